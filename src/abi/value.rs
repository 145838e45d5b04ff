//! Host-side values that can be written into guest memory.

use std::fmt;

use super::{AbiError, ValueType};

/// A typed value on the host side of the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Byte(u8),
    I32(u32),
    I64(u64),
    F32(f32),
    F64(f64),
    String(String),
}

impl Value {
    /// The wire type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bytes(_) => ValueType::Bytes,
            Self::Byte(_) => ValueType::Byte,
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
            Self::String(_) => ValueType::String,
        }
    }

    /// Natural byte size of the value in linear memory.
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Bytes(b) => b.len(),
            Self::String(s) => s.len(),
            Self::Byte(_) => 1,
            Self::I32(_) | Self::F32(_) => 4,
            Self::I64(_) | Self::F64(_) => 8,
        }
    }

    /// Little-endian memory representation.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b.clone(),
            Self::Byte(b) => vec![*b],
            Self::I32(v) => v.to_le_bytes().to_vec(),
            Self::I64(v) => v.to_le_bytes().to_vec(),
            Self::F32(v) => v.to_le_bytes().to_vec(),
            Self::F64(v) => v.to_le_bytes().to_vec(),
            Self::String(s) => s.as_bytes().to_vec(),
        }
    }

    /// Parse a `kind:literal` argument, e.g. `string:hello`, `i32:7`,
    /// `f64:1.5` or `bytes:deadbeef` (hex).
    pub fn parse_typed(input: &str) -> Result<Self, AbiError> {
        let (kind, literal) = input
            .split_once(':')
            .ok_or_else(|| AbiError::UnsupportedConversion(format!("{input} (expected kind:value)")))?;

        let invalid = |kind: &str| {
            AbiError::UnsupportedConversion(format!("invalid {kind} literal '{literal}'"))
        };

        match kind {
            "bytes" => hex::decode(literal)
                .map(Self::Bytes)
                .map_err(|_| invalid(kind)),
            "byte" | "u8" => literal.parse().map(Self::Byte).map_err(|_| invalid(kind)),
            "i32" | "u32" => literal.parse().map(Self::I32).map_err(|_| invalid(kind)),
            "i64" | "u64" => literal.parse().map(Self::I64).map_err(|_| invalid(kind)),
            "f32" => literal.parse().map(Self::F32).map_err(|_| invalid(kind)),
            "f64" => literal.parse().map(Self::F64).map_err(|_| invalid(kind)),
            "string" | "str" => Ok(Self::String(literal.to_string())),
            other => Err(AbiError::UnsupportedConversion(other.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "bytes:{}", hex::encode(b)),
            Self::Byte(v) => write!(f, "byte:{v}"),
            Self::I32(v) => write!(f, "i32:{v}"),
            Self::I64(v) => write!(f, "i64:{v}"),
            Self::F32(v) => write!(f, "f32:{v}"),
            Self::F64(v) => write!(f, "f64:{v}"),
            Self::String(s) => write!(f, "string:{s}"),
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::I32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_sizes() {
        assert_eq!(Value::from("hello").byte_size(), 5);
        assert_eq!(Value::from(7u8).byte_size(), 1);
        assert_eq!(Value::from(7u32).byte_size(), 4);
        assert_eq!(Value::from(7u64).byte_size(), 8);
        assert_eq!(Value::from(1.5f32).byte_size(), 4);
        assert_eq!(Value::from(1.5f64).byte_size(), 8);
        assert_eq!(Value::from(vec![1u8, 2, 3]).byte_size(), 3);
    }

    #[test]
    fn test_le_bytes() {
        assert_eq!(Value::I32(0x0403_0201).to_le_bytes(), vec![1, 2, 3, 4]);
        assert_eq!(Value::F64(1.0).to_le_bytes(), 1.0f64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_parse_typed() {
        assert_eq!(Value::parse_typed("string:a:b").unwrap(), Value::String("a:b".into()));
        assert_eq!(Value::parse_typed("i32:42").unwrap(), Value::I32(42));
        assert_eq!(Value::parse_typed("u64:42").unwrap(), Value::I64(42));
        assert_eq!(Value::parse_typed("byte:255").unwrap(), Value::Byte(255));
        assert_eq!(Value::parse_typed("f32:1.5").unwrap(), Value::F32(1.5));
        assert_eq!(Value::parse_typed("bytes:00ff").unwrap(), Value::Bytes(vec![0, 255]));
        assert!(Value::parse_typed("byte:256").is_err());
        assert!(Value::parse_typed("nope").is_err());

        let err = Value::parse_typed("i128:1").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported conversion data type: i128");
    }
}
