//! Packed 64-bit calling convention shared by host and guest.
//!
//! A value crossing the boundary is written into guest linear memory and
//! described by one `u64` word:
//!
//! ```text
//! 63        56 55                              24 23              0
//! +-----------+----------------------------------+-----------------+
//! | type tag  |             offset               |      size       |
//! +-----------+----------------------------------+-----------------+
//! ```
//!
//! # Module Organization
//!
//! - [`error`]: Error types for encoding and memory access
//! - [`buffer`]: Little-endian buffer read/write helpers
//! - [`value`]: Host-side typed values and their conversions
//! - [`handle`]: Generation-checked ownership handles
//! - [`memory`]: Raw memory and allocator capabilities, plus [`LinearMemory`]
//! - [`accessor`]: The typed [`Memory`] accessor layered on top of them

mod accessor;
pub(crate) mod buffer;
mod error;
mod handle;
mod memory;
mod value;

pub use accessor::Memory;
pub use buffer::{bytes_to_words, words_to_bytes};
pub use error::{AbiError, FreeFailure};
pub use handle::{Handle, HandleTable};
pub use memory::{Allocator, LinearMemory, RawMemory};
pub use value::Value;

use std::fmt;

/// Wire tag reserved for multi-pack carriers.
pub const PACK_TAG: u8 = 255;

/// Largest size representable in the 24-bit size field.
pub const MAX_SIZE: u32 = (1 << 24) - 1;

const OFFSET_SHIFT: u32 = 24;
const TAG_SHIFT: u32 = 56;
const SIZE_MASK: u64 = 0xFF_FFFF;
const OFFSET_MASK: u64 = 0xFFFF_FFFF;

/// The kinds of values that can cross the host/guest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Bytes = 0,
    Byte = 1,
    I32 = 2,
    I64 = 3,
    F32 = 4,
    F64 = 5,
    String = 6,
}

impl ValueType {
    /// All value types, in tag order.
    pub const ALL: [ValueType; 7] = [
        ValueType::Bytes,
        ValueType::Byte,
        ValueType::I32,
        ValueType::I64,
        ValueType::F32,
        ValueType::F64,
        ValueType::String,
    ];

    /// The wire tag for this type.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a value type by wire tag. Returns `None` for the pack tag and
    /// for unassigned tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Bytes),
            1 => Some(Self::Byte),
            2 => Some(Self::I32),
            3 => Some(Self::I64),
            4 => Some(Self::F32),
            5 => Some(Self::F64),
            6 => Some(Self::String),
            _ => None,
        }
    }

    /// Fixed byte width, or `None` for variable-length kinds.
    pub fn fixed_size(self) -> Option<u32> {
        match self {
            Self::Byte => Some(1),
            Self::I32 | Self::F32 => Some(4),
            Self::I64 | Self::F64 => Some(8),
            Self::Bytes | Self::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Byte => "byte",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pack a raw `(tag, offset, size)` triple into a wire word.
///
/// Fails if `size` does not fit in 24 bits.
pub fn pack(tag: u8, offset: u32, size: u32) -> Result<u64, AbiError> {
    if size > MAX_SIZE {
        return Err(AbiError::SizeOverflow { size: size.into() });
    }
    Ok((u64::from(tag) << TAG_SHIFT) | (u64::from(offset) << OFFSET_SHIFT) | u64::from(size))
}

/// Split a wire word into its raw `(tag, offset, size)` triple.
///
/// Never fails; the tag is not validated.
pub fn unpack(word: u64) -> (u8, u32, u32) {
    let tag = (word >> TAG_SHIFT) as u8;
    let offset = ((word >> OFFSET_SHIFT) & OFFSET_MASK) as u32;
    let size = (word & SIZE_MASK) as u32;
    (tag, offset, size)
}

/// A single typed value living in guest linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedData {
    ty: ValueType,
    offset: u32,
    size: u32,
}

impl PackedData {
    /// Describe `size` bytes of type `ty` at `offset`.
    pub fn new(ty: ValueType, offset: u32, size: u32) -> Result<Self, AbiError> {
        if size > MAX_SIZE {
            return Err(AbiError::SizeOverflow { size: size.into() });
        }
        Ok(Self { ty, offset, size })
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Encode as a wire word.
    pub fn to_wire(self) -> u64 {
        (u64::from(self.ty.tag()) << TAG_SHIFT)
            | (u64::from(self.offset) << OFFSET_SHIFT)
            | u64::from(self.size)
    }

    /// Decode a wire word, rejecting the pack tag and unassigned tags.
    pub fn from_wire(word: u64) -> Result<Self, AbiError> {
        let (tag, offset, size) = unpack(word);
        let ty = ValueType::from_tag(tag).ok_or(AbiError::UnknownTag(tag))?;
        Ok(Self { ty, offset, size })
    }
}

impl fmt::Display for PackedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}+{}", self.ty, self.offset, self.size)
    }
}

/// A word pointing at an array of further packed words, or the empty word.
///
/// The empty value encodes as `0` and means "no results".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MultiPackedData {
    carrier: Option<Carrier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Carrier {
    offset: u32,
    size: u32,
}

impl MultiPackedData {
    pub const EMPTY: Self = Self { carrier: None };

    /// Describe a carrier region of `size` bytes at `offset`.
    pub fn new(offset: u32, size: u32) -> Result<Self, AbiError> {
        if size > MAX_SIZE {
            return Err(AbiError::SizeOverflow { size: size.into() });
        }
        if size % 8 != 0 {
            return Err(AbiError::MisalignedPack { size });
        }
        Ok(Self {
            carrier: Some(Carrier { offset, size }),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.carrier.is_none()
    }

    /// Number of packed words in the carrier.
    pub fn len(&self) -> usize {
        self.carrier.map_or(0, |c| (c.size / 8) as usize)
    }

    /// Carrier `(offset, size)`, if any.
    pub fn region(&self) -> Option<(u32, u32)> {
        self.carrier.map(|c| (c.offset, c.size))
    }

    pub fn to_wire(self) -> u64 {
        match self.carrier {
            Some(c) => {
                (u64::from(PACK_TAG) << TAG_SHIFT)
                    | (u64::from(c.offset) << OFFSET_SHIFT)
                    | u64::from(c.size)
            }
            None => 0,
        }
    }

    /// Decode a wire word. `0` decodes to [`MultiPackedData::EMPTY`]; any
    /// other word must carry the pack tag.
    pub fn from_wire(word: u64) -> Result<Self, AbiError> {
        if word == 0 {
            return Ok(Self::EMPTY);
        }
        let (tag, offset, size) = unpack(word);
        if tag != PACK_TAG {
            return Err(AbiError::NotAPack { tag });
        }
        Self::new(offset, size)
    }

    /// Returns `true` if `word` carries the pack tag.
    pub fn is_pack_word(word: u64) -> bool {
        unpack(word).0 == PACK_TAG
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let word = pack(ValueType::String.tag(), 16, 13).unwrap();
        assert_eq!(word, 0x0600_0000_1000_000d);
        assert_eq!(unpack(word), (6, 16, 13));
    }

    #[test]
    fn test_pack_rejects_oversized() {
        assert!(pack(0, 0, MAX_SIZE).is_ok());
        assert!(matches!(
            pack(0, 0, MAX_SIZE + 1),
            Err(AbiError::SizeOverflow { size }) if size == u64::from(MAX_SIZE) + 1
        ));
        assert!(PackedData::new(ValueType::Bytes, 0, 1 << 24).is_err());
    }

    #[test]
    fn test_unpack_is_total() {
        let (tag, offset, size) = unpack(u64::MAX);
        assert_eq!(tag, 255);
        assert_eq!(offset, u32::MAX);
        assert_eq!(size, MAX_SIZE);
    }

    #[test]
    fn test_from_wire_rejects_unknown_tags() {
        let word = pack(42, 8, 8).unwrap();
        assert!(matches!(PackedData::from_wire(word), Err(AbiError::UnknownTag(42))));

        let pack_word = pack(PACK_TAG, 8, 8).unwrap();
        assert!(PackedData::from_wire(pack_word).is_err());
    }

    #[test]
    fn test_multi_pack_wire() {
        assert_eq!(MultiPackedData::from_wire(0).unwrap(), MultiPackedData::EMPTY);
        assert_eq!(MultiPackedData::EMPTY.to_wire(), 0);

        let multi = MultiPackedData::new(64, 24).unwrap();
        assert_eq!(multi.len(), 3);
        let word = multi.to_wire();
        assert!(MultiPackedData::is_pack_word(word));
        assert_eq!(MultiPackedData::from_wire(word).unwrap(), multi);

        let scalar = PackedData::new(ValueType::I32, 64, 4).unwrap().to_wire();
        assert!(matches!(
            MultiPackedData::from_wire(scalar),
            Err(AbiError::NotAPack { tag: 2 })
        ));
        assert!(matches!(
            MultiPackedData::new(0, 12),
            Err(AbiError::MisalignedPack { size: 12 })
        ));
    }

    #[test]
    fn test_value_type_tags() {
        for ty in ValueType::ALL {
            assert_eq!(ValueType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ValueType::from_tag(PACK_TAG), None);
    }
}
