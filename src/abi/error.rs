//! Error types for packed-value encoding and memory access.

use thiserror::Error;

/// Errors that can occur while packing values or accessing linear memory.
#[derive(Error, Debug)]
pub enum AbiError {
    #[error("Size {size} exceeds 24 bits precision {}", super::MAX_SIZE + 1)]
    SizeOverflow { size: u64 },

    #[error("Unsupported conversion data type: {0}")]
    UnsupportedConversion(String),

    #[error("Unknown type tag {0}")]
    UnknownTag(u8),

    #[error("Memory.{operation}({offset}, {size}) out of range of memory size {memory_size}")]
    OutOfRange {
        operation: &'static str,
        offset: u32,
        size: u32,
        memory_size: usize,
    },

    #[error("Invalid data type found, expected pack tag {}, got {tag}", super::PACK_TAG)]
    NotAPack { tag: u8 },

    #[error("Packed data is empty")]
    EmptyPack,

    #[error("Multi-pack carrier size {size} is not a multiple of 8")]
    MisalignedPack { size: u32 },

    #[error("Invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: u32 },

    #[error("Stale handle: memory at offset {offset} was released")]
    StaleHandle { offset: u32 },

    #[error("Value index {index} out of bounds for {len} values")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Can't invoke '{operation}' function: {reason}")]
    Allocation {
        operation: &'static str,
        reason: String,
    },

    #[error("Failed to free {} offset(s): {}", .failures.len(), join_failures(.failures))]
    Free { failures: Vec<FreeFailure> },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AbiError>,
    },
}

/// A single failed `free` inside an aggregated [`AbiError::Free`].
#[derive(Debug)]
pub struct FreeFailure {
    pub offset: u32,
    pub reason: String,
}

fn join_failures(failures: &[FreeFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.offset, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AbiError {
    /// Wrap this error with a short contextual message.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context wrappers.
    pub fn root(&self) -> &AbiError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns `true` if this error (ignoring context) is a memory-range error.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.root(), Self::OutOfRange { .. })
    }

    /// Returns `true` if this error (ignoring context) is a stale-handle error.
    pub fn is_stale_handle(&self) -> bool {
        matches!(self.root(), Self::StaleHandle { .. })
    }
}
