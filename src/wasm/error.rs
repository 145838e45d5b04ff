//! Error types for guest module execution.

use thiserror::Error;

use crate::abi::AbiError;

/// Errors that can occur while creating or calling into a guest module.
#[derive(Error, Debug)]
pub enum WasmError {
    /// Wasmtime engine, compilation or linking error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),

    /// Failed to read a wasm binary.
    #[error("Failed to load wasm module: {0}")]
    Io(#[from] std::io::Error),

    /// Packed-value encoding or memory access error.
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// The guest does not export something the runtime requires.
    #[error("Module does not export '{0}'")]
    MissingExport(String),

    /// Requested guest function is not exported.
    #[error("Function not found in module: {0}")]
    FunctionNotFound(String),

    /// An argument could not be allocated, written or packed.
    #[error("Failed to write argument {index} of guest function '{function}': {source}")]
    Argument {
        function: String,
        index: usize,
        #[source]
        source: AbiError,
    },

    /// The guest call itself failed (trap, signature mismatch, ...).
    #[error("Failed to invoke the guest function '{function}': {reason}")]
    Call { function: String, reason: String },

    /// The returned word could not be decoded into packed values.
    #[error("Failed to decode results of '{function}': {source}")]
    Decode {
        function: String,
        #[source]
        source: AbiError,
    },

    /// A host function received a different number of slots than it declares.
    #[error("Params mismatch for host function '{function}': expected {expected}, received {received}")]
    ParamsMismatch {
        function: String,
        expected: usize,
        received: usize,
    },

    /// The wasm binary does not match the expected hash.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    /// WASI context could not be configured.
    #[error("WASI configuration error: {0}")]
    Wasi(String),

    /// A host function callback reported a failure.
    #[error("Host function '{function}' failed: {reason}")]
    Callback { function: String, reason: String },

    /// Memory owned by a call result could not be released.
    #[error("Failed to release memory of '{function}': {source}")]
    Cleanup {
        function: String,
        #[source]
        source: AbiError,
    },
}

impl WasmError {
    /// Create a callback error from a host function name and message.
    pub fn callback(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Callback {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a hash mismatch.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// Returns `true` if a host function was called with the wrong arity.
    pub fn is_params_mismatch(&self) -> bool {
        matches!(self, Self::ParamsMismatch { .. })
    }

    /// Returns the underlying [`AbiError`], if any.
    pub fn abi(&self) -> Option<&AbiError> {
        match self {
            Self::Abi(source)
            | Self::Argument { source, .. }
            | Self::Decode { source, .. }
            | Self::Cleanup { source, .. } => Some(source),
            _ => None,
        }
    }
}
