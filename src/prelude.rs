//! Convenient re-exports for common usage patterns.
//!
//! # Example
//!
//! ```ignore
//! use wasify::prelude::*;
//!
//! let greet = HostFunction::new("greet", [ValueType::String], [ValueType::String], |memory, params| {
//!     let name = memory.read_string_pack(params[0])?;
//!     let reply = memory.write_string_pack(&format!("Hello, {name}"))?;
//!     Ok(memory.write_multi_pack(&[reply])?)
//! });
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Codec and memory access
pub use crate::abi::{
    AbiError, Allocator, Handle, LinearMemory, Memory, MultiPackedData, PackedData, RawMemory,
    Value, ValueType,
};
pub use crate::logging::LogSeverity;

// Guest execution (requires "wasm" feature)
#[cfg(feature = "wasm")]
pub use crate::wasm::{
    FsConfig, GuestFunction, GuestFunctionResult, GuestModule, HostFunction, ModuleConfig,
    Runtime, RuntimeConfig, Wasm, WasmError,
};

// Manifests (requires "manifest" feature)
#[cfg(feature = "manifest")]
pub use crate::manifest::{ManifestError, ModuleManifest};
