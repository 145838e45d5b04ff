//! Unified error type for the wasify library.
//!
//! This module provides a single [`Error`] type that encompasses all errors
//! that can occur in the library, making it easier to handle errors in
//! application code.

use thiserror::Error;

use crate::abi::AbiError;
#[cfg(feature = "manifest")]
use crate::manifest::ManifestError;
#[cfg(feature = "wasm")]
use crate::wasm::WasmError;

/// Unified error type for all wasify operations.
///
/// # Example
///
/// ```ignore
/// use wasify::{Result, wasm::{ModuleConfig, Runtime, RuntimeConfig, Wasm}};
///
/// fn greet(runtime: &Runtime) -> Result<String> {
///     let mut module = runtime.create(ModuleConfig::new("env", Wasm::from_file("guest.wasm")?))?;
///     let mut result = module.guest_function("greet").invoke(["wasify"]).into_result()?;
///     let reply = result.read_string_pack(0)?;
///     result.close()?;
///     Ok(reply)
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Error from packed-value encoding or memory access.
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// Error from guest module creation or execution.
    #[cfg(feature = "wasm")]
    #[error(transparent)]
    Wasm(#[from] WasmError),

    /// Error loading a module manifest.
    #[cfg(feature = "manifest")]
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if this is an ABI error.
    pub fn is_abi(&self) -> bool {
        matches!(self, Self::Abi(_))
    }

    /// Returns `true` if this is a WASM execution error.
    #[cfg(feature = "wasm")]
    pub fn is_wasm(&self) -> bool {
        matches!(self, Self::Wasm(_))
    }

    /// Returns `true` if this is a manifest error.
    #[cfg(feature = "manifest")]
    pub fn is_manifest(&self) -> bool {
        matches!(self, Self::Manifest(_))
    }

    /// Returns `true` if this is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if a module failed its integrity check.
    #[cfg(feature = "wasm")]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Wasm(e) if e.is_integrity())
    }
}
