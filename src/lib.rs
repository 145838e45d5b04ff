//! Typed host/guest calls for WebAssembly modules.
//!
//! The WebAssembly calling convention only carries numbers. wasify passes
//! richer values (bytes, scalars, floats, strings and tuples of them) by
//! writing them into the guest's linear memory and describing each one with
//! a single packed `u64`: an 8-bit type tag, a 32-bit offset and a 24-bit
//! size. A word tagged `255` points at an array of further packed words and
//! carries multiple values.
//!
//! # Quick Start
//!
//! ```ignore
//! use wasify::prelude::*;
//!
//! let runtime = Runtime::new(RuntimeConfig::default())?;
//! let mut module = runtime.create(ModuleConfig::new("myEnv", Wasm::from_file("guest.wasm")?))?;
//!
//! let mut result = module.guest_function("greet").invoke(["wasify"]);
//! if let Some(err) = result.error() {
//!     eprintln!("{err}");
//! }
//! println!("{}", result.read_string_pack(0)?);
//! result.close()?;
//! ```
//!
//! # Modules
//!
//! - [`abi`] - Packed-value codec and typed memory accessor (always available)
//! - [`wasm`] - Guest execution through wasmtime (requires `wasm` feature)
//! - [`manifest`] - TOML module manifests (requires `manifest` feature)
//!
//! # Feature Flags
//!
//! - `wasm` - Enable guest execution through wasmtime (enabled by default)
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `manifest` - Enable TOML module manifests
//! - `cli` - Enable the command-line interface binary
//! - `full` - Enable all features

pub mod abi;
mod logging;
#[cfg(feature = "manifest")]
pub mod manifest;
pub mod prelude;
#[cfg(feature = "wasm")]
pub mod wasm;

mod error;

// Re-export the unified error type
pub use error::{Error, Result};

pub use logging::LogSeverity;

// Re-export ABI types
pub use abi::{
    AbiError, Handle, LinearMemory, Memory, MultiPackedData, PackedData, Value, ValueType,
};

// Re-export WASM types at crate root for convenience
#[cfg(feature = "wasm")]
pub use wasm::{
    GuestFunctionResult, GuestModule, HostFunction, ModuleConfig, Runtime, RuntimeConfig, Wasm,
    WasmError,
};
