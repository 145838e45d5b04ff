//! Guest module execution through wasmtime.
//!
//! A [`Runtime`] owns the engine. Each [`ModuleConfig`] it is given becomes a
//! [`GuestModule`]: its own store, WASI context, linker and linear memory.
//!
//! ```text
//! host values ─► GuestFunction::invoke ─► malloc + write + pack ─► guest export
//!                                                                      │
//! GuestFunctionResult ◄── adopt handles ◄── read carrier + free ◄── packed word
//! ```
//!
//! Guest imports resolve against the `wasify` namespace ([`default_host_functions`])
//! and the module's own namespace, where each [`HostFunction`] decodes the
//! incoming packed words and hands them to its callback.

mod config;
mod defaults;
mod error;
mod guest_function;
mod host_function;
mod memory;
mod module;
mod result;
mod runtime;

pub use config::{FsConfig, ModuleConfig, RuntimeConfig, Wasm};
pub use defaults::{WASIFY_NAMESPACE, default_host_functions};
pub use error::WasmError;
pub use guest_function::GuestFunction;
pub use host_function::{HostCallback, HostFunction};
pub use memory::InstanceMemory;
pub use module::GuestModule;
pub use result::GuestFunctionResult;
pub use runtime::{HostState, Runtime, hash_wasm};
