//! Host functions callable from the guest.
//!
//! The guest calls a host function with one `i64` slot per declared
//! parameter. Each slot is a packed word describing a value the guest wrote
//! into its own memory; the callback receives the decoded [`PackedData`]
//! list unread, together with a [`Memory`] accessor for the calling
//! instance, and answers with a [`MultiPackedData`] that is stored into the
//! single `i64` return slot.

use std::fmt;
use std::sync::Arc;

use wasmtime::{Engine, FuncType, ValType};

use super::error::WasmError;
use crate::abi::{Memory, MultiPackedData, PackedData, ValueType};
use crate::logging::debug;

/// Signature shared by all host function callbacks.
pub type HostCallback =
    dyn Fn(&mut dyn Memory, &[PackedData]) -> Result<MultiPackedData, WasmError> + Send + Sync;

/// A host function registration record.
///
/// # Example
///
/// ```ignore
/// use wasify::abi::{Memory, ValueType};
/// use wasify::wasm::HostFunction;
///
/// let greet = HostFunction::new("greet", [ValueType::String], [ValueType::String], |memory, params| {
///     let name = memory.read_string_pack(params[0])?;
///     let reply = memory.write_string_pack(&format!("Hello, {name}"))?;
///     Ok(memory.write_multi_pack(&[reply])?)
/// });
/// ```
#[derive(Clone)]
pub struct HostFunction {
    name: String,
    params: Vec<ValueType>,
    results: Vec<ValueType>,
    callback: Arc<HostCallback>,
}

impl HostFunction {
    pub fn new<F>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = ValueType>,
        results: impl IntoIterator<Item = ValueType>,
        callback: F,
    ) -> Self
    where
        F: Fn(&mut dyn Memory, &[PackedData]) -> Result<MultiPackedData, WasmError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
            callback: Arc::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn results(&self) -> &[ValueType] {
        &self.results
    }

    /// Decode incoming slots into packed values.
    ///
    /// A function that declares no parameters ignores its slots. Otherwise
    /// the slot count must match the declared parameter count.
    pub fn decode_params(&self, slots: &[u64]) -> Result<Vec<PackedData>, WasmError> {
        if self.params.is_empty() {
            return Ok(Vec::new());
        }
        if slots.len() != self.params.len() {
            return Err(WasmError::ParamsMismatch {
                function: self.name.clone(),
                expected: self.params.len(),
                received: slots.len(),
            });
        }
        slots
            .iter()
            .map(|word| {
                PackedData::from_wire(*word).map_err(|source| WasmError::Decode {
                    function: self.name.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Decode `slots`, run the callback and return the word for the guest's
    /// return slot. The callback is never reached if decoding fails.
    pub fn dispatch(&self, memory: &mut dyn Memory, slots: &[u64]) -> Result<u64, WasmError> {
        let params = self.decode_params(slots)?;
        debug!(function = %self.name, params = params.len(), "calling host function");
        let packed = (self.callback)(memory, &params)?;
        Ok(packed.to_wire())
    }

    /// Native wasm signature: one `i64` per parameter and a single `i64`
    /// result when any result is declared.
    pub(crate) fn func_type(&self, engine: &Engine) -> FuncType {
        let results: &[ValType] = if self.results.is_empty() {
            &[]
        } else {
            &[ValType::I64]
        };
        FuncType::new(
            engine,
            self.params.iter().map(|_| ValType::I64),
            results.iter().cloned(),
        )
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}
