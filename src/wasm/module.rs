//! A live guest module instance.

use wasmtime::{Instance, Store, Val};

use super::error::WasmError;
use super::guest_function::GuestFunction;
use super::memory::{GuestExports, InstanceMemory, native_arg, native_word};
use super::runtime::HostState;
use crate::logging::{info, trace};

/// An instantiated guest with its own store and linear memory.
///
/// Calls are strictly sequential: every entry point borrows the module
/// mutably.
pub struct GuestModule {
    namespace: String,
    store: Store<HostState>,
    instance: Instance,
    exports: GuestExports,
}

impl GuestModule {
    pub(crate) fn new(
        namespace: String,
        store: Store<HostState>,
        instance: Instance,
        exports: GuestExports,
    ) -> Self {
        Self {
            namespace,
            store,
            instance,
            exports,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prepare a call to the exported function `name`.
    ///
    /// The export is looked up when the function is invoked.
    pub fn guest_function(&mut self, name: impl Into<String>) -> GuestFunction<'_> {
        GuestFunction::new(self, name.into())
    }

    /// Typed accessor over this module's memory and allocator.
    pub fn memory(&mut self) -> InstanceMemory<&mut Store<HostState>> {
        InstanceMemory::new(&mut self.store, self.exports)
    }

    /// Call an export with raw words and no packing.
    ///
    /// Returns the first result, or `None` for a function without results.
    pub fn call_raw(&mut self, name: &str, args: &[u64]) -> Result<Option<u64>, WasmError> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| WasmError::FunctionNotFound(name.to_string()))?;
        let ty = func.ty(&self.store);
        if ty.params().len() != args.len() {
            return Err(WasmError::Call {
                function: name.to_string(),
                reason: format!("expected {} arguments, got {}", ty.params().len(), args.len()),
            });
        }
        let params: Vec<Val> = ty
            .params()
            .zip(args)
            .map(|(ty, word)| native_arg(&ty, *word))
            .collect();
        let mut results: Vec<Val> = ty.results().map(|ty| native_arg(&ty, 0)).collect();

        trace!(function = name, args = ?args, "raw guest call");
        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| WasmError::Call {
                function: name.to_string(),
                reason: format!("{e:#}"),
            })?;
        Ok(results.first().and_then(native_word))
    }

    pub(crate) fn instance(&self) -> Instance {
        self.instance
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Number of guest values currently owned through live handles.
    pub fn live_handles(&self) -> usize {
        self.store.data().handles.len()
    }

    /// Tear down the instance and release its store.
    pub fn close(self) {
        info!(namespace = %self.namespace, "module closed");
    }
}
