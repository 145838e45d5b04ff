//! Owned results of a guest call.

use super::error::WasmError;
use super::module::GuestModule;
use crate::abi::{AbiError, Allocator, Handle, Memory, PackedData, Value};
use crate::logging::{trace, warn};

/// The decoded values of one guest call, or the error that prevented it.
///
/// Values are decoded when the call completes and stay readable until the
/// result is closed. [`close`](Self::close) consumes the result and frees
/// every value together with the call's arguments exactly once; a result that
/// is dropped without being closed is released on drop.
pub struct GuestFunctionResult<'m> {
    module: &'m mut GuestModule,
    function: String,
    error: Option<WasmError>,
    values: Vec<Handle>,
    arguments: Vec<u32>,
    released: bool,
}

impl<'m> GuestFunctionResult<'m> {
    pub(crate) fn new(
        module: &'m mut GuestModule,
        function: String,
        values: Vec<Handle>,
        arguments: Vec<u32>,
    ) -> Self {
        Self {
            module,
            function,
            error: None,
            values,
            arguments,
            released: false,
        }
    }

    pub(crate) fn failed(module: &'m mut GuestModule, function: String, error: WasmError) -> Self {
        Self {
            module,
            function,
            error: Some(error),
            values: Vec::new(),
            arguments: Vec::new(),
            released: false,
        }
    }

    /// Name of the guest function that produced this result.
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn error(&self) -> Option<&WasmError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Turn a failed call into `Err`, keeping successful results.
    pub fn into_result(mut self) -> Result<Self, WasmError> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Handles to the returned values, in the order the guest packed them.
    pub fn values(&self) -> &[Handle] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn packed(&mut self, index: usize) -> Result<PackedData, WasmError> {
        let handle = self
            .values
            .get(index)
            .copied()
            .ok_or(AbiError::IndexOutOfBounds {
                index,
                len: self.values.len(),
            })?;
        Ok(self.module.memory().resolve(&handle)?)
    }

    pub fn read_bytes_pack(&mut self, index: usize) -> Result<Vec<u8>, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_bytes_pack(pd)?)
    }

    pub fn read_byte_pack(&mut self, index: usize) -> Result<u8, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_byte_pack(pd)?)
    }

    pub fn read_u32_pack(&mut self, index: usize) -> Result<u32, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_u32_pack(pd)?)
    }

    pub fn read_u64_pack(&mut self, index: usize) -> Result<u64, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_u64_pack(pd)?)
    }

    pub fn read_f32_pack(&mut self, index: usize) -> Result<f32, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_f32_pack(pd)?)
    }

    pub fn read_f64_pack(&mut self, index: usize) -> Result<f64, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_f64_pack(pd)?)
    }

    pub fn read_string_pack(&mut self, index: usize) -> Result<String, WasmError> {
        let pd = self.packed(index)?;
        Ok(self.module.memory().read_string_pack(pd)?)
    }

    /// Read a value according to its packed type.
    pub fn read_any_pack(&mut self, index: usize) -> Result<Value, WasmError> {
        let pd = self.packed(index)?;
        let (value, _, _) = self.module.memory().read_any_pack(pd)?;
        Ok(value)
    }

    /// Read every value in order.
    pub fn read_all(&mut self) -> Result<Vec<Value>, WasmError> {
        (0..self.values.len())
            .map(|index| self.read_any_pack(index))
            .collect()
    }

    /// Free every value and argument owned by this result.
    pub fn close(mut self) -> Result<(), WasmError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), WasmError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.values.is_empty() && self.arguments.is_empty() {
            return Ok(());
        }

        let mut memory = self.module.memory();
        let mut offsets: Vec<u32> = self
            .values
            .iter()
            .filter_map(|handle| memory.resolve(handle).ok())
            .map(|pd| pd.offset())
            .chain(self.arguments.iter().copied())
            .collect();
        // A value may point into an argument.
        offsets.sort_unstable();
        offsets.dedup();

        trace!(function = %self.function, offsets = offsets.len(), "releasing result");
        memory.free(&offsets).map_err(|source| WasmError::Cleanup {
            function: self.function.clone(),
            source,
        })
    }
}

impl Drop for GuestFunctionResult<'_> {
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(function = %self.function, error = %err, "failed to release guest function result");
        }
    }
}
