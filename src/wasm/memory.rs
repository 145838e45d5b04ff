//! Linear memory of a live guest instance.

use wasmtime::{AsContextMut, Func, Memory as WasmMemory, Val, ValType};

use super::runtime::HostState;
use crate::abi::buffer::{read_slice, write_slice};
use crate::abi::{AbiError, Allocator, Handle, PackedData, RawMemory};
use crate::logging::trace;

/// Exports the runtime resolves once per instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GuestExports {
    pub(crate) memory: WasmMemory,
    pub(crate) malloc: Option<Func>,
    pub(crate) free: Option<Func>,
}

/// [`RawMemory`] + [`Allocator`] over a guest's `memory`, `malloc` and `free`.
///
/// Generic over the store context so the same accessor serves host-initiated
/// calls (`&mut Store`) and host functions running inside a guest call
/// (`&mut Caller`). Handle registrations live in the store data and survive
/// the accessor.
pub struct InstanceMemory<C> {
    ctx: C,
    exports: GuestExports,
}

impl<C> InstanceMemory<C>
where
    C: AsContextMut<Data = HostState>,
{
    pub(crate) fn new(ctx: C, exports: GuestExports) -> Self {
        Self { ctx, exports }
    }

    fn call_allocator(
        &mut self,
        operation: &'static str,
        func: Option<Func>,
        arg: u64,
    ) -> Result<Option<u64>, AbiError> {
        let func = func.ok_or_else(|| AbiError::Allocation {
            operation,
            reason: "function is not exported by the guest".to_string(),
        })?;
        let ty = func.ty(self.ctx.as_context());
        let params: Vec<Val> = ty.params().map(|ty| native_arg(&ty, arg)).collect();
        let mut results: Vec<Val> = ty.results().map(|ty| native_arg(&ty, 0)).collect();

        trace!(operation, arg, "calling guest allocator");
        func.call(self.ctx.as_context_mut(), &params, &mut results)
            .map_err(|e| AbiError::Allocation {
                operation,
                reason: format!("{e:#}"),
            })?;

        Ok(results.first().and_then(native_word))
    }
}

/// Zero-extend `value` into a native value of type `ty`.
pub(crate) fn native_arg(ty: &ValType, value: u64) -> Val {
    match ty {
        ValType::I32 => Val::I32(value as u32 as i32),
        _ => Val::I64(value as i64),
    }
}

/// Read a native integer result back as a word.
pub(crate) fn native_word(val: &Val) -> Option<u64> {
    match val {
        Val::I64(v) => Some(*v as u64),
        Val::I32(v) => Some(u64::from(*v as u32)),
        _ => None,
    }
}

impl<C> RawMemory for InstanceMemory<C>
where
    C: AsContextMut<Data = HostState>,
{
    fn size(&self) -> usize {
        self.exports.memory.data_size(self.ctx.as_context())
    }

    fn read(&self, operation: &'static str, offset: u32, len: u32) -> Result<Vec<u8>, AbiError> {
        let data = self.exports.memory.data(self.ctx.as_context());
        read_slice(data, operation, offset, len).map(<[u8]>::to_vec)
    }

    fn write(&mut self, operation: &'static str, offset: u32, bytes: &[u8]) -> Result<(), AbiError> {
        let data = self.exports.memory.data_mut(self.ctx.as_context_mut());
        write_slice(data, operation, offset, bytes)
    }
}

impl<C> Allocator for InstanceMemory<C>
where
    C: AsContextMut<Data = HostState>,
{
    fn malloc(&mut self, size: u32) -> Result<u32, AbiError> {
        let malloc = self.exports.malloc;
        let word = self
            .call_allocator("malloc", malloc, u64::from(size))?
            .ok_or_else(|| AbiError::Allocation {
                operation: "malloc",
                reason: "guest malloc returned no value".to_string(),
            })?;
        let offset = u32::try_from(word).map_err(|_| AbiError::Allocation {
            operation: "malloc",
            reason: format!("returned offset {word} does not fit in 32 bits"),
        })?;
        if offset == 0 && size > 0 {
            return Err(AbiError::Allocation {
                operation: "malloc",
                reason: format!("guest could not allocate {size} bytes"),
            });
        }
        trace!(size, offset, "malloc");
        Ok(offset)
    }

    fn release(&mut self, offset: u32) -> Result<(), AbiError> {
        let free = self.exports.free;
        self.call_allocator("free", free, u64::from(offset))?;
        trace!(offset, "free");
        Ok(())
    }

    fn adopt(&mut self, packed: PackedData) -> Handle {
        self.ctx.as_context_mut().data_mut().handles.adopt(packed)
    }

    fn resolve(&self, handle: &Handle) -> Result<PackedData, AbiError> {
        self.ctx.as_context().data().handles.resolve(handle)
    }

    fn retire(&mut self, offset: u32) {
        self.ctx.as_context_mut().data_mut().handles.retire(offset);
    }
}
