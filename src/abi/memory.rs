//! Raw memory and allocator capabilities, and an in-process linear memory.

use std::collections::BTreeMap;

use super::buffer::{align_to, read_slice, write_slice};
use super::{AbiError, Handle, HandleTable, PackedData};

/// Size of one WebAssembly memory page.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Bounds-checked byte access to a linear memory.
pub trait RawMemory {
    /// Current size of the memory in bytes.
    fn size(&self) -> usize;

    /// Copy `len` bytes starting at `offset`.
    ///
    /// `operation` names the caller in the out-of-range error.
    fn read(&self, operation: &'static str, offset: u32, len: u32) -> Result<Vec<u8>, AbiError>;

    /// Write `bytes` starting at `offset`. Nothing is written if the range
    /// does not fit.
    fn write(&mut self, operation: &'static str, offset: u32, bytes: &[u8]) -> Result<(), AbiError>;
}

/// Allocation and ownership tracking over a linear memory.
pub trait Allocator {
    /// Allocate `size` bytes and return their offset.
    fn malloc(&mut self, size: u32) -> Result<u32, AbiError>;

    /// Release a single allocation.
    fn release(&mut self, offset: u32) -> Result<(), AbiError>;

    /// Take ownership of `packed`, returning a generation-checked handle.
    fn adopt(&mut self, packed: PackedData) -> Handle;

    /// Resolve a handle, failing if its memory has been released since.
    fn resolve(&self, handle: &Handle) -> Result<PackedData, AbiError>;

    /// Invalidate every handle pointing at `offset`.
    fn retire(&mut self, offset: u32);
}

/// In-process linear memory with a first-fit allocator.
///
/// Mirrors a guest heap closely enough to exercise the packed calling
/// convention without a WebAssembly engine: allocations are 8-byte aligned,
/// offset 0 is never handed out and the memory grows by whole pages.
///
/// # Example
///
/// ```ignore
/// use wasify::abi::{LinearMemory, Memory};
///
/// let mut memory = LinearMemory::new();
/// let packed = memory.write_string_pack("hello")?;
/// assert_eq!(memory.read_string_pack(packed)?, "hello");
/// memory.free_pack(&[packed])?;
/// ```
#[derive(Debug)]
pub struct LinearMemory {
    data: Vec<u8>,
    heap_start: u32,
    next: u32,
    live: BTreeMap<u32, u32>,
    free_blocks: BTreeMap<u32, u32>,
    handles: HandleTable,
    max_size: usize,
}

impl Default for LinearMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearMemory {
    /// Create a memory of one page that may grow up to 4 GiB.
    pub fn new() -> Self {
        Self::with_limits(PAGE_SIZE, u32::MAX as usize)
    }

    /// Create a memory of `initial` bytes that may grow up to `max_size` bytes.
    pub fn with_limits(initial: usize, max_size: usize) -> Self {
        Self {
            data: vec![0; initial],
            heap_start: 8,
            next: 8,
            live: BTreeMap::new(),
            free_blocks: BTreeMap::new(),
            handles: HandleTable::new(),
            max_size: max_size.max(initial),
        }
    }

    /// Create a memory whose leading bytes are `data`; the heap starts after them.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let heap_start = align_to(data.len().max(8), 8) as u32;
        let mut memory = Self::with_limits(data.len().max(PAGE_SIZE), u32::MAX as usize);
        if let Some(prefix) = memory.data.get_mut(..data.len()) {
            prefix.copy_from_slice(&data);
        }
        memory.heap_start = heap_start;
        memory.next = heap_start;
        memory
    }

    /// Get the raw bytes of the linear memory.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the length of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of allocations that have not been released.
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    fn grow_to(&mut self, end: usize) -> Result<(), AbiError> {
        if end <= self.data.len() {
            return Ok(());
        }
        let pages = end.div_ceil(PAGE_SIZE);
        let new_len = pages * PAGE_SIZE;
        if new_len > self.max_size {
            return Err(AbiError::Allocation {
                operation: "malloc",
                reason: format!(
                    "out of memory: need {end} bytes, limit is {} bytes",
                    self.max_size
                ),
            });
        }
        self.data.resize(new_len, 0);
        Ok(())
    }

    /// First-fit reuse. A larger block is split and its tail stays free.
    fn take_free_block(&mut self, block: u32) -> Option<u32> {
        let (offset, size) = self
            .free_blocks
            .iter()
            .find(|(_, size)| **size >= block)
            .map(|(offset, size)| (*offset, *size))?;
        self.free_blocks.remove(&offset);
        if size > block {
            self.free_blocks.insert(offset + block, size - block);
        }
        Some(offset)
    }
}

impl RawMemory for LinearMemory {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&self, operation: &'static str, offset: u32, len: u32) -> Result<Vec<u8>, AbiError> {
        read_slice(&self.data, operation, offset, len).map(<[u8]>::to_vec)
    }

    fn write(&mut self, operation: &'static str, offset: u32, bytes: &[u8]) -> Result<(), AbiError> {
        write_slice(&mut self.data, operation, offset, bytes)
    }
}

impl Allocator for LinearMemory {
    fn malloc(&mut self, size: u32) -> Result<u32, AbiError> {
        let block = align_to((size as usize).max(1), 8) as u32;

        if let Some(offset) = self.take_free_block(block) {
            self.live.insert(offset, block);
            return Ok(offset);
        }

        let offset = self.next;
        let end = offset as usize + block as usize;
        self.grow_to(end)?;
        self.next = end as u32;
        self.live.insert(offset, block);
        Ok(offset)
    }

    fn release(&mut self, offset: u32) -> Result<(), AbiError> {
        let block = self.live.remove(&offset).ok_or_else(|| AbiError::Allocation {
            operation: "free",
            reason: format!("offset {offset} is not allocated"),
        })?;
        self.free_blocks.insert(offset, block);
        Ok(())
    }

    fn adopt(&mut self, packed: PackedData) -> Handle {
        self.handles.adopt(packed)
    }

    fn resolve(&self, handle: &Handle) -> Result<PackedData, AbiError> {
        self.handles.resolve(handle)
    }

    fn retire(&mut self, offset: u32) {
        self.handles.retire(offset);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_malloc_is_aligned_and_nonzero() {
        let mut memory = LinearMemory::new();
        let a = memory.malloc(3).unwrap();
        let b = memory.malloc(0).unwrap();
        let c = memory.malloc(16).unwrap();
        assert_ne!(a, 0);
        assert_eq!(a % 8, 0);
        assert_eq!(b, a + 8);
        assert_eq!(c, b + 8);
        assert_eq!(memory.live_allocations(), 3);
    }

    #[test]
    fn test_released_block_is_reused() {
        let mut memory = LinearMemory::new();
        let a = memory.malloc(32).unwrap();
        let _b = memory.malloc(8).unwrap();
        memory.release(a).unwrap();
        assert_eq!(memory.malloc(16).unwrap(), a);
    }

    #[test]
    fn test_split_block_tail_is_reused() {
        let mut memory = LinearMemory::new();
        let a = memory.malloc(32).unwrap();
        let _b = memory.malloc(8).unwrap();
        let size = memory.size();
        memory.release(a).unwrap();

        assert_eq!(memory.malloc(16).unwrap(), a);
        assert_eq!(memory.malloc(16).unwrap(), a + 16);
        assert_eq!(memory.size(), size);
        assert_eq!(memory.live_allocations(), 3);
    }

    #[test]
    fn test_double_release_fails() {
        let mut memory = LinearMemory::new();
        let a = memory.malloc(8).unwrap();
        memory.release(a).unwrap();
        assert!(matches!(
            memory.release(a),
            Err(AbiError::Allocation { operation: "free", .. })
        ));
    }

    #[test]
    fn test_grows_by_pages_up_to_limit() {
        let mut memory = LinearMemory::with_limits(PAGE_SIZE, 2 * PAGE_SIZE);
        memory.malloc(PAGE_SIZE as u32).unwrap();
        assert_eq!(memory.size(), 2 * PAGE_SIZE);
        assert!(memory.malloc(PAGE_SIZE as u32).is_err());
    }

    #[test]
    fn test_from_bytes_keeps_prefix() {
        let memory = LinearMemory::from_bytes(b"wasify".to_vec());
        assert_eq!(memory.read("ReadBytes", 0, 6).unwrap(), b"wasify");
        assert_eq!(memory.heap_start, 8);
    }

    #[test]
    fn test_out_of_range_write_leaves_memory_untouched() {
        let mut memory = LinearMemory::with_limits(16, 16);
        let err = memory.write("WriteBytes", 12, &[1; 8]).unwrap_err();
        assert!(err.is_out_of_range());
        assert!(memory.as_bytes().iter().all(|b| *b == 0));
    }
}
