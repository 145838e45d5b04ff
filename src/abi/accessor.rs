//! Typed memory accessor.
//!
//! [`Memory`] is implemented for every [`RawMemory`] + [`Allocator`] and
//! layers the packed calling convention on top of raw bytes:
//!
//! - `read_*` / `write_*` take a raw offset,
//! - `read_*_pack` take a [`PackedData`] and use its offset and size,
//! - `write_*_pack` allocate, write and return the new [`PackedData`].
//!
//! The trait is object safe; host callbacks receive `&mut dyn Memory`.

use super::buffer::to_array;
use super::{
    AbiError, Allocator, FreeFailure, Handle, MultiPackedData, PackedData, RawMemory, Value,
    ValueType, bytes_to_words, words_to_bytes,
};

pub trait Memory: RawMemory + Allocator {
    // ---------------------------------------------------------------------
    // Raw offset reads
    // ---------------------------------------------------------------------

    fn read_bytes(&self, offset: u32, size: u32) -> Result<Vec<u8>, AbiError> {
        self.read("ReadBytes", offset, size)
    }

    fn read_byte(&self, offset: u32) -> Result<u8, AbiError> {
        let bytes = self.read("ReadByte", offset, 1)?;
        to_array::<1>(&bytes, "ReadByte", offset).map(|[b]| b)
    }

    fn read_u32(&self, offset: u32) -> Result<u32, AbiError> {
        let bytes = self.read("ReadUint32", offset, 4)?;
        to_array(&bytes, "ReadUint32", offset).map(u32::from_le_bytes)
    }

    fn read_u64(&self, offset: u32) -> Result<u64, AbiError> {
        let bytes = self.read("ReadUint64", offset, 8)?;
        to_array(&bytes, "ReadUint64", offset).map(u64::from_le_bytes)
    }

    fn read_f32(&self, offset: u32) -> Result<f32, AbiError> {
        let bytes = self.read("ReadFloat32", offset, 4)?;
        to_array(&bytes, "ReadFloat32", offset).map(f32::from_le_bytes)
    }

    fn read_f64(&self, offset: u32) -> Result<f64, AbiError> {
        let bytes = self.read("ReadFloat64", offset, 8)?;
        to_array(&bytes, "ReadFloat64", offset).map(f64::from_le_bytes)
    }

    fn read_string(&self, offset: u32, size: u32) -> Result<String, AbiError> {
        let bytes = self.read("ReadString", offset, size)?;
        String::from_utf8(bytes).map_err(|_| AbiError::InvalidUtf8 { offset })
    }

    // ---------------------------------------------------------------------
    // Raw offset writes
    // ---------------------------------------------------------------------

    fn write_bytes(&mut self, offset: u32, v: &[u8]) -> Result<(), AbiError> {
        self.write("WriteBytes", offset, v)
    }

    fn write_byte(&mut self, offset: u32, v: u8) -> Result<(), AbiError> {
        self.write("WriteByte", offset, &[v])
    }

    fn write_u32(&mut self, offset: u32, v: u32) -> Result<(), AbiError> {
        self.write("WriteUint32", offset, &v.to_le_bytes())
    }

    fn write_u64(&mut self, offset: u32, v: u64) -> Result<(), AbiError> {
        self.write("WriteUint64", offset, &v.to_le_bytes())
    }

    fn write_f32(&mut self, offset: u32, v: f32) -> Result<(), AbiError> {
        self.write("WriteFloat32", offset, &v.to_le_bytes())
    }

    fn write_f64(&mut self, offset: u32, v: f64) -> Result<(), AbiError> {
        self.write("WriteFloat64", offset, &v.to_le_bytes())
    }

    fn write_string(&mut self, offset: u32, v: &str) -> Result<(), AbiError> {
        self.write("WriteString", offset, v.as_bytes())
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Read a value of type `ty` stored at `offset`.
    ///
    /// `size` is only used by the variable-length kinds.
    fn read_any(&self, ty: ValueType, offset: u32, size: u32) -> Result<Value, AbiError> {
        Ok(match ty {
            ValueType::Bytes => Value::Bytes(self.read_bytes(offset, size)?),
            ValueType::Byte => Value::Byte(self.read_byte(offset)?),
            ValueType::I32 => Value::I32(self.read_u32(offset)?),
            ValueType::I64 => Value::I64(self.read_u64(offset)?),
            ValueType::F32 => Value::F32(self.read_f32(offset)?),
            ValueType::F64 => Value::F64(self.read_f64(offset)?),
            ValueType::String => Value::String(self.read_string(offset, size)?),
        })
    }

    /// Read the value described by `pd`, dispatching on its type.
    ///
    /// Returns the value together with its offset and size.
    fn read_any_pack(&self, pd: PackedData) -> Result<(Value, u32, u32), AbiError> {
        let (offset, size) = (pd.offset(), pd.size());
        let value = self.read_any(pd.value_type(), offset, size)?;
        Ok((value, offset, size))
    }

    /// Write `v` at `offset`, dispatching on its variant.
    fn write_any(&mut self, offset: u32, v: &Value) -> Result<(), AbiError> {
        match v {
            Value::Bytes(b) => self.write_bytes(offset, b),
            Value::Byte(b) => self.write_byte(offset, *b),
            Value::I32(n) => self.write_u32(offset, *n),
            Value::I64(n) => self.write_u64(offset, *n),
            Value::F32(n) => self.write_f32(offset, *n),
            Value::F64(n) => self.write_f64(offset, *n),
            Value::String(s) => self.write_string(offset, s),
        }
    }

    // ---------------------------------------------------------------------
    // Packed reads
    // ---------------------------------------------------------------------

    fn read_bytes_pack(&self, pd: PackedData) -> Result<Vec<u8>, AbiError> {
        self.read_bytes(pd.offset(), pd.size())
    }

    fn read_byte_pack(&self, pd: PackedData) -> Result<u8, AbiError> {
        self.read_byte(pd.offset())
    }

    fn read_u32_pack(&self, pd: PackedData) -> Result<u32, AbiError> {
        self.read_u32(pd.offset())
    }

    fn read_u64_pack(&self, pd: PackedData) -> Result<u64, AbiError> {
        self.read_u64(pd.offset())
    }

    fn read_f32_pack(&self, pd: PackedData) -> Result<f32, AbiError> {
        self.read_f32(pd.offset())
    }

    fn read_f64_pack(&self, pd: PackedData) -> Result<f64, AbiError> {
        self.read_f64(pd.offset())
    }

    fn read_string_pack(&self, pd: PackedData) -> Result<String, AbiError> {
        self.read_string(pd.offset(), pd.size())
    }

    // ---------------------------------------------------------------------
    // Packed writes
    // ---------------------------------------------------------------------

    /// Allocate room for `v`, write it and return its packed description.
    ///
    /// The allocation is released again if the write fails.
    fn write_any_pack(&mut self, v: &Value) -> Result<PackedData, AbiError> {
        let size = u32::try_from(v.byte_size()).map_err(|_| AbiError::SizeOverflow {
            size: v.byte_size() as u64,
        })?;
        let packed = PackedData::new(v.value_type(), 0, size)?;
        let offset = self.malloc(size)?;
        if let Err(err) = self.write_any(offset, v) {
            // The write error is the one worth reporting.
            let _ = self.release(offset);
            return Err(err);
        }
        PackedData::new(packed.value_type(), offset, size)
    }

    fn write_bytes_pack(&mut self, v: &[u8]) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::Bytes(v.to_vec()))
    }

    fn write_byte_pack(&mut self, v: u8) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::Byte(v))
    }

    fn write_u32_pack(&mut self, v: u32) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::I32(v))
    }

    fn write_u64_pack(&mut self, v: u64) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::I64(v))
    }

    fn write_f32_pack(&mut self, v: f32) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::F32(v))
    }

    fn write_f64_pack(&mut self, v: f64) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::F64(v))
    }

    fn write_string_pack(&mut self, v: &str) -> Result<PackedData, AbiError> {
        self.write_any_pack(&Value::String(v.to_string()))
    }

    // ---------------------------------------------------------------------
    // Multi-pack
    // ---------------------------------------------------------------------

    /// Allocate a carrier holding `datas` as little-endian words.
    ///
    /// An empty list yields [`MultiPackedData::EMPTY`] without allocating.
    fn write_multi_pack(&mut self, datas: &[PackedData]) -> Result<MultiPackedData, AbiError> {
        if datas.is_empty() {
            return Ok(MultiPackedData::EMPTY);
        }
        let words: Vec<u64> = datas.iter().map(|pd| pd.to_wire()).collect();
        let bytes = words_to_bytes(&words);
        let size = u32::try_from(bytes.len()).map_err(|_| AbiError::SizeOverflow {
            size: bytes.len() as u64,
        })?;
        let multi = MultiPackedData::new(0, size)?;
        let offset = self.malloc(size)?;
        if let Err(err) = self.write_bytes(offset, &bytes) {
            let _ = self.release(offset);
            return Err(err);
        }
        debug_assert_eq!(multi.len(), datas.len());
        MultiPackedData::new(offset, size)
    }

    /// Read the words held by a carrier, then free the carrier itself.
    ///
    /// The described values stay allocated; their ownership passes to the
    /// caller.
    fn read_multi_pack(&mut self, multi: MultiPackedData) -> Result<Vec<PackedData>, AbiError> {
        let (offset, size) = multi.region().ok_or(AbiError::EmptyPack)?;
        let bytes = self
            .read_bytes(offset, size)
            .map_err(|e| e.context("failed to read data"))?;
        self.free(&[offset])
            .map_err(|e| e.context("failed to free up pack data"))?;
        bytes_to_words(&bytes)?
            .into_iter()
            .map(PackedData::from_wire)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Freeing
    // ---------------------------------------------------------------------

    /// Release every offset, attempting all of them and aggregating failures.
    fn free(&mut self, offsets: &[u32]) -> Result<(), AbiError> {
        let mut failures = Vec::new();
        for &offset in offsets {
            self.retire(offset);
            if let Err(err) = self.release(offset) {
                failures.push(FreeFailure {
                    offset,
                    reason: err.to_string(),
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AbiError::Free { failures })
        }
    }

    fn free_pack(&mut self, datas: &[PackedData]) -> Result<(), AbiError> {
        let offsets: Vec<u32> = datas.iter().map(|pd| pd.offset()).collect();
        self.free(&offsets)
    }

    // ---------------------------------------------------------------------
    // Handles
    // ---------------------------------------------------------------------

    /// Read through a handle, failing if its memory was released.
    fn read_handle(&self, handle: &Handle) -> Result<Value, AbiError> {
        let pd = self.resolve(handle)?;
        self.read_any_pack(pd).map(|(value, _, _)| value)
    }

    /// Free the memory behind live handles; stale handles are skipped.
    fn free_handles(&mut self, handles: &[Handle]) -> Result<(), AbiError> {
        let offsets: Vec<u32> = handles
            .iter()
            .filter_map(|h| self.resolve(h).ok())
            .map(|pd| pd.offset())
            .collect();
        self.free(&offsets)
    }
}

impl<M: RawMemory + Allocator + ?Sized> Memory for M {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::abi::LinearMemory;

    #[test]
    fn test_scalar_pack_roundtrip() {
        let mut memory = LinearMemory::new();

        let bytes = memory.write_bytes_pack(b"Some").unwrap();
        let byte = memory.write_byte_pack(1).unwrap();
        let u32v = memory.write_u32_pack(11).unwrap();
        let u64v = memory.write_u64_pack(2023).unwrap();
        let f32v = memory.write_f32_pack(11.1).unwrap();
        let f64v = memory.write_f64_pack(11.2023).unwrap();
        let string = memory.write_string_pack("Host: Wasify.").unwrap();

        assert_eq!(memory.read_bytes_pack(bytes).unwrap(), b"Some");
        assert_eq!(memory.read_byte_pack(byte).unwrap(), 1);
        assert_eq!(memory.read_u32_pack(u32v).unwrap(), 11);
        assert_eq!(memory.read_u64_pack(u64v).unwrap(), 2023);
        assert_eq!(memory.read_f32_pack(f32v).unwrap().to_bits(), 11.1f32.to_bits());
        assert_eq!(memory.read_f64_pack(f64v).unwrap().to_bits(), 11.2023f64.to_bits());
        assert_eq!(memory.read_string_pack(string).unwrap(), "Host: Wasify.");

        assert_eq!(string.value_type(), ValueType::String);
        assert_eq!(string.size(), 13);
        assert_eq!(f64v.size(), 8);
    }

    #[test]
    fn test_read_any_dispatches_on_tag() {
        let mut memory = LinearMemory::new();
        let pd = memory.write_f64_pack(64.01).unwrap();
        let (value, offset, size) = memory.read_any_pack(pd).unwrap();
        assert_eq!(value, Value::F64(64.01));
        assert_eq!(offset, pd.offset());
        assert_eq!(size, 8);

        memory.write_any(pd.offset(), &Value::F64(-1.5)).unwrap();
        assert_eq!(
            memory.read_any(ValueType::F64, pd.offset(), 8).unwrap(),
            Value::F64(-1.5)
        );
    }

    #[test]
    fn test_out_of_range_read_reports_context() {
        let memory = LinearMemory::with_limits(64, 64);
        let err = memory.read_u64(60).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Memory.ReadUint64(60, 8) out of range of memory size 64"
        );
    }

    #[test]
    fn test_invalid_utf8_string() {
        let mut memory = LinearMemory::new();
        let pd = memory.write_bytes_pack(&[0xff, 0xfe]).unwrap();
        assert!(matches!(
            memory.read_string_pack(pd),
            Err(AbiError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_multi_pack_roundtrip_frees_carrier() {
        let mut memory = LinearMemory::new();
        let a = memory.write_string_pack("a").unwrap();
        let b = memory.write_u32_pack(2).unwrap();
        let multi = memory.write_multi_pack(&[a, b]).unwrap();
        assert_eq!(multi.len(), 2);
        assert_eq!(memory.live_allocations(), 3);

        let values = memory.read_multi_pack(multi).unwrap();
        assert_eq!(values, vec![a, b]);
        assert_eq!(memory.live_allocations(), 2);
    }

    #[test]
    fn test_empty_multi_pack() {
        let mut memory = LinearMemory::new();
        assert_eq!(memory.write_multi_pack(&[]).unwrap(), MultiPackedData::EMPTY);
        assert!(matches!(
            memory.read_multi_pack(MultiPackedData::EMPTY),
            Err(AbiError::EmptyPack)
        ));
    }

    #[test]
    fn test_free_aggregates_failures() {
        let mut memory = LinearMemory::new();
        let a = memory.malloc(8).unwrap();
        let err = memory.free(&[999, a, 1001]).unwrap_err();
        match err {
            AbiError::Free { failures } => {
                let offsets: Vec<u32> = failures.iter().map(|f| f.offset).collect();
                assert_eq!(offsets, vec![999, 1001]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(memory.live_allocations(), 0);
    }

    #[test]
    fn test_handles_become_stale_after_free() {
        let mut memory = LinearMemory::new();
        let pd = memory.write_string_pack("hello").unwrap();
        let handle = memory.adopt(pd);
        assert_eq!(
            memory.read_handle(&handle).unwrap(),
            Value::String("hello".into())
        );

        memory.free_handles(&[handle]).unwrap();
        assert!(memory.read_handle(&handle).unwrap_err().is_stale_handle());
        // A second release skips the stale handle instead of double-freeing.
        memory.free_handles(&[handle]).unwrap();
    }

    #[test]
    fn test_dyn_memory_is_usable() {
        let mut memory = LinearMemory::new();
        let dyn_memory: &mut dyn Memory = &mut memory;
        let pd = dyn_memory.write_u64_pack(7).unwrap();
        assert_eq!(dyn_memory.read_u64_pack(pd).unwrap(), 7);
    }
}
