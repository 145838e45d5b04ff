//! Property-based tests for the packed-value codec and memory accessor.

use proptest::prelude::*;
use wasify::abi::{
    AbiError, LinearMemory, MAX_SIZE, Memory, MultiPackedData, PackedData, RawMemory, Value,
    ValueType, pack, unpack,
};

fn value_type() -> impl Strategy<Value = ValueType> {
    prop::sample::select(ValueType::ALL.to_vec())
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        any::<u8>().prop_map(Value::Byte),
        any::<u32>().prop_map(Value::I32),
        any::<u64>().prop_map(Value::I64),
        any::<u32>().prop_map(|bits| Value::F32(f32::from_bits(bits))),
        any::<u64>().prop_map(|bits| Value::F64(f64::from_bits(bits))),
        ".{0,32}".prop_map(Value::String),
    ]
}

/// Compare values bit-exactly, so NaN payloads count as equal.
fn same_bits(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

proptest! {
    #[test]
    fn pack_roundtrip(ty in value_type(), offset in any::<u32>(), size in 0..=MAX_SIZE) {
        let packed = PackedData::new(ty, offset, size).unwrap();
        let word = packed.to_wire();
        prop_assert_eq!(unpack(word), (ty.tag(), offset, size));
        prop_assert_eq!(PackedData::from_wire(word).unwrap(), packed);
        prop_assert_eq!(pack(ty.tag(), offset, size).unwrap(), word);
    }

    #[test]
    fn pack_rejects_oversized(tag in any::<u8>(), offset in any::<u32>(), size in (MAX_SIZE + 1)..=u32::MAX) {
        let is_overflow = matches!(pack(tag, offset, size), Err(AbiError::SizeOverflow { .. }));
        prop_assert!(is_overflow);
        prop_assert!(PackedData::new(ValueType::Bytes, offset, size).is_err());
    }

    #[test]
    fn scalar_roundtrip_is_bit_exact(v in value()) {
        let mut memory = LinearMemory::new();
        let packed = memory.write_any_pack(&v).unwrap();
        prop_assert_eq!(packed.value_type(), v.value_type());
        prop_assert_eq!(packed.size() as usize, v.byte_size());

        let (read, offset, size) = memory.read_any_pack(packed).unwrap();
        prop_assert!(same_bits(&read, &v), "{:?} != {:?}", read, v);
        prop_assert_eq!(offset, packed.offset());
        prop_assert_eq!(size, packed.size());
    }

    #[test]
    fn multi_pack_roundtrip(values in prop::collection::vec(value(), 1..16)) {
        let mut memory = LinearMemory::new();
        let packed: Vec<PackedData> = values
            .iter()
            .map(|v| memory.write_any_pack(v).unwrap())
            .collect();
        let multi = memory.write_multi_pack(&packed).unwrap();
        prop_assert_eq!(multi.len(), values.len());

        let word = multi.to_wire();
        let decoded = memory.read_multi_pack(MultiPackedData::from_wire(word).unwrap()).unwrap();
        prop_assert_eq!(&decoded, &packed);
        for (pd, expected) in decoded.iter().zip(&values) {
            let (read, _, _) = memory.read_any_pack(*pd).unwrap();
            prop_assert!(same_bits(&read, expected));
        }
        // Only the carrier was freed.
        prop_assert_eq!(memory.live_allocations(), values.len());
    }

    #[test]
    fn out_of_range_read_fails(size in 1u32..256, past_end in 0u32..64) {
        let mut memory = LinearMemory::with_limits(1024, 1024);
        memory.write("WriteBytes", 0, &[0xAA; 1024]).unwrap();

        let offset = 1024 - size + past_end + 1;
        let err = memory.read_bytes(offset, size).unwrap_err();
        prop_assert!(err.is_out_of_range());
        prop_assert_eq!(
            err.to_string(),
            format!("Memory.ReadBytes({offset}, {size}) out of range of memory size 1024")
        );
    }
}
