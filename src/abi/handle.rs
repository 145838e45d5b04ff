//! Generation-checked handles for values owned by the host.
//!
//! A raw [`PackedData`] is only a location; nothing stops it from being read
//! after its memory was freed. Values the host takes ownership of are
//! registered in a [`HandleTable`] and handed out as [`Handle`]s. Freeing the
//! memory retires the registration, so a later lookup through the same handle
//! fails with [`AbiError::StaleHandle`] instead of returning reused bytes.

use std::collections::HashMap;

use super::{AbiError, PackedData};

/// An owned reference to a packed value, valid until its memory is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    packed: PackedData,
    generation: u64,
}

impl Handle {
    /// The packed value this handle refers to. The location is unchecked.
    pub fn packed(&self) -> PackedData {
        self.packed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Live handle registrations keyed by offset.
///
/// Several handles may share an offset, e.g. when a guest returns the same
/// word twice. Each stays valid until the offset is retired.
#[derive(Debug, Default)]
pub struct HandleTable {
    live: HashMap<u32, Vec<u64>>,
    next_generation: u64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register ownership of `packed`.
    pub fn adopt(&mut self, packed: PackedData) -> Handle {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.live.entry(packed.offset()).or_default().push(generation);
        Handle { packed, generation }
    }

    /// Return the packed value if `handle` is still live.
    pub fn resolve(&self, handle: &Handle) -> Result<PackedData, AbiError> {
        match self.live.get(&handle.packed.offset()) {
            Some(generations) if generations.contains(&handle.generation) => Ok(handle.packed),
            _ => Err(AbiError::StaleHandle {
                offset: handle.packed.offset(),
            }),
        }
    }

    /// Drop every registration at `offset`. Returns `true` if any existed.
    pub fn retire(&mut self, offset: u32) -> bool {
        self.live.remove(&offset).is_some()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::abi::ValueType;

    #[test]
    fn test_retired_handle_is_stale() {
        let mut table = HandleTable::new();
        let packed = PackedData::new(ValueType::String, 64, 5).unwrap();
        let handle = table.adopt(packed);
        assert_eq!(table.resolve(&handle).unwrap(), packed);

        assert!(table.retire(64));
        assert!(!table.retire(64));
        assert!(matches!(
            table.resolve(&handle),
            Err(AbiError::StaleHandle { offset: 64 })
        ));
    }

    #[test]
    fn test_reused_offset_gets_new_generation() {
        let mut table = HandleTable::new();
        let packed = PackedData::new(ValueType::I32, 128, 4).unwrap();
        let old = table.adopt(packed);
        table.retire(128);
        let new = table.adopt(packed);

        assert_ne!(old.generation(), new.generation());
        assert!(table.resolve(&old).is_err());
        assert!(table.resolve(&new).is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_shared_offset_keeps_every_handle_live() {
        let mut table = HandleTable::new();
        let packed = PackedData::new(ValueType::String, 64, 5).unwrap();
        let first = table.adopt(packed);
        let second = table.adopt(packed);

        assert_eq!(table.resolve(&first).unwrap(), packed);
        assert_eq!(table.resolve(&second).unwrap(), packed);
        assert_eq!(table.len(), 2);

        assert!(table.retire(64));
        assert!(table.resolve(&first).is_err());
        assert!(table.resolve(&second).is_err());
        assert!(table.is_empty());
    }
}
