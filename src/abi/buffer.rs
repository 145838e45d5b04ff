//! Little-endian buffer helpers for packed values.

use super::AbiError;

/// Align a value up to the nearest multiple of alignment.
#[inline]
pub(crate) fn align_to(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Safe buffer slice read helper - returns an out-of-range error instead of panicking.
#[inline]
pub(crate) fn read_slice<'a>(
    buffer: &'a [u8],
    operation: &'static str,
    offset: u32,
    len: u32,
) -> Result<&'a [u8], AbiError> {
    let start = offset as usize;
    let end = start.checked_add(len as usize);
    end.and_then(|end| buffer.get(start..end))
        .ok_or(AbiError::OutOfRange {
            operation,
            offset,
            size: len,
            memory_size: buffer.len(),
        })
}

/// Safe buffer slice write helper.
#[inline]
pub(crate) fn write_slice(
    buffer: &mut [u8],
    operation: &'static str,
    offset: u32,
    data: &[u8],
) -> Result<(), AbiError> {
    let memory_size = buffer.len();
    let start = offset as usize;
    let end = start.checked_add(data.len());
    end.and_then(|end| buffer.get_mut(start..end))
        .ok_or(AbiError::OutOfRange {
            operation,
            offset,
            size: data.len() as u32,
            memory_size,
        })?
        .copy_from_slice(data);
    Ok(())
}

/// Copy a slice into a fixed-size array, failing if the lengths differ.
#[inline]
pub(crate) fn to_array<const N: usize>(
    bytes: &[u8],
    operation: &'static str,
    offset: u32,
) -> Result<[u8; N], AbiError> {
    <[u8; N]>::try_from(bytes).map_err(|_| AbiError::OutOfRange {
        operation,
        offset,
        size: N as u32,
        memory_size: bytes.len(),
    })
}

/// Serialize packed words into a dense little-endian byte array.
pub fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 8);
    for word in words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

/// Reinterpret a dense little-endian byte array as packed words.
///
/// Trailing bytes that do not form a whole word are rejected.
pub fn bytes_to_words(bytes: &[u8]) -> Result<Vec<u64>, AbiError> {
    let chunks = bytes.chunks_exact(8);
    if !chunks.remainder().is_empty() {
        return Err(AbiError::MisalignedPack {
            size: bytes.len() as u32,
        });
    }
    chunks
        .map(|chunk| to_array::<8>(chunk, "ReadPack", 0).map(u64::from_le_bytes))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_words_roundtrip() {
        let words = [0u64, 1, u64::MAX, 0x0600_0000_1000_000d];
        let bytes = words_to_bytes(&words);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes.get(..8), Some(&[0u8; 8][..]));
        assert_eq!(bytes_to_words(&bytes).unwrap(), words);
    }

    #[test]
    fn test_bytes_to_words_rejects_partial_word() {
        assert!(matches!(
            bytes_to_words(&[0; 12]),
            Err(AbiError::MisalignedPack { size: 12 })
        ));
    }

    #[test]
    fn test_read_slice_bounds() {
        let buf = [1u8, 2, 3, 4];
        assert_eq!(read_slice(&buf, "ReadBytes", 1, 2).unwrap(), &[2, 3]);
        let err = read_slice(&buf, "ReadBytes", 3, 2).unwrap_err();
        assert_eq!(err.to_string(), "Memory.ReadBytes(3, 2) out of range of memory size 4");
        assert!(read_slice(&buf, "ReadBytes", u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_write_slice_bounds() {
        let mut buf = [0u8; 4];
        write_slice(&mut buf, "WriteBytes", 2, &[9, 9]).unwrap();
        assert_eq!(buf, [0, 0, 9, 9]);
        assert!(write_slice(&mut buf, "WriteBytes", 3, &[1, 1]).is_err());
        assert_eq!(buf, [0, 0, 9, 9]);
    }
}
