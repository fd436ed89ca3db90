//! LEB128-style variable-length integers.
//!
//! Seven payload bits per byte, high bit set on every byte except the last.
//! Used for term lengths and delta-encoded posting lists in segment blobs.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;

use crate::error::{Result, SundialError};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MAX_VARINT_LEN);
    let mut val = value;

    while val >= 0x80 {
        bytes.push((val as u8 & 0x7F) | 0x80);
        val >>= 7;
    }
    bytes.push(val as u8);

    bytes
}

/// Decode a u64 value, returning it together with the number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;

    for (i, &byte) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(SundialError::corrupted("varint overflow"));
        }
        result |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(SundialError::corrupted("incomplete varint"))
}

/// Write a variable-length encoded u64, returning the number of bytes written.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = encode_u64(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Read a variable-length encoded u64.
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;

    for i in 0..MAX_VARINT_LEN {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(SundialError::corrupted("varint overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_u64() {
        for value in [0, 1, 127, 128, 255, 16383, 16384, u32::MAX as u64, u64::MAX] {
            let encoded = encode_u64(value);
            let (decoded, bytes_read) = decode_u64(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
        }
    }

    #[test]
    fn test_write_read_stream() {
        let mut buffer = Vec::new();
        write_u64(&mut buffer, 300).unwrap();
        write_u64(&mut buffer, 7).unwrap();

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_u64(&mut cursor).unwrap(), 300);
        assert_eq!(read_u64(&mut cursor).unwrap(), 7);
    }

    #[test]
    fn test_encoding_efficiency() {
        assert_eq!(encode_u64(0).len(), 1);
        assert_eq!(encode_u64(127).len(), 1);
        assert_eq!(encode_u64(128).len(), 2);
        assert_eq!(encode_u64(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn test_incomplete_and_overflow() {
        assert!(decode_u64(&[0x80]).is_err());
        assert!(decode_u64(&[0xFF; 11]).is_err());
        assert!(read_u64(&mut Cursor::new(vec![0xFF; 11])).is_err());
    }
}
