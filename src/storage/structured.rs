//! Checksummed binary encoding for segment blobs and metadata log records.
//!
//! [`StructWriter`] appends little-endian integers, varints and
//! length-prefixed byte strings to a buffer while feeding a running CRC32;
//! [`StructWriter::finish`] appends that checksum. [`StructReader`] reads the
//! same primitives back from a byte slice and [`StructReader::verify`] checks
//! the trailing checksum.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{Result, SundialError};
use crate::util::varint::{encode_u64, read_u64};

/// A structured writer for binary data.
pub struct StructWriter {
    buffer: Vec<u8>,
    hasher: Hasher,
}

impl StructWriter {
    /// Create a writer with an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a writer whose buffer can hold `capacity` bytes without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        StructWriter {
            buffer: Vec::with_capacity(capacity),
            hasher: Hasher::new(),
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) {
        self.append(&[value]);
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) {
        self.append(&value.to_le_bytes());
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) {
        self.append(&value.to_le_bytes());
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) {
        self.append(&encode_u64(value));
    }

    /// Write raw bytes with a varint length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_varint(value.len() as u64);
        self.append(value);
    }

    /// Write a UTF-8 string with a varint length prefix.
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.append(value);
    }

    /// Bytes written so far, excluding the checksum.
    pub fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Append the CRC32 of everything written and return the buffer.
    pub fn finish(mut self) -> Vec<u8> {
        let checksum = self.hasher.finalize();
        // Writing into a Vec cannot fail.
        let _ = self.buffer.write_u32::<LittleEndian>(checksum);
        self.buffer
    }
}

impl Default for StructWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A structured reader over a checksummed byte slice.
pub struct StructReader<'a> {
    cursor: Cursor<&'a [u8]>,
    body_len: u64,
    stored_checksum: u32,
}

impl<'a> StructReader<'a> {
    /// Wrap `data`, which must end with the 4-byte checksum written by
    /// [`StructWriter::finish`].
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(SundialError::corrupted("data too short for checksum"));
        }
        let (body, tail) = data.split_at(data.len() - 4);
        let stored_checksum = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);

        Ok(StructReader {
            cursor: Cursor::new(body),
            body_len: body.len() as u64,
            stored_checksum,
        })
    }

    /// Check the trailing CRC32 against the whole body.
    pub fn verify(&self) -> Result<()> {
        let actual = crc32fast::hash(self.cursor.get_ref());
        if actual == self.stored_checksum {
            Ok(())
        } else {
            Err(SundialError::corrupted(format!(
                "checksum mismatch: stored {:#010x}, computed {actual:#010x}",
                self.stored_checksum
            )))
        }
    }

    fn truncated(e: std::io::Error) -> SundialError {
        SundialError::corrupted(format!("unexpected end of data: {e}"))
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(Self::truncated)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(Self::truncated)
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(Self::truncated)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        read_u64(&mut self.cursor).map_err(|e| match e {
            SundialError::Io(io) => Self::truncated(io),
            other => other,
        })
    }

    /// Read bytes with a varint length prefix.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_varint()?;
        self.read_raw(length)
    }

    /// Read a UTF-8 string with a varint length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| SundialError::corrupted(format!("invalid UTF-8: {e}")))
    }

    /// Read exactly `length` raw bytes.
    pub fn read_raw(&mut self, length: u64) -> Result<Vec<u8>> {
        if length > self.remaining() {
            return Err(SundialError::corrupted(format!(
                "length {length} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        let mut bytes = vec![0u8; length as usize];
        self.cursor.read_exact(&mut bytes).map_err(Self::truncated)?;
        Ok(bytes)
    }

    /// Current offset into the body.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Bytes left before the checksum.
    pub fn remaining(&self) -> u64 {
        self.body_len.saturating_sub(self.cursor.position())
    }

    /// Whether the whole body has been consumed.
    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut writer = StructWriter::new();
        writer.write_u32(0x5344_4c31);
        writer.write_u8(7);
        writer.write_varint(300);
        writer.write_string("field");
        writer.write_bytes(&[0xFF, 0x00]);
        writer.write_u64(u64::MAX);
        let data = writer.finish();

        let mut reader = StructReader::new(&data).unwrap();
        reader.verify().unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x5344_4c31);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "field");
        assert_eq!(reader.read_bytes().unwrap(), vec![0xFF, 0x00]);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut writer = StructWriter::new();
        writer.write_string("payload");
        let mut data = writer.finish();
        data[2] ^= 0x01;

        let reader = StructReader::new(&data).unwrap();
        assert!(matches!(reader.verify(), Err(SundialError::Corrupted(_))));
    }

    #[test]
    fn test_truncated_input() {
        assert!(StructReader::new(&[1, 2]).is_err());

        let mut writer = StructWriter::new();
        writer.write_varint(100);
        let data = writer.finish();
        let mut reader = StructReader::new(&data).unwrap();
        // Length prefix claims 100 bytes but the body has none left.
        assert!(matches!(reader.read_bytes(), Err(SundialError::Corrupted(_))));
    }
}
