//! File header encoding
//!
//! The 128-byte prefix of every collection data file.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, SydbError};

use super::{FILE_HEADER_SIZE, MAGIC, VERSION};

/// Bytes actually occupied by header fields; the rest is zero padding
const USED_HEADER_BYTES: usize = 48;

/// Decoded data file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    /// Physical records in the file, tombstoned ones included
    pub record_count: u64,
    pub file_size: u64,
    /// Where the next record is appended
    pub free_offset: u64,
    pub schema_checksum: u32,
    /// Reserved for a secondary index; always 0
    pub index_root_offset: u64,
    pub flags: u32,
}

impl FileHeader {
    /// Header of an empty data file
    pub fn new(schema_checksum: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            record_count: 0,
            file_size: FILE_HEADER_SIZE,
            free_offset: FILE_HEADER_SIZE,
            schema_checksum,
            index_root_offset: 0,
            flags: 0,
        }
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE as usize] {
        let mut buf = BytesMut::with_capacity(FILE_HEADER_SIZE as usize);
        buf.put_u32(self.magic);
        buf.put_u32(self.version);
        buf.put_u64_le(self.record_count);
        buf.put_u64_le(self.file_size);
        buf.put_u64_le(self.free_offset);
        buf.put_u32(self.schema_checksum);
        buf.put_u64_le(self.index_root_offset);
        buf.put_u32(self.flags);
        debug_assert_eq!(buf.len(), USED_HEADER_BYTES);
        buf.put_bytes(0, FILE_HEADER_SIZE as usize - USED_HEADER_BYTES);

        let mut out = [0u8; FILE_HEADER_SIZE as usize];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode and validate magic and version
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE as usize {
            return Err(SydbError::CorruptFile(format!(
                "truncated file header: expected {} bytes, got {}",
                FILE_HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut buf = &bytes[..USED_HEADER_BYTES];
        let magic = buf.get_u32();
        if magic != MAGIC {
            return Err(SydbError::CorruptFile(format!(
                "bad magic number 0x{:08x} (expected 0x{:08x})",
                magic, MAGIC
            )));
        }

        let version = buf.get_u32();
        if version != VERSION {
            return Err(SydbError::CorruptFile(format!(
                "unsupported data file version {}",
                version
            )));
        }

        let header = Self {
            magic,
            version,
            record_count: buf.get_u64_le(),
            file_size: buf.get_u64_le(),
            free_offset: buf.get_u64_le(),
            schema_checksum: buf.get_u32(),
            index_root_offset: buf.get_u64_le(),
            flags: buf.get_u32(),
        };

        if header.free_offset < FILE_HEADER_SIZE || header.free_offset > header.file_size {
            return Err(SydbError::CorruptFile(format!(
                "free offset {} outside [{}, {}]",
                header.free_offset, FILE_HEADER_SIZE, header.file_size
            )));
        }

        Ok(header)
    }
}
