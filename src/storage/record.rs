//! Record encoding
//!
//! The 56-byte header in front of each JSON payload, and the decoded record
//! handed out by scans.

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;

use crate::error::{Result, SydbError};

use super::{record_footprint, FLAG_TOMBSTONE, RECORD_HEADER_SIZE, UUID_FIELD_SIZE};

/// Header preceding every record payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Payload length, excluding the trailing NUL
    pub data_size: u32,
    /// Write time, seconds since the Unix epoch
    pub timestamp: u32,
    pub flags: u32,
    /// CRC-32 of the payload
    pub checksum: u32,
    /// Instance id (36 characters)
    pub uuid: String,
}

impl RecordHeader {
    pub fn new(uuid: &str, payload: &[u8], timestamp: u32) -> Result<Self> {
        if uuid.len() >= UUID_FIELD_SIZE {
            return Err(SydbError::Validation(format!(
                "record id '{}' longer than {} bytes",
                uuid,
                UUID_FIELD_SIZE - 1
            )));
        }
        let data_size = u32::try_from(payload.len()).map_err(|_| {
            SydbError::Validation(format!("payload of {} bytes is too large", payload.len()))
        })?;

        Ok(Self {
            data_size,
            timestamp,
            flags: 0,
            checksum: crc32fast::hash(payload),
            uuid: uuid.to_string(),
        })
    }

    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_TOMBSTONE != 0
    }

    /// Total bytes this record occupies on disk
    pub fn footprint(&self) -> u64 {
        record_footprint(self.data_size)
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE as usize] {
        let mut buf = BytesMut::with_capacity(RECORD_HEADER_SIZE as usize);
        buf.put_u32_le(self.data_size);
        buf.put_u32_le(self.timestamp);
        buf.put_u32_le(self.flags);
        buf.put_u32_le(self.checksum);

        let mut uuid = [0u8; UUID_FIELD_SIZE];
        let id = self.uuid.as_bytes();
        let len = id.len().min(UUID_FIELD_SIZE - 1);
        uuid[..len].copy_from_slice(&id[..len]);
        buf.put_slice(&uuid);
        buf.put_bytes(0, 3);

        let mut out = [0u8; RECORD_HEADER_SIZE as usize];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_HEADER_SIZE as usize {
            return Err(SydbError::CorruptFile(format!(
                "truncated record header: expected {} bytes, got {}",
                RECORD_HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut buf = &bytes[..16];
        let data_size = buf.get_u32_le();
        let timestamp = buf.get_u32_le();
        let flags = buf.get_u32_le();
        let checksum = buf.get_u32_le();

        let uuid_bytes = &bytes[16..16 + UUID_FIELD_SIZE];
        let end = uuid_bytes.iter().position(|&b| b == 0).unwrap_or(UUID_FIELD_SIZE);
        let uuid = std::str::from_utf8(&uuid_bytes[..end])
            .map_err(|_| SydbError::CorruptFile("record id is not valid UTF-8".to_string()))?
            .to_string();

        Ok(Self {
            data_size,
            timestamp,
            flags,
            checksum,
            uuid,
        })
    }
}

/// A record read back from a data file
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// File offset of the record header
    pub offset: u64,
    pub header: RecordHeader,
    /// Payload bytes, without the trailing NUL
    pub payload: Vec<u8>,
}

impl StoredRecord {
    pub fn id(&self) -> &str {
        &self.header.uuid
    }

    pub fn is_tombstone(&self) -> bool {
        self.header.is_tombstone()
    }

    /// Recomputed payload CRC matches the stored one
    pub fn checksum_ok(&self) -> bool {
        crc32fast::hash(&self.payload) == self.header.checksum
    }

    /// Verify the checksum, then decode the payload as JSON
    pub fn document(&self) -> Result<Value> {
        if !self.checksum_ok() {
            return Err(SydbError::CorruptFile(format!(
                "checksum mismatch for record '{}' at offset {}",
                self.header.uuid, self.offset
            )));
        }
        Ok(serde_json::from_slice(&self.payload)?)
    }
}
