//! Storage Module
//!
//! Binary record store: one append-only data file per collection.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ File Header (128 bytes)                                      │
//! │   magic u32 BE "SYDB" | version u32 BE | record_count u64 LE │
//! │   file_size u64 LE | free_offset u64 LE | schema_crc u32 BE  │
//! │   index_root u64 LE | flags u32 BE | reserved (zero padded)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Record 1                                                     │
//! │ ┌───────────┬───────────┬──────────┬──────────┬────────────┐ │
//! │ │ size (4)  │ time (4)  │flags (4) │ crc (4)  │ uuid (37)  │ │
//! │ ├───────────┴───────────┴──────────┴──────────┴────────────┤ │
//! │ │ reserved (3) │ JSON payload (size bytes) │ NUL (1)       │ │
//! │ └──────────────────────────────────────────────────────────┘ │
//! │ ... repeated, appended at free_offset ...                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record header integers are little-endian. The CRC is CRC-32 (IEEE) of the
//! payload bytes.

mod header;
mod record;
mod store;

pub use header::FileHeader;
pub use record::{RecordHeader, StoredRecord};
pub use store::{unix_timestamp, CompactReport, RecordScanner, RecordStore, VerifyReport};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic number identifying a SYDB data file ("SYDB")
pub const MAGIC: u32 = 0x5359_4442;

/// Current data file format version
pub const VERSION: u32 = 2;

/// Size of the file header at offset 0
pub const FILE_HEADER_SIZE: u64 = 128;

/// Size of the header preceding each record payload
pub const RECORD_HEADER_SIZE: u64 = 56;

/// Bytes reserved for the id in a record header (36 chars + NUL)
pub const UUID_FIELD_SIZE: usize = 37;

/// Record flag: record has been logically deleted
pub const FLAG_TOMBSTONE: u32 = 0x1;

/// On-disk footprint of a record carrying `data_size` payload bytes
pub fn record_footprint(data_size: u32) -> u64 {
    RECORD_HEADER_SIZE + data_size as u64 + 1
}
