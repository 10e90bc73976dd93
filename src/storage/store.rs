//! Record Store
//!
//! Reads and writes the data file format over any seekable byte stream.
//! Pooled `File`s are used in production; tests can use `Cursor<Vec<u8>>`.

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SydbError};

use super::{FileHeader, RecordHeader, StoredRecord};
use super::{FILE_HEADER_SIZE, FLAG_TOMBSTONE, RECORD_HEADER_SIZE};

/// Seconds since the Unix epoch
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Record header timestamp; saturates instead of wrapping after 2106
fn record_timestamp() -> u32 {
    u32::try_from(unix_timestamp()).unwrap_or(u32::MAX)
}

/// Outcome of a checksum verification pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub records: u64,
    pub live: u64,
    pub deleted: u64,
    pub corrupt: u64,
}

/// Outcome of a compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactReport {
    pub records_before: u64,
    pub records_after: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Record-level access to one collection data file
pub struct RecordStore<'a, F> {
    file: &'a mut F,
}

impl<'a, F: Read + Write + Seek> RecordStore<'a, F> {
    pub fn new(file: &'a mut F) -> Self {
        Self { file }
    }

    /// Write the header of an empty data file
    pub fn initialize(&mut self, schema_checksum: u32) -> Result<FileHeader> {
        let header = FileHeader::new(schema_checksum);
        self.write_header(&header)?;
        Ok(header)
    }

    /// Read and validate the 128-byte file header
    pub fn read_header(&mut self) -> Result<FileHeader> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut bytes = [0u8; FILE_HEADER_SIZE as usize];
        read_exact_or_corrupt(self.file, &mut bytes, "file header")?;
        FileHeader::decode(&bytes)
    }

    /// Overwrite the 128-byte file header
    pub fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        self.file.flush()?;
        Ok(())
    }

    /// Append one payload at `header.free_offset` and persist the updated header.
    ///
    /// Returns the offset the record was written at.
    pub fn append(&mut self, header: &mut FileHeader, id: &str, payload: &[u8]) -> Result<u64> {
        let record = RecordHeader::new(id, payload, record_timestamp())?;
        self.append_record(header, &record, payload)
    }

    /// Append with a caller-built record header (used when copying records)
    pub fn append_record(
        &mut self,
        header: &mut FileHeader,
        record: &RecordHeader,
        payload: &[u8],
    ) -> Result<u64> {
        let offset = header.free_offset;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&record.encode())?;
        self.file.write_all(payload)?;
        self.file.write_all(&[0u8])?;

        header.record_count += 1;
        header.free_offset = offset + record.footprint();
        header.file_size = header.file_size.max(header.free_offset);
        self.write_header(header)?;

        tracing::trace!(
            "Appended record {} ({} bytes) at offset {}",
            record.uuid,
            record.data_size,
            offset
        );
        Ok(offset)
    }

    /// Lazily iterate every physical record, tombstones included.
    ///
    /// Each call starts again from the first record.
    pub fn scan(&mut self, header: &FileHeader) -> RecordScanner<'_, F> {
        RecordScanner {
            file: &mut *self.file,
            offset: FILE_HEADER_SIZE,
            remaining: header.record_count,
            end: header.file_size,
            failed: false,
        }
    }

    /// Iterate decoded live documents, failing on checksum mismatch
    pub fn documents(
        &mut self,
        header: &FileHeader,
    ) -> impl Iterator<Item = Result<Value>> + '_ {
        self.scan(header).filter_map(|record| match record {
            Ok(record) if record.is_tombstone() => None,
            Ok(record) => Some(record.document()),
            Err(e) => Some(Err(e)),
        })
    }

    /// Find the live record carrying `id`.
    ///
    /// If an interrupted relocation left two live copies, the later one wins.
    pub fn locate(&mut self, header: &FileHeader, id: &str) -> Result<Option<StoredRecord>> {
        let mut found = None;
        for record in self.scan(header) {
            let record = record?;
            if !record.is_tombstone() && record.id() == id {
                found = Some(record);
            }
        }
        Ok(found)
    }

    /// Store a new payload for `record`, in place when it fits.
    ///
    /// Otherwise the replacement is appended under the same id before the old
    /// slot is tombstoned, so a failed write never leaves the id without a
    /// live record. Returns whether the rewrite happened in place.
    pub fn replace(
        &mut self,
        header: &mut FileHeader,
        record: &StoredRecord,
        payload: &[u8],
    ) -> Result<bool> {
        if self.rewrite_in_place(record, payload)? {
            return Ok(true);
        }
        self.append(header, record.id(), payload)?;
        self.mark_deleted(record)?;
        Ok(false)
    }

    /// Replace a record's payload inside its existing slot.
    ///
    /// The slot keeps its `data_size`; a shorter payload is padded with
    /// spaces. Returns false, writing nothing, when the payload does not fit.
    pub fn rewrite_in_place(&mut self, record: &StoredRecord, payload: &[u8]) -> Result<bool> {
        let slot = record.header.data_size as usize;
        if payload.len() > slot {
            return Ok(false);
        }

        let mut padded = Vec::with_capacity(slot);
        padded.extend_from_slice(payload);
        padded.resize(slot, b' ');

        let mut updated = record.header.clone();
        updated.checksum = crc32fast::hash(&padded);
        updated.timestamp = record_timestamp();

        self.file.seek(SeekFrom::Start(record.offset))?;
        self.file.write_all(&updated.encode())?;
        self.file.write_all(&padded)?;
        self.file.flush()?;
        Ok(true)
    }

    /// Set the tombstone flag on a record
    pub fn mark_deleted(&mut self, record: &StoredRecord) -> Result<()> {
        let mut updated = record.header.clone();
        updated.flags |= FLAG_TOMBSTONE;
        self.file.seek(SeekFrom::Start(record.offset))?;
        self.file.write_all(&updated.encode())?;
        self.file.flush()?;
        Ok(())
    }

    /// Count live, deleted and checksum-failing records
    pub fn verify(&mut self, header: &FileHeader) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        for record in self.scan(header) {
            let record = record?;
            report.records += 1;
            if !record.checksum_ok() {
                report.corrupt += 1;
            } else if record.is_tombstone() {
                report.deleted += 1;
            } else {
                report.live += 1;
            }
        }
        Ok(report)
    }

    /// Copy every live record into `target`, which must be an empty stream
    pub fn compact_into<W: Read + Write + Seek>(
        &mut self,
        header: &FileHeader,
        target: &mut W,
    ) -> Result<CompactReport> {
        let mut out = RecordStore::new(target);
        let mut out_header = out.initialize(header.schema_checksum)?;

        for record in self.scan(header) {
            let record = record?;
            if record.is_tombstone() {
                continue;
            }
            if !record.checksum_ok() {
                return Err(SydbError::CorruptFile(format!(
                    "checksum mismatch for record '{}' at offset {}",
                    record.id(),
                    record.offset
                )));
            }
            out.append_record(&mut out_header, &record.header, &record.payload)?;
        }

        Ok(CompactReport {
            records_before: header.record_count,
            records_after: out_header.record_count,
            bytes_before: header.file_size,
            bytes_after: out_header.file_size,
        })
    }
}

/// Lazy, finite iterator over the records of a data file
pub struct RecordScanner<'a, F> {
    file: &'a mut F,
    /// Offset of the next record header
    offset: u64,
    /// Records still expected according to the file header
    remaining: u64,
    /// Logical end of file
    end: u64,
    failed: bool,
}

impl<'a, F: Read + Seek> RecordScanner<'a, F> {
    fn read_next(&mut self) -> Result<StoredRecord> {
        self.file.seek(SeekFrom::Start(self.offset))?;

        let mut raw = [0u8; RECORD_HEADER_SIZE as usize];
        read_exact_or_corrupt(self.file, &mut raw, "record header")?;
        let header = RecordHeader::decode(&raw)?;

        let next_offset = self.offset + header.footprint();
        if next_offset > self.end {
            return Err(SydbError::CorruptFile(format!(
                "record at offset {} extends past end of data ({} > {})",
                self.offset, next_offset, self.end
            )));
        }

        let mut payload = vec![0u8; header.data_size as usize + 1];
        read_exact_or_corrupt(self.file, &mut payload, "record payload")?;
        if payload.pop() != Some(0) {
            return Err(SydbError::CorruptFile(format!(
                "record at offset {} is missing its terminator",
                self.offset
            )));
        }

        let record = StoredRecord {
            offset: self.offset,
            header,
            payload,
        };
        self.offset = next_offset;
        self.remaining -= 1;
        Ok(record)
    }
}

impl<'a, F: Read + Seek> Iterator for RecordScanner<'a, F> {
    type Item = Result<StoredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 || self.offset >= self.end {
            return None;
        }

        match self.read_next() {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                // A broken record makes every later offset unreliable
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn read_exact_or_corrupt<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            SydbError::CorruptFile(format!("truncated {}", what))
        } else {
            SydbError::Io(e)
        }
    })
}
