//! File Connection Pool
//!
//! A fixed number of slots holding open data files keyed by
//! (database, collection). Handles are moved out of their slot while in use
//! and moved back on release, so a file is never shared between threads.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;

/// Identifies the data file a handle is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub database: String,
    pub collection: String,
}

impl PoolKey {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

#[derive(Debug)]
enum Slot {
    /// Never opened, or cleared by invalidation
    Unused,
    /// Open and bound to a key, available for reuse
    Idle { key: PoolKey, file: File },
    /// Handed out; `stale` means the file must not come back on release
    InUse { key: PoolKey, stale: bool },
}

/// An open data file borrowed from the pool
///
/// Must be given back with [`FilePool::release`]. Temporary handles (pool
/// exhausted) are simply closed on release.
#[derive(Debug)]
pub struct PooledFile {
    file: File,
    key: PoolKey,
    slot: Option<usize>,
}

impl PooledFile {
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Whether this handle lives outside the pool
    pub fn is_temporary(&self) -> bool {
        self.slot.is_none()
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Read for PooledFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for PooledFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Seek for PooledFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilePoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub idle: usize,
    /// Files opened into a slot
    pub opens: u64,
    /// Acquisitions served by an idle slot without touching the filesystem
    pub reuses: u64,
    /// Untracked handles opened because every slot was busy
    pub temporaries: u64,
}

/// Bounded pool of reusable data file handles
pub struct FilePool {
    slots: Mutex<Vec<Slot>>,
    opens: AtomicU64,
    reuses: AtomicU64,
    temporaries: AtomicU64,
}

impl FilePool {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::Unused).collect();
        Self {
            slots: Mutex::new(slots),
            opens: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            temporaries: AtomicU64::new(0),
        }
    }

    /// Borrow a handle for `key`, opening `path` if needed.
    ///
    /// Order of preference:
    /// 1. An idle slot already bound to `key`
    /// 2. An unused slot, then an idle slot bound to another key (rebound)
    /// 3. A temporary handle outside the pool
    pub fn acquire(&self, key: &PoolKey, path: &Path) -> Result<PooledFile> {
        let claimed = {
            let mut slots = self.slots.lock();

            for (index, slot) in slots.iter_mut().enumerate() {
                if !matches!(slot, Slot::Idle { key: k, .. } if k == key) {
                    continue;
                }
                let in_use = Slot::InUse {
                    key: key.clone(),
                    stale: false,
                };
                if let Slot::Idle { file, .. } = std::mem::replace(slot, in_use) {
                    self.reuses.fetch_add(1, Ordering::Relaxed);
                    return Ok(PooledFile {
                        file,
                        key: key.clone(),
                        slot: Some(index),
                    });
                }
            }

            let free = slots
                .iter()
                .position(|slot| matches!(slot, Slot::Unused))
                .or_else(|| slots.iter().position(|slot| matches!(slot, Slot::Idle { .. })));

            free.map(|index| {
                // Any stale binding's file is dropped (closed) here
                slots[index] = Slot::InUse {
                    key: key.clone(),
                    stale: false,
                };
                index
            })
        };

        // Open outside the lock
        match claimed {
            Some(index) => match open_data_file(path) {
                Ok(file) => {
                    self.opens.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(
                        "Opened {}/{} into pool slot {}",
                        key.database,
                        key.collection,
                        index
                    );
                    Ok(PooledFile {
                        file,
                        key: key.clone(),
                        slot: Some(index),
                    })
                }
                Err(e) => {
                    self.slots.lock()[index] = Slot::Unused;
                    Err(e)
                }
            },
            None => {
                let file = open_data_file(path)?;
                self.temporaries.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "File pool exhausted, using temporary handle for {}/{}",
                    key.database,
                    key.collection
                );
                Ok(PooledFile {
                    file,
                    key: key.clone(),
                    slot: None,
                })
            }
        }
    }

    /// Return a handle. Pooled handles go back to idle; temporary ones close.
    pub fn release(&self, handle: PooledFile) {
        let PooledFile { file, key, slot } = handle;
        let Some(index) = slot else {
            return;
        };

        let mut slots = self.slots.lock();
        let keep = matches!(slots[index], Slot::InUse { stale: false, .. });
        slots[index] = if keep {
            Slot::Idle { key, file }
        } else {
            Slot::Unused
        };
    }

    /// Close every handle bound to `database` (and `collection`, if given).
    ///
    /// Handles currently in use are closed when released.
    pub fn invalidate(&self, database: &str, collection: Option<&str>) -> usize {
        let bound = |key: &PoolKey| {
            key.database == database && collection.map_or(true, |c| key.collection == c)
        };

        let mut closed = 0;
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            let hit = match slot {
                Slot::Idle { key, .. } | Slot::InUse { key, .. } => bound(key),
                Slot::Unused => false,
            };
            if !hit {
                continue;
            }
            closed += 1;
            match slot {
                Slot::InUse { stale, .. } => *stale = true,
                _ => *slot = Slot::Unused,
            }
        }
        closed
    }

    /// Close all idle handles
    pub fn close_all(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            match slot {
                Slot::Idle { .. } => *slot = Slot::Unused,
                Slot::InUse { stale, .. } => *stale = true,
                Slot::Unused => {}
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn stats(&self) -> FilePoolStats {
        let slots = self.slots.lock();
        FilePoolStats {
            capacity: slots.len(),
            in_use: slots
                .iter()
                .filter(|slot| matches!(slot, Slot::InUse { .. }))
                .count(),
            idle: slots
                .iter()
                .filter(|slot| matches!(slot, Slot::Idle { .. }))
                .count(),
            opens: self.opens.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            temporaries: self.temporaries.load(Ordering::Relaxed),
        }
    }
}

fn open_data_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().read(true).write(true).open(path)?)
}
