//! Instance Cache
//!
//! Bounded map from instance key to decoded document with least-recently-used
//! eviction. Purely an optimisation: a miss or an eviction only costs a scan.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// A cached document plus access bookkeeping
#[derive(Debug, Clone)]
struct CacheEntry {
    document: Value,
    last_accessed: Instant,
    access_count: u64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of decoded instances
///
/// Keys are built with [`InstanceCache::key`] so identical ids in different
/// collections never collide.
pub struct InstanceCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InstanceCache {
    /// Create a cache holding at most `capacity` documents (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache key for one instance of one collection
    pub fn key(database: &str, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", database, collection, id)
    }

    /// Look up a document, recording a hit or a miss
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = Instant::now();
                entry.access_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.document.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite, evicting the least recently used entry when full
    pub fn put(&self, key: String, document: Value) {
        let entry = CacheEntry {
            document,
            last_accessed: Instant::now(),
            access_count: 0,
        };

        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Evicted {} from instance cache", evicted);
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().pop(key).map(|entry| entry.document)
    }

    /// Drop every entry whose key starts with `prefix`
    ///
    /// Used when a collection or database disappears.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Number of times `key` has been read since it was cached
    pub fn access_count(&self, key: &str) -> Option<u64> {
        self.entries.lock().peek(key).map(|entry| entry.access_count)
    }

    /// Time since `key` was last read or written
    pub fn idle_for(&self, key: &str) -> Option<std::time::Duration> {
        self.entries
            .lock()
            .peek(key)
            .map(|entry| entry.last_accessed.elapsed())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }
}
