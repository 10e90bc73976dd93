//! Pool Module
//!
//! Bounded resource pools shared by request handling.
//!
//! - [`FilePool`]: reusable open data files keyed by (database, collection)
//! - [`WorkerPool`]: bounded job queue plus fixed worker threads

mod file_pool;
mod worker;

pub use file_pool::{FilePool, FilePoolStats, PoolKey, PooledFile};
pub use worker::{Job, Rejected, WorkerGauge, WorkerPool, WorkerStats};
