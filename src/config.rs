//! Configuration for SYDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a SYDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all databases
    /// Internal structure:
    ///   {base_dir}/
    ///     └── {database}/
    ///         └── {collection}/
    ///             ├── schema.txt   (field descriptors)
    ///             └── data.sydb    (binary record file)
    pub base_dir: PathBuf,

    /// Attempts made when directory creation fails transiently
    pub create_retries: u32,

    /// Delay between directory creation attempts (milliseconds)
    pub retry_backoff_ms: u64,

    // -------------------------------------------------------------------------
    // Resource Pools
    // -------------------------------------------------------------------------
    /// Number of reusable data file handles
    pub file_pool_size: usize,

    /// Maximum number of decoded instances kept in memory
    pub cache_capacity: usize,

    /// Number of request worker threads
    pub worker_count: usize,

    /// Maximum number of accepted requests waiting for a worker
    pub queue_capacity: usize,

    /// How long the accept loop waits for queue space (milliseconds)
    pub submit_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Rate Limiting
    // -------------------------------------------------------------------------
    /// Length of one fixed rate-limit window (milliseconds)
    pub rate_limit_window_ms: u64,

    /// Requests allowed per client within one window
    pub rate_limit_max_requests: u32,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./sydb_data"),
            create_retries: 3,
            retry_backoff_ms: 10,
            file_pool_size: 16,
            cache_capacity: 2048,
            worker_count: 4,
            queue_capacity: 64,
            submit_timeout_ms: 1000,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 100,
            listen_addr: "127.0.0.1:8080".to_string(),
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage root directory
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_dir = path.into();
        self
    }

    /// Set how many times directory creation is attempted
    pub fn create_retries(mut self, retries: u32) -> Self {
        self.config.create_retries = retries;
        self
    }

    /// Set the delay between directory creation attempts (in milliseconds)
    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Set the number of pooled data file handles
    pub fn file_pool_size(mut self, size: usize) -> Self {
        self.config.file_pool_size = size;
        self
    }

    /// Set the instance cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the number of worker threads
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Set the request queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the queue submission timeout (in milliseconds)
    pub fn submit_timeout_ms(mut self, ms: u64) -> Self {
        self.config.submit_timeout_ms = ms;
        self
    }

    /// Set the rate-limit window length (in milliseconds)
    pub fn rate_limit_window_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_window_ms = ms;
        self
    }

    /// Set the maximum requests per client per window
    pub fn rate_limit_max_requests(mut self, max: u32) -> Self {
        self.config.rate_limit_max_requests = max;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
