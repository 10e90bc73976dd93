//! SYDB Server Binary
//!
//! Starts the HTTP server for SYDB.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sydb::network::Server;
use sydb::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// SYDB Server
#[derive(Parser, Debug)]
#[command(name = "sydb-server")]
#[command(about = "Document-oriented storage engine with an HTTP/JSON front end")]
#[command(version)]
struct Args {
    /// Storage root directory
    #[arg(short, long, env = "SYDB_BASE_DIR", default_value = "./sydb_data")]
    base_dir: PathBuf,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Number of request worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Accepted requests allowed to wait for a worker
    #[arg(short, long, default_value = "64")]
    queue_capacity: usize,

    /// How long the accept loop waits for queue space, in milliseconds
    #[arg(long, default_value = "1000")]
    submit_timeout_ms: u64,

    /// Number of pooled data file handles
    #[arg(long, default_value = "16")]
    file_pool_size: usize,

    /// Maximum number of cached instances
    #[arg(short, long, default_value = "2048")]
    cache_capacity: usize,

    /// Requests allowed per client per rate-limit window
    #[arg(long, default_value = "100")]
    rate_limit: u32,

    /// Rate-limit window length in milliseconds
    #[arg(long, default_value = "60000")]
    rate_window_ms: u64,

    /// Connection read timeout in milliseconds
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Connection write timeout in milliseconds
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sydb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("SYDB Server v{}", sydb::VERSION);
    tracing::info!("Base directory: {}", args.base_dir.display());
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .base_dir(&args.base_dir)
        .listen_addr(&args.listen)
        .worker_count(args.workers)
        .queue_capacity(args.queue_capacity)
        .submit_timeout_ms(args.submit_timeout_ms)
        .file_pool_size(args.file_pool_size)
        .cache_capacity(args.cache_capacity)
        .rate_limit_max_requests(args.rate_limit)
        .rate_limit_window_ms(args.rate_window_ms)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
