//! # SYDB
//!
//! A document-oriented storage engine with an HTTP front end:
//! - Append-only binary record files with CRC-32 checked records
//! - Schema-validated JSON instances grouped into databases and collections
//! - Bounded LRU instance cache and pooled file handles
//! - Worker pool with backpressure and a per-client rate limiter
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 HTTP Server (accept loop)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ RequestContext
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                Worker Pool (bounded queue)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Gateway (rate limiter, routing, JSON)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        Engine (databases, collections, instances)            │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!  ┌───────────┐     ┌─────────────┐    ┌─────────────┐
//!  │   Cache   │     │  File Pool  │    │    Query    │
//!  │   (LRU)   │     │  (handles)  │    │  (matcher)  │
//!  └───────────┘     └──────┬──────┘    └─────────────┘
//!                           │
//!                           ▼
//!                    ┌─────────────┐
//!                    │   Storage   │
//!                    │ (data.sydb) │
//!                    └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod validation;

pub mod cache;
pub mod engine;
pub mod network;
pub mod pool;
pub mod protocol;
pub mod query;
pub mod rate_limit;
pub mod schema;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::Engine;
pub use error::{Result, SydbError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SYDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
