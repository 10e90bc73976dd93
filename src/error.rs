//! Error types for SYDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SydbError
pub type Result<T> = std::result::Result<T, SydbError>;

/// Unified error type for SYDB operations
#[derive(Debug, Error)]
pub enum SydbError {
    // -------------------------------------------------------------------------
    // Client Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Admission Errors
    // -------------------------------------------------------------------------
    #[error("Server overloaded: {0}")]
    Overloaded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SydbError {
    /// HTTP status code used when this error is rendered by the gateway
    pub fn status_code(&self) -> u16 {
        match self {
            SydbError::Validation(_) | SydbError::Json(_) | SydbError::Protocol(_) => 400,
            SydbError::NotFound(_) => 404,
            SydbError::AlreadyExists(_) => 409,
            SydbError::RateLimited(_) => 429,
            SydbError::Overloaded(_) => 503,
            SydbError::CorruptFile(_) | SydbError::Io(_) => 500,
        }
    }
}
