//! Error types for the local mirror.

use thiserror::Error;

/// Result type alias for mirror operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while reading or writing the local mirror.
///
/// Callers treat any of these on the read path as a cache miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to open mirror: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
