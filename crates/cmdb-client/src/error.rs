//! CMDB client errors

use thiserror::Error;

/// Errors that can occur when interacting with the CMDB API
#[derive(Debug, Error)]
pub enum CmdbError {
    /// HTTP request/response error (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway kept answering 429 until the retry budget ran out
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// The gateway answered 5xx without a CMDB envelope (upstream down or overloaded)
    #[error("CMDB unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// CMDB API returned `result=false` or a non-zero code
    #[error("CMDB API error (code {code}, request {request_id}): {message}")]
    Api {
        code: i64,
        message: String,
        request_id: String,
    },

    /// CMDB rejected a create because a record with the same unique key exists
    #[error("Duplicate record (code {code}): {message}")]
    Duplicate { code: i64, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CmdbError {
    /// Transport-level failures are retried by the HTTP layer and, once the
    /// budget is spent, abandon the resource kind for the current pass.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CmdbError::Http(_) | CmdbError::TooManyRequests(_) | CmdbError::Unavailable { .. }
        )
    }

    /// Whether the HTTP layer should try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            CmdbError::Http(e) => !e.is_builder() && !e.is_decode(),
            CmdbError::TooManyRequests(_) | CmdbError::Unavailable { .. } => true,
            _ => false,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CmdbError::Duplicate { .. })
    }
}
