//! Storage client errors

use thiserror::Error;

/// Errors that can occur when querying the cluster storage API
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage API returned a non-success status or `result=false`
    #[error("Storage API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored object could not be decoded into its Kubernetes type
    #[error("Failed to decode {resource} {name}: {source}")]
    Decode {
        resource: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
