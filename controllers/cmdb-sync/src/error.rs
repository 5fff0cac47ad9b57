//! Controller-specific error types.
//!
//! Errors from the CMDB, storage and project clients are wrapped here so the
//! orchestrator can log and classify them per sync state.

use cmdb_client::{CacheError, CmdbError};
use storage_client::StorageError;
use thiserror::Error;

/// Errors that can occur in the CMDB synchronizer.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// CMDB API error
    #[error("CMDB error: {0}")]
    Cmdb(#[from] CmdbError),

    /// Local mirror could not be opened
    #[error("Mirror error: {0}")]
    Cache(#[from] CacheError),

    /// Cluster storage API error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Project lookup failed
    #[error("Project lookup failed: {0}")]
    ProjectLookup(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reconciliation failed
    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),

    /// Metrics registry or endpoint failure
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// I/O error (config file, listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// Transport failures abandon the current state for this pass only.
    pub fn is_transport(&self) -> bool {
        match self {
            ControllerError::Cmdb(e) => e.is_transport(),
            ControllerError::Storage(StorageError::Http(_)) => true,
            _ => false,
        }
    }
}
