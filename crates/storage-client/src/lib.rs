//! Cluster Storage API Client
//!
//! Reads the stored snapshot of a cluster's Kubernetes objects (nodes,
//! namespaces, quotas, workloads, pods, ReplicaSets) and decodes them into
//! `k8s-openapi` and game workload types.

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod storage_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::StorageClient;
pub use error::StorageError;
pub use models::{resource, StoredResource};
pub use storage_trait::{ClusterStorageTrait, Stored};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockStorageClient;
