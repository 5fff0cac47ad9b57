//! CMDB REST API Client
//!
//! A Rust client library for the CMDB container-topology collections
//! (`kube/cluster`, `kube/node`, `kube/namespace`, `kube/workload/<kind>`,
//! `kube/pod`, `kube/container`).
//!
//! # Example
//!
//! ```no_run
//! use cmdb_client::{CmdbClient, CmdbClientConfig, CmdbStore, GatewayCredentials, MirrorCache};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = GatewayCredentials {
//!     bk_app_code: "cmdb-sync".to_string(),
//!     bk_app_secret: "secret".to_string(),
//!     bk_username: "admin".to_string(),
//! };
//! let client = CmdbClient::new(CmdbClientConfig::new(
//!     "http://bkapi.example.com/api/bk-cmdb/prod/api/v3".to_string(),
//!     credentials,
//! ))?;
//!
//! let store = CmdbStore::new(Arc::new(client))
//!     .with_cache(MirrorCache::open(std::path::Path::new("/var/lib/cmdb-sync/BCS-K8S-00001.redb"))?);
//!
//! // Every node of CMDB cluster 42 in business 100, served from the mirror when possible
//! let nodes = store.list_nodes(100, 42, true).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Pagination**: every listing is fetched completely in pages of 100
//! - **Retry Logic**: fixed-delay retry of transport failures and 429 answers
//! - **Batch Fallback**: rejected batches are resubmitted one record at a time
//! - **Duplicate Adoption**: "already exists" creates adopt the existing record
//! - **Local Mirror**: optional redb cache, read-through and write-through

pub mod cache;
pub mod client;
pub mod common;
pub mod error;
pub mod models;
pub mod store;
#[path = "trait.rs"]
pub mod cmdb_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use cache::{CacheError, MirrorCache};
pub use client::{CmdbClient, CmdbClientConfig};
pub use cmdb_trait::CmdbClientTrait;
pub use common::query::{Filter, Page, Rule};
pub use common::{GatewayCredentials, HttpClient, RetryPolicy};
pub use error::CmdbError;
pub use models::*;
pub use store::{CmdbStore, CreateOutcome, DeleteItem, MutationOutcome, UpdateItem};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockCmdbClient};
