//! CmdbClient trait for mocking
//!
//! This trait abstracts the raw CMDB REST surface so the higher-level
//! [`CmdbStore`](crate::store::CmdbStore) can be exercised against an
//! in-memory CMDB in unit tests. The concrete `CmdbClient` implements it over
//! HTTP.

use crate::common::query::{Filter, Page};
use crate::error::CmdbError;
use crate::models::*;
use serde_json::Value;

/// Trait for CMDB API client operations
///
/// Records travel as JSON values; typing happens in the store.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait CmdbClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// `POST /findmany/<kind>`: one page of records matching `filter`
    async fn find_page(
        &self,
        kind: ResourceKind,
        biz_id: i64,
        filter: &Filter,
        page: Page,
    ) -> Result<FindResult<Value>, CmdbError>;

    /// `POST /createmany/<kind>`: ids of the created records, in input order
    async fn create_many(&self, kind: ResourceKind, biz_id: i64, data: &[Value]) -> Result<Vec<i64>, CmdbError>;

    /// `PUT /updatemany/<kind>`: apply one delta to every id
    async fn update_many(&self, kind: ResourceKind, biz_id: i64, ids: &[i64], data: &Value) -> Result<(), CmdbError>;

    /// `DELETE /deletemany/<kind>`
    async fn delete_many(&self, kind: ResourceKind, biz_id: i64, ids: &[i64]) -> Result<(), CmdbError>;

    /// `PUT /update/kube/cluster/type`
    async fn update_cluster_type(&self, biz_id: i64, id: i64, cluster_type: ClusterType) -> Result<(), CmdbError>;

    /// Hosts whose inner IP is one of `ips`
    async fn find_hosts_by_ip(&self, ips: &[String]) -> Result<Vec<Host>, CmdbError>;
}
