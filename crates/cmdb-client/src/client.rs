//! CMDB API client
//!
//! Implements the CMDB container-topology REST surface:
//! `findmany`, `createmany`, `updatemany`, `deletemany` under `kube/<kind>`,
//! plus the cluster type mutation and the host search used for node host ids.

use crate::common::query::{Filter, Page, Rule};
use crate::common::{GatewayCredentials, HttpClient, RetryPolicy, DEFAULT_DUPLICATE_CODE};
use crate::error::CmdbError;
use crate::cmdb_trait::CmdbClientTrait;
use crate::models::*;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`CmdbClient`]
#[derive(Debug, Clone)]
pub struct CmdbClientConfig {
    /// API gateway base URL, e.g. `http://bkapi.example.com/api/bk-cmdb/prod/api/v3`
    pub base_url: String,
    pub credentials: GatewayCredentials,
    /// Transport timeout per request
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Error code the CMDB uses for "record already exists"
    pub duplicate_code: i64,
}

impl CmdbClientConfig {
    pub fn new(base_url: String, credentials: GatewayCredentials) -> Self {
        Self {
            base_url,
            credentials,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            duplicate_code: DEFAULT_DUPLICATE_CODE,
        }
    }
}

/// CMDB API client
#[derive(Debug, Clone)]
pub struct CmdbClient {
    http: HttpClient,
}

impl CmdbClient {
    /// Create a new CMDB client
    pub fn new(config: CmdbClientConfig) -> Result<Self, CmdbError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CmdbError::Http)?;

        let http = HttpClient::new(
            client,
            config.base_url,
            &config.credentials,
            config.retry,
            config.duplicate_code,
        )?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl CmdbClientTrait for CmdbClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn find_page(
        &self,
        kind: ResourceKind,
        biz_id: i64,
        filter: &Filter,
        page: Page,
    ) -> Result<FindResult<Value>, CmdbError> {
        let mut body = json!({
            "bk_biz_id": biz_id,
            "page": {"start": page.start, "limit": page.limit, "sort": "id"},
            "fields": [],
        });
        if !filter.is_empty() {
            body["filter"] = serde_json::to_value(filter)?;
        }

        debug!("Querying {} with filter: {:?}", kind, filter);
        let data: Option<FindResult<Value>> = self
            .http
            .call(Method::POST, &format!("findmany/{}", kind.path()), &body)
            .await?;
        Ok(data.unwrap_or(FindResult { count: 0, info: Vec::new() }))
    }

    async fn create_many(&self, kind: ResourceKind, biz_id: i64, data: &[Value]) -> Result<Vec<i64>, CmdbError> {
        let body = json!({
            "bk_biz_id": biz_id,
            "data": data,
        });

        debug!("Creating {} {} record(s)", data.len(), kind);
        let created: Option<CreatedIds> = self
            .http
            .call(Method::POST, &format!("createmany/{}", kind.path()), &body)
            .await?;
        let ids = created.map(|c| c.ids).unwrap_or_default();

        if ids.len() != data.len() {
            return Err(CmdbError::InvalidRequest(format!(
                "createmany {} returned {} id(s) for {} record(s)",
                kind,
                ids.len(),
                data.len()
            )));
        }
        Ok(ids)
    }

    async fn update_many(&self, kind: ResourceKind, biz_id: i64, ids: &[i64], data: &Value) -> Result<(), CmdbError> {
        let body = json!({
            "bk_biz_id": biz_id,
            "ids": ids,
            "data": data,
        });

        debug!("Updating {} {} record(s)", ids.len(), kind);
        let _: Option<Value> = self
            .http
            .call(Method::PUT, &format!("updatemany/{}", kind.path()), &body)
            .await?;
        Ok(())
    }

    async fn delete_many(&self, kind: ResourceKind, biz_id: i64, ids: &[i64]) -> Result<(), CmdbError> {
        let body = json!({
            "bk_biz_id": biz_id,
            "ids": ids,
        });

        debug!("Deleting {} {} record(s)", ids.len(), kind);
        let _: Option<Value> = self
            .http
            .call(Method::DELETE, &format!("deletemany/{}", kind.path()), &body)
            .await?;
        Ok(())
    }

    async fn update_cluster_type(&self, biz_id: i64, id: i64, cluster_type: ClusterType) -> Result<(), CmdbError> {
        let body = json!({
            "bk_biz_id": biz_id,
            "id": id,
            "type": cluster_type,
        });

        debug!("Changing cluster {} type to {:?}", id, cluster_type);
        let _: Option<Value> = self
            .http
            .call(Method::PUT, &format!("update/{}/type", ResourceKind::Cluster.path()), &body)
            .await?;
        Ok(())
    }

    async fn find_hosts_by_ip(&self, ips: &[String]) -> Result<Vec<Host>, CmdbError> {
        if ips.is_empty() {
            return Ok(Vec::new());
        }

        let rules: Vec<Rule> = ips.iter().map(|ip| Rule::equal("bk_host_innerip", ip.as_str())).collect();
        let filter = Filter::or(rules);

        crate::common::query::fetch_all_pages(|page| {
            let body = json!({
                "page": {"start": page.start, "limit": page.limit},
                "fields": ["bk_host_id", "bk_host_innerip"],
                "host_property_filter": filter,
            });
            async move {
                let data: Option<FindResult<Host>> = self
                    .http
                    .call(Method::POST, "hosts/list_hosts_without_app", &body)
                    .await?;
                Ok::<_, CmdbError>(data.unwrap_or(FindResult { count: 0, info: Vec::new() }))
            }
        })
        .await
    }
}
