//! Cluster storage API client
//!
//! Reads the latest stored snapshot of Kubernetes objects for a cluster:
//! `GET {base}/query/k8s/dynamic/clusters/{cluster}/{resource}` for
//! cluster-scoped kinds and `.../namespaces/{ns}/{resource}` for namespaced
//! ones.

use crate::error::StorageError;
use crate::models::{resource, StorageResponse, StoredResource};
use crate::storage_trait::{ClusterStorageTrait, Stored};
use crds::{GameDeployment, GameStatefulSet};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, ResourceQuota};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Cluster storage API client
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    token: String,
}

impl StorageClient {
    /// Create a new storage client
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StorageError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn path(cluster_id: &str, namespace: Option<&str>, resource: &str) -> String {
        match namespace {
            Some(ns) => format!(
                "/query/k8s/dynamic/clusters/{}/namespaces/{}/{}",
                urlencoding::encode(cluster_id),
                urlencoding::encode(ns),
                resource
            ),
            None => format!("/query/k8s/dynamic/clusters/{}/{}", urlencoding::encode(cluster_id), resource),
        }
    }

    /// Query stored objects and decode them into `T`
    async fn query<T: DeserializeOwned>(
        &self,
        cluster_id: &str,
        namespace: Option<&str>,
        resource: &str,
        name: Option<&str>,
    ) -> Result<Stored<T>, StorageError> {
        let mut url = format!("{}{}", self.base_url, Self::path(cluster_id, namespace, resource));
        if let Some(name) = name {
            url.push_str(&format!("?resourceName={}", urlencoding::encode(name)));
        }
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(StorageError::Http)?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Api {
                code: i64::from(status.as_u16()),
                message: body.chars().take(500).collect(),
            });
        }

        let envelope: StorageResponse = serde_json::from_str(&body)?;
        if !envelope.result || envelope.code != 0 {
            return Err(StorageError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                let name = raw.resource_name.clone();
                raw.decode().map_err(|source| StorageError::Decode {
                    resource: resource.to_string(),
                    name,
                    source,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ClusterStorageTrait for StorageClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn query_nodes(&self, cluster_id: &str) -> Result<Stored<Node>, StorageError> {
        self.query(cluster_id, None, resource::NODE, None).await
    }

    async fn query_namespaces(&self, cluster_id: &str) -> Result<Stored<Namespace>, StorageError> {
        self.query(cluster_id, None, resource::NAMESPACE, None).await
    }

    async fn query_resource_quotas(&self, cluster_id: &str) -> Result<Stored<ResourceQuota>, StorageError> {
        self.query(cluster_id, None, resource::RESOURCE_QUOTA, None).await
    }

    async fn query_deployments(&self, cluster_id: &str, namespace: &str) -> Result<Stored<Deployment>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::DEPLOYMENT, None).await
    }

    async fn query_statefulsets(&self, cluster_id: &str, namespace: &str) -> Result<Stored<StatefulSet>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::STATEFULSET, None).await
    }

    async fn query_daemonsets(&self, cluster_id: &str, namespace: &str) -> Result<Stored<DaemonSet>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::DAEMONSET, None).await
    }

    async fn query_game_deployments(
        &self,
        cluster_id: &str,
        namespace: &str,
    ) -> Result<Stored<GameDeployment>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::GAME_DEPLOYMENT, None).await
    }

    async fn query_game_statefulsets(
        &self,
        cluster_id: &str,
        namespace: &str,
    ) -> Result<Stored<GameStatefulSet>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::GAME_STATEFULSET, None).await
    }

    async fn query_pods(&self, cluster_id: &str, namespace: &str) -> Result<Stored<Pod>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::POD, None).await
    }

    async fn query_replica_set(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoredResource<ReplicaSet>>, StorageError> {
        let found: Stored<ReplicaSet> = self
            .query(cluster_id, Some(namespace), resource::REPLICASET, Some(name))
            .await?;
        Ok(found.into_iter().find(|rs| rs.resource_name == name || rs.data.metadata.name.as_deref() == Some(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_paths() {
        assert_eq!(
            StorageClient::path("BCS-K8S-00001", None, resource::NODE),
            "/query/k8s/dynamic/clusters/BCS-K8S-00001/Node"
        );
        assert_eq!(
            StorageClient::path("BCS-K8S-00001", Some("kube-system"), resource::POD),
            "/query/k8s/dynamic/clusters/BCS-K8S-00001/namespaces/kube-system/Pod"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = StorageClient::new(
            "http://storage.example.com/bcsstorage/v1/".to_string(),
            "token".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://storage.example.com/bcsstorage/v1");
    }
}
