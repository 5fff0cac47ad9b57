//! Mock ClusterStorage for unit testing
//!
//! Holds Kubernetes objects as JSON per (cluster, resource) and serves them
//! through [`ClusterStorageTrait`]. Queries of a resource can be made to fail,
//! and ReplicaSet lookups are counted.

use crate::error::StorageError;
use crate::models::{resource, RawResource, StoredResource};
use crate::storage_trait::{ClusterStorageTrait, Stored};
use crds::{GameDeployment, GameStatefulSet};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, ResourceQuota};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Key = (String, &'static str);

/// Mock cluster storage for testing
#[derive(Clone, Default)]
pub struct MockStorageClient {
    objects: Arc<Mutex<HashMap<Key, Vec<Value>>>>,
    failing: Arc<Mutex<HashSet<&'static str>>>,
    replica_set_lookups: Arc<Mutex<usize>>,
    latency: Arc<Mutex<Duration>>,
}

impl std::fmt::Debug for MockStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStorageClient").finish_non_exhaustive()
    }
}

fn meta_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get("metadata").and_then(|m| m.get(field)).and_then(Value::as_str)
}

impl MockStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing one with the same namespace and name
    pub fn put<T: Serialize>(&self, cluster_id: &str, resource: &'static str, object: &T) {
        let value = serde_json::to_value(object).unwrap();
        let mut objects = self.objects.lock().unwrap();
        let list = objects.entry((cluster_id.to_string(), resource)).or_default();
        list.retain(|v| {
            meta_str(v, "namespace") != meta_str(&value, "namespace") || meta_str(v, "name") != meta_str(&value, "name")
        });
        list.push(value);
    }

    /// Drop an object from storage
    pub fn remove(&self, cluster_id: &str, resource: &'static str, namespace: Option<&str>, name: &str) {
        let mut objects = self.objects.lock().unwrap();
        if let Some(list) = objects.get_mut(&(cluster_id.to_string(), resource)) {
            list.retain(|v| meta_str(v, "namespace") != namespace || meta_str(v, "name") != Some(name));
        }
    }

    /// Queries of `resource` fail with an API error
    pub fn fail(&self, resource: &'static str) {
        self.failing.lock().unwrap().insert(resource);
    }

    pub fn recover(&self, resource: &'static str) {
        self.failing.lock().unwrap().remove(resource);
    }

    /// Every query waits `latency` before answering
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn replica_set_lookups(&self) -> usize {
        *self.replica_set_lookups.lock().unwrap()
    }

    async fn query<T: DeserializeOwned>(
        &self,
        cluster_id: &str,
        namespace: Option<&str>,
        resource: &'static str,
    ) -> Result<Stored<T>, StorageError> {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().unwrap().contains(resource) {
            return Err(StorageError::Api {
                code: 500,
                message: format!("{} unavailable", resource),
            });
        }

        let objects = self.objects.lock().unwrap();
        let list = objects.get(&(cluster_id.to_string(), resource)).cloned().unwrap_or_default();
        list.into_iter()
            .filter(|v| namespace.is_none() || meta_str(v, "namespace") == namespace)
            .map(|v| {
                let raw = RawResource {
                    cluster_id: cluster_id.to_string(),
                    namespace: meta_str(&v, "namespace").unwrap_or_default().to_string(),
                    resource_name: meta_str(&v, "name").unwrap_or_default().to_string(),
                    update_time: String::new(),
                    data: v,
                };
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
impl ClusterStorageTrait for MockStorageClient {
    fn base_url(&self) -> &str {
        "http://mock-storage"
    }

    async fn query_nodes(&self, cluster_id: &str) -> Result<Stored<Node>, StorageError> {
        self.query(cluster_id, None, resource::NODE).await
    }

    async fn query_namespaces(&self, cluster_id: &str) -> Result<Stored<Namespace>, StorageError> {
        self.query(cluster_id, None, resource::NAMESPACE).await
    }

    async fn query_resource_quotas(&self, cluster_id: &str) -> Result<Stored<ResourceQuota>, StorageError> {
        self.query(cluster_id, None, resource::RESOURCE_QUOTA).await
    }

    async fn query_deployments(&self, cluster_id: &str, namespace: &str) -> Result<Stored<Deployment>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::DEPLOYMENT).await
    }

    async fn query_statefulsets(&self, cluster_id: &str, namespace: &str) -> Result<Stored<StatefulSet>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::STATEFULSET).await
    }

    async fn query_daemonsets(&self, cluster_id: &str, namespace: &str) -> Result<Stored<DaemonSet>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::DAEMONSET).await
    }

    async fn query_game_deployments(
        &self,
        cluster_id: &str,
        namespace: &str,
    ) -> Result<Stored<GameDeployment>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::GAME_DEPLOYMENT).await
    }

    async fn query_game_statefulsets(
        &self,
        cluster_id: &str,
        namespace: &str,
    ) -> Result<Stored<GameStatefulSet>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::GAME_STATEFULSET).await
    }

    async fn query_pods(&self, cluster_id: &str, namespace: &str) -> Result<Stored<Pod>, StorageError> {
        self.query(cluster_id, Some(namespace), resource::POD).await
    }

    async fn query_replica_set(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoredResource<ReplicaSet>>, StorageError> {
        *self.replica_set_lookups.lock().unwrap() += 1;
        let found: Stored<ReplicaSet> = self.query(cluster_id, Some(namespace), resource::REPLICASET).await?;
        Ok(found.into_iter().find(|rs| rs.resource_name == name))
    }
}
