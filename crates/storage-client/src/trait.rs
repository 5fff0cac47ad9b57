//! ClusterStorage trait for mocking
//!
//! Abstracts the cluster storage API so the synchronizer can be tested
//! against in-memory snapshots.

use crate::error::StorageError;
use crate::models::StoredResource;
use crds::{GameDeployment, GameStatefulSet};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, ResourceQuota};

/// Stored objects of one kind
pub type Stored<T> = Vec<StoredResource<T>>;

/// Trait for cluster storage queries
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterStorageTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    async fn query_nodes(&self, cluster_id: &str) -> Result<Stored<Node>, StorageError>;

    async fn query_namespaces(&self, cluster_id: &str) -> Result<Stored<Namespace>, StorageError>;

    /// Resource quotas of every namespace in the cluster
    async fn query_resource_quotas(&self, cluster_id: &str) -> Result<Stored<ResourceQuota>, StorageError>;

    async fn query_deployments(&self, cluster_id: &str, namespace: &str) -> Result<Stored<Deployment>, StorageError>;

    async fn query_statefulsets(&self, cluster_id: &str, namespace: &str) -> Result<Stored<StatefulSet>, StorageError>;

    async fn query_daemonsets(&self, cluster_id: &str, namespace: &str) -> Result<Stored<DaemonSet>, StorageError>;

    async fn query_game_deployments(
        &self,
        cluster_id: &str,
        namespace: &str,
    ) -> Result<Stored<GameDeployment>, StorageError>;

    async fn query_game_statefulsets(
        &self,
        cluster_id: &str,
        namespace: &str,
    ) -> Result<Stored<GameStatefulSet>, StorageError>;

    async fn query_pods(&self, cluster_id: &str, namespace: &str) -> Result<Stored<Pod>, StorageError>;

    /// A single ReplicaSet by name, `None` if storage does not know it
    async fn query_replica_set(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoredResource<ReplicaSet>>, StorageError>;
}
