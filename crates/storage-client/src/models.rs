//! Storage API data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource segment names used in storage query paths
pub mod resource {
    pub const NODE: &str = "Node";
    pub const NAMESPACE: &str = "Namespace";
    pub const RESOURCE_QUOTA: &str = "ResourceQuota";
    pub const DEPLOYMENT: &str = "Deployment";
    pub const STATEFULSET: &str = "StatefulSet";
    pub const DAEMONSET: &str = "DaemonSet";
    pub const GAME_DEPLOYMENT: &str = "GameDeployment";
    pub const GAME_STATEFULSET: &str = "GameStatefulSet";
    pub const POD: &str = "Pod";
    pub const REPLICASET: &str = "ReplicaSet";
}

/// Response envelope of the storage API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageResponse {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Vec<RawResource>>,
}

/// One stored object as returned on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResource {
    pub data: Value,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub update_time: String,
}

/// A stored Kubernetes object with its storage metadata
#[derive(Debug, Clone)]
pub struct StoredResource<T> {
    pub data: T,
    pub cluster_id: String,
    pub namespace: String,
    pub resource_name: String,
    /// When the storage last saw the object change, if reported
    pub update_time: Option<DateTime<Utc>>,
}

impl RawResource {
    /// Decode `data` into `T`, keeping the storage metadata.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<StoredResource<T>, serde_json::Error> {
        let update_time = DateTime::parse_from_rfc3339(&self.update_time)
            .ok()
            .map(|t| t.with_timezone(&Utc));
        Ok(StoredResource {
            data: serde_json::from_value(self.data)?,
            cluster_id: self.cluster_id,
            namespace: self.namespace,
            resource_name: self.resource_name,
            update_time,
        })
    }
}
