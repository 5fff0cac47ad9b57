//! GameStatefulSet CRD
//!
//! Ordered, stably-named game workload.

use crate::strategy::{GameSelector, GameUpdateStrategy};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "tkex.tencent.com",
    version = "v1alpha1",
    kind = "GameStatefulSet",
    namespaced,
    status = "GameStatefulSetStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct GameStatefulSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<GameSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// `OrderedReady` or `Parallel`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_management_policy: Option<String>,

    #[serde(default)]
    pub update_strategy: GameUpdateStrategy,

    #[serde(default)]
    pub template: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameStatefulSetStatus {
    #[serde(default)]
    pub replicas: i64,
    #[serde(default)]
    pub ready_replicas: i64,
    #[serde(default)]
    pub current_replicas: i64,
    #[serde(default)]
    pub updated_replicas: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
