//! GameDeployment CRD
//!
//! Stateless game workload with in-place update support.

use crate::strategy::{GameSelector, GameUpdateStrategy};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "tkex.tencent.com",
    version = "v1alpha1",
    kind = "GameDeployment",
    namespaced,
    status = "GameDeploymentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct GameDeploymentSpec {
    /// Desired number of pods (defaults to 1 when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<GameSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ready_seconds: Option<i64>,

    #[serde(default)]
    pub update_strategy: GameUpdateStrategy,

    /// Pod template, not interpreted
    #[serde(default)]
    pub template: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameDeploymentStatus {
    #[serde(default)]
    pub replicas: i64,
    #[serde(default)]
    pub ready_replicas: i64,
    #[serde(default)]
    pub updated_replicas: i64,
    #[serde(default)]
    pub available_replicas: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::IntOrPercent;

    #[test]
    fn test_parse_manifest() {
        let manifest = r#"
apiVersion: tkex.tencent.com/v1alpha1
kind: GameDeployment
metadata:
  name: gd-1
  namespace: game
  labels:
    app: gd
spec:
  replicas: 3
  selector:
    matchLabels:
      app: gd
  updateStrategy:
    type: InplaceUpdate
    rollingUpdate:
      partition: 1
      maxUnavailable: 2
      maxSurge: "25%"
  template:
    metadata:
      labels:
        app: gd
"#;
        let gd: GameDeployment = serde_yaml::from_str(manifest).unwrap();
        assert_eq!(gd.metadata.name.as_deref(), Some("gd-1"));
        assert_eq!(gd.spec.replicas, Some(3));
        assert_eq!(gd.spec.update_strategy.strategy_type.as_deref(), Some("InplaceUpdate"));
        let rolling = gd.spec.update_strategy.rolling_update.unwrap();
        assert_eq!(rolling.partition, Some(1));
        assert_eq!(rolling.max_unavailable, Some(IntOrPercent::Int(2)));
        assert_eq!(rolling.max_surge, Some(IntOrPercent::Percent("25%".to_string())));
        assert!(gd.status.is_none());
    }

    #[test]
    fn test_missing_strategy_defaults() {
        let json = serde_json::json!({
            "apiVersion": "tkex.tencent.com/v1alpha1",
            "kind": "GameDeployment",
            "metadata": {"name": "gd-2", "namespace": "game"},
            "spec": {}
        });
        let gd: GameDeployment = serde_json::from_value(json).unwrap();
        assert_eq!(gd.spec.replicas, None);
        assert_eq!(gd.spec.update_strategy, Default::default());
    }
}
