//! CMDB container-topology models
//!
//! These models match the CMDB `kube` object schemas (cluster, node,
//! namespace, workload, pod, container). The same struct is used as the
//! create payload and as the listed record; `id` is omitted on the wire
//! until the CMDB has assigned one.

use crate::common::query::{Filter, Rule};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kubernetes-style label set. Ordered so deltas serialize deterministically.
pub type Labels = BTreeMap<String, String>;

/// Name of the synthetic workload that owns pods without a recognised controller.
pub const BARE_PODS_WORKLOAD_NAME: &str = "pods";

/// CMDB response envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
    pub data: Option<T>,
}

/// `data` payload of a `findmany` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResult<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        bound(deserialize = "T: Deserialize<'de>")
    )]
    pub info: Vec<T>,
}

/// `data` payload of a `createmany` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedIds {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ids: Vec<i64>,
}

/// Workload collections mirrored by the CMDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    GameDeployment,
    GameStatefulSet,
    /// Synthetic bare-pods bucket, one per namespace
    Pods,
}

impl WorkloadKind {
    /// The five kinds sourced from the cluster, in sync order.
    pub const SYNCED: [WorkloadKind; 5] = [
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::DaemonSet,
        WorkloadKind::GameDeployment,
        WorkloadKind::GameStatefulSet,
    ];

    /// Identifier used in CMDB paths and pod workload references
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulSet",
            WorkloadKind::DaemonSet => "daemonSet",
            WorkloadKind::GameDeployment => "gameDeployment",
            WorkloadKind::GameStatefulSet => "gameStatefulSet",
            WorkloadKind::Pods => "pods",
        }
    }

    /// Map a Kubernetes owner-reference kind onto a directly mirrored workload kind.
    ///
    /// `ReplicaSet` is deliberately absent: it must be resolved through its own
    /// owner (a `Deployment`).
    pub fn from_owner_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(WorkloadKind::Deployment),
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            "DaemonSet" => Some(WorkloadKind::DaemonSet),
            "GameDeployment" => Some(WorkloadKind::GameDeployment),
            "GameStatefulSet" => Some(WorkloadKind::GameStatefulSet),
            _ => None,
        }
    }

    /// Whether records of this kind carry a replica count
    pub fn has_replicas(&self) -> bool {
        !matches!(self, WorkloadKind::DaemonSet | WorkloadKind::Pods)
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every CMDB object family the synchronizer reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Cluster,
    Node,
    Namespace,
    Workload(WorkloadKind),
    Pod,
    Container,
}

impl ResourceKind {
    /// Object path segment used by `findmany`/`createmany`/`updatemany`/`deletemany`
    pub fn path(&self) -> String {
        match self {
            ResourceKind::Cluster => "kube/cluster".to_string(),
            ResourceKind::Node => "kube/node".to_string(),
            ResourceKind::Namespace => "kube/namespace".to_string(),
            ResourceKind::Workload(kind) => format!("kube/workload/{}", kind.as_str()),
            ResourceKind::Pod => "kube/pod".to_string(),
            ResourceKind::Container => "kube/container".to_string(),
        }
    }

    /// Local mirror table name
    pub fn table_name(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::Node => "node",
            ResourceKind::Namespace => "namespace",
            ResourceKind::Workload(WorkloadKind::Deployment) => "workload_deployment",
            ResourceKind::Workload(WorkloadKind::StatefulSet) => "workload_statefulset",
            ResourceKind::Workload(WorkloadKind::DaemonSet) => "workload_daemonset",
            ResourceKind::Workload(WorkloadKind::GameDeployment) => "workload_gamedeployment",
            ResourceKind::Workload(WorkloadKind::GameStatefulSet) => "workload_gamestatefulset",
            ResourceKind::Workload(WorkloadKind::Pods) => "workload_pods",
            ResourceKind::Pod => "pod",
            ResourceKind::Container => "container",
        }
    }

    /// All kinds, used to create the mirror tables up front
    pub fn all() -> Vec<ResourceKind> {
        let mut kinds = vec![ResourceKind::Cluster, ResourceKind::Node, ResourceKind::Namespace];
        kinds.extend(WorkloadKind::SYNCED.iter().map(|k| ResourceKind::Workload(*k)));
        kinds.push(ResourceKind::Workload(WorkloadKind::Pods));
        kinds.push(ResourceKind::Pod);
        kinds.push(ResourceKind::Container);
        kinds
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Workload(kind) => write!(f, "workload/{}", kind),
            other => f.write_str(other.table_name()),
        }
    }
}

/// A record stored in one of the CMDB kube collections
pub trait CmdbRecord: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// CMDB-assigned identifier (0 until created)
    fn id(&self) -> i64;

    /// Assign the identifier returned by `createmany`
    fn set_id(&mut self, id: i64);

    /// Business the record is filed under (`bk_biz_id` of the write call)
    fn biz_id(&self) -> i64;

    /// Filter selecting records that share this record's natural key
    fn natural_key_filter(&self) -> Filter;

    /// Human-readable natural key for log lines
    fn display_key(&self) -> String;
}

/// Cluster sharing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClusterType {
    #[default]
    #[serde(rename = "INDEPENDENT_CLUSTER")]
    Independent,
    #[serde(rename = "SHARE_CLUSTER")]
    Shared,
}

/// Cluster record (`kube/cluster`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    pub bk_biz_id: i64,
    pub name: String,
    #[serde(default)]
    pub scheduling_engine: String,
    /// Cluster UID (natural key)
    pub uid: String,
    /// Underlying infrastructure cluster id
    #[serde(default)]
    pub xid: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub network_type: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub vpc: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub network: Vec<String>,
    #[serde(rename = "type", default)]
    pub cluster_type: ClusterType,
    #[serde(default)]
    pub environment: String,
}

impl CmdbRecord for Cluster {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn biz_id(&self) -> i64 {
        self.bk_biz_id
    }
    fn natural_key_filter(&self) -> Filter {
        Filter::and(vec![Rule::equal("uid", self.uid.as_str())])
    }
    fn display_key(&self) -> String {
        self.uid.clone()
    }
}

/// Node taint as mirrored in the CMDB
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

/// Node record (`kube/node`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    pub bk_biz_id: i64,
    pub bk_cluster_id: i64,
    #[serde(default)]
    pub cluster_uid: String,
    #[serde(default)]
    pub bk_host_id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Labels,
    #[serde(default, deserialize_with = "null_as_default")]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub unschedulable: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub internal_ip: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_ip: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    /// Container runtime version, e.g. `containerd://1.6.21`
    #[serde(default)]
    pub runtime_component: String,
    #[serde(default)]
    pub pod_cidr: String,
}

impl CmdbRecord for Node {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn biz_id(&self) -> i64 {
        self.bk_biz_id
    }
    fn natural_key_filter(&self) -> Filter {
        Filter::and(vec![
            Rule::equal("bk_cluster_id", self.bk_cluster_id),
            Rule::equal("name", self.name.as_str()),
        ])
    }
    fn display_key(&self) -> String {
        format!("{}/{}", self.cluster_uid, self.name)
    }
}

/// Namespace resource quota (only `hard` and `scopes` are mirrored)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceQuota {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hard: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scopes: Vec<String>,
}

/// Namespace record (`kube/namespace`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    pub bk_biz_id: i64,
    pub bk_cluster_id: i64,
    #[serde(default)]
    pub cluster_uid: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Labels,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_quotas: Vec<ResourceQuota>,
}

impl CmdbRecord for Namespace {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn biz_id(&self) -> i64 {
        self.bk_biz_id
    }
    fn natural_key_filter(&self) -> Filter {
        Filter::and(vec![
            Rule::equal("bk_cluster_id", self.bk_cluster_id),
            Rule::equal("name", self.name.as_str()),
        ])
    }
    fn display_key(&self) -> String {
        format!("{}/{}", self.cluster_uid, self.name)
    }
}

/// Integer-or-percentage value (`maxUnavailable`, `maxSurge`).
///
/// Serialized through the CMDB's explicit adapter:
/// `{"type": 0, "int_val": 1}` or `{"type": 1, "str_val": "25%"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntOrStr {
    Int(i64),
    Str(String),
}

#[derive(Serialize, Deserialize)]
struct IntOrStrWire {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    int_val: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    str_val: Option<String>,
}

impl Serialize for IntOrStr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            IntOrStr::Int(v) => IntOrStrWire { kind: 0, int_val: Some(*v), str_val: None },
            IntOrStr::Str(v) => IntOrStrWire { kind: 1, int_val: None, str_val: Some(v.clone()) },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IntOrStr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = IntOrStrWire::deserialize(deserializer)?;
        match wire.kind {
            0 => Ok(IntOrStr::Int(wire.int_val.unwrap_or_default())),
            1 => Ok(IntOrStr::Str(wire.str_val.unwrap_or_default())),
            other => Err(serde::de::Error::custom(format!("unknown int-or-string type {}", other))),
        }
    }
}

/// Label selector requirement (`matchExpressions` entry)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<String>,
}

/// Workload label selector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_labels: Labels,
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

/// Flat wire shape of `rolling_update_strategy`.
///
/// This is only the serialization adapter; code that builds or compares
/// policies works with [`RollingUpdatePolicy`], which knows which fields are
/// valid for each workload kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RollingUpdateFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i64>,
}

impl RollingUpdateFields {
    pub fn is_empty(&self) -> bool {
        self.max_unavailable.is_none() && self.max_surge.is_none() && self.partition.is_none()
    }
}

/// Rolling-update policy, one variant per workload kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollingUpdatePolicy {
    Deployment {
        max_unavailable: Option<IntOrStr>,
        max_surge: Option<IntOrStr>,
    },
    StatefulSet {
        partition: Option<i64>,
    },
    DaemonSet {
        max_unavailable: Option<IntOrStr>,
        max_surge: Option<IntOrStr>,
    },
    GameDeployment {
        max_unavailable: Option<IntOrStr>,
        max_surge: Option<IntOrStr>,
        partition: Option<i64>,
    },
    GameStatefulSet {
        max_unavailable: Option<IntOrStr>,
        partition: Option<i64>,
    },
}

impl RollingUpdatePolicy {
    /// Read a stored policy back, keeping only the fields valid for `kind`.
    pub fn from_fields(kind: WorkloadKind, fields: &RollingUpdateFields) -> Option<Self> {
        let f = fields.clone();
        match kind {
            WorkloadKind::Deployment => Some(RollingUpdatePolicy::Deployment {
                max_unavailable: f.max_unavailable,
                max_surge: f.max_surge,
            }),
            WorkloadKind::StatefulSet => Some(RollingUpdatePolicy::StatefulSet { partition: f.partition }),
            WorkloadKind::DaemonSet => Some(RollingUpdatePolicy::DaemonSet {
                max_unavailable: f.max_unavailable,
                max_surge: f.max_surge,
            }),
            WorkloadKind::GameDeployment => Some(RollingUpdatePolicy::GameDeployment {
                max_unavailable: f.max_unavailable,
                max_surge: f.max_surge,
                partition: f.partition,
            }),
            WorkloadKind::GameStatefulSet => Some(RollingUpdatePolicy::GameStatefulSet {
                max_unavailable: f.max_unavailable,
                partition: f.partition,
            }),
            WorkloadKind::Pods => None,
        }
    }

    /// Flatten into the wire adapter.
    pub fn to_fields(&self) -> RollingUpdateFields {
        match self.clone() {
            RollingUpdatePolicy::Deployment { max_unavailable, max_surge }
            | RollingUpdatePolicy::DaemonSet { max_unavailable, max_surge } => RollingUpdateFields {
                max_unavailable,
                max_surge,
                partition: None,
            },
            RollingUpdatePolicy::StatefulSet { partition } => RollingUpdateFields {
                partition,
                ..Default::default()
            },
            RollingUpdatePolicy::GameDeployment { max_unavailable, max_surge, partition } => {
                RollingUpdateFields { max_unavailable, max_surge, partition }
            }
            RollingUpdatePolicy::GameStatefulSet { max_unavailable, partition } => RollingUpdateFields {
                max_unavailable,
                max_surge: None,
                partition,
            },
        }
    }
}

impl Serialize for RollingUpdatePolicy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_fields().serialize(serializer)
    }
}

/// Workload record (`kube/workload/<kind>`), including the bare-pods bucket
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workload {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    pub bk_biz_id: i64,
    pub bk_cluster_id: i64,
    #[serde(default)]
    pub cluster_uid: String,
    pub bk_namespace_id: i64,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ready_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update_strategy: Option<RollingUpdateFields>,
}

impl Workload {
    /// The bare-pods bucket for a namespace
    pub fn bare_pods(namespace: &Namespace) -> Self {
        Self {
            bk_biz_id: namespace.bk_biz_id,
            bk_cluster_id: namespace.bk_cluster_id,
            cluster_uid: namespace.cluster_uid.clone(),
            bk_namespace_id: namespace.id,
            namespace: namespace.name.clone(),
            name: BARE_PODS_WORKLOAD_NAME.to_string(),
            ..Default::default()
        }
    }
}

impl CmdbRecord for Workload {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn biz_id(&self) -> i64 {
        self.bk_biz_id
    }
    fn natural_key_filter(&self) -> Filter {
        Filter::and(vec![
            Rule::equal("bk_namespace_id", self.bk_namespace_id),
            Rule::equal("name", self.name.as_str()),
        ])
    }
    fn display_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Reference from a pod to its owning workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodWorkloadRef {
    pub kind: WorkloadKind,
    pub name: String,
    pub id: i64,
}

/// Pod IP entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodIp {
    pub ip: String,
}

/// Pod record (`kube/pod`); `containers` is only sent on create
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pod {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    pub bk_biz_id: i64,
    pub bk_cluster_id: i64,
    #[serde(default)]
    pub cluster_uid: String,
    pub bk_namespace_id: i64,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub bk_node_id: i64,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub bk_host_id: i64,
    pub name: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub workload_ref: Option<PodWorkloadRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub operator: Vec<String>,
    #[serde(default)]
    pub ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ips: Vec<PodIp>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
}

impl CmdbRecord for Pod {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn biz_id(&self) -> i64 {
        self.bk_biz_id
    }
    fn natural_key_filter(&self) -> Filter {
        Filter::and(vec![
            Rule::equal("bk_namespace_id", self.bk_namespace_id),
            Rule::equal("name", self.name.as_str()),
        ])
    }
    fn display_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Container record (`kube/container`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Container {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bk_biz_id: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bk_cluster_id: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bk_pod_id: i64,
    pub name: String,
    #[serde(default)]
    pub image: String,
    /// Runtime container id, without the `containerd://` style scheme
    pub container_uid: String,
}

impl CmdbRecord for Container {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn biz_id(&self) -> i64 {
        self.bk_biz_id
    }
    fn natural_key_filter(&self) -> Filter {
        Filter::and(vec![
            Rule::equal("bk_pod_id", self.bk_pod_id),
            Rule::equal("name", self.name.as_str()),
        ])
    }
    fn display_key(&self) -> String {
        format!("{}/{}", self.bk_pod_id, self.name)
    }
}

/// Host returned by the host search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Host {
    pub bk_host_id: i64,
    #[serde(default)]
    pub bk_host_innerip: String,
}

impl Host {
    /// `bk_host_innerip` may hold several comma-separated addresses
    pub fn has_ip(&self, ip: &str) -> bool {
        self.bk_host_innerip.split(',').any(|candidate| candidate.trim() == ip)
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
