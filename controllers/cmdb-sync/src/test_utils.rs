//! Test utilities for unit testing the sync states
//!
//! Builders for cluster objects as the storage API returns them, CMDB
//! records, and a reconciler wired to the in-memory mocks.

use crate::config::{ClusterSpec, SyncSettings};
use crate::error::ControllerError;
use crate::project::ProjectLookup;
use crate::reconciler::Reconciler;
use cmdb_client::{ClusterType, CmdbStore, MirrorCache, MockCmdbClient, Namespace};
use k8s_openapi::api::apps::v1 as apps;
use k8s_openapi::api::core::v1 as core;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use storage_client::{MockStorageClient, StoredResource};

pub const CLUSTER_UID: &str = "BCS-K8S-00001";
pub const BIZ_ID: i64 = 100;

fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

fn owned_by(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: if kind == "GameDeployment" || kind == "GameStatefulSet" {
            "tkex.tencent.com/v1alpha1".to_string()
        } else {
            "apps/v1".to_string()
        },
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{}-uid", name),
        controller: Some(true),
        ..Default::default()
    }
}

/// Helper to create a Kubernetes node with one internal IP and a NoSchedule taint
pub fn k8s_node(name: &str, internal_ip: &str) -> core::Node {
    core::Node {
        metadata: ObjectMeta {
            labels: Some(BTreeMap::from([(
                "kubernetes.io/hostname".to_string(),
                name.to_string(),
            )])),
            ..meta(None, name)
        },
        spec: Some(core::NodeSpec {
            pod_cidr: Some("10.1.0.0/24".to_string()),
            taints: Some(vec![core::Taint {
                key: "dedicated".to_string(),
                value: None,
                effect: "NoSchedule".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: Some(core::NodeStatus {
            addresses: Some(vec![
                core::NodeAddress {
                    type_: "InternalIP".to_string(),
                    address: internal_ip.to_string(),
                },
                core::NodeAddress {
                    type_: "Hostname".to_string(),
                    address: name.to_string(),
                },
            ]),
            node_info: Some(core::NodeSystemInfo {
                container_runtime_version: "containerd://1.6.21".to_string(),
                kubelet_version: "v1.30.2".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

/// Helper to create a namespace, optionally annotated with a project code
pub fn k8s_namespace(name: &str, project_code: Option<&str>) -> core::Namespace {
    core::Namespace {
        metadata: ObjectMeta {
            annotations: project_code.map(|code| {
                BTreeMap::from([(
                    crate::config::DEFAULT_PROJECT_CODE_ANNOTATION.to_string(),
                    code.to_string(),
                )])
            }),
            ..meta(None, name)
        },
        ..Default::default()
    }
}

/// Helper to create a quota with a single hard limit
pub fn k8s_quota(namespace: &str, resource: &str, value: &str) -> core::ResourceQuota {
    core::ResourceQuota {
        metadata: meta(Some(namespace), &format!("{}-{}", namespace, resource)),
        spec: Some(core::ResourceQuotaSpec {
            hard: Some(BTreeMap::from([(resource.to_string(), Quantity(value.to_string()))])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn k8s_deployment(namespace: &str, name: &str, replicas: i32) -> apps::Deployment {
    apps::Deployment {
        metadata: ObjectMeta {
            labels: Some(app_labels(name)),
            ..meta(Some(namespace), name)
        },
        spec: Some(apps::DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(app_labels(name)),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn k8s_statefulset(namespace: &str, name: &str) -> apps::StatefulSet {
    apps::StatefulSet {
        metadata: ObjectMeta {
            labels: Some(app_labels(name)),
            ..meta(Some(namespace), name)
        },
        spec: Some(apps::StatefulSetSpec {
            replicas: Some(2),
            selector: LabelSelector {
                match_labels: Some(app_labels(name)),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Helper to create a ReplicaSet owned by a Deployment
pub fn k8s_replica_set(namespace: &str, name: &str, deployment: &str) -> apps::ReplicaSet {
    apps::ReplicaSet {
        metadata: ObjectMeta {
            owner_references: Some(vec![owned_by("Deployment", deployment)]),
            ..meta(Some(namespace), name)
        },
        ..Default::default()
    }
}

/// Helper to create a scheduled pod with one running container `main`.
///
/// `owner` is `(kind, name)` of its single owner reference.
pub fn k8s_pod(namespace: &str, name: &str, node: &str, owner: Option<(&str, &str)>) -> core::Pod {
    core::Pod {
        metadata: ObjectMeta {
            labels: Some(app_labels(name)),
            owner_references: owner.map(|(kind, owner_name)| vec![owned_by(kind, owner_name)]),
            ..meta(Some(namespace), name)
        },
        spec: Some(core::PodSpec {
            node_name: Some(node.to_string()),
            containers: vec![core::Container {
                name: "main".to_string(),
                image: Some("nginx:1.25".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(core::PodStatus {
            pod_ip: Some("10.1.0.4".to_string()),
            pod_ips: Some(vec![core::PodIP {
                ip: "10.1.0.4".to_string(),
            }]),
            container_statuses: Some(vec![core::ContainerStatus {
                name: "main".to_string(),
                image: "nginx:1.25".to_string(),
                container_id: Some(format!("containerd://{}-main", name)),
                ready: true,
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

/// Wrap an object the way the storage client returns it
pub fn stored<T>(data: T) -> StoredResource<T> {
    StoredResource {
        data,
        cluster_id: CLUSTER_UID.to_string(),
        namespace: String::new(),
        resource_name: String::new(),
        update_time: None,
    }
}

/// CMDB namespace record in cluster 9 of the test business
pub fn cmdb_namespace(id: i64, name: &str) -> Namespace {
    Namespace {
        id,
        bk_biz_id: BIZ_ID,
        bk_cluster_id: 9,
        cluster_uid: CLUSTER_UID.to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn cluster_spec() -> ClusterSpec {
    ClusterSpec {
        id: CLUSTER_UID.to_string(),
        name: "test-cluster".to_string(),
        biz_id: BIZ_ID.to_string(),
        scheduling_engine: "k8s".to_string(),
        version: "1.30.2".to_string(),
        network_type: "overlay".to_string(),
        region: "ap-guangzhou".to_string(),
        network: vec!["10.1.0.0/16".to_string()],
        cluster_type: ClusterType::Independent,
        environment: "prod".to_string(),
        creator: "admin".to_string(),
        ..Default::default()
    }
}

/// Project lookup answering from a fixed table
#[derive(Debug, Default)]
pub struct StaticProjects(pub HashMap<String, i64>);

#[async_trait::async_trait]
impl ProjectLookup for StaticProjects {
    async fn business_id(&self, project_code: &str) -> Result<Option<i64>, ControllerError> {
        Ok(self.0.get(project_code).copied())
    }
}

/// Reconciler over the mocks, without a local mirror
pub fn reconciler(
    cmdb: &MockCmdbClient,
    storage: &MockStorageClient,
    projects: Option<Arc<dyn ProjectLookup>>,
    settings: SyncSettings,
    cluster: ClusterSpec,
) -> Reconciler {
    Reconciler::new(
        CmdbStore::new(Arc::new(cmdb.clone())),
        Arc::new(storage.clone()),
        projects,
        settings,
        cluster,
    )
}

/// Reconciler over the mocks that reads through an in-memory mirror
pub fn mirrored_reconciler(cmdb: &MockCmdbClient, storage: &MockStorageClient, cluster: ClusterSpec) -> Reconciler {
    let store = CmdbStore::new(Arc::new(cmdb.clone())).with_cache(MirrorCache::open_in_memory().unwrap());
    let settings = SyncSettings {
        prefer_cache: true,
        ..SyncSettings::default()
    };
    Reconciler::new(store, Arc::new(storage.clone()), None, settings, cluster)
}
