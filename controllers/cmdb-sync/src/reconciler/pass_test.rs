//! Full passes against the in-memory CMDB and cluster storage.

use super::*;
use crate::test_utils::*;
use cmdb_client::{ClusterType, Container, Host, MockCall, MockCmdbClient, Pod, ResourceKind};
use std::collections::HashMap;
use storage_client::{resource, MockStorageClient};

fn seeded_storage() -> MockStorageClient {
    let storage = MockStorageClient::new();
    storage.put(CLUSTER_UID, resource::NODE, &k8s_node("node-a", "10.0.0.1"));
    storage.put(CLUSTER_UID, resource::NAMESPACE, &k8s_namespace("ns-a", None));
    storage.put(CLUSTER_UID, resource::DEPLOYMENT, &k8s_deployment("ns-a", "dep-1", 2));
    storage.put(CLUSTER_UID, resource::REPLICASET, &k8s_replica_set("ns-a", "dep-1-7d9f", "dep-1"));
    storage.put(
        CLUSTER_UID,
        resource::POD,
        &k8s_pod("ns-a", "pod-1", "node-a", Some(("ReplicaSet", "dep-1-7d9f"))),
    );
    storage.put(CLUSTER_UID, resource::POD, &k8s_pod("ns-a", "bare-1", "node-a", None));
    storage
}

fn default_reconciler(cmdb: &MockCmdbClient, storage: &MockStorageClient) -> Reconciler {
    reconciler(cmdb, storage, None, SyncSettings::default(), cluster_spec())
}

fn mutated_kinds(calls: &[MockCall]) -> Vec<ResourceKind> {
    calls
        .iter()
        .filter_map(|call| match call {
            MockCall::Create { kind, .. } | MockCall::Update { kind, .. } | MockCall::Delete { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        })
        .collect()
}

fn pod_named(cmdb: &MockCmdbClient, name: &str) -> Option<Pod> {
    cmdb.typed::<Pod>(ResourceKind::Pod).into_iter().find(|p| p.name == name)
}

fn workload_id(cmdb: &MockCmdbClient, kind: WorkloadKind, name: &str) -> i64 {
    cmdb.typed::<Workload>(ResourceKind::Workload(kind))
        .into_iter()
        .find(|w| w.name == name)
        .map(|w| w.id)
        .unwrap()
}

#[tokio::test]
async fn test_first_pass_creates_topology_parents_first() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();

    let report = default_reconciler(&cmdb, &storage).run_pass().await;

    assert!(report.completed);
    assert_eq!(report.failed_states(), 0);
    assert_eq!(
        mutated_kinds(&cmdb.mutations()),
        vec![
            ResourceKind::Cluster,
            ResourceKind::Node,
            ResourceKind::Namespace,
            ResourceKind::Workload(WorkloadKind::Pods),
            ResourceKind::Workload(WorkloadKind::Deployment),
            ResourceKind::Pod,
        ]
    );

    let deployment_id = workload_id(&cmdb, WorkloadKind::Deployment, "dep-1");
    let bucket_id = workload_id(&cmdb, WorkloadKind::Pods, "pods");
    let node = cmdb.typed::<cmdb_client::Node>(ResourceKind::Node).remove(0);

    let pod = pod_named(&cmdb, "pod-1").unwrap();
    let owner = pod.workload_ref.unwrap();
    assert_eq!(owner.kind, WorkloadKind::Deployment);
    assert_eq!(owner.name, "dep-1");
    assert_eq!(owner.id, deployment_id);
    assert_eq!(pod.bk_node_id, node.id);
    assert_eq!(pod.operator, vec!["admin".to_string()]);

    let bare = pod_named(&cmdb, "bare-1").unwrap();
    let owner = bare.workload_ref.unwrap();
    assert_eq!(owner.kind, WorkloadKind::Pods);
    assert_eq!(owner.id, bucket_id);

    let containers = cmdb.typed::<Container>(ResourceKind::Container);
    assert_eq!(containers.len(), 2);
    assert!(containers.iter().any(|c| c.container_uid == "pod-1-main" && c.bk_pod_id == pod.id));
    assert_eq!(report.counters(ResourceKind::Pod).created, 2);
}

#[tokio::test]
async fn test_second_pass_is_a_noop() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = default_reconciler(&cmdb, &storage);

    reconciler.run_pass().await;
    cmdb.clear_calls();
    let report = reconciler.run_pass().await;

    assert!(report.completed);
    assert!(cmdb.mutations().is_empty(), "unexpected writes: {:?}", cmdb.mutations());
    assert_eq!(report.total_mutations(), 0);
}

#[tokio::test]
async fn test_mirrored_passes_write_only_the_changes() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = mirrored_reconciler(&cmdb, &storage, cluster_spec());

    assert!(reconciler.run_pass().await.completed);
    assert_eq!(cmdb.typed::<Pod>(ResourceKind::Pod).len(), 2);

    cmdb.clear_calls();
    let report = reconciler.run_pass().await;
    assert!(report.completed);
    assert!(cmdb.mutations().is_empty(), "unexpected writes: {:?}", cmdb.mutations());
    assert!(!cmdb.calls().contains(&MockCall::Find {
        kind: ResourceKind::Pod,
        biz_id: BIZ_ID,
    }));

    let bare_id = pod_named(&cmdb, "bare-1").unwrap().id;
    storage.remove(CLUSTER_UID, resource::POD, Some("ns-a"), "bare-1");
    cmdb.clear_calls();
    reconciler.run_pass().await;
    assert_eq!(cmdb.mutations(), vec![MockCall::Delete {
        kind: ResourceKind::Pod,
        biz_id: BIZ_ID,
        ids: vec![bare_id],
    }]);

    storage.put(CLUSTER_UID, resource::POD, &k8s_pod("ns-a", "bare-2", "node-a", None));
    cmdb.clear_calls();
    reconciler.run_pass().await;
    let mutations = cmdb.mutations();
    assert_eq!(mutations.len(), 1, "unexpected writes: {:?}", mutations);
    assert!(matches!(&mutations[0], MockCall::Create { kind: ResourceKind::Pod, .. }));
    assert!(pod_named(&cmdb, "bare-1").is_none());
    assert!(pod_named(&cmdb, "bare-2").is_some());

    cmdb.clear_calls();
    reconciler.run_pass().await;
    assert!(cmdb.mutations().is_empty(), "unexpected writes: {:?}", cmdb.mutations());
}

#[tokio::test]
async fn test_vanished_pod_is_the_only_delete() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = default_reconciler(&cmdb, &storage);
    reconciler.run_pass().await;
    let bare_id = pod_named(&cmdb, "bare-1").unwrap().id;

    storage.remove(CLUSTER_UID, resource::POD, Some("ns-a"), "bare-1");
    cmdb.clear_calls();
    let report = reconciler.run_pass().await;

    assert_eq!(cmdb.mutations(), vec![MockCall::Delete {
        kind: ResourceKind::Pod,
        biz_id: BIZ_ID,
        ids: vec![bare_id],
    }]);
    assert_eq!(report.counters(ResourceKind::Pod).deleted, 1);
    assert!(cmdb.typed::<Container>(ResourceKind::Container).iter().all(|c| c.bk_pod_id != bare_id));
}

#[tokio::test]
async fn test_drifted_workload_is_updated_in_place() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = default_reconciler(&cmdb, &storage);
    reconciler.run_pass().await;
    let deployment_id = workload_id(&cmdb, WorkloadKind::Deployment, "dep-1");

    storage.put(CLUSTER_UID, resource::DEPLOYMENT, &k8s_deployment("ns-a", "dep-1", 5));
    cmdb.clear_calls();
    reconciler.run_pass().await;

    let mutations = cmdb.mutations();
    assert_eq!(mutations.len(), 1);
    match &mutations[0] {
        MockCall::Update { kind, ids, data, .. } => {
            assert_eq!(*kind, ResourceKind::Workload(WorkloadKind::Deployment));
            assert_eq!(ids, &vec![deployment_id]);
            assert_eq!(data["replicas"], 5);
            assert!(data.get("labels").is_none());
        }
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pod_without_runtime_ids_waits() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let mut pending = k8s_pod("ns-a", "pending-1", "node-a", None);
    pending.status.as_mut().unwrap().container_statuses = None;
    storage.put(CLUSTER_UID, resource::POD, &pending);

    let report = default_reconciler(&cmdb, &storage).run_pass().await;

    assert!(pod_named(&cmdb, "pending-1").is_none());
    assert_eq!(report.counters(ResourceKind::Pod).deferred, 1);
    assert_eq!(report.counters(ResourceKind::Pod).created, 2);
}

#[tokio::test]
async fn test_pending_pod_keeps_its_existing_record() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = default_reconciler(&cmdb, &storage);
    reconciler.run_pass().await;

    // Container restarted and has no runtime id yet
    let mut restarting = k8s_pod("ns-a", "bare-1", "node-a", None);
    restarting.status.as_mut().unwrap().container_statuses = None;
    storage.put(CLUSTER_UID, resource::POD, &restarting);
    cmdb.clear_calls();
    reconciler.run_pass().await;

    assert!(cmdb.mutations().is_empty());
    assert!(pod_named(&cmdb, "bare-1").is_some());
}

#[tokio::test]
async fn test_failed_workload_kind_defers_its_pods() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    storage.fail(resource::DEPLOYMENT);

    let report = default_reconciler(&cmdb, &storage).run_pass().await;

    assert!(report.completed);
    assert!(!report.succeeded(SyncState::Workloads(WorkloadKind::Deployment)));
    assert!(report.succeeded(SyncState::Workloads(WorkloadKind::StatefulSet)));
    assert!(report.succeeded(SyncState::Pods));
    assert!(pod_named(&cmdb, "pod-1").is_none());
    assert!(pod_named(&cmdb, "bare-1").is_some());
    assert_eq!(report.counters(ResourceKind::Pod).deferred, 1);

    storage.recover(resource::DEPLOYMENT);
    let report = default_reconciler(&cmdb, &storage).run_pass().await;
    assert_eq!(report.counters(ResourceKind::Pod).created, 1);
    assert!(pod_named(&cmdb, "pod-1").is_some());
}

#[tokio::test]
async fn test_failed_pod_listing_in_namespace_deletes_nothing() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = default_reconciler(&cmdb, &storage);
    reconciler.run_pass().await;

    storage.fail(resource::POD);
    cmdb.clear_calls();
    reconciler.run_pass().await;

    assert!(cmdb.mutations().is_empty());
    assert_eq!(cmdb.typed::<Pod>(ResourceKind::Pod).len(), 2);
}

#[tokio::test]
async fn test_removed_namespace_is_purged_children_first() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let reconciler = default_reconciler(&cmdb, &storage);
    reconciler.run_pass().await;

    storage.remove(CLUSTER_UID, resource::NAMESPACE, None, "ns-a");
    cmdb.clear_calls();
    let report = reconciler.run_pass().await;

    assert!(report.succeeded(SyncState::Namespaces));
    let kinds = mutated_kinds(&cmdb.mutations());
    assert_eq!(kinds.first(), Some(&ResourceKind::Pod));
    assert_eq!(kinds.last(), Some(&ResourceKind::Namespace));
    assert!(cmdb.typed::<Namespace>(ResourceKind::Namespace).is_empty());
    assert!(cmdb.typed::<Pod>(ResourceKind::Pod).is_empty());
    assert!(cmdb.typed::<Container>(ResourceKind::Container).is_empty());
    assert!(cmdb.records(ResourceKind::Workload(WorkloadKind::Deployment)).is_empty());
    assert!(cmdb.records(ResourceKind::Workload(WorkloadKind::Pods)).is_empty());
}

#[tokio::test]
async fn test_namespace_business_from_project() {
    let storage = seeded_storage();
    storage.put(CLUSTER_UID, resource::NAMESPACE, &k8s_namespace("ns-a", Some("blueking")));
    let projects: Arc<dyn ProjectLookup> =
        Arc::new(StaticProjects(HashMap::from([("blueking".to_string(), 200)])));

    // Without a fallback the project's business is used
    let cmdb = MockCmdbClient::default();
    reconciler(&cmdb, &storage, Some(projects.clone()), SyncSettings::default(), cluster_spec())
        .run_pass()
        .await;
    assert_eq!(cmdb.typed::<Namespace>(ResourceKind::Namespace)[0].bk_biz_id, 200);
    assert_eq!(pod_named(&cmdb, "pod-1").unwrap().bk_biz_id, 200);

    // With a fallback, namespaces of foreign businesses are redirected to it
    let cmdb = MockCmdbClient::default();
    let settings = SyncSettings {
        fallback_biz_id: Some(300),
        ..SyncSettings::default()
    };
    let reconciler = reconciler(&cmdb, &storage, Some(projects), settings, cluster_spec());
    reconciler.run_pass().await;
    assert_eq!(cmdb.typed::<Namespace>(ResourceKind::Namespace)[0].bk_biz_id, 300);
    assert_eq!(
        cmdb.typed::<Workload>(ResourceKind::Workload(WorkloadKind::Deployment))[0].bk_biz_id,
        300
    );

    cmdb.clear_calls();
    reconciler.run_pass().await;
    assert!(cmdb.mutations().is_empty());
}

#[tokio::test]
async fn test_node_host_id_resolved_by_ip() {
    let cmdb = MockCmdbClient::default();
    cmdb.add_host(Host {
        bk_host_id: 77,
        bk_host_innerip: "10.0.0.9,10.0.0.1".to_string(),
    });
    let storage = seeded_storage();

    default_reconciler(&cmdb, &storage).run_pass().await;

    let node = cmdb.typed::<cmdb_client::Node>(ResourceKind::Node).remove(0);
    assert_eq!(node.bk_host_id, 77);
    assert_eq!(pod_named(&cmdb, "pod-1").unwrap().bk_host_id, 77);
}

#[tokio::test]
async fn test_unknown_host_uses_default() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    let settings = SyncSettings {
        default_host_id: Some(5),
        ..SyncSettings::default()
    };

    reconciler(&cmdb, &storage, None, settings, cluster_spec()).run_pass().await;

    assert_eq!(cmdb.typed::<cmdb_client::Node>(ResourceKind::Node)[0].bk_host_id, 5);
}

#[tokio::test]
async fn test_cluster_type_change() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    default_reconciler(&cmdb, &storage).run_pass().await;
    let cluster_id = cmdb.typed::<Cluster>(ResourceKind::Cluster)[0].id;

    let mut spec = cluster_spec();
    spec.cluster_type = ClusterType::Shared;
    cmdb.clear_calls();
    let report = reconciler(&cmdb, &storage, None, SyncSettings::default(), spec).run_pass().await;

    assert_eq!(cmdb.mutations(), vec![MockCall::UpdateClusterType {
        id: cluster_id,
        cluster_type: ClusterType::Shared,
    }]);
    assert_eq!(cmdb.typed::<Cluster>(ResourceKind::Cluster)[0].cluster_type, ClusterType::Shared);
    assert_eq!(report.counters(ResourceKind::Cluster).updated, 1);
}

#[tokio::test]
async fn test_unresolvable_cluster_ends_pass() {
    let cmdb = MockCmdbClient::default();
    cmdb.fail_listing(ResourceKind::Cluster);
    let storage = seeded_storage();

    let report = default_reconciler(&cmdb, &storage).run_pass().await;

    assert!(!report.completed);
    assert!(matches!(report.outcome(SyncState::Cluster), Some(StateOutcome::Failed(_))));
    assert!(report.outcome(SyncState::Nodes).is_none());
    assert!(cmdb.mutations().is_empty());
}

#[tokio::test]
async fn test_namespace_failure_skips_dependent_states() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    storage.fail(resource::NAMESPACE);

    let report = default_reconciler(&cmdb, &storage).run_pass().await;

    assert!(report.completed);
    assert!(report.succeeded(SyncState::Nodes));
    assert!(matches!(report.outcome(SyncState::Namespaces), Some(StateOutcome::Failed(_))));
    assert!(matches!(
        report.outcome(SyncState::Workloads(WorkloadKind::Deployment)),
        Some(StateOutcome::Skipped(_))
    ));
    assert!(matches!(report.outcome(SyncState::Pods), Some(StateOutcome::Skipped(_))));
    assert!(cmdb.records(ResourceKind::Pod).is_empty());
}

#[tokio::test]
async fn test_replica_set_lookups_are_cached_per_pass() {
    let cmdb = MockCmdbClient::default();
    let storage = seeded_storage();
    storage.put(
        CLUSTER_UID,
        resource::POD,
        &k8s_pod("ns-a", "pod-2", "node-a", Some(("ReplicaSet", "dep-1-7d9f"))),
    );

    default_reconciler(&cmdb, &storage).run_pass().await;

    assert_eq!(storage.replica_set_lookups(), 1);
    assert_eq!(
        pod_named(&cmdb, "pod-2").unwrap().workload_ref.unwrap().name,
        "dep-1"
    );
}
