use super::*;
use crate::mock::{MockCall, MockCmdbClient};
use serde_json::json;

const BIZ: i64 = 100;
const CLUSTER_ID: i64 = 9;

fn store(mock: &MockCmdbClient) -> CmdbStore {
    CmdbStore::new(Arc::new(mock.clone()))
}

fn cached_store(mock: &MockCmdbClient) -> CmdbStore {
    store(mock).with_cache(MirrorCache::open_in_memory().unwrap())
}

fn node(name: &str) -> Node {
    Node {
        bk_biz_id: BIZ,
        bk_cluster_id: CLUSTER_ID,
        cluster_uid: "BCS-K8S-00001".to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

fn workload(namespace_id: i64, name: &str) -> Workload {
    Workload {
        bk_biz_id: BIZ,
        bk_cluster_id: CLUSTER_ID,
        bk_namespace_id: namespace_id,
        namespace: "default".to_string(),
        name: name.to_string(),
        replicas: Some(1),
        ..Default::default()
    }
}

fn pod(namespace_id: i64, name: &str) -> Pod {
    Pod {
        bk_biz_id: BIZ,
        bk_cluster_id: CLUSTER_ID,
        bk_namespace_id: namespace_id,
        namespace: "default".to_string(),
        name: name.to_string(),
        containers: vec![Container {
            name: "app".to_string(),
            image: "nginx:1.25".to_string(),
            container_uid: format!("{}-app", name),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn deployment() -> ResourceKind {
    ResourceKind::Workload(WorkloadKind::Deployment)
}

fn count_calls(mock: &MockCmdbClient, pred: impl Fn(&MockCall) -> bool) -> usize {
    mock.calls().iter().filter(|c| pred(*c)).count()
}

#[tokio::test]
async fn test_list_fetches_every_page() {
    let mock = MockCmdbClient::default();
    for i in 0..101 {
        mock.insert(ResourceKind::Node, &node(&format!("node-{i}")));
    }

    let nodes = store(&mock).list_nodes(BIZ, CLUSTER_ID, false).await.unwrap();
    assert_eq!(nodes.len(), 101);
    assert_eq!(count_calls(&mock, |c| matches!(c, MockCall::Find { .. })), 2);
}

#[tokio::test]
async fn test_list_prefers_mirror_when_asked() {
    let mock = MockCmdbClient::default();
    mock.insert(ResourceKind::Node, &node("node-1"));
    let store = cached_store(&mock);

    // cold mirror: remote listing fills it
    assert_eq!(store.list_nodes(BIZ, CLUSTER_ID, true).await.unwrap().len(), 1);
    mock.clear_calls();

    assert_eq!(store.list_nodes(BIZ, CLUSTER_ID, true).await.unwrap().len(), 1);
    assert!(mock.calls().is_empty());

    // without the flag the remote is always consulted
    store.list_nodes(BIZ, CLUSTER_ID, false).await.unwrap();
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_mirror_result_falls_through() {
    let mock = MockCmdbClient::default();
    let store = cached_store(&mock);

    assert!(store.list_nodes(BIZ, CLUSTER_ID, true).await.unwrap().is_empty());
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn test_list_surfaces_transport_failure() {
    let mock = MockCmdbClient::default();
    mock.fail_listing(ResourceKind::Node);

    let err = store(&mock).list_nodes(BIZ, CLUSTER_ID, false).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_create_assigns_ids() {
    let mock = MockCmdbClient::default();
    let outcome = store(&mock)
        .create(deployment(), vec![workload(3, "dep-1"), workload(3, "dep-2")])
        .await
        .unwrap();

    assert_eq!(outcome.created.len(), 2);
    assert!(outcome.failed.is_empty());
    assert!(outcome.created.iter().all(|w| w.id > 0));
    assert_eq!(count_calls(&mock, |c| matches!(c, MockCall::Create { .. })), 1);
}

#[tokio::test]
async fn test_rejected_batch_falls_back_to_single_records() {
    let mock = MockCmdbClient::default();
    mock.reject_batches_over(1);

    let records = vec![workload(3, "dep-1"), workload(3, "dep-2"), workload(3, "dep-3")];
    let outcome = store(&mock).create(deployment(), records).await.unwrap();

    assert_eq!(outcome.created.len(), 3);
    assert!(outcome.failed.is_empty());
    // one rejected batch plus three single-record creates
    assert_eq!(count_calls(&mock, |c| matches!(c, MockCall::Create { .. })), 4);
    assert_eq!(mock.records(deployment()).len(), 3);
}

#[tokio::test]
async fn test_short_id_list_falls_back_to_single_records() {
    let mock = MockCmdbClient::default();
    mock.drop_batch_ids_over(1);

    let records = vec![workload(3, "dep-1"), workload(3, "dep-2"), workload(3, "dep-3")];
    let outcome = store(&mock).create(deployment(), records).await.unwrap();

    // the batch stored all three; the single-record retries adopt them
    assert_eq!(outcome.created.len(), 3);
    assert!(outcome.failed.is_empty());
    assert_eq!(mock.records(deployment()).len(), 3);
    let mut ids: Vec<i64> = outcome.created.iter().map(|w| w.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(count_calls(&mock, |c| matches!(c, MockCall::Create { .. })), 4);
}

#[tokio::test]
async fn test_single_record_failure_does_not_block_siblings() {
    let mock = MockCmdbClient::default();
    mock.reject_name("dep-bad");

    let records = vec![workload(3, "dep-1"), workload(3, "dep-bad"), workload(3, "dep-3")];
    let outcome = store(&mock).create(deployment(), records).await.unwrap();

    let created: Vec<&str> = outcome.created.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(created, vec!["dep-1", "dep-3"]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].name, "dep-bad");
}

#[tokio::test]
async fn test_create_chunks_large_batches() {
    let mock = MockCmdbClient::default();
    let records: Vec<Workload> = (0..250).map(|i| workload(3, &format!("dep-{i}"))).collect();

    let outcome = store(&mock).create(deployment(), records).await.unwrap();
    assert_eq!(outcome.created.len(), 250);

    let sizes: Vec<usize> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Create { names, .. } => Some(names.len()),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![100, 100, 50]);
}

#[tokio::test]
async fn test_duplicate_create_adopts_existing_record() {
    let mock = MockCmdbClient::default();
    let existing_id = mock.insert(deployment(), &workload(3, "dep-1"));

    let outcome = store(&mock).create(deployment(), vec![workload(3, "dep-1")]).await.unwrap();
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.created[0].id, existing_id);
    assert_eq!(mock.records(deployment()).len(), 1);
}

#[tokio::test]
async fn test_duplicate_inside_batch_is_adopted_after_fallback() {
    let mock = MockCmdbClient::default();
    let existing_id = mock.insert(deployment(), &workload(3, "dep-1"));

    let outcome = store(&mock)
        .create(deployment(), vec![workload(3, "dep-1"), workload(3, "dep-2")])
        .await
        .unwrap();
    assert_eq!(outcome.created.len(), 2);
    assert_eq!(outcome.created[0].id, existing_id);
    assert_eq!(mock.records(deployment()).len(), 2);
}

#[tokio::test]
async fn test_create_writes_through_to_mirror() {
    let mock = MockCmdbClient::default();
    let store = cached_store(&mock);

    let outcome = store.create(ResourceKind::Pod, vec![pod(3, "pod-1")]).await.unwrap();
    let pod_id = outcome.created[0].id;

    let cache = store.cache().unwrap();
    let pods = cache.query(ResourceKind::Pod, &Filter::ids(&[pod_id])).unwrap();
    assert_eq!(pods.len(), 1);
    let containers = cache
        .query(ResourceKind::Container, &Filter::and(vec![Rule::equal("bk_pod_id", pod_id)]))
        .unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0]["container_uid"], "pod-1-app");
}

#[tokio::test]
async fn test_update_groups_identical_deltas() {
    let mock = MockCmdbClient::default();
    let a = mock.insert(deployment(), &workload(3, "dep-a"));
    let b = mock.insert(deployment(), &workload(3, "dep-b"));
    let c = mock.insert(deployment(), &workload(3, "dep-c"));

    let scale_to = |n: i64| {
        let mut delta = Map::new();
        delta.insert("replicas".to_string(), json!(n));
        delta
    };
    let items = vec![
        UpdateItem { id: a, biz_id: BIZ, key: "default/dep-a".to_string(), delta: scale_to(3) },
        UpdateItem { id: b, biz_id: BIZ, key: "default/dep-b".to_string(), delta: scale_to(3) },
        UpdateItem { id: c, biz_id: BIZ, key: "default/dep-c".to_string(), delta: scale_to(5) },
    ];

    let outcome = store(&mock).update(deployment(), items).await.unwrap();
    assert_eq!(outcome.succeeded.len(), 3);
    assert_eq!(count_calls(&mock, |c| matches!(c, MockCall::Update { .. })), 2);
    assert_eq!(mock.record(deployment(), b).unwrap()["replicas"], 3);
    assert_eq!(mock.record(deployment(), c).unwrap()["replicas"], 5);
}

#[tokio::test]
async fn test_update_falls_back_per_record() {
    let mock = MockCmdbClient::default();
    let good = mock.insert(deployment(), &workload(3, "dep-good"));
    let bad = mock.insert(deployment(), &workload(3, "dep-bad"));
    mock.reject_name("dep-bad");

    let mut delta = Map::new();
    delta.insert("replicas".to_string(), json!(2));
    let items = vec![
        UpdateItem { id: good, biz_id: BIZ, key: "default/dep-good".to_string(), delta: delta.clone() },
        UpdateItem { id: bad, biz_id: BIZ, key: "default/dep-bad".to_string(), delta },
    ];

    let outcome = store(&mock).update(deployment(), items).await.unwrap();
    assert_eq!(outcome.succeeded, vec![good]);
    assert_eq!(outcome.failed, vec![bad]);
}

#[tokio::test]
async fn test_delete_removes_mirror_rows_and_pod_containers() {
    let mock = MockCmdbClient::default();
    let store = cached_store(&mock);
    let created = store.create(ResourceKind::Pod, vec![pod(3, "pod-1")]).await.unwrap().created;
    let cache = store.cache().unwrap();
    assert!(!cache.is_empty(ResourceKind::Container).unwrap());

    let outcome = store.delete(ResourceKind::Pod, vec![DeleteItem::of(&created[0])]).await.unwrap();
    assert_eq!(outcome.succeeded, vec![created[0].id]);
    assert!(cache.is_empty(ResourceKind::Pod).unwrap());
    assert!(cache.is_empty(ResourceKind::Container).unwrap());
    assert!(mock.records(ResourceKind::Container).is_empty());
}

#[tokio::test]
async fn test_delete_of_missing_id_is_tolerated() {
    let mock = MockCmdbClient::default();
    let item = DeleteItem { id: 404, biz_id: BIZ, key: "default/gone".to_string() };

    let outcome = store(&mock).delete(ResourceKind::Pod, vec![item]).await.unwrap();
    assert_eq!(outcome.succeeded, vec![404]);
}

#[tokio::test]
async fn test_find_host_id_by_inner_ip() {
    let mock = MockCmdbClient::default();
    mock.add_host(Host { bk_host_id: 77, bk_host_innerip: "10.0.0.5,192.168.1.5".to_string() });

    let store = store(&mock);
    let ips = vec!["192.168.1.5".to_string()];
    assert_eq!(store.find_host_id(&ips).await.unwrap(), Some(77));
    assert_eq!(store.find_host_id(&["10.9.9.9".to_string()]).await.unwrap(), None);
}

#[tokio::test]
async fn test_update_cluster_type() {
    let mock = MockCmdbClient::default();
    let cluster = Cluster {
        bk_biz_id: BIZ,
        name: "prod".to_string(),
        uid: "BCS-K8S-00001".to_string(),
        ..Default::default()
    };
    let id = mock.insert(ResourceKind::Cluster, &cluster);
    let cluster = Cluster { id, ..cluster };

    store(&mock).update_cluster_type(&cluster, ClusterType::Shared).await.unwrap();
    assert_eq!(mock.record(ResourceKind::Cluster, id).unwrap()["type"], "SHARE_CLUSTER");
}
