use super::labels;
use cmdb_client::{Container, Namespace, Pod, PodIp};
use k8s_openapi::api::core::v1 as core;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

/// Outcome of building a pod record
#[derive(Debug, Clone, PartialEq)]
pub enum PodBuild {
    Ready(Pod),
    /// Not all containers have a runtime id yet; retried next pass
    Deferred { name: String, missing: Vec<String> },
}

/// Runtime id without its scheme: `containerd://abc` becomes `abc`
pub fn runtime_id(container_id: &str) -> Option<String> {
    let id = match container_id.split_once("://") {
        Some((_, id)) => id,
        None => container_id,
    };
    let id = id.trim();
    if id.is_empty() { None } else { Some(id.to_string()) }
}

/// The pod's owner, when it has exactly one
pub fn single_owner(pod: &core::Pod) -> Option<&OwnerReference> {
    match pod.metadata.owner_references.as_deref() {
        Some([owner]) => Some(owner),
        _ => None,
    }
}

/// Pod record with its containers.
///
/// Workload reference, node/host ids and operators are filled in by the pod
/// state once ownership has been resolved.
pub fn build(namespace: &Namespace, pod: &core::Pod) -> Option<PodBuild> {
    let name = pod.metadata.name.clone()?;
    let spec = pod.spec.clone().unwrap_or_default();
    let status = pod.status.clone().unwrap_or_default();
    let statuses = status.container_statuses.unwrap_or_default();

    let mut containers = Vec::with_capacity(spec.containers.len());
    let mut missing = Vec::new();
    for container in &spec.containers {
        let reported = statuses.iter().find(|s| s.name == container.name);
        let uid = reported.and_then(|s| s.container_id.as_deref()).and_then(runtime_id);
        let Some(container_uid) = uid else {
            missing.push(container.name.clone());
            continue;
        };
        let image = container
            .image
            .clone()
            .or_else(|| reported.map(|s| s.image.clone()))
            .unwrap_or_default();
        containers.push(Container {
            id: 0,
            bk_biz_id: namespace.bk_biz_id,
            bk_cluster_id: namespace.bk_cluster_id,
            bk_pod_id: 0,
            name: container.name.clone(),
            image,
            container_uid,
        });
    }

    if !missing.is_empty() {
        return Some(PodBuild::Deferred { name, missing });
    }

    Some(PodBuild::Ready(Pod {
        id: 0,
        bk_biz_id: namespace.bk_biz_id,
        bk_cluster_id: namespace.bk_cluster_id,
        cluster_uid: namespace.cluster_uid.clone(),
        bk_namespace_id: namespace.id,
        namespace: namespace.name.clone(),
        bk_node_id: 0,
        node_name: spec.node_name.unwrap_or_default(),
        bk_host_id: 0,
        name,
        workload_ref: None,
        labels: labels(&pod.metadata),
        priority: spec.priority.map(i64::from),
        operator: Vec::new(),
        ip: status.pod_ip.unwrap_or_default(),
        ips: status
            .pod_ips
            .unwrap_or_default()
            .into_iter()
            .map(|ip| PodIp { ip: ip.ip })
            .collect(),
        containers,
    }))
}
