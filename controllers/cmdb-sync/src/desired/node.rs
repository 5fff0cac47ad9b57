use super::{labels, ClusterRef};
use cmdb_client::{Node, Taint};
use k8s_openapi::api::core::v1 as core;

/// Node record without its host id, which is resolved separately
pub fn build(cluster: &ClusterRef, node: &core::Node) -> Option<Node> {
    let name = node.metadata.name.clone()?;
    let spec = node.spec.clone().unwrap_or_default();
    let status = node.status.clone().unwrap_or_default();

    let addresses = status.addresses.unwrap_or_default();
    let address_of = |kind: &str| -> Vec<String> {
        addresses
            .iter()
            .filter(|a| a.type_ == kind)
            .map(|a| a.address.clone())
            .collect()
    };

    Some(Node {
        id: 0,
        bk_biz_id: cluster.biz_id,
        bk_cluster_id: cluster.cluster_id,
        cluster_uid: cluster.cluster_uid.clone(),
        bk_host_id: 0,
        labels: labels(&node.metadata),
        taints: spec
            .taints
            .unwrap_or_default()
            .into_iter()
            .map(|t| Taint {
                key: t.key,
                value: t.value.unwrap_or_default(),
                effect: t.effect,
            })
            .collect(),
        unschedulable: spec.unschedulable.unwrap_or(false),
        internal_ip: address_of("InternalIP"),
        external_ip: address_of("ExternalIP"),
        hostname: address_of("Hostname").into_iter().next().unwrap_or_default(),
        runtime_component: status
            .node_info
            .map(|info| info.container_runtime_version)
            .unwrap_or_default(),
        pod_cidr: spec.pod_cidr.unwrap_or_default(),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::k8s_node;

    fn cluster() -> ClusterRef {
        ClusterRef { biz_id: 100, cluster_id: 9, cluster_uid: "BCS-K8S-00001".to_string() }
    }

    #[test]
    fn test_build_node() {
        let node = build(&cluster(), &k8s_node("node-a", "10.0.0.1")).unwrap();
        assert_eq!(node.name, "node-a");
        assert_eq!(node.bk_cluster_id, 9);
        assert_eq!(node.internal_ip, vec!["10.0.0.1".to_string()]);
        assert_eq!(node.hostname, "node-a");
        assert_eq!(node.runtime_component, "containerd://1.6.21");
        assert_eq!(node.taints.len(), 1);
        assert_eq!(node.taints[0].value, "");
        assert!(!node.unschedulable);
    }

    #[test]
    fn test_nameless_node_is_skipped() {
        let mut node = k8s_node("node-a", "10.0.0.1");
        node.metadata.name = None;
        assert!(build(&cluster(), &node).is_none());
    }
}
