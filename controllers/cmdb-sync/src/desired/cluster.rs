use crate::config::ClusterSpec;
use cmdb_client::Cluster;

/// Cluster record as configured
pub fn build(spec: &ClusterSpec, biz_id: i64) -> Cluster {
    Cluster {
        id: 0,
        bk_biz_id: biz_id,
        name: spec.name.clone(),
        scheduling_engine: spec.scheduling_engine.clone(),
        uid: spec.id.clone(),
        xid: spec.xid.clone(),
        version: spec.version.clone(),
        network_type: spec.network_type.clone(),
        region: spec.region.clone(),
        vpc: spec.vpc.clone(),
        network: spec.network.clone(),
        cluster_type: spec.cluster_type,
        environment: spec.environment.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdb_client::ClusterType;

    #[test]
    fn test_build_cluster() {
        let spec = ClusterSpec {
            id: "BCS-K8S-00001".to_string(),
            name: "prod".to_string(),
            scheduling_engine: "k8s".to_string(),
            cluster_type: ClusterType::Shared,
            network: vec!["10.0.0.0/16".to_string()],
            ..Default::default()
        };
        let cluster = build(&spec, 100);
        assert_eq!(cluster.uid, "BCS-K8S-00001");
        assert_eq!(cluster.bk_biz_id, 100);
        assert_eq!(cluster.cluster_type, ClusterType::Shared);
        assert_eq!(cluster.network.len(), 1);
    }
}
