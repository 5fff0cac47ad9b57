use super::{annotation, labels, ClusterRef};
use cmdb_client::{Namespace, ResourceQuota};
use k8s_openapi::api::core::v1 as core;
use std::collections::BTreeMap;
use storage_client::StoredResource;

/// Namespace record filed under `biz_id`
pub fn build(
    cluster: &ClusterRef,
    namespace: &core::Namespace,
    biz_id: i64,
    quotas: Vec<ResourceQuota>,
) -> Option<Namespace> {
    Some(Namespace {
        id: 0,
        bk_biz_id: biz_id,
        bk_cluster_id: cluster.cluster_id,
        cluster_uid: cluster.cluster_uid.clone(),
        name: namespace.metadata.name.clone()?,
        labels: labels(&namespace.metadata),
        resource_quotas: quotas,
    })
}

/// Project code annotation of a namespace
pub fn project_code<'a>(namespace: &'a core::Namespace, annotation_key: &str) -> Option<&'a str> {
    annotation(&namespace.metadata, annotation_key)
}

/// Group quota objects by namespace, keeping `hard` and `scopes`
pub fn quotas_by_namespace(quotas: &[StoredResource<core::ResourceQuota>]) -> BTreeMap<String, Vec<ResourceQuota>> {
    let mut grouped: BTreeMap<String, Vec<ResourceQuota>> = BTreeMap::new();
    for stored in quotas {
        let namespace = stored
            .data
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| stored.namespace.clone());
        let spec = stored.data.spec.clone().unwrap_or_default();
        grouped.entry(namespace).or_default().push(ResourceQuota {
            hard: spec
                .hard
                .unwrap_or_default()
                .into_iter()
                .map(|(resource, quantity)| (resource, quantity.0))
                .collect(),
            scopes: spec.scopes.unwrap_or_default(),
        });
    }
    grouped
}
