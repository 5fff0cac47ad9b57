use super::{KindCounters, PassContext, PassReport, Reconciler};
use crate::compare;
use crate::desired::pod::{build, single_owner, PodBuild};
use crate::diff::diff;
use crate::error::ControllerError;
use crate::reconcile_helpers::apply_plan;
use cmdb_client::{
    Labels, Namespace, Node, Pod, PodWorkloadRef, ResourceKind, Workload, WorkloadKind, BARE_PODS_WORKLOAD_NAME,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

pub const CREATOR_LABEL: &str = "io.tencent.paas.creator";
pub const UPDATER_LABEL: &str = "io.tencent.paas.updater";

type PodKey = (i64, String);

fn pod_key(pod: &Pod) -> PodKey {
    (pod.bk_namespace_id, pod.name.clone())
}

/// Owner of a pod after following ReplicaSets to their Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    Workload(WorkloadKind, String),
    Bare,
}

impl Reconciler {
    pub(super) async fn sync_pods(&self, ctx: &mut PassContext, report: &mut PassReport) -> Result<(), ControllerError> {
        let namespaces: Vec<Namespace> = ctx.namespaces.iter().flat_map(|m| m.values().cloned()).collect();
        let nodes = self.pod_nodes(ctx).await;
        let mut counters = KindCounters::default();

        let mut wanted = Vec::new();
        let mut owners: HashMap<PodKey, Option<OwnerReference>> = HashMap::new();
        let mut deferred: BTreeSet<PodKey> = BTreeSet::new();
        let mut unavailable: BTreeSet<i64> = BTreeSet::new();

        for namespace in &namespaces {
            let stored = match self.storage.query_pods(&self.cluster.id, &namespace.name).await {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Failed to query pods of namespace {}, leaving them untouched: {}", namespace.name, e);
                    unavailable.insert(namespace.id);
                    continue;
                }
            };
            for object in &stored {
                match build(namespace, &object.data) {
                    Some(PodBuild::Ready(pod)) => {
                        owners.insert(pod_key(&pod), single_owner(&object.data).cloned());
                        wanted.push(pod);
                    }
                    Some(PodBuild::Deferred { name, missing }) => {
                        debug!(
                            "Deferring pod {}/{}: no runtime id yet for container(s) {:?}",
                            namespace.name, name, missing
                        );
                        counters.deferred += 1;
                        deferred.insert((namespace.id, name));
                    }
                    None => {}
                }
            }
        }

        let current: Vec<Pod> = self
            .store
            .list_pods(&ctx.biz_ids, ctx.cluster.id, self.settings.prefer_cache)
            .await?
            .into_iter()
            .filter(|p| !unavailable.contains(&p.bk_namespace_id) && !deferred.contains(&pod_key(p)))
            .collect();

        let mut plan = diff(wanted, current, pod_key, compare::pod::compare);

        let mut replica_sets: HashMap<(String, String), Option<String>> = HashMap::new();
        let mut ready = Vec::with_capacity(plan.to_create.len());
        for mut pod in std::mem::take(&mut plan.to_create) {
            let owner_ref = owners.remove(&pod_key(&pod)).flatten();
            let owner = self.resolve_owner(&pod.namespace, owner_ref.as_ref(), &mut replica_sets).await;
            let Some(workload) = attached_workload(ctx, &pod.namespace, &owner) else {
                debug!("Deferring pod {}/{}: owner {:?} not in CMDB yet", pod.namespace, pod.name, owner);
                counters.deferred += 1;
                continue;
            };

            pod.workload_ref = Some(PodWorkloadRef {
                kind: match owner {
                    Owner::Workload(kind, _) => kind,
                    Owner::Bare => WorkloadKind::Pods,
                },
                name: workload.name.clone(),
                id: workload.id,
            });
            let namespace_labels = ctx.namespaces.as_ref().and_then(|m| m.get(&pod.namespace)).map(|n| &n.labels);
            pod.operator = operators(&[Some(&workload.labels), namespace_labels], &self.cluster.creator, &self.cluster.updater);
            if let Some(node) = nodes.get(&pod.node_name) {
                pod.bk_node_id = node.id;
                pod.bk_host_id = node.bk_host_id;
            }
            ready.push(pod);
        }
        plan.to_create = ready;

        let applied = apply_plan(&self.store, ResourceKind::Pod, plan).await?;
        counters.merge(applied.counters);
        report.add(ResourceKind::Pod, counters);
        if counters.deferred > 0 {
            info!("{} pod(s) in cluster {} deferred to a later pass", counters.deferred, self.cluster.id);
        }
        Ok(())
    }

    /// Nodes from this pass, or from the CMDB when the node state failed
    async fn pod_nodes(&self, ctx: &PassContext) -> BTreeMap<String, Node> {
        if let Some(nodes) = &ctx.nodes {
            return nodes.clone();
        }
        match self.store.list_nodes(ctx.biz_id, ctx.cluster.id, self.settings.prefer_cache).await {
            Ok(nodes) => nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
            Err(e) => {
                warn!("Failed to list nodes of cluster {}, pods get no node reference: {}", self.cluster.id, e);
                BTreeMap::new()
            }
        }
    }

    async fn resolve_owner(
        &self,
        namespace: &str,
        owner: Option<&OwnerReference>,
        replica_sets: &mut HashMap<(String, String), Option<String>>,
    ) -> Owner {
        let Some(owner) = owner else {
            return Owner::Bare;
        };
        if owner.kind == "ReplicaSet" {
            let key = (namespace.to_string(), owner.name.clone());
            if !replica_sets.contains_key(&key) {
                let deployment = self.replica_set_deployment(namespace, &owner.name).await;
                replica_sets.insert(key.clone(), deployment);
            }
            return match replica_sets.get(&key).cloned().flatten() {
                Some(deployment) => Owner::Workload(WorkloadKind::Deployment, deployment),
                None => Owner::Bare,
            };
        }
        match WorkloadKind::from_owner_kind(&owner.kind) {
            Some(kind) => Owner::Workload(kind, owner.name.clone()),
            None => Owner::Bare,
        }
    }

    /// Name of the Deployment owning a ReplicaSet
    async fn replica_set_deployment(&self, namespace: &str, name: &str) -> Option<String> {
        match self.storage.query_replica_set(&self.cluster.id, namespace, name).await {
            Ok(Some(replica_set)) => {
                let owners = replica_set.data.metadata.owner_references.unwrap_or_default();
                match owners.as_slice() {
                    [owner] if owner.kind == "Deployment" => Some(owner.name.clone()),
                    _ => None,
                }
            }
            Ok(None) => {
                debug!("ReplicaSet {}/{} not found in storage", namespace, name);
                None
            }
            Err(e) => {
                warn!("Failed to look up ReplicaSet {}/{}: {}", namespace, name, e);
                None
            }
        }
    }
}

/// CMDB workload a pod attaches to. `None` defers the pod: its owning kind
/// failed this pass, or the workload or bucket is not in the CMDB yet.
fn attached_workload<'a>(ctx: &'a PassContext, namespace: &str, owner: &Owner) -> Option<&'a Workload> {
    match owner {
        Owner::Workload(kind, name) => {
            if ctx.failed_kinds.contains(kind) {
                return None;
            }
            ctx.workloads.get(&(*kind, namespace.to_string(), name.clone()))
        }
        Owner::Bare => ctx
            .bare_pods
            .get(namespace)
            .filter(|bucket| bucket.name == BARE_PODS_WORKLOAD_NAME),
    }
}

/// Operators of a pod: the first label set naming a creator or updater wins,
/// then the cluster's own creator and updater.
pub fn operators(label_sets: &[Option<&Labels>], creator: &str, updater: &str) -> Vec<String> {
    for labels in label_sets.iter().flatten() {
        let found = dedup([labels.get(CREATOR_LABEL), labels.get(UPDATER_LABEL)].into_iter().flatten().map(String::as_str));
        if !found.is_empty() {
            return found;
        }
    }
    dedup([creator, updater])
}

fn dedup<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}
