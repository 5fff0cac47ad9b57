use super::{PassContext, PassReport, Reconciler};
use crate::compare;
use crate::desired::workload as build;
use crate::diff::diff;
use crate::error::ControllerError;
use crate::reconcile_helpers::{apply_plan, delete_records};
use cmdb_client::{Namespace, Pod, ResourceKind, Workload, WorkloadKind};
use std::collections::BTreeSet;
use tracing::debug;

impl Reconciler {
    /// Sync one workload collection. Any storage failure abandons the whole
    /// kind for this pass so a partial snapshot never causes deletions.
    pub(super) async fn sync_workloads(
        &self,
        kind: WorkloadKind,
        ctx: &mut PassContext,
        report: &mut PassReport,
    ) -> Result<(), ControllerError> {
        let resource = ResourceKind::Workload(kind);
        let namespaces: Vec<Namespace> = ctx.namespaces.iter().flat_map(|m| m.values().cloned()).collect();

        let mut wanted = Vec::new();
        for namespace in &namespaces {
            wanted.extend(self.desired_workloads(kind, namespace).await?);
        }
        debug!("{} {} workload(s) in cluster {}", wanted.len(), kind, self.cluster.id);

        let current = self
            .store
            .list_workloads(kind, &ctx.biz_ids, ctx.cluster.id, self.settings.prefer_cache)
            .await?;
        let plan = diff(
            wanted,
            current,
            |w| (w.bk_namespace_id, w.name.clone()),
            |current, desired| compare::workload::compare(kind, current, desired),
        );

        if !plan.to_delete.is_empty() {
            let stale: BTreeSet<i64> = plan.to_delete.iter().map(|w| w.id).collect();
            let orphans: Vec<Pod> = self
                .store
                .list_pods(&ctx.biz_ids, ctx.cluster.id, false)
                .await?
                .into_iter()
                .filter(|p| p.workload_ref.as_ref().is_some_and(|r| r.kind == kind && stale.contains(&r.id)))
                .collect();
            report.add(ResourceKind::Pod, delete_records(&self.store, ResourceKind::Pod, &orphans).await?);
        }

        let applied = apply_plan(&self.store, resource, plan).await?;
        report.add(resource, applied.counters);
        for workload in applied.present {
            ctx.workloads
                .insert((kind, workload.namespace.clone(), workload.name.clone()), workload);
        }
        Ok(())
    }

    async fn desired_workloads(&self, kind: WorkloadKind, namespace: &Namespace) -> Result<Vec<Workload>, ControllerError> {
        let uid = self.cluster.id.as_str();
        let ns = namespace.name.as_str();
        let workloads = match kind {
            WorkloadKind::Deployment => self
                .storage
                .query_deployments(uid, ns)
                .await?
                .iter()
                .filter_map(|o| build::from_deployment(namespace, &o.data))
                .collect(),
            WorkloadKind::StatefulSet => self
                .storage
                .query_statefulsets(uid, ns)
                .await?
                .iter()
                .filter_map(|o| build::from_statefulset(namespace, &o.data))
                .collect(),
            WorkloadKind::DaemonSet => self
                .storage
                .query_daemonsets(uid, ns)
                .await?
                .iter()
                .filter_map(|o| build::from_daemonset(namespace, &o.data))
                .collect(),
            WorkloadKind::GameDeployment => self
                .storage
                .query_game_deployments(uid, ns)
                .await?
                .iter()
                .filter_map(|o| build::from_game_deployment(namespace, &o.data))
                .collect(),
            WorkloadKind::GameStatefulSet => self
                .storage
                .query_game_statefulsets(uid, ns)
                .await?
                .iter()
                .filter_map(|o| build::from_game_statefulset(namespace, &o.data))
                .collect(),
            WorkloadKind::Pods => Vec::new(),
        };
        Ok(workloads)
    }
}
