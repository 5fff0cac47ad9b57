use super::{KindCounters, PassContext, PassReport, Reconciler};
use crate::compare;
use crate::desired;
use crate::diff::diff;
use crate::error::ControllerError;
use crate::reconcile_helpers::{apply_plan, delete_records};
use cmdb_client::{Namespace, Pod, ResourceKind, ResourceQuota, Workload, WorkloadKind};
use k8s_openapi::api::core::v1 as core;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

impl Reconciler {
    pub(super) async fn sync_namespaces(
        &self,
        ctx: &mut PassContext,
        report: &mut PassReport,
    ) -> Result<(), ControllerError> {
        let uid = &self.cluster.id;
        let stored = self.storage.query_namespaces(uid).await?;
        let quotas = match self.storage.query_resource_quotas(uid).await {
            Ok(quotas) => Some(desired::namespace::quotas_by_namespace(&quotas)),
            Err(e) => {
                warn!("Failed to query resource quotas of cluster {}, keeping recorded quotas: {}", uid, e);
                None
            }
        };

        let mut resolved_projects = HashMap::new();
        let mut tenants: Vec<(&core::Namespace, i64)> = Vec::with_capacity(stored.len());
        for object in &stored {
            let biz_id = self.namespace_business(&object.data, ctx.biz_id, &mut resolved_projects).await;
            tenants.push((&object.data, biz_id));
        }

        let mut biz_ids: BTreeSet<i64> = tenants.iter().map(|(_, biz)| *biz).collect();
        biz_ids.insert(ctx.biz_id);
        biz_ids.extend(self.settings.fallback_biz_id);
        ctx.biz_ids = biz_ids.into_iter().collect();

        let current = self
            .store
            .list_namespaces(&ctx.biz_ids, ctx.cluster.id, self.settings.prefer_cache)
            .await?;
        let recorded_quotas: BTreeMap<String, Vec<ResourceQuota>> =
            current.iter().map(|n| (n.name.clone(), n.resource_quotas.clone())).collect();

        let cluster = ctx.cluster_ref();
        let wanted: Vec<Namespace> = tenants
            .into_iter()
            .filter_map(|(object, biz_id)| {
                let name = object.metadata.name.as_deref()?;
                let namespace_quotas = match &quotas {
                    Some(quotas) => quotas.get(name).cloned().unwrap_or_default(),
                    None => recorded_quotas.get(name).cloned().unwrap_or_default(),
                };
                desired::namespace::build(&cluster, object, biz_id, namespace_quotas)
            })
            .collect();

        let mut plan = diff(wanted, current, |n| n.name.clone(), compare::namespace::compare);
        // A namespace stays filed under the business it was created in
        for planned in &mut plan.to_update {
            planned.desired.bk_biz_id = planned.current.bk_biz_id;
        }
        if !plan.to_delete.is_empty() {
            self.purge_namespace_children(&plan.to_delete, ctx, report).await?;
        }

        let applied = apply_plan(&self.store, ResourceKind::Namespace, plan).await?;
        report.add(ResourceKind::Namespace, applied.counters);
        ctx.namespaces = Some(applied.present.into_iter().map(|n| (n.name.clone(), n)).collect());

        self.ensure_bare_pods(ctx, report).await
    }

    /// Business a namespace is filed under.
    ///
    /// Without a resolvable project the cluster's business is used. A project
    /// resolving to a different business is redirected to the configured
    /// fallback business when one is set.
    async fn namespace_business(
        &self,
        namespace: &core::Namespace,
        cluster_biz_id: i64,
        resolved: &mut HashMap<String, Option<i64>>,
    ) -> i64 {
        let Some(projects) = &self.projects else {
            return cluster_biz_id;
        };
        let Some(code) = desired::namespace::project_code(namespace, &self.settings.project_code_annotation) else {
            return cluster_biz_id;
        };
        let name = namespace.metadata.name.as_deref().unwrap_or_default();

        let business = match resolved.get(code) {
            Some(cached) => *cached,
            None => {
                let business = match projects.business_id(code).await {
                    Ok(business) => business,
                    Err(e) => {
                        warn!("Failed to resolve project {} of namespace {}: {}", code, name, e);
                        None
                    }
                };
                resolved.insert(code.to_string(), business);
                business
            }
        };

        match business {
            None => cluster_biz_id,
            Some(biz_id) if biz_id == cluster_biz_id => biz_id,
            Some(biz_id) => match self.settings.fallback_biz_id {
                Some(fallback) => {
                    debug!(
                        "Namespace {} belongs to business {} (cluster business {}), filing under fallback {}",
                        name, biz_id, cluster_biz_id, fallback
                    );
                    fallback
                }
                None => biz_id,
            },
        }
    }

    /// Delete pods and workloads of namespaces about to be removed; the CMDB
    /// refuses to delete a namespace that still has children.
    async fn purge_namespace_children(
        &self,
        stale: &[Namespace],
        ctx: &PassContext,
        report: &mut PassReport,
    ) -> Result<(), ControllerError> {
        let stale_ids: BTreeSet<i64> = stale.iter().map(|n| n.id).collect();
        info!(
            "Removing children of {} stale namespace(s) in cluster {}",
            stale_ids.len(),
            self.cluster.id
        );

        let pods: Vec<Pod> = self
            .store
            .list_pods(&ctx.biz_ids, ctx.cluster.id, false)
            .await?
            .into_iter()
            .filter(|p| stale_ids.contains(&p.bk_namespace_id))
            .collect();
        report.add(ResourceKind::Pod, delete_records(&self.store, ResourceKind::Pod, &pods).await?);

        for kind in WorkloadKind::SYNCED.into_iter().chain([WorkloadKind::Pods]) {
            let resource = ResourceKind::Workload(kind);
            let workloads: Vec<Workload> = self
                .store
                .list_workloads(kind, &ctx.biz_ids, ctx.cluster.id, false)
                .await?
                .into_iter()
                .filter(|w| stale_ids.contains(&w.bk_namespace_id))
                .collect();
            report.add(resource, delete_records(&self.store, resource, &workloads).await?);
        }
        Ok(())
    }

    /// Every present namespace gets exactly one bare-pods bucket.
    async fn ensure_bare_pods(&self, ctx: &mut PassContext, report: &mut PassReport) -> Result<(), ControllerError> {
        let Some(namespaces) = &ctx.namespaces else {
            return Ok(());
        };
        let kind = ResourceKind::Workload(WorkloadKind::Pods);

        let existing = self
            .store
            .list_workloads(WorkloadKind::Pods, &ctx.biz_ids, ctx.cluster.id, self.settings.prefer_cache)
            .await?;
        let mut by_namespace_id: BTreeMap<i64, Workload> = BTreeMap::new();
        for bucket in existing {
            by_namespace_id.entry(bucket.bk_namespace_id).or_insert(bucket);
        }

        let mut buckets = BTreeMap::new();
        let mut missing = Vec::new();
        for namespace in namespaces.values() {
            match by_namespace_id.remove(&namespace.id) {
                Some(bucket) => {
                    buckets.insert(namespace.name.clone(), bucket);
                }
                None => missing.push(Workload::bare_pods(namespace)),
            }
        }

        let mut counters = KindCounters::default();
        if !missing.is_empty() {
            info!("Creating {} bare-pods bucket(s) in cluster {}", missing.len(), self.cluster.id);
            let outcome = self.store.create(kind, missing).await?;
            counters.created += outcome.created.len() as u64;
            counters.failed += outcome.failed.len() as u64;
            for bucket in outcome.created {
                buckets.insert(bucket.namespace.clone(), bucket);
            }
        }
        report.add(kind, counters);
        ctx.bare_pods = buckets;
        Ok(())
    }
}
