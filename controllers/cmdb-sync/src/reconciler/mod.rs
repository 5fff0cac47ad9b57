//! Synchronization of one cluster into the CMDB.
//!
//! A pass runs its states strictly in order:
//! - `cluster`: resolve (or create) the CMDB cluster record
//! - `node`: nodes, with host ids resolved by IP
//! - `namespace`: namespaces with tenant resolution, plus their bare-pods buckets
//! - `workload`: the five workload kinds, each independently
//! - `pod`: pods and their containers, attached to resolved workloads
//!
//! Only a failure to resolve the cluster ends a pass early; any other state
//! failure is logged and the pass moves on.

mod cluster;
mod namespace;
mod node;
mod pod;
mod report;
mod workload;

pub use report::{KindCounters, PassReport, StateOutcome, SyncState};

use crate::config::{ClusterSpec, SyncSettings};
use crate::desired::ClusterRef;
use crate::error::ControllerError;
use crate::project::ProjectLookup;
use cmdb_client::{Cluster, CmdbStore, Namespace, Node, Workload, WorkloadKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use storage_client::ClusterStorageTrait;
use tracing::{error, info};

/// State handed from one sync state to the next within a pass
#[derive(Debug)]
pub(crate) struct PassContext {
    /// Business of the cluster record
    pub(crate) biz_id: i64,
    pub(crate) cluster: Cluster,
    /// Nodes present in the CMDB by name; `None` when the node state failed
    pub(crate) nodes: Option<BTreeMap<String, Node>>,
    /// Namespaces present in the CMDB by name; `None` when they could not be synced
    pub(crate) namespaces: Option<BTreeMap<String, Namespace>>,
    /// Businesses namespaced records of this cluster may be filed under
    pub(crate) biz_ids: Vec<i64>,
    /// Workloads present in the CMDB keyed by (kind, namespace, name)
    pub(crate) workloads: BTreeMap<(WorkloadKind, String, String), Workload>,
    /// Kinds whose state failed this pass
    pub(crate) failed_kinds: BTreeSet<WorkloadKind>,
    /// Bare-pods bucket per namespace name
    pub(crate) bare_pods: BTreeMap<String, Workload>,
}

impl PassContext {
    fn new(biz_id: i64, cluster: Cluster) -> Self {
        Self {
            biz_id,
            cluster,
            nodes: None,
            namespaces: None,
            biz_ids: vec![biz_id],
            workloads: BTreeMap::new(),
            failed_kinds: BTreeSet::new(),
            bare_pods: BTreeMap::new(),
        }
    }

    pub(crate) fn cluster_ref(&self) -> ClusterRef {
        ClusterRef {
            biz_id: self.biz_id,
            cluster_id: self.cluster.id,
            cluster_uid: self.cluster.uid.clone(),
        }
    }
}

/// Synchronizes one configured cluster.
pub struct Reconciler {
    pub(crate) store: CmdbStore,
    pub(crate) storage: Arc<dyn ClusterStorageTrait>,
    pub(crate) projects: Option<Arc<dyn ProjectLookup>>,
    pub(crate) settings: SyncSettings,
    pub(crate) cluster: ClusterSpec,
}

impl Reconciler {
    pub fn new(
        store: CmdbStore,
        storage: Arc<dyn ClusterStorageTrait>,
        projects: Option<Arc<dyn ProjectLookup>>,
        settings: SyncSettings,
        cluster: ClusterSpec,
    ) -> Self {
        Self {
            store,
            storage,
            projects,
            settings,
            cluster,
        }
    }

    pub fn cluster_uid(&self) -> &str {
        &self.cluster.id
    }

    /// Run one full pass. Never fails as a whole; the report says what happened.
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::new(&self.cluster.id);
        info!("Starting pass {} for cluster {}", report.pass_id, self.cluster.id);

        let mut ctx = match self.sync_cluster(&mut report).await {
            Ok(ctx) => {
                report.record(SyncState::Cluster, StateOutcome::Succeeded);
                ctx
            }
            Err(e) => {
                error!("Failed to resolve cluster {} in CMDB: {}", self.cluster.id, e);
                report.record(SyncState::Cluster, StateOutcome::Failed(e.to_string()));
                report.log_summary();
                return report;
            }
        };

        let outcome = outcome_of(self.sync_nodes(&mut ctx, &mut report).await);
        report.record(SyncState::Nodes, outcome);

        let outcome = outcome_of(self.sync_namespaces(&mut ctx, &mut report).await);
        report.record(SyncState::Namespaces, outcome);

        for kind in WorkloadKind::SYNCED {
            let state = SyncState::Workloads(kind);
            if ctx.namespaces.is_none() {
                ctx.failed_kinds.insert(kind);
                report.record(state, StateOutcome::Skipped("namespaces unavailable".to_string()));
                continue;
            }
            let result = self.sync_workloads(kind, &mut ctx, &mut report).await;
            if result.is_err() {
                ctx.failed_kinds.insert(kind);
            }
            report.record(state, outcome_of(result));
        }

        if ctx.namespaces.is_none() {
            report.record(SyncState::Pods, StateOutcome::Skipped("namespaces unavailable".to_string()));
        } else {
            let outcome = outcome_of(self.sync_pods(&mut ctx, &mut report).await);
            report.record(SyncState::Pods, outcome);
        }

        report.completed = true;
        report.log_summary();
        report
    }
}

fn outcome_of(result: Result<(), ControllerError>) -> StateOutcome {
    match result {
        Ok(()) => StateOutcome::Succeeded,
        Err(e) => StateOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
#[path = "pass_test.rs"]
mod pass_test;
