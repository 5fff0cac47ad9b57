//! Per-pass outcome bookkeeping.

use chrono::{DateTime, Utc};
use cmdb_client::{ResourceKind, WorkloadKind};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

/// States of one pass, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncState {
    Cluster,
    Nodes,
    Namespaces,
    Workloads(WorkloadKind),
    Pods,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Cluster => f.write_str("SyncCluster"),
            SyncState::Nodes => f.write_str("SyncNodes"),
            SyncState::Namespaces => f.write_str("SyncNamespaces"),
            SyncState::Workloads(kind) => write!(f, "SyncWorkloads({})", kind),
            SyncState::Pods => f.write_str("SyncPods"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOutcome {
    Succeeded,
    Failed(String),
    /// Not attempted because a prerequisite state failed
    Skipped(String),
}

/// Mutation counters of one resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounters {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub failed: u64,
    /// Records held back to a later pass
    pub deferred: u64,
}

impl KindCounters {
    pub fn merge(&mut self, other: KindCounters) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.deferred += other.deferred;
    }

    /// Successful writes
    pub fn mutations(&self) -> u64 {
        self.created + self.updated + self.deleted
    }
}

/// Result of one synchronization pass over one cluster
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub cluster: String,
    pub started_at: DateTime<Utc>,
    pub counters: BTreeMap<ResourceKind, KindCounters>,
    pub states: Vec<(SyncState, StateOutcome)>,
    /// The cluster record was resolved and every later state ran
    pub completed: bool,
}

impl PassReport {
    pub fn new(cluster: &str) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            cluster: cluster.to_string(),
            started_at: Utc::now(),
            counters: BTreeMap::new(),
            states: Vec::new(),
            completed: false,
        }
    }

    pub fn add(&mut self, kind: ResourceKind, counters: KindCounters) {
        self.counters.entry(kind).or_default().merge(counters);
    }

    pub fn counters(&self, kind: ResourceKind) -> KindCounters {
        self.counters.get(&kind).copied().unwrap_or_default()
    }

    pub fn record(&mut self, state: SyncState, outcome: StateOutcome) {
        match &outcome {
            StateOutcome::Succeeded => {}
            StateOutcome::Failed(reason) => warn!("{} failed for cluster {}: {}", state, self.cluster, reason),
            StateOutcome::Skipped(reason) => warn!("{} skipped for cluster {}: {}", state, self.cluster, reason),
        }
        self.states.push((state, outcome));
    }

    pub fn outcome(&self, state: SyncState) -> Option<&StateOutcome> {
        self.states.iter().find(|(s, _)| *s == state).map(|(_, o)| o)
    }

    pub fn succeeded(&self, state: SyncState) -> bool {
        matches!(self.outcome(state), Some(StateOutcome::Succeeded))
    }

    /// Successful writes across all kinds
    pub fn total_mutations(&self) -> u64 {
        self.counters.values().map(KindCounters::mutations).sum()
    }

    pub fn failed_states(&self) -> usize {
        self.states
            .iter()
            .filter(|(_, o)| !matches!(o, StateOutcome::Succeeded))
            .count()
    }

    pub fn log_summary(&self) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        info!(
            "Pass {} for cluster {} finished in {}ms: {} write(s), {} state(s) not successful, completed={}",
            self.pass_id,
            self.cluster,
            elapsed.num_milliseconds(),
            self.total_mutations(),
            self.failed_states(),
            self.completed
        );
        for (kind, c) in &self.counters {
            if *c != KindCounters::default() {
                info!(
                    "  {}: created={} updated={} deleted={} failed={} deferred={}",
                    kind, c.created, c.updated, c.deleted, c.failed, c.deferred
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut report = PassReport::new("BCS-K8S-00001");
        report.add(ResourceKind::Pod, KindCounters { created: 2, ..Default::default() });
        report.add(ResourceKind::Pod, KindCounters { deleted: 1, failed: 1, ..Default::default() });

        let pods = report.counters(ResourceKind::Pod);
        assert_eq!(pods.created, 2);
        assert_eq!(pods.deleted, 1);
        assert_eq!(pods.failed, 1);
        assert_eq!(report.total_mutations(), 3);
        assert_eq!(report.counters(ResourceKind::Node), KindCounters::default());
    }

    #[test]
    fn test_state_outcomes() {
        let mut report = PassReport::new("BCS-K8S-00001");
        report.record(SyncState::Cluster, StateOutcome::Succeeded);
        report.record(
            SyncState::Workloads(WorkloadKind::DaemonSet),
            StateOutcome::Failed("storage unavailable".to_string()),
        );

        assert!(report.succeeded(SyncState::Cluster));
        assert!(!report.succeeded(SyncState::Workloads(WorkloadKind::DaemonSet)));
        assert!(report.outcome(SyncState::Pods).is_none());
        assert_eq!(report.failed_states(), 1);
        assert_eq!(SyncState::Workloads(WorkloadKind::DaemonSet).to_string(), "SyncWorkloads(daemonSet)");
    }
}
