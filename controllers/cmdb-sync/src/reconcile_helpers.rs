//! Helper functions for applying differ output
//!
//! Every sync state ends the same way: delete what is stale, update what
//! drifted, create what is missing, and carry forward the records that are
//! now present in the CMDB so later states can attach children to them.

use crate::diff::DiffPlan;
use crate::reconciler::KindCounters;
use cmdb_client::{CmdbError, CmdbRecord, CmdbStore, DeleteItem, ResourceKind};
use tracing::{debug, info};

/// Records present in the CMDB after a plan was applied
#[derive(Debug)]
pub struct Applied<T> {
    pub present: Vec<T>,
    pub counters: KindCounters,
}

/// Apply a plan in delete, update, create order.
///
/// Records whose update failed stay present with their current values;
/// records whose create failed are absent. A transport error stops the plan
/// and is returned.
pub async fn apply_plan<T: CmdbRecord>(
    store: &CmdbStore,
    kind: ResourceKind,
    mut plan: DiffPlan<T>,
) -> Result<Applied<T>, CmdbError> {
    let mut counters = KindCounters::default();

    if plan.is_noop() {
        debug!("{}: {} record(s) up to date", kind, plan.unchanged.len());
        return Ok(Applied { present: plan.unchanged, counters });
    }

    info!(
        "{}: {} to create, {} to update, {} to delete, {} unchanged",
        kind,
        plan.to_create.len(),
        plan.to_update.len(),
        plan.to_delete.len(),
        plan.unchanged.len()
    );

    if !plan.to_delete.is_empty() {
        let outcome = store.delete(kind, plan.delete_items()).await?;
        counters.deleted += outcome.succeeded.len() as u64;
        counters.failed += outcome.failed.len() as u64;
    }

    let mut present = std::mem::take(&mut plan.unchanged);

    if !plan.to_update.is_empty() {
        let outcome = store.update(kind, plan.update_items()).await?;
        counters.updated += outcome.succeeded.len() as u64;
        counters.failed += outcome.failed.len() as u64;
        for planned in plan.to_update {
            if outcome.succeeded.contains(&planned.id()) {
                present.push(planned.desired);
            } else {
                present.push(planned.current);
            }
        }
    }

    if !plan.to_create.is_empty() {
        let outcome = store.create(kind, plan.to_create).await?;
        counters.created += outcome.created.len() as u64;
        counters.failed += outcome.failed.len() as u64;
        present.extend(outcome.created);
    }

    Ok(Applied { present, counters })
}

/// Delete records outside of a diff (children of stale parents)
pub async fn delete_records<T: CmdbRecord>(
    store: &CmdbStore,
    kind: ResourceKind,
    records: &[T],
) -> Result<KindCounters, CmdbError> {
    let mut counters = KindCounters::default();
    if records.is_empty() {
        return Ok(counters);
    }
    info!("{}: deleting {} record(s) of removed parents", kind, records.len());
    let outcome = store.delete(kind, records.iter().map(DeleteItem::of).collect()).await?;
    counters.deleted += outcome.succeeded.len() as u64;
    counters.failed += outcome.failed.len() as u64;
    Ok(counters)
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod tests;
