//! Natural-key differ.
//!
//! Classifies desired (cluster-sourced) records against current (CMDB)
//! records by natural key. Keys only on the desired side are creates, keys
//! only on the current side are deletes, and shared keys become updates when
//! the field comparator reports drift.

use crate::compare::FieldDelta;
use cmdb_client::{CmdbRecord, DeleteItem, UpdateItem};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::warn;

/// A record present on both sides whose mirrored fields drifted
#[derive(Debug, Clone)]
pub struct PlannedUpdate<T> {
    pub current: T,
    /// Desired record carrying the current record's id
    pub desired: T,
    pub delta: FieldDelta,
}

impl<T: CmdbRecord> PlannedUpdate<T> {
    pub fn id(&self) -> i64 {
        self.current.id()
    }

    pub fn to_item(&self) -> UpdateItem {
        UpdateItem {
            id: self.current.id(),
            biz_id: self.current.biz_id(),
            key: self.current.display_key(),
            delta: self.delta.clone().into_map(),
        }
    }
}

/// Differ output
#[derive(Debug, Clone)]
pub struct DiffPlan<T> {
    pub to_create: Vec<T>,
    pub to_update: Vec<PlannedUpdate<T>>,
    pub to_delete: Vec<T>,
    /// Current records that need no change
    pub unchanged: Vec<T>,
}

impl<T> Default for DiffPlan<T> {
    fn default() -> Self {
        Self {
            to_create: Vec::new(),
            to_update: Vec::new(),
            to_delete: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<T: CmdbRecord> DiffPlan<T> {
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn delete_items(&self) -> Vec<DeleteItem> {
        self.to_delete.iter().map(DeleteItem::of).collect()
    }

    pub fn update_items(&self) -> Vec<UpdateItem> {
        self.to_update.iter().map(PlannedUpdate::to_item).collect()
    }
}

/// Diff `desired` against `current`.
///
/// Two desired records under one key: the later one wins and the clash is
/// logged. Two current records under one key: the first is kept and the
/// extras are scheduled for deletion.
pub fn diff<T, K, FK, FC>(desired: Vec<T>, current: Vec<T>, key_fn: FK, compare_fn: FC) -> DiffPlan<T>
where
    T: CmdbRecord,
    K: Ord + Debug,
    FK: Fn(&T) -> K,
    FC: Fn(&T, &T) -> Option<FieldDelta>,
{
    let mut plan = DiffPlan::default();

    let mut desired_by_key: BTreeMap<K, T> = BTreeMap::new();
    for record in desired {
        let key = key_fn(&record);
        if let Some(previous) = desired_by_key.get(&key) {
            warn!(
                "Duplicate desired key {:?}: {} superseded by a later record",
                key,
                previous.display_key()
            );
        }
        desired_by_key.insert(key, record);
    }

    let mut current_by_key: BTreeMap<K, T> = BTreeMap::new();
    for record in current {
        let key = key_fn(&record);
        if current_by_key.contains_key(&key) {
            warn!(
                "Duplicate CMDB record for key {:?} (id {}), scheduling removal",
                key,
                record.id()
            );
            plan.to_delete.push(record);
            continue;
        }
        current_by_key.insert(key, record);
    }

    for (key, mut wanted) in desired_by_key {
        match current_by_key.remove(&key) {
            Some(existing) => match compare_fn(&existing, &wanted) {
                Some(delta) => {
                    wanted.set_id(existing.id());
                    plan.to_update.push(PlannedUpdate {
                        current: existing,
                        desired: wanted,
                        delta,
                    });
                }
                None => plan.unchanged.push(existing),
            },
            None => plan.to_create.push(wanted),
        }
    }

    plan.to_delete.extend(current_by_key.into_values());
    plan
}
