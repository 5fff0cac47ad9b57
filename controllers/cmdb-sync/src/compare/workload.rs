use super::FieldDelta;
use cmdb_client::{LabelSelector, RollingUpdateFields, RollingUpdatePolicy, Workload, WorkloadKind};

/// Compare two records of the same workload collection.
///
/// The rolling-update policy is compared in its typed per-kind form, so
/// fields a kind does not carry never register as drift. An unset desired
/// policy against a stored one is sent as an empty policy.
pub fn compare(kind: WorkloadKind, current: &Workload, desired: &Workload) -> Option<FieldDelta> {
    let mut delta = FieldDelta::new();
    delta.track("labels", &current.labels, &desired.labels);

    let current_selector = current.selector.clone().unwrap_or_default();
    let desired_selector = desired.selector.clone().unwrap_or_default();
    delta.track("selector", &current_selector, &desired_selector);

    if kind.has_replicas() {
        delta.track_some("replicas", &current.replicas, &desired.replicas);
    }
    delta.track_some("min_ready_seconds", &current.min_ready_seconds, &desired.min_ready_seconds);
    delta.track_some("strategy_type", &current.strategy_type, &desired.strategy_type);

    let current_policy = policy(kind, current.rolling_update_strategy.as_ref());
    let desired_policy = policy(kind, desired.rolling_update_strategy.as_ref());
    if current_policy != desired_policy {
        let fields = desired_policy.map(|p| p.to_fields()).unwrap_or_default();
        delta.set("rolling_update_strategy", &fields);
    }

    delta.into_change()
}

fn policy(kind: WorkloadKind, fields: Option<&RollingUpdateFields>) -> Option<RollingUpdatePolicy> {
    let fields = fields.cloned().unwrap_or_default();
    RollingUpdatePolicy::from_fields(kind, &fields).filter(|p| !p.to_fields().is_empty())
}

/// Selector helper for builders: an empty selector is stored as absent
pub fn normalize_selector(selector: LabelSelector) -> Option<LabelSelector> {
    if selector.is_empty() { None } else { Some(selector) }
}
