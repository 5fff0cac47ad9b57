use super::FieldDelta;
use cmdb_client::Namespace;

pub fn compare(current: &Namespace, desired: &Namespace) -> Option<FieldDelta> {
    let mut delta = FieldDelta::new();
    delta.track("labels", &current.labels, &desired.labels);
    delta.track("resource_quotas", &current.resource_quotas, &desired.resource_quotas);
    delta.into_change()
}
