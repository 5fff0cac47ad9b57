use super::FieldDelta;
use cmdb_client::{Node, Taint};

pub fn compare(current: &Node, desired: &Node) -> Option<FieldDelta> {
    let mut delta = FieldDelta::new();
    delta.track("labels", &current.labels, &desired.labels);
    if sorted(&current.taints) != sorted(&desired.taints) {
        delta.set("taints", &desired.taints);
    }
    delta.track("unschedulable", &current.unschedulable, &desired.unschedulable);
    delta.track("hostname", &current.hostname, &desired.hostname);
    delta.track("internal_ip", &current.internal_ip, &desired.internal_ip);
    delta.track("external_ip", &current.external_ip, &desired.external_ip);
    delta.track("runtime_component", &current.runtime_component, &desired.runtime_component);
    delta.track("pod_cidr", &current.pod_cidr, &desired.pod_cidr);
    delta.track("bk_host_id", &current.bk_host_id, &desired.bk_host_id);
    delta.into_change()
}

fn sorted(taints: &[Taint]) -> Vec<&Taint> {
    let mut taints: Vec<&Taint> = taints.iter().collect();
    taints.sort();
    taints
}
