use super::FieldDelta;
use cmdb_client::Cluster;

/// Descriptive cluster fields. The shared/independent type is not part of
/// the general update; it has its own mutation.
pub fn compare(current: &Cluster, desired: &Cluster) -> Option<FieldDelta> {
    let mut delta = FieldDelta::new();
    delta.track("name", &current.name, &desired.name);
    delta.track("scheduling_engine", &current.scheduling_engine, &desired.scheduling_engine);
    delta.track("xid", &current.xid, &desired.xid);
    delta.track("version", &current.version, &desired.version);
    delta.track("network_type", &current.network_type, &desired.network_type);
    delta.track("region", &current.region, &desired.region);
    delta.track("vpc", &current.vpc, &desired.vpc);
    delta.track("network", &current.network, &desired.network);
    delta.track("environment", &current.environment, &desired.environment);
    delta.into_change()
}
