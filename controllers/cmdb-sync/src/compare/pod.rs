use super::FieldDelta;
use cmdb_client::Pod;

/// Only labels are mutable on a mirrored pod; every other change shows up as
/// a new pod name.
pub fn compare(current: &Pod, desired: &Pod) -> Option<FieldDelta> {
    let mut delta = FieldDelta::new();
    delta.track("labels", &current.labels, &desired.labels);
    delta.into_change()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_labels() {
        let current = Pod { id: 1, name: "pod-1".to_string(), ..Default::default() };
        assert!(compare(&current, &current.clone()).is_none());

        let mut desired = current.clone();
        desired.labels.insert("app".to_string(), "web".to_string());
        desired.ip = "10.1.0.4".to_string();
        let delta = compare(&current, &desired).unwrap();
        assert_eq!(delta.fields().collect::<Vec<_>>(), vec!["labels"]);
    }
}
