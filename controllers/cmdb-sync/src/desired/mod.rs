//! Desired-state builders.
//!
//! Turn cluster objects (k8s-openapi types and the game workload CRDs) into
//! CMDB records attached to already-synced parents.

pub mod cluster;
pub mod namespace;
pub mod node;
pub mod pod;
pub mod workload;

use cmdb_client::{IntOrStr, LabelSelector, LabelSelectorRequirement, Labels};
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as meta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// CMDB cluster a record is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    pub biz_id: i64,
    pub cluster_id: i64,
    pub cluster_uid: String,
}

pub fn labels(metadata: &meta::ObjectMeta) -> Labels {
    metadata.labels.clone().unwrap_or_default()
}

pub fn annotation<'a>(metadata: &'a meta::ObjectMeta, key: &str) -> Option<&'a str> {
    metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

pub fn selector(selector: &meta::LabelSelector) -> LabelSelector {
    LabelSelector {
        match_labels: selector.match_labels.clone().unwrap_or_default(),
        match_expressions: selector
            .match_expressions
            .iter()
            .flatten()
            .map(|r| LabelSelectorRequirement {
                key: r.key.clone(),
                operator: r.operator.clone(),
                values: r.values.clone().unwrap_or_default(),
            })
            .collect(),
    }
}

pub fn int_or_str(value: &IntOrString) -> IntOrStr {
    match value {
        IntOrString::Int(v) => IntOrStr::Int(i64::from(*v)),
        IntOrString::String(v) => IntOrStr::Str(v.clone()),
    }
}
