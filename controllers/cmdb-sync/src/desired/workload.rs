use super::{int_or_str, labels, selector};
use crate::compare::workload::normalize_selector;
use cmdb_client::{IntOrStr, LabelSelector, LabelSelectorRequirement, Namespace, RollingUpdatePolicy, Workload};
use crds::{GameDeployment, GameSelector, GameStatefulSet, IntOrPercent};
use k8s_openapi::api::apps::v1 as apps;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn base(namespace: &Namespace, metadata: &ObjectMeta) -> Option<Workload> {
    Some(Workload {
        bk_biz_id: namespace.bk_biz_id,
        bk_cluster_id: namespace.bk_cluster_id,
        cluster_uid: namespace.cluster_uid.clone(),
        bk_namespace_id: namespace.id,
        namespace: namespace.name.clone(),
        name: metadata.name.clone()?,
        labels: labels(metadata),
        ..Default::default()
    })
}

fn policy_fields(policy: RollingUpdatePolicy) -> Option<cmdb_client::RollingUpdateFields> {
    let fields = policy.to_fields();
    if fields.is_empty() { None } else { Some(fields) }
}

pub fn from_deployment(namespace: &Namespace, deployment: &apps::Deployment) -> Option<Workload> {
    let mut workload = base(namespace, &deployment.metadata)?;
    let spec = deployment.spec.clone().unwrap_or_default();
    let strategy = spec.strategy.unwrap_or_default();
    let rolling = strategy.rolling_update.unwrap_or_default();

    workload.selector = normalize_selector(selector(&spec.selector));
    workload.replicas = Some(i64::from(spec.replicas.unwrap_or(1)));
    workload.min_ready_seconds = Some(i64::from(spec.min_ready_seconds.unwrap_or(0)));
    workload.strategy_type = strategy.type_;
    workload.rolling_update_strategy = policy_fields(RollingUpdatePolicy::Deployment {
        max_unavailable: rolling.max_unavailable.as_ref().map(int_or_str),
        max_surge: rolling.max_surge.as_ref().map(int_or_str),
    });
    Some(workload)
}

pub fn from_statefulset(namespace: &Namespace, statefulset: &apps::StatefulSet) -> Option<Workload> {
    let mut workload = base(namespace, &statefulset.metadata)?;
    let spec = statefulset.spec.clone().unwrap_or_default();
    let strategy = spec.update_strategy.unwrap_or_default();
    let rolling = strategy.rolling_update.unwrap_or_default();

    workload.selector = normalize_selector(selector(&spec.selector));
    workload.replicas = Some(i64::from(spec.replicas.unwrap_or(1)));
    workload.min_ready_seconds = Some(i64::from(spec.min_ready_seconds.unwrap_or(0)));
    workload.strategy_type = strategy.type_;
    workload.rolling_update_strategy = policy_fields(RollingUpdatePolicy::StatefulSet {
        partition: rolling.partition.map(i64::from),
    });
    Some(workload)
}

pub fn from_daemonset(namespace: &Namespace, daemonset: &apps::DaemonSet) -> Option<Workload> {
    let mut workload = base(namespace, &daemonset.metadata)?;
    let spec = daemonset.spec.clone().unwrap_or_default();
    let strategy = spec.update_strategy.unwrap_or_default();
    let rolling = strategy.rolling_update.unwrap_or_default();

    workload.selector = normalize_selector(selector(&spec.selector));
    workload.min_ready_seconds = Some(i64::from(spec.min_ready_seconds.unwrap_or(0)));
    workload.strategy_type = strategy.type_;
    workload.rolling_update_strategy = policy_fields(RollingUpdatePolicy::DaemonSet {
        max_unavailable: rolling.max_unavailable.as_ref().map(int_or_str),
        max_surge: rolling.max_surge.as_ref().map(int_or_str),
    });
    Some(workload)
}

fn game_selector(selector: Option<&GameSelector>) -> Option<LabelSelector> {
    let selector = selector?;
    normalize_selector(LabelSelector {
        match_labels: selector.match_labels.clone(),
        match_expressions: selector
            .match_expressions
            .iter()
            .map(|r| LabelSelectorRequirement {
                key: r.key.clone(),
                operator: r.operator.clone(),
                values: r.values.clone(),
            })
            .collect(),
    })
}

fn percent(value: &IntOrPercent) -> IntOrStr {
    match value {
        IntOrPercent::Int(v) => IntOrStr::Int(*v),
        IntOrPercent::Percent(v) => IntOrStr::Str(v.clone()),
    }
}

pub fn from_game_deployment(namespace: &Namespace, game: &GameDeployment) -> Option<Workload> {
    let mut workload = base(namespace, &game.metadata)?;
    let spec = &game.spec;
    let rolling = spec.update_strategy.rolling_update.clone().unwrap_or_default();

    workload.selector = game_selector(spec.selector.as_ref());
    workload.replicas = Some(spec.replicas.unwrap_or(1));
    workload.min_ready_seconds = Some(spec.min_ready_seconds.unwrap_or(0));
    workload.strategy_type = spec.update_strategy.strategy_type.clone();
    workload.rolling_update_strategy = policy_fields(RollingUpdatePolicy::GameDeployment {
        max_unavailable: rolling.max_unavailable.as_ref().map(percent),
        max_surge: rolling.max_surge.as_ref().map(percent),
        partition: rolling.partition,
    });
    Some(workload)
}

pub fn from_game_statefulset(namespace: &Namespace, game: &GameStatefulSet) -> Option<Workload> {
    let mut workload = base(namespace, &game.metadata)?;
    let spec = &game.spec;
    let rolling = spec.update_strategy.rolling_update.clone().unwrap_or_default();

    workload.selector = game_selector(spec.selector.as_ref());
    workload.replicas = Some(spec.replicas.unwrap_or(1));
    workload.strategy_type = spec.update_strategy.strategy_type.clone();
    workload.rolling_update_strategy = policy_fields(RollingUpdatePolicy::GameStatefulSet {
        max_unavailable: rolling.max_unavailable.as_ref().map(percent),
        partition: rolling.partition,
    });
    Some(workload)
}
