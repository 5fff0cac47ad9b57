use super::{PassContext, PassReport, Reconciler};
use crate::compare;
use crate::desired;
use crate::diff::diff;
use crate::error::ControllerError;
use crate::reconcile_helpers::apply_plan;
use cmdb_client::{Node, ResourceKind};
use std::collections::BTreeMap;
use tracing::{debug, warn};

impl Reconciler {
    pub(super) async fn sync_nodes(&self, ctx: &mut PassContext, report: &mut PassReport) -> Result<(), ControllerError> {
        let stored = self.storage.query_nodes(&self.cluster.id).await?;
        let current = self
            .store
            .list_nodes(ctx.biz_id, ctx.cluster.id, self.settings.prefer_cache)
            .await?;
        let current_by_name: BTreeMap<&str, &Node> = current.iter().map(|n| (n.name.as_str(), n)).collect();

        let cluster = ctx.cluster_ref();
        let mut wanted = Vec::with_capacity(stored.len());
        for object in &stored {
            let Some(mut node) = desired::node::build(&cluster, &object.data) else {
                continue;
            };
            node.bk_host_id = self.resolve_host_id(&node, current_by_name.get(node.name.as_str()).copied()).await;
            wanted.push(node);
        }

        let plan = diff(wanted, current, |n| n.name.clone(), compare::node::compare);
        let applied = apply_plan(&self.store, ResourceKind::Node, plan).await?;
        report.add(ResourceKind::Node, applied.counters);

        ctx.nodes = Some(applied.present.into_iter().map(|n| (n.name.clone(), n)).collect());
        Ok(())
    }

    /// Host id for a node: a value already recorded wins, then a lookup by
    /// internal IP, then the configured default.
    async fn resolve_host_id(&self, node: &Node, current: Option<&Node>) -> i64 {
        if let Some(recorded) = current.map(|c| c.bk_host_id).filter(|id| *id > 0) {
            return recorded;
        }
        if !node.internal_ip.is_empty() {
            match self.store.find_host_id(&node.internal_ip).await {
                Ok(Some(id)) => return id,
                Ok(None) => debug!("No CMDB host matches node {} ({:?})", node.name, node.internal_ip),
                Err(e) => warn!("Failed to look up host of node {}: {}", node.name, e),
            }
        }
        self.settings.default_host_id.unwrap_or(0)
    }
}
