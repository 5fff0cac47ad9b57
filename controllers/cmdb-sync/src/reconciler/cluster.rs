use super::{KindCounters, PassContext, PassReport, Reconciler};
use crate::compare;
use crate::desired;
use crate::error::ControllerError;
use cmdb_client::{ResourceKind, UpdateItem};
use tracing::{info, warn};

impl Reconciler {
    /// Find the cluster record by UID, creating it when absent and bringing
    /// drifted fields and the cluster type up to date otherwise.
    pub(super) async fn sync_cluster(&self, report: &mut PassReport) -> Result<PassContext, ControllerError> {
        let uid = &self.cluster.id;
        let biz_id = self.cluster.business_id()?;
        let desired = desired::cluster::build(&self.cluster, biz_id);
        let mut counters = KindCounters::default();

        let existing = self.store.find_cluster(biz_id, uid, self.settings.prefer_cache).await?;
        let record = match existing {
            None => {
                info!("Creating cluster {} in business {}", uid, biz_id);
                let outcome = self.store.create(ResourceKind::Cluster, vec![desired]).await?;
                let created = outcome.created.into_iter().next().ok_or_else(|| {
                    ControllerError::Reconciliation(format!("cluster {} could not be created", uid))
                })?;
                counters.created += 1;
                created
            }
            Some(existing) => {
                let mut record = existing.clone();

                if let Some(delta) = compare::cluster::compare(&existing, &desired) {
                    info!("Cluster {} drifted, updating {} field(s)", uid, delta.len());
                    let item = UpdateItem {
                        id: existing.id,
                        biz_id: existing.bk_biz_id,
                        key: existing.uid.clone(),
                        delta: delta.into_map(),
                    };
                    let outcome = self.store.update(ResourceKind::Cluster, vec![item]).await?;
                    if outcome.succeeded.contains(&existing.id) {
                        counters.updated += 1;
                        record = desired.clone();
                        record.id = existing.id;
                        record.bk_biz_id = existing.bk_biz_id;
                        record.cluster_type = existing.cluster_type;
                    } else {
                        counters.failed += 1;
                    }
                }

                if existing.cluster_type != desired.cluster_type {
                    info!(
                        "Cluster {} type changed from {:?} to {:?}",
                        uid, existing.cluster_type, desired.cluster_type
                    );
                    match self.store.update_cluster_type(&existing, desired.cluster_type).await {
                        Ok(()) => {
                            counters.updated += 1;
                            record.cluster_type = desired.cluster_type;
                        }
                        Err(e) => {
                            warn!("Failed to change type of cluster {}: {}", uid, e);
                            counters.failed += 1;
                        }
                    }
                }
                record
            }
        };

        report.add(ResourceKind::Cluster, counters);
        Ok(PassContext::new(biz_id, record))
    }
}
