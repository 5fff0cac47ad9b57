//! CMDB Sync Controller
//!
//! Mirrors the topology of Kubernetes clusters into the CMDB:
//! - Cluster: the cluster record itself, created on first sight
//! - Node: nodes with their host ids
//! - Namespace: namespaces, filed under their project's business
//! - Workload: Deployments, StatefulSets, DaemonSets, GameDeployments, GameStatefulSets
//! - Pod: pods and their containers, attached to their owning workload
//!
//! Cluster state is read from the cluster storage service; every pass converges
//! the CMDB to it with the fewest possible writes.

mod backoff;
mod compare;
mod config;
mod controller;
mod desired;
mod diff;
mod error;
mod metrics;
mod project;
mod reconcile_helpers;
mod reconciler;
#[cfg(test)]
mod test_utils;

use crate::config::SyncConfig;
use crate::error::ControllerError;
use crate::metrics::SyncMetrics;
use controller::Controller;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting CMDB Sync Controller");

    let config = SyncConfig::load()?;

    info!("Configuration:");
    info!("  CMDB URL: {}", config.cmdb.url);
    info!("  Storage URL: {}", config.storage.url);
    info!("  Clusters: {}", config.clusters.len());
    info!("  Interval: {:?}", config.interval());
    info!(
        "  Mirror: {}",
        if config.cache.enabled { config.cache.dir.display().to_string() } else { "disabled".to_string() }
    );

    let metrics = SyncMetrics::new()?;
    if config.metrics.enabled {
        let server = metrics.clone();
        let listen = config.metrics.listen.clone();
        tokio::spawn(async move {
            if let Err(e) = server.serve(&listen).await {
                error!("Metrics endpoint stopped: {}", e);
            }
        });
    }

    // Initialize and run controller
    let controller = Controller::new(&config, metrics).await?;
    controller.run().await?;

    Ok(())
}
