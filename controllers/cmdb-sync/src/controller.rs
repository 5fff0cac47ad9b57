//! Main controller implementation.
//!
//! This module contains the `Controller` struct that owns one reconciler per
//! configured cluster and drives their passes on a fixed interval. A cluster
//! whose pass could not resolve its CMDB record is retried on a Fibonacci
//! backoff instead of waiting for the next interval.

use crate::backoff::FibonacciBackoff;
use crate::config::{ClusterSpec, SyncConfig};
use crate::error::ControllerError;
use crate::metrics::SyncMetrics;
use crate::project::{ProjectClient, ProjectLookup};
use crate::reconciler::Reconciler;
use cmdb_client::{CmdbClient, CmdbClientConfig, CmdbClientTrait, CmdbStore, GatewayCredentials, MirrorCache, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use storage_client::{ClusterStorageTrait, StorageClient};
use tokio::time::Instant;
use tracing::{error, info, warn};

const RETRY_MIN_SECS: u64 = 30;

/// One cluster and its schedule
struct ClusterWorker {
    reconciler: Reconciler,
    backoff: FibonacciBackoff,
    next_due: Instant,
}

/// Main controller for CMDB topology synchronization.
pub struct Controller {
    workers: Vec<ClusterWorker>,
    metrics: SyncMetrics,
    interval: Duration,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: &SyncConfig, metrics: SyncMetrics) -> Result<Self, ControllerError> {
        info!("Initializing CMDB sync controller");

        let cmdb_config = CmdbClientConfig {
            base_url: config.cmdb.url.clone(),
            credentials: GatewayCredentials {
                bk_app_code: config.cmdb.app_code.clone(),
                bk_app_secret: config.cmdb.app_secret.clone(),
                bk_username: config.cmdb.username.clone(),
            },
            timeout: Duration::from_secs(config.cmdb.timeout_secs),
            retry: RetryPolicy {
                max_attempts: config.cmdb.max_attempts,
                delay: Duration::from_secs(config.cmdb.retry_delay_secs),
            },
            duplicate_code: config.cmdb.duplicate_code,
        };
        let cmdb: Arc<dyn CmdbClientTrait> = Arc::new(CmdbClient::new(cmdb_config)?);

        let storage: Arc<dyn ClusterStorageTrait> = Arc::new(StorageClient::new(
            config.storage.url.clone(),
            config.storage.token.clone(),
            Duration::from_secs(config.storage.timeout_secs),
        )?);

        let projects: Option<Arc<dyn ProjectLookup>> = match &config.project {
            Some(project) if !project.url.is_empty() => Some(Arc::new(ProjectClient::new(
                project.url.clone(),
                project.token.clone(),
                Duration::from_secs(config.storage.timeout_secs),
            )?)),
            _ => {
                info!("No project service configured, namespaces are filed under their cluster's business");
                None
            }
        };

        // Validate credentials and connectivity before proceeding
        info!("Validating CMDB credentials and connectivity...");
        if let Some(first) = config.clusters.first() {
            let probe = CmdbStore::new(cmdb.clone());
            probe
                .find_cluster(first.business_id()?, &first.id, false)
                .await
                .map_err(|e| {
                    error!("Failed to query CMDB: {}", e);
                    error!("Please ensure:");
                    error!("  1. CMDB_APP_CODE and CMDB_APP_SECRET are set correctly");
                    error!("  2. The app is authorized for business {}", first.biz_id);
                    error!("  3. The CMDB gateway is reachable at {}", config.cmdb.url);
                    ControllerError::Cmdb(e)
                })?;
        }
        info!("CMDB credentials validated and connectivity established");

        if config.cache.enabled {
            std::fs::create_dir_all(&config.cache.dir)?;
        }

        let now = Instant::now();
        let settings = config.settings();
        let max_backoff = config.sync.interval_secs.max(RETRY_MIN_SECS);
        let mut workers = Vec::with_capacity(config.clusters.len());
        for cluster in &config.clusters {
            let store = cluster_store(config, cmdb.clone(), cluster)?;
            workers.push(ClusterWorker {
                reconciler: Reconciler::new(store, storage.clone(), projects.clone(), settings.clone(), cluster.clone()),
                backoff: FibonacciBackoff::new(RETRY_MIN_SECS, max_backoff),
                next_due: now,
            });
        }
        info!("Managing {} cluster(s), interval {:?}", workers.len(), config.interval());

        Ok(Self {
            workers,
            metrics,
            interval: config.interval(),
        })
    }

    /// Runs passes until interrupted.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Controller started");
        loop {
            self.run_due().await;

            let wake = self
                .workers
                .iter()
                .map(|w| w.next_due)
                .min()
                .unwrap_or_else(|| Instant::now() + self.interval);
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Shutdown signal received, stopping controller");
                    return Ok(());
                }
            }
        }
    }

    /// Run a pass for every cluster that is due, one cluster at a time
    async fn run_due(&mut self) {
        for worker in &mut self.workers {
            if worker.next_due > Instant::now() {
                continue;
            }
            let cluster = worker.reconciler.cluster_uid().to_string();
            let started = Instant::now();

            // Passes are never cut short; a long one only delays the next.
            let report = worker.reconciler.run_pass().await;
            let elapsed = started.elapsed();
            self.metrics.observe_pass(&report, elapsed);
            if elapsed > self.interval {
                warn!("Pass for cluster {} took {:?}, longer than the {:?} interval", cluster, elapsed, self.interval);
                self.metrics.observe_overrun(&cluster);
            }

            if report.completed {
                worker.backoff.reset();
                worker.next_due = started + self.interval;
            } else {
                let delay = worker.backoff.next_backoff();
                warn!("Pass for cluster {} did not complete, retrying in {:?}", cluster, delay);
                worker.next_due = Instant::now() + delay;
            }
        }
    }
}

/// Store for one cluster, with its own mirror file when caching is enabled
fn cluster_store(
    config: &SyncConfig,
    cmdb: Arc<dyn CmdbClientTrait>,
    cluster: &ClusterSpec,
) -> Result<CmdbStore, ControllerError> {
    let store = CmdbStore::new(cmdb);
    if !config.cache.enabled {
        return Ok(store);
    }
    let path = config.cache.dir.join(format!("{}.redb", cluster.id));
    info!("Cluster {} mirrors the CMDB at {}", cluster.id, path.display());
    Ok(store.with_cache(MirrorCache::open(&path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::test_utils::*;
    use cmdb_client::{MockCmdbClient, Pod, ResourceKind};
    use storage_client::{resource, MockStorageClient};

    fn config(cache_dir: &std::path::Path, enabled: bool) -> SyncConfig {
        let mut config = SyncConfig::parse(
            r#"
cmdb:
  url: http://cmdb.invalid
  app_code: cmdb-sync
  app_secret: secret
storage:
  url: http://storage.invalid
clusters:
  - id: BCS-K8S-00001
    biz_id: "100"
"#,
        )
        .unwrap();
        config.cache.enabled = enabled;
        config.cache.dir = cache_dir.to_path_buf();
        config
    }

    #[test]
    fn test_cluster_store_opens_mirror_per_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), true);
        let cmdb: Arc<dyn CmdbClientTrait> = Arc::new(cmdb_client::MockCmdbClient::default());

        let store = cluster_store(&config, cmdb, &config.clusters[0]).unwrap();
        assert!(store.cache().is_some());
        assert!(dir.path().join("BCS-K8S-00001.redb").exists());
    }

    #[test]
    fn test_cluster_store_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), false);
        let cmdb: Arc<dyn CmdbClientTrait> = Arc::new(cmdb_client::MockCmdbClient::default());

        let store = cluster_store(&config, cmdb, &config.clusters[0]).unwrap();
        assert!(store.cache().is_none());
    }

    #[tokio::test]
    async fn test_pass_longer_than_interval_runs_to_completion() {
        let cmdb = MockCmdbClient::default();
        let storage = MockStorageClient::new();
        storage.put(CLUSTER_UID, resource::NODE, &k8s_node("node-a", "10.0.0.1"));
        storage.put(CLUSTER_UID, resource::NAMESPACE, &k8s_namespace("ns-a", None));
        storage.put(CLUSTER_UID, resource::POD, &k8s_pod("ns-a", "bare-1", "node-a", None));
        storage.set_latency(Duration::from_millis(20));

        let metrics = SyncMetrics::new().unwrap();
        let mut controller = Controller {
            workers: vec![ClusterWorker {
                reconciler: reconciler(&cmdb, &storage, None, SyncSettings::default(), cluster_spec()),
                backoff: FibonacciBackoff::new(RETRY_MIN_SECS, RETRY_MIN_SECS),
                next_due: Instant::now(),
            }],
            metrics: metrics.clone(),
            interval: Duration::from_millis(5),
        };

        controller.run_due().await;

        let pods = cmdb.typed::<Pod>(ResourceKind::Pod);
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name, "bare-1");

        let text = metrics.encode_text().unwrap();
        assert!(text.contains(r#"cmdb_sync_passes_total{cluster="BCS-K8S-00001",outcome="completed"} 1"#));
        assert!(text.contains(r#"cmdb_sync_pass_overruns_total{cluster="BCS-K8S-00001"} 1"#));
        assert!(controller.workers[0].next_due <= Instant::now());
    }
}
