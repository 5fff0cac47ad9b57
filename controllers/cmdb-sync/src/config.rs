//! Synchronizer configuration.
//!
//! Loaded from a YAML file (`CMDB_SYNC_CONFIG`, default
//! `/etc/cmdb-sync/config.yaml`). Endpoints and secrets can be overridden
//! from the environment so they never have to live in the file.

use crate::error::ControllerError;
use cmdb_client::ClusterType;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cmdb-sync/config.yaml";
pub const DEFAULT_PROJECT_CODE_ANNOTATION: &str = "io.tencent.bcs.projectcode";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub cmdb: CmdbSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub project: Option<ProjectSection>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CmdbSection {
    pub url: String,
    pub app_code: String,
    pub app_secret: String,
    pub username: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub duplicate_code: i64,
}

impl Default for CmdbSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            app_code: String::new(),
            app_secret: String::new(),
            username: "admin".to_string(),
            timeout_secs: 60,
            max_attempts: 3,
            retry_delay_secs: 3,
            duplicate_code: 1_199_014,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    pub url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    /// Directory holding one mirror file per cluster
    pub dir: PathBuf,
    /// Serve current-state listings from the mirror when it has data
    pub prefer_cache: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("/var/lib/cmdb-sync"),
            prefer_cache: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub interval_secs: u64,
    /// Business substituted when a namespace's project resolves to another business
    pub fallback_biz_id: Option<i64>,
    /// Host id used for nodes whose IPs match no CMDB host
    pub default_host_id: Option<i64>,
    pub project_code_annotation: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            fallback_biz_id: None,
            default_host_id: None,
            project_code_annotation: DEFAULT_PROJECT_CODE_ANNOTATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
    pub listen: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A cluster to synchronize, with the descriptive fields the CMDB keeps
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    /// Cluster UID, e.g. `BCS-K8S-00001`
    pub id: String,
    pub name: String,
    /// Declared business identifier (parsed as an integer)
    pub biz_id: String,
    pub biz_id_override: Option<i64>,
    pub scheduling_engine: String,
    pub xid: String,
    pub version: String,
    pub network_type: String,
    pub region: String,
    pub vpc: String,
    pub network: Vec<String>,
    pub cluster_type: ClusterType,
    pub environment: String,
    pub creator: String,
    pub updater: String,
}

impl ClusterSpec {
    /// Business the cluster record belongs to: explicit override, else the
    /// declared identifier.
    pub fn business_id(&self) -> Result<i64, ControllerError> {
        if let Some(id) = self.biz_id_override {
            return Ok(id);
        }
        self.biz_id.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!(
                "cluster {} has no usable business id (biz_id={:?})",
                self.id, self.biz_id
            ))
        })
    }
}

/// Orchestrator knobs shared by every cluster
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub prefer_cache: bool,
    pub fallback_biz_id: Option<i64>,
    pub default_host_id: Option<i64>,
    pub project_code_annotation: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            prefer_cache: false,
            fallback_biz_id: None,
            default_host_id: None,
            project_code_annotation: DEFAULT_PROJECT_CODE_ANNOTATION.to_string(),
        }
    }
}

impl SyncConfig {
    /// Load from `CMDB_SYNC_CONFIG` (or the default path) and apply
    /// environment overrides.
    pub fn load() -> Result<Self, ControllerError> {
        let path = std::env::var("CMDB_SYNC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(Path::new(&path), &env)
    }

    pub fn load_from(path: &Path, env: &HashMap<String, String>) -> Result<Self, ControllerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&raw)?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, ControllerError> {
        serde_yaml::from_str(raw).map_err(|e| ControllerError::InvalidConfig(e.to_string()))
    }

    /// Environment variables win over file values.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = env.get(key).filter(|v| !v.is_empty()) {
                *target = value.clone();
            }
        };
        set(&mut self.cmdb.url, "CMDB_URL");
        set(&mut self.cmdb.app_code, "CMDB_APP_CODE");
        set(&mut self.cmdb.app_secret, "CMDB_APP_SECRET");
        set(&mut self.cmdb.username, "CMDB_USERNAME");
        set(&mut self.storage.url, "STORAGE_URL");
        set(&mut self.storage.token, "STORAGE_TOKEN");

        if let Some(url) = env.get("PROJECT_URL").filter(|v| !v.is_empty()) {
            self.project.get_or_insert_with(ProjectSection::default).url = url.clone();
        }
        if let Some(project) = self.project.as_mut() {
            set(&mut project.token, "PROJECT_TOKEN");
        }
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        let required = [
            ("cmdb.url (CMDB_URL)", &self.cmdb.url),
            ("cmdb.app_code (CMDB_APP_CODE)", &self.cmdb.app_code),
            ("cmdb.app_secret (CMDB_APP_SECRET)", &self.cmdb.app_secret),
            ("storage.url (STORAGE_URL)", &self.storage.url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ControllerError::InvalidConfig(format!("{} is required", name)));
            }
        }
        if self.sync.interval_secs == 0 {
            return Err(ControllerError::InvalidConfig("sync.interval_secs must be positive".to_string()));
        }
        if self.clusters.is_empty() {
            return Err(ControllerError::InvalidConfig("no clusters configured".to_string()));
        }
        for cluster in &self.clusters {
            if cluster.id.trim().is_empty() {
                return Err(ControllerError::InvalidConfig("cluster with empty id".to_string()));
            }
            cluster.business_id()?;
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            prefer_cache: self.cache.enabled && self.cache.prefer_cache,
            fallback_biz_id: self.sync.fallback_biz_id,
            default_host_id: self.sync.default_host_id,
            project_code_annotation: self.sync.project_code_annotation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
cmdb:
  url: http://bkapi.example.com/api/bk-cmdb/prod/api/v3
  app_code: cmdb-sync
  app_secret: from-file
storage:
  url: http://storage.example.com/bcsstorage/v1
  token: storage-token
cache:
  enabled: true
  dir: /tmp/cmdb-sync
  prefer_cache: true
sync:
  interval_secs: 300
  fallback_biz_id: 2
clusters:
  - id: BCS-K8S-00001
    name: prod
    biz_id: "100"
    cluster_type: SHARE_CLUSTER
    network: ["10.0.0.0/16"]
    creator: alice
  - id: BCS-K8S-00002
    name: staging
    biz_id: "not-a-number"
    biz_id_override: 200
"#;

    #[test]
    fn test_parse_sample() {
        let config = SyncConfig::parse(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.cmdb.timeout_secs, 60);
        assert_eq!(config.cmdb.duplicate_code, 1_199_014);
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert!(config.project.is_none());
        assert_eq!(config.clusters.len(), 2);
        assert_eq!(config.clusters[0].cluster_type, ClusterType::Shared);
        assert_eq!(config.clusters[1].cluster_type, ClusterType::Independent);

        let settings = config.settings();
        assert!(settings.prefer_cache);
        assert_eq!(settings.fallback_biz_id, Some(2));
        assert_eq!(settings.project_code_annotation, DEFAULT_PROJECT_CODE_ANNOTATION);
    }

    #[test]
    fn test_business_id_resolution() {
        let config = SyncConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.clusters[0].business_id().unwrap(), 100);
        assert_eq!(config.clusters[1].business_id().unwrap(), 200);

        let broken = ClusterSpec { id: "c".to_string(), biz_id: "x".to_string(), ..Default::default() };
        assert!(matches!(broken.business_id(), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SyncConfig::parse(SAMPLE).unwrap();
        let env: HashMap<String, String> = [
            ("CMDB_APP_SECRET", "from-env"),
            ("STORAGE_TOKEN", ""),
            ("PROJECT_URL", "http://project.example.com"),
            ("PROJECT_TOKEN", "p-token"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        config.apply_env(&env);
        assert_eq!(config.cmdb.app_secret, "from-env");
        assert_eq!(config.storage.token, "storage-token");
        let project = config.project.unwrap();
        assert_eq!(project.url, "http://project.example.com");
        assert_eq!(project.token, "p-token");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SyncConfig::parse(SAMPLE).unwrap();
        config.cmdb.url.clear();
        assert!(matches!(config.validate(), Err(ControllerError::InvalidConfig(_))));

        let config = SyncConfig::parse("cmdb: {url: x, app_code: a, app_secret: s}\nstorage: {url: y}\n").unwrap();
        assert!(matches!(config.validate(), Err(ControllerError::InvalidConfig(_))));

        assert!(SyncConfig::parse("unknown_section: 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = SyncConfig::load_from(&path, &HashMap::new()).unwrap();
        assert_eq!(config.clusters[0].id, "BCS-K8S-00001");

        let missing = SyncConfig::load_from(&dir.path().join("absent.yaml"), &HashMap::new());
        assert!(matches!(missing, Err(ControllerError::InvalidConfig(_))));
    }
}
