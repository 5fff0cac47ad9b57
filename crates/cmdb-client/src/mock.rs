//! Mock CmdbClient for unit testing
//!
//! An in-memory CMDB implementing [`CmdbClientTrait`]. It enforces the same
//! natural-key uniqueness the real CMDB does (reporting the duplicate code),
//! refuses to delete namespaces that still own workloads or pods, splits pod
//! creates into pod and container rows, and records every call so tests can
//! assert on the exact mutations a pass issued.
//!
//! Failure injection: reject batches above a size, reject records by name,
//! and make listings of a kind fail like a dead transport.

use crate::cmdb_trait::CmdbClientTrait;
use crate::common::query::{Filter, Page};
use crate::error::CmdbError;
use crate::models::*;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

const MOCK_REJECT_CODE: i64 = 1_199_006;

/// A call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Find { kind: ResourceKind, biz_id: i64 },
    Create { kind: ResourceKind, biz_id: i64, names: Vec<String> },
    Update { kind: ResourceKind, biz_id: i64, ids: Vec<i64>, data: Value },
    Delete { kind: ResourceKind, biz_id: i64, ids: Vec<i64> },
    UpdateClusterType { id: i64, cluster_type: ClusterType },
    FindHosts { ips: Vec<String> },
}

impl MockCall {
    /// Whether the call changed CMDB state (or tried to)
    pub fn is_mutation(&self) -> bool {
        !matches!(self, MockCall::Find { .. } | MockCall::FindHosts { .. })
    }
}

#[derive(Default)]
struct MockState {
    tables: HashMap<ResourceKind, BTreeMap<i64, Value>>,
    hosts: Vec<Host>,
    calls: Vec<MockCall>,
    max_batch: Option<usize>,
    batch_id_limit: Option<usize>,
    rejected_names: HashSet<String>,
    failing_kinds: HashSet<ResourceKind>,
}

/// Mock CmdbClient for testing
#[derive(Clone)]
pub struct MockCmdbClient {
    base_url: String,
    state: Arc<Mutex<MockState>>,
    // Counter for generating IDs
    next_id: Arc<Mutex<i64>>,
}

impl Default for MockCmdbClient {
    fn default() -> Self {
        Self::new("http://mock-cmdb")
    }
}

impl MockCmdbClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Arc::new(Mutex::new(MockState::default())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn next_id(&self) -> i64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }

    /// Store a record directly, bypassing uniqueness checks (for test setup).
    /// Returns the id assigned (or the record's own `id` if set).
    pub fn insert<T: serde::Serialize>(&self, kind: ResourceKind, record: &T) -> i64 {
        let mut value = serde_json::to_value(record).unwrap();
        let id = match value.get("id").and_then(Value::as_i64) {
            Some(id) if id > 0 => id,
            _ => self.next_id(),
        };
        value["id"] = Value::from(id);
        {
            let mut next = self.next_id.lock().unwrap();
            if *next <= id {
                *next = id + 1;
            }
        }
        self.state.lock().unwrap().tables.entry(kind).or_default().insert(id, value);
        id
    }

    /// All stored records of `kind`, in id order
    pub fn records(&self, kind: ResourceKind) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state.tables.get(&kind).map(|t| t.values().cloned().collect()).unwrap_or_default()
    }

    /// Stored records of `kind`, decoded
    pub fn typed<T: CmdbRecord>(&self, kind: ResourceKind) -> Vec<T> {
        self.records(kind).into_iter().map(|v| serde_json::from_value(v).unwrap()).collect()
    }

    pub fn record(&self, kind: ResourceKind, id: i64) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.tables.get(&kind).and_then(|t| t.get(&id)).cloned()
    }

    pub fn add_host(&self, host: Host) {
        self.state.lock().unwrap().hosts.push(host);
    }

    /// Reject every create/update/delete carrying more than `max` records
    pub fn reject_batches_over(&self, max: usize) {
        self.state.lock().unwrap().max_batch = Some(max);
    }

    /// Batch creates store every record but answer with at most `max` ids
    pub fn drop_batch_ids_over(&self, max: usize) {
        self.state.lock().unwrap().batch_id_limit = Some(max);
    }

    /// Reject any mutation touching a record with this `name`
    pub fn reject_name(&self, name: impl Into<String>) {
        self.state.lock().unwrap().rejected_names.insert(name.into());
    }

    /// Listings of `kind` fail as if the transport were down
    pub fn fail_listing(&self, kind: ResourceKind) {
        self.state.lock().unwrap().failing_kinds.insert(kind);
    }

    pub fn restore_listing(&self, kind: ResourceKind) {
        self.state.lock().unwrap().failing_kinds.remove(&kind);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Mutating calls only
    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls().into_iter().filter(MockCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

fn rejection(message: String) -> CmdbError {
    CmdbError::Api {
        code: MOCK_REJECT_CODE,
        message,
        request_id: "mock".to_string(),
    }
}

fn duplicate(kind: ResourceKind, key: &str) -> CmdbError {
    CmdbError::Duplicate {
        code: crate::common::DEFAULT_DUPLICATE_CODE,
        message: format!("{} {} already exists", kind, key),
    }
}

fn name_of(value: &Value) -> String {
    value.get("name").and_then(Value::as_str).unwrap_or_default().to_string()
}

fn int_field(value: &Value, field: &str) -> i64 {
    value.get(field).and_then(Value::as_i64).unwrap_or_default()
}

/// Natural key the CMDB enforces uniqueness on
fn unique_key(kind: ResourceKind, value: &Value) -> String {
    match kind {
        ResourceKind::Cluster => value.get("uid").and_then(Value::as_str).unwrap_or_default().to_string(),
        ResourceKind::Node | ResourceKind::Namespace => {
            format!("{}/{}", int_field(value, "bk_cluster_id"), name_of(value))
        }
        ResourceKind::Workload(_) | ResourceKind::Pod => {
            format!("{}/{}", int_field(value, "bk_namespace_id"), name_of(value))
        }
        ResourceKind::Container => format!("{}/{}", int_field(value, "bk_pod_id"), name_of(value)),
    }
}

impl MockState {
    fn check_batch(&self, len: usize) -> Result<(), CmdbError> {
        match self.max_batch {
            Some(max) if len > max => Err(rejection(format!("batch of {} exceeds {}", len, max))),
            _ => Ok(()),
        }
    }

    fn check_names<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<(), CmdbError> {
        for name in names {
            if self.rejected_names.contains(name) {
                return Err(rejection(format!("record {} rejected", name)));
            }
        }
        Ok(())
    }

    fn names_of(&self, kind: ResourceKind, ids: &[i64]) -> Vec<String> {
        let table = self.tables.get(&kind);
        ids.iter()
            .filter_map(|id| table.and_then(|t| t.get(id)))
            .map(name_of)
            .collect()
    }

    fn has_children(&self, namespace_id: i64) -> bool {
        self.tables.iter().any(|(kind, table)| {
            matches!(kind, ResourceKind::Workload(_) | ResourceKind::Pod)
                && table.values().any(|v| int_field(v, "bk_namespace_id") == namespace_id)
        })
    }
}

#[async_trait::async_trait]
impl CmdbClientTrait for MockCmdbClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn find_page(
        &self,
        kind: ResourceKind,
        biz_id: i64,
        filter: &Filter,
        page: Page,
    ) -> Result<FindResult<Value>, CmdbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Find { kind, biz_id });
        if state.failing_kinds.contains(&kind) {
            return Err(CmdbError::TooManyRequests(format!("{} listing unavailable", kind)));
        }

        let matching: Vec<Value> = state
            .tables
            .get(&kind)
            .map(|t| {
                t.values()
                    .filter(|v| v.get("bk_biz_id").and_then(Value::as_i64).map_or(true, |b| b == biz_id))
                    .filter(|v| filter.matches(v))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let count = matching.len() as u64;
        let info = matching
            .into_iter()
            .skip(page.start as usize)
            .take(page.limit as usize)
            .collect();
        Ok(FindResult { count, info })
    }

    async fn create_many(&self, kind: ResourceKind, biz_id: i64, data: &[Value]) -> Result<Vec<i64>, CmdbError> {
        let names: Vec<String> = data.iter().map(name_of).collect();
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(MockCall::Create { kind, biz_id, names: names.clone() });
            state.check_batch(data.len())?;
            state.check_names(&names)?;

            let existing: HashSet<String> = state
                .tables
                .get(&kind)
                .map(|t| t.values().map(|v| unique_key(kind, v)).collect())
                .unwrap_or_default();
            let mut batch_keys = HashSet::new();
            for value in data {
                let key = unique_key(kind, value);
                if existing.contains(&key) || !batch_keys.insert(key.clone()) {
                    return Err(duplicate(kind, &key));
                }
            }
        }

        let mut ids = Vec::with_capacity(data.len());
        for value in data {
            let id = self.next_id();
            let mut record = value.clone();
            let containers = record
                .as_object_mut()
                .and_then(|o| o.remove("containers"))
                .and_then(|c| c.as_array().cloned())
                .unwrap_or_default();
            record["id"] = Value::from(id);
            record["bk_biz_id"] = Value::from(biz_id);

            if kind == ResourceKind::Pod {
                for container in containers {
                    let container_id = self.next_id();
                    let mut container = container;
                    container["id"] = Value::from(container_id);
                    container["bk_pod_id"] = Value::from(id);
                    container["bk_biz_id"] = Value::from(biz_id);
                    container["bk_cluster_id"] = record.get("bk_cluster_id").cloned().unwrap_or(Value::Null);
                    self.state
                        .lock()
                        .unwrap()
                        .tables
                        .entry(ResourceKind::Container)
                        .or_default()
                        .insert(container_id, container);
                }
            }

            self.state.lock().unwrap().tables.entry(kind).or_default().insert(id, record);
            ids.push(id);
        }
        if data.len() > 1 {
            if let Some(max) = self.state.lock().unwrap().batch_id_limit {
                ids.truncate(max);
            }
        }
        Ok(ids)
    }

    async fn update_many(&self, kind: ResourceKind, biz_id: i64, ids: &[i64], data: &Value) -> Result<(), CmdbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Update { kind, biz_id, ids: ids.to_vec(), data: data.clone() });
        state.check_batch(ids.len())?;
        let names = state.names_of(kind, ids);
        state.check_names(&names)?;

        let delta: Map<String, Value> = data.as_object().cloned().unwrap_or_default();
        let table = state.tables.entry(kind).or_default();
        if let Some(missing) = ids.iter().find(|id| !table.contains_key(id)) {
            return Err(rejection(format!("{} id {} not found", kind, missing)));
        }
        for id in ids {
            if let Some(Value::Object(record)) = table.get_mut(id) {
                for (field, value) in &delta {
                    record.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete_many(&self, kind: ResourceKind, biz_id: i64, ids: &[i64]) -> Result<(), CmdbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Delete { kind, biz_id, ids: ids.to_vec() });
        state.check_batch(ids.len())?;
        let names = state.names_of(kind, ids);
        state.check_names(&names)?;

        if kind == ResourceKind::Namespace {
            if let Some(busy) = ids.iter().find(|id| state.has_children(**id)) {
                return Err(rejection(format!("namespace {} still has workloads or pods", busy)));
            }
        }

        if let Some(table) = state.tables.get_mut(&kind) {
            for id in ids {
                table.remove(id);
            }
        }
        if kind == ResourceKind::Pod {
            if let Some(containers) = state.tables.get_mut(&ResourceKind::Container) {
                containers.retain(|_, c| !ids.contains(&int_field(c, "bk_pod_id")));
            }
        }
        Ok(())
    }

    async fn update_cluster_type(&self, biz_id: i64, id: i64, cluster_type: ClusterType) -> Result<(), CmdbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::UpdateClusterType { id, cluster_type });
        let record = state
            .tables
            .get_mut(&ResourceKind::Cluster)
            .and_then(|t| t.get_mut(&id))
            .filter(|r| int_field(r, "bk_biz_id") == biz_id)
            .ok_or_else(|| CmdbError::NotFound(format!("cluster {}", id)))?;
        record["type"] = serde_json::to_value(cluster_type)?;
        Ok(())
    }

    async fn find_hosts_by_ip(&self, ips: &[String]) -> Result<Vec<Host>, CmdbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::FindHosts { ips: ips.to_vec() });
        Ok(state
            .hosts
            .iter()
            .filter(|h| ips.iter().any(|ip| h.has_ip(ip)))
            .cloned()
            .collect())
    }
}
