//! Typed, cache-aside access to the CMDB
//!
//! [`CmdbStore`] sits on top of a [`CmdbClientTrait`] and owns everything the
//! synchronizer expects from "the remote store": full pagination, batch
//! chunking with per-record fallback, duplicate-key adoption and the optional
//! [`MirrorCache`] (read-through on request, write-through after mutations).

use crate::cache::MirrorCache;
use crate::cmdb_trait::CmdbClientTrait;
use crate::common::query::{fetch_all_pages, Filter, Rule};
use crate::error::CmdbError;
use crate::models::*;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum records per `createmany`/`updatemany`/`deletemany` request
pub const MAX_BATCH: usize = 100;

/// Result of a bulk create
#[derive(Debug)]
pub struct CreateOutcome<T> {
    /// Records now present in the CMDB, with ids assigned (created or adopted)
    pub created: Vec<T>,
    /// Records that could not be created; left for the next pass
    pub failed: Vec<T>,
}

impl<T> Default for CreateOutcome<T> {
    fn default() -> Self {
        Self { created: Vec::new(), failed: Vec::new() }
    }
}

/// One pending update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub id: i64,
    pub biz_id: i64,
    /// Natural key, for logging
    pub key: String,
    /// Changed fields only
    pub delta: Map<String, Value>,
}

/// One pending delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    pub id: i64,
    pub biz_id: i64,
    /// Natural key, for logging
    pub key: String,
}

impl DeleteItem {
    pub fn of<T: CmdbRecord>(record: &T) -> Self {
        Self { id: record.id(), biz_id: record.biz_id(), key: record.display_key() }
    }
}

/// Result of a bulk update or delete
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub succeeded: Vec<i64>,
    pub failed: Vec<i64>,
}

/// Cache-aside CMDB store
#[derive(Clone)]
pub struct CmdbStore {
    client: Arc<dyn CmdbClientTrait>,
    cache: Option<MirrorCache>,
}

impl std::fmt::Debug for CmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdbStore")
            .field("base_url", &self.client.base_url())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl CmdbStore {
    pub fn new(client: Arc<dyn CmdbClientTrait>) -> Self {
        Self { client, cache: None }
    }

    /// Attach a local mirror
    pub fn with_cache(mut self, cache: MirrorCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn client(&self) -> &Arc<dyn CmdbClientTrait> {
        &self.client
    }

    pub fn cache(&self) -> Option<&MirrorCache> {
        self.cache.as_ref()
    }

    /// Every record of `kind` in business `biz_id` matching `filter`.
    ///
    /// With `prefer_cache` and a mirror attached, a non-empty local result is
    /// returned without a remote call. Empty or undecodable local results fall
    /// through to a full paginated remote listing, which refreshes the mirror.
    pub async fn list<T: CmdbRecord>(
        &self,
        kind: ResourceKind,
        biz_id: i64,
        filter: &Filter,
        prefer_cache: bool,
    ) -> Result<Vec<T>, CmdbError> {
        if prefer_cache {
            if let Some(records) = self.list_local(kind, biz_id, filter) {
                debug!("Mirror hit for {} ({} record(s))", kind, records.len());
                return Ok(records);
            }
        }

        let values = fetch_all_pages(|page| self.client.find_page(kind, biz_id, filter, page)).await?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.upsert(kind, &values) {
                warn!("Failed to refresh mirror for {}: {}", kind, e);
            }
        }

        values
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(CmdbError::Serialization))
            .collect()
    }

    fn list_local<T: CmdbRecord>(&self, kind: ResourceKind, biz_id: i64, filter: &Filter) -> Option<Vec<T>> {
        let cache = self.cache.as_ref()?;
        let values = match cache.query(kind, filter) {
            Ok(values) => values,
            Err(e) => {
                debug!("Mirror read for {} failed, treating as miss: {}", kind, e);
                return None;
            }
        };
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            if value.get("bk_biz_id").and_then(Value::as_i64).is_some_and(|b| b != biz_id) {
                continue;
            }
            match serde_json::from_value::<T>(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!("Mirror record for {} undecodable, treating as miss: {}", kind, e);
                    return None;
                }
            }
        }
        if records.is_empty() {
            None
        } else {
            Some(records)
        }
    }

    /// [`list`](Self::list) across several businesses, deduplicated by id.
    pub async fn list_in<T: CmdbRecord>(
        &self,
        kind: ResourceKind,
        biz_ids: &[i64],
        filter: &Filter,
        prefer_cache: bool,
    ) -> Result<Vec<T>, CmdbError> {
        let mut seen = BTreeSet::new();
        let mut all = Vec::new();
        for biz_id in biz_ids.iter().collect::<BTreeSet<_>>() {
            for record in self.list::<T>(kind, *biz_id, filter, prefer_cache).await? {
                if seen.insert(record.id()) {
                    all.push(record);
                }
            }
        }
        Ok(all)
    }

    pub async fn list_clusters(&self, biz_id: i64, filter: &Filter, prefer_cache: bool) -> Result<Vec<Cluster>, CmdbError> {
        self.list(ResourceKind::Cluster, biz_id, filter, prefer_cache).await
    }

    pub async fn find_cluster(&self, biz_id: i64, uid: &str, prefer_cache: bool) -> Result<Option<Cluster>, CmdbError> {
        let filter = Filter::and(vec![Rule::equal("uid", uid)]);
        Ok(self.list_clusters(biz_id, &filter, prefer_cache).await?.into_iter().next())
    }

    pub async fn list_nodes(&self, biz_id: i64, cluster_id: i64, prefer_cache: bool) -> Result<Vec<Node>, CmdbError> {
        self.list(ResourceKind::Node, biz_id, &cluster_filter(cluster_id), prefer_cache).await
    }

    pub async fn list_namespaces(
        &self,
        biz_ids: &[i64],
        cluster_id: i64,
        prefer_cache: bool,
    ) -> Result<Vec<Namespace>, CmdbError> {
        self.list_in(ResourceKind::Namespace, biz_ids, &cluster_filter(cluster_id), prefer_cache).await
    }

    pub async fn list_workloads(
        &self,
        kind: WorkloadKind,
        biz_ids: &[i64],
        cluster_id: i64,
        prefer_cache: bool,
    ) -> Result<Vec<Workload>, CmdbError> {
        self.list_in(ResourceKind::Workload(kind), biz_ids, &cluster_filter(cluster_id), prefer_cache)
            .await
    }

    pub async fn list_pods(&self, biz_ids: &[i64], cluster_id: i64, prefer_cache: bool) -> Result<Vec<Pod>, CmdbError> {
        self.list_in(ResourceKind::Pod, biz_ids, &cluster_filter(cluster_id), prefer_cache).await
    }

    pub async fn list_containers(
        &self,
        biz_id: i64,
        pod_ids: &[i64],
        prefer_cache: bool,
    ) -> Result<Vec<Container>, CmdbError> {
        if pod_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::and(vec![Rule::is_in("bk_pod_id", pod_ids.iter().copied())]);
        self.list(ResourceKind::Container, biz_id, &filter, prefer_cache).await
    }

    /// Host id of the first host owning any of `ips`
    pub async fn find_host_id(&self, ips: &[String]) -> Result<Option<i64>, CmdbError> {
        let hosts = self.client.find_hosts_by_ip(ips).await?;
        Ok(ips
            .iter()
            .find_map(|ip| hosts.iter().find(|h| h.has_ip(ip)))
            .map(|h| h.bk_host_id))
    }

    pub async fn update_cluster_type(&self, cluster: &Cluster, cluster_type: ClusterType) -> Result<(), CmdbError> {
        self.client.update_cluster_type(cluster.bk_biz_id, cluster.id, cluster_type).await?;
        self.refresh(ResourceKind::Cluster, cluster.bk_biz_id, &[cluster.id]).await;
        Ok(())
    }

    /// Create records, chunked per business in batches of [`MAX_BATCH`].
    ///
    /// A rejected batch is resubmitted one record at a time. A record the CMDB
    /// reports as already existing is re-fetched by natural key and adopted.
    /// Transport failures abort the remaining work and are returned as `Err`.
    pub async fn create<T: CmdbRecord>(&self, kind: ResourceKind, records: Vec<T>) -> Result<CreateOutcome<T>, CmdbError> {
        let mut outcome = CreateOutcome::default();
        let result = self.create_chunks(kind, records, &mut outcome).await;

        let mut by_biz: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for record in &outcome.created {
            by_biz.entry(record.biz_id()).or_default().push(record.id());
        }
        for (biz_id, ids) in by_biz {
            self.refresh(kind, biz_id, &ids).await;
        }

        result.map(|_| outcome)
    }

    async fn create_chunks<T: CmdbRecord>(
        &self,
        kind: ResourceKind,
        records: Vec<T>,
        outcome: &mut CreateOutcome<T>,
    ) -> Result<(), CmdbError> {
        for (biz_id, group) in group_by_biz(records) {
            for chunk in group.chunks(MAX_BATCH) {
                if chunk.len() > 1 {
                    let values = chunk.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
                    match self.client.create_many(kind, biz_id, &values).await {
                        Ok(ids) if ids.len() == chunk.len() => {
                            for (record, id) in chunk.iter().zip(ids) {
                                let mut record = record.clone();
                                record.set_id(id);
                                outcome.created.push(record);
                            }
                            continue;
                        }
                        Ok(ids) => {
                            // Records already created by the batch come back as duplicates and are adopted.
                            warn!(
                                "Batch create of {} {} record(s) returned {} id(s), retrying one at a time",
                                chunk.len(),
                                kind,
                                ids.len()
                            );
                        }
                        Err(e) if e.is_transport() => return Err(e),
                        Err(e) => {
                            warn!(
                                "Batch create of {} {} record(s) rejected, retrying one at a time: {}",
                                chunk.len(),
                                kind,
                                e
                            );
                        }
                    }
                }

                for record in chunk {
                    match self.create_one(kind, biz_id, record).await? {
                        Some(created) => outcome.created.push(created),
                        None => outcome.failed.push(record.clone()),
                    }
                }
            }
        }
        Ok(())
    }

    async fn create_one<T: CmdbRecord>(&self, kind: ResourceKind, biz_id: i64, record: &T) -> Result<Option<T>, CmdbError> {
        let value = serde_json::to_value(record)?;
        match self.client.create_many(kind, biz_id, std::slice::from_ref(&value)).await {
            Ok(ids) => {
                let Some(id) = ids.first().copied() else {
                    warn!("Create of {} {} returned no id", kind, record.display_key());
                    return Ok(None);
                };
                let mut created = record.clone();
                created.set_id(id);
                Ok(Some(created))
            }
            Err(e) if e.is_duplicate() => self.adopt(kind, biz_id, record).await,
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                warn!("Failed to create {} {}: {}", kind, record.display_key(), e);
                Ok(None)
            }
        }
    }

    /// Re-query a record the CMDB says already exists and take over its id.
    async fn adopt<T: CmdbRecord>(&self, kind: ResourceKind, biz_id: i64, record: &T) -> Result<Option<T>, CmdbError> {
        let existing: Vec<T> = self.list(kind, biz_id, &record.natural_key_filter(), false).await?;
        match existing.into_iter().next() {
            Some(found) => {
                info!("Adopted existing {} {} (id {})", kind, record.display_key(), found.id());
                let mut adopted = record.clone();
                adopted.set_id(found.id());
                Ok(Some(adopted))
            }
            None => {
                warn!("{} {} reported as duplicate but not found by natural key", kind, record.display_key());
                Ok(None)
            }
        }
    }

    /// Apply field deltas. Items with identical deltas share one request.
    pub async fn update(&self, kind: ResourceKind, items: Vec<UpdateItem>) -> Result<MutationOutcome, CmdbError> {
        let mut outcome = MutationOutcome::default();
        let mut groups: BTreeMap<(i64, String), (Value, Vec<UpdateItem>)> = BTreeMap::new();
        for item in items {
            let delta = Value::Object(item.delta.clone());
            let group_key = (item.biz_id, delta.to_string());
            groups.entry(group_key).or_insert_with(|| (delta, Vec::new())).1.push(item);
        }

        let mut result = Ok(());
        'groups: for ((biz_id, _), (delta, group)) in &groups {
            for chunk in group.chunks(MAX_BATCH) {
                let ids: Vec<i64> = chunk.iter().map(|i| i.id).collect();
                if chunk.len() > 1 {
                    match self.client.update_many(kind, *biz_id, &ids, delta).await {
                        Ok(()) => {
                            outcome.succeeded.extend(ids);
                            continue;
                        }
                        Err(e) if e.is_transport() => {
                            result = Err(e);
                            break 'groups;
                        }
                        Err(e) => {
                            warn!(
                                "Batch update of {} {} record(s) rejected, retrying one at a time: {}",
                                chunk.len(),
                                kind,
                                e
                            );
                        }
                    }
                }

                for item in chunk {
                    match self.client.update_many(kind, *biz_id, &[item.id], delta).await {
                        Ok(()) => outcome.succeeded.push(item.id),
                        Err(e) if e.is_transport() => {
                            result = Err(e);
                            break 'groups;
                        }
                        Err(e) => {
                            warn!("Failed to update {} {}: {}", kind, item.key, e);
                            outcome.failed.push(item.id);
                        }
                    }
                }
            }
        }

        let mut by_biz: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for ((biz_id, _), (_, group)) in &groups {
            let done: Vec<i64> = group.iter().map(|i| i.id).filter(|id| outcome.succeeded.contains(id)).collect();
            by_biz.entry(*biz_id).or_default().extend(done);
        }
        for (biz_id, ids) in by_biz {
            self.refresh(kind, biz_id, &ids).await;
        }

        result.map(|_| outcome)
    }

    /// Delete records by id. Ids that no longer exist are not an error.
    pub async fn delete(&self, kind: ResourceKind, items: Vec<DeleteItem>) -> Result<MutationOutcome, CmdbError> {
        let mut outcome = MutationOutcome::default();
        let mut groups: BTreeMap<i64, Vec<DeleteItem>> = BTreeMap::new();
        for item in items {
            groups.entry(item.biz_id).or_default().push(item);
        }

        let mut result = Ok(());
        'groups: for (biz_id, group) in &groups {
            for chunk in group.chunks(MAX_BATCH) {
                let ids: Vec<i64> = chunk.iter().map(|i| i.id).collect();
                if chunk.len() > 1 {
                    match self.client.delete_many(kind, *biz_id, &ids).await {
                        Ok(()) => {
                            outcome.succeeded.extend(ids);
                            continue;
                        }
                        Err(e) if e.is_transport() => {
                            result = Err(e);
                            break 'groups;
                        }
                        Err(e) => {
                            warn!(
                                "Batch delete of {} {} record(s) rejected, retrying one at a time: {}",
                                chunk.len(),
                                kind,
                                e
                            );
                        }
                    }
                }

                for item in chunk {
                    match self.client.delete_many(kind, *biz_id, &[item.id]).await {
                        Ok(()) => outcome.succeeded.push(item.id),
                        Err(e) if e.is_transport() => {
                            result = Err(e);
                            break 'groups;
                        }
                        Err(e) => {
                            warn!("Failed to delete {} {}: {}", kind, item.key, e);
                            outcome.failed.push(item.id);
                        }
                    }
                }
            }
        }

        self.forget(kind, &outcome.succeeded);
        result.map(|_| outcome)
    }

    /// Re-fetch `ids` from the CMDB and upsert them into the mirror.
    /// Pods bring their containers along.
    async fn refresh(&self, kind: ResourceKind, biz_id: i64, ids: &[i64]) {
        let Some(cache) = &self.cache else {
            return;
        };
        if ids.is_empty() {
            return;
        }

        for chunk in ids.chunks(MAX_BATCH) {
            let filter = Filter::ids(chunk);
            match fetch_all_pages(|page| self.client.find_page(kind, biz_id, &filter, page)).await {
                Ok(values) => {
                    if let Err(e) = cache.upsert(kind, &values) {
                        warn!("Failed to write {} to mirror: {}", kind, e);
                    }
                }
                Err(e) => warn!("Failed to re-fetch {} for mirror: {}", kind, e),
            }

            if kind == ResourceKind::Pod {
                let filter = Filter::and(vec![Rule::is_in("bk_pod_id", chunk.iter().copied())]);
                let containers =
                    fetch_all_pages(|page| self.client.find_page(ResourceKind::Container, biz_id, &filter, page)).await;
                match containers {
                    Ok(values) => {
                        if let Err(e) = cache.upsert(ResourceKind::Container, &values) {
                            warn!("Failed to write containers to mirror: {}", e);
                        }
                    }
                    Err(e) => warn!("Failed to re-fetch containers for mirror: {}", e),
                }
            }
        }
    }

    fn forget(&self, kind: ResourceKind, ids: &[i64]) {
        let Some(cache) = &self.cache else {
            return;
        };
        if ids.is_empty() {
            return;
        }
        if let Err(e) = cache.remove(kind, ids) {
            warn!("Failed to remove {} from mirror: {}", kind, e);
        }
        if kind == ResourceKind::Pod {
            let filter = Filter::and(vec![Rule::is_in("bk_pod_id", ids.iter().copied())]);
            if let Err(e) = cache.remove_matching(ResourceKind::Container, &filter) {
                warn!("Failed to remove containers from mirror: {}", e);
            }
        }
    }
}

fn cluster_filter(cluster_id: i64) -> Filter {
    Filter::and(vec![Rule::equal("bk_cluster_id", cluster_id)])
}

fn group_by_biz<T: CmdbRecord>(records: Vec<T>) -> BTreeMap<i64, Vec<T>> {
    let mut groups: BTreeMap<i64, Vec<T>> = BTreeMap::new();
    for record in records {
        groups.entry(record.biz_id()).or_default().push(record);
    }
    groups
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
