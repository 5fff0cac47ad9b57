//! MirrorCache: redb-backed local mirror of CMDB records.
//!
//! One table per [`ResourceKind`], keyed by CMDB id, with the record stored as
//! JSON bytes. Filters are evaluated locally with the same semantics the CMDB
//! applies remotely. Each cluster gets its own database file, so partitions
//! never see each other's rows.

pub mod error;

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;
use tracing::debug;

use crate::common::query::Filter;
use crate::models::ResourceKind;
pub use error::{CacheError, CacheResult};

macro_rules! map_err {
    ($variant:ident) => {
        |e| CacheError::$variant(e.to_string())
    };
}

fn table(kind: ResourceKind) -> TableDefinition<'static, i64, &'static [u8]> {
    TableDefinition::new(kind.table_name())
}

/// Thread-safe local mirror backed by redb.
#[derive(Clone)]
pub struct MirrorCache {
    db: Arc<Database>,
}

impl std::fmt::Debug for MirrorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorCache").finish_non_exhaustive()
    }
}

impl MirrorCache {
    /// Open (or create) a mirror file at the given path.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(map_err!(Open))?;
        }
        let db = Database::create(path).map_err(map_err!(Open))?;
        let cache = Self { db: Arc::new(db) };
        cache.ensure_tables()?;
        debug!(?path, "mirror opened");
        Ok(cache)
    }

    /// Create an ephemeral in-memory mirror (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let cache = Self { db: Arc::new(db) };
        cache.ensure_tables()?;
        Ok(cache)
    }

    fn ensure_tables(&self) -> CacheResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for kind in ResourceKind::all() {
            txn.open_table(table(kind)).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Records of `kind` matching `filter`, in id order.
    pub fn query(&self, kind: ResourceKind, filter: &Filter) -> CacheResult<Vec<Value>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table(kind)).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: Value = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if filter.matches(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Insert or replace records by their `id`. Records without an id are skipped.
    pub fn upsert(&self, kind: ResourceKind, records: &[Value]) -> CacheResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut written = 0;
        {
            let mut table = txn.open_table(table(kind)).map_err(map_err!(Table))?;
            for record in records {
                let Some(id) = record.get("id").and_then(Value::as_i64) else {
                    continue;
                };
                let bytes = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
                table.insert(id, bytes.as_slice()).map_err(map_err!(Write))?;
                written += 1;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind = %kind, written, "mirror upsert");
        Ok(written)
    }

    /// Remove records by id. Missing ids are ignored.
    pub fn remove(&self, kind: ResourceKind, ids: &[i64]) -> CacheResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut removed = 0;
        {
            let mut table = txn.open_table(table(kind)).map_err(map_err!(Table))?;
            for id in ids {
                if table.remove(*id).map_err(map_err!(Write))?.is_some() {
                    removed += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind = %kind, removed, "mirror remove");
        Ok(removed)
    }

    /// Remove every record of `kind` matching `filter`.
    pub fn remove_matching(&self, kind: ResourceKind, filter: &Filter) -> CacheResult<usize> {
        let ids: Vec<i64> = self
            .query(kind, filter)?
            .iter()
            .filter_map(|record| record.get("id").and_then(Value::as_i64))
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.remove(kind, &ids)
    }

    /// Number of records of `kind`.
    pub fn len(&self, kind: ResourceKind) -> CacheResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table(kind)).map_err(map_err!(Table))?;
        let mut count = 0;
        for entry in table.iter().map_err(map_err!(Read))? {
            entry.map_err(map_err!(Read))?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self, kind: ResourceKind) -> CacheResult<bool> {
        Ok(self.len(kind)? == 0)
    }
}
