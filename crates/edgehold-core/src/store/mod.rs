//! Local state store.
//!
//! Two layers: SQLite rows (durable, survive restarts) and per-kind in-memory indexes
//! (what readers see). Which writers may touch the indexes depends on [`StoreMode`]:
//!
//! ```text
//!                enter_connected(): MergeDelete
//!   DISCONNECTED ─────────────────────────────▶ CONNECTED
//!        ▲                                          │
//!        └──────────── enter_disconnected() ────────┘
//! ```
//!
//! The syncer writes both layers in either mode. Client writes always reach SQLite but
//! only reach the indexes while disconnected.

mod index;
mod mode;
mod persistent;


pub use index::KindIndexes;
pub use mode::StoreMode;
pub use persistent::{row_key, split_row_key, PersistentStore};

use edgehold_types::{ResourceKind, ResourceObject, StoreError};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::str::FromStr;

use crate::error::AppResult;

const STORE_FILE: &str = "edgehold.db";

pub struct LocalStore {
    rows: PersistentStore,
    indexes: KindIndexes,
    mode: RwLock<StoreMode>,
    /// Highest numeric resourceVersion seen in either layer.
    highest_version: AtomicU64,
}

fn numeric_version(obj: &ResourceObject) -> Option<u64> {
    obj.resource_version().and_then(|rv| rv.parse().ok())
}

impl LocalStore {
    /// Open `{data_dir}/edgehold.db` and rebuild the indexes from its rows.
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        Self::with_rows(PersistentStore::open(&data_dir.join(STORE_FILE))?)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::with_rows(PersistentStore::open_in_memory()?)
    }

    fn with_rows(rows: PersistentStore) -> AppResult<Self> {
        let store = Self {
            rows,
            indexes: KindIndexes::new(),
            mode: RwLock::new(StoreMode::Disconnected),
            highest_version: AtomicU64::new(0),
        };
        store.rebuild()?;
        Ok(store)
    }

    /// Load every persisted row into its kind's index. Corrupted rows are skipped.
    fn rebuild(&self) -> AppResult<usize> {
        let mut loaded = 0;
        for kind in ResourceKind::ALL {
            for (key, value) in self.rows.scan(kind)? {
                match ResourceObject::from_json(&value) {
                    Ok(obj) => {
                        self.observe_version(&obj);
                        self.indexes.insert(kind, obj);
                        loaded += 1;
                    },
                    Err(e) => {
                        let err = StoreError::Corrupted {
                            key: row_key(kind, &key),
                            message: e.to_string(),
                        };
                        tracing::warn!("Skipping persisted row: {}", err);
                    },
                }
            }
        }
        tracing::info!(objects = loaded, "Local store indexes rebuilt");
        Ok(loaded)
    }

    fn observe_version(&self, obj: &ResourceObject) {
        if let Some(v) = numeric_version(obj) {
            self.highest_version.fetch_max(v, Ordering::AcqRel);
        }
    }

    pub fn mode(&self) -> StoreMode {
        *self.mode.read()
    }

    /// Transition to CONNECTED, running MergeDelete as the transition action.
    /// A no-op returning 0 if already connected.
    pub fn enter_connected(&self) -> AppResult<usize> {
        let mut mode = self.mode.write();
        if *mode == StoreMode::Connected {
            return Ok(0);
        }
        let removed = self.merge_delete()?;
        *mode = StoreMode::Connected;
        tracing::info!(removed, "Local store entered connected mode");
        Ok(removed)
    }

    pub fn enter_disconnected(&self) {
        let mut mode = self.mode.write();
        if *mode == StoreMode::Disconnected {
            return;
        }
        *mode = StoreMode::Disconnected;
        tracing::warn!("Local store entered disconnected mode; serving local state");
    }

    /// Delete, in one transaction, every persisted row whose key is absent from its kind's
    /// index. Rows of unrecognized kinds go too. Returns the number of rows removed.
    pub fn merge_delete(&self) -> AppResult<usize> {
        let stale: Vec<String> = self
            .rows
            .scan_keys()?
            .into_iter()
            .filter(|row| match split_row_key(row) {
                Some((kind, key)) => match ResourceKind::from_str(kind) {
                    Ok(kind) => !self.indexes.contains(kind, key),
                    Err(_) => true,
                },
                None => true,
            })
            .collect();
        if !stale.is_empty() {
            tracing::debug!(rows = ?stale, "MergeDelete removing rows");
        }
        self.rows.delete_rows(&stale)
    }

    /// Look up by kind name and object key.
    pub fn get(&self, kind: &str, key: &str) -> AppResult<ResourceObject> {
        let kind = ResourceKind::from_str(kind)?;
        self.get_kind(kind, key)
    }

    pub fn get_kind(&self, kind: ResourceKind, key: &str) -> AppResult<ResourceObject> {
        self.indexes.get(kind, key).ok_or_else(|| {
            StoreError::NotFound { kind: kind.as_str().to_string(), key: key.to_string() }.into()
        })
    }

    /// List by kind name; an unknown kind yields an empty list.
    pub fn list(&self, kind: &str, namespace: Option<&str>) -> Vec<ResourceObject> {
        match ResourceKind::from_str(kind) {
            Ok(kind) => self.indexes.list(kind, namespace),
            Err(_) => Vec::new(),
        }
    }

    pub fn list_kind(&self, kind: ResourceKind) -> Vec<ResourceObject> {
        self.indexes.list(kind, None)
    }

    /// The persisted form of an object, independent of the indexes.
    pub fn get_persisted(
        &self,
        kind: ResourceKind,
        key: &str,
    ) -> AppResult<Option<ResourceObject>> {
        match self.rows.get(kind, key)? {
            Some(raw) => Ok(Some(ResourceObject::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// Authoritative upsert from the syncer: both layers, any mode.
    pub fn upsert(
        &self,
        kind: ResourceKind,
        obj: &ResourceObject,
    ) -> AppResult<Option<ResourceObject>> {
        // Shared with other writers, exclusive against MergeDelete.
        let _mode = self.mode.read();
        self.rows.put(kind, &obj.key(), &obj.to_json_string())?;
        self.observe_version(obj);
        Ok(self.indexes.insert(kind, obj.clone()))
    }

    /// Authoritative delete from the syncer: both layers, any mode.
    pub fn remove(&self, kind: ResourceKind, key: &str) -> AppResult<Option<ResourceObject>> {
        let _mode = self.mode.read();
        self.rows.delete(kind, key)?;
        Ok(self.indexes.remove(kind, key))
    }

    /// Client write. While disconnected the object is stamped with a fresh local
    /// resourceVersion, indexed, and the stamped copy returned; otherwise `None`.
    pub fn client_put(
        &self,
        kind: ResourceKind,
        obj: &ResourceObject,
    ) -> AppResult<Option<ResourceObject>> {
        // Held across both layers so a mode switch cannot interleave.
        let mode = self.mode.read();
        if !mode.indexes_client_writes() {
            self.rows.put(kind, &obj.key(), &obj.to_json_string())?;
            return Ok(None);
        }
        let floor =
            self.highest_version.load(Ordering::Acquire).max(numeric_version(obj).unwrap_or(0));
        let version = self.rows.next_local_version(floor)?;
        let mut stamped = obj.clone();
        stamped.set_resource_version(Some(&version.to_string()));
        self.rows.put(kind, &stamped.key(), &stamped.to_json_string())?;
        self.observe_version(&stamped);
        self.indexes.insert(kind, stamped.clone());
        Ok(Some(stamped))
    }

    /// Client delete. Fails with not-found when neither layer has the key.
    pub fn client_delete(
        &self,
        kind: ResourceKind,
        key: &str,
    ) -> AppResult<Option<ResourceObject>> {
        let mode = self.mode.read();
        let persisted = self.rows.delete(kind, key)?;
        let indexed = if mode.indexes_client_writes() { self.indexes.remove(kind, key) } else { None };
        if !persisted && indexed.is_none() {
            return Err(StoreError::NotFound {
                kind: kind.as_str().to_string(),
                key: key.to_string(),
            }
            .into());
        }
        Ok(indexed)
    }

    /// Keep only `keys` in the index of `kind`. Used after a fresh initial list so the
    /// index reflects exactly what the central API holds.
    pub fn retain_index(&self, kind: ResourceKind, keys: &HashSet<String>) -> usize {
        self.indexes.retain(kind, keys)
    }

    pub fn index_len(&self, kind: ResourceKind) -> usize {
        self.indexes.len(kind)
    }

    pub fn persisted_len(&self) -> AppResult<usize> {
        self.rows.count()
    }
}
