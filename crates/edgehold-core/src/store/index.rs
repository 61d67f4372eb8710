//! Per-kind in-memory indexes.

use edgehold_types::{ResourceKind, ResourceObject};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One ordered map per kind, each behind its own lock.
pub struct KindIndexes {
    kinds: HashMap<ResourceKind, RwLock<BTreeMap<String, ResourceObject>>>,
}

impl Default for KindIndexes {
    fn default() -> Self {
        Self::new()
    }
}

impl KindIndexes {
    pub fn new() -> Self {
        let kinds = ResourceKind::ALL.into_iter().map(|k| (k, RwLock::new(BTreeMap::new()))).collect();
        Self { kinds }
    }

    fn index(&self, kind: ResourceKind) -> Option<&RwLock<BTreeMap<String, ResourceObject>>> {
        self.kinds.get(&kind)
    }

    pub fn get(&self, kind: ResourceKind, key: &str) -> Option<ResourceObject> {
        self.index(kind)?.read().get(key).cloned()
    }

    pub fn contains(&self, kind: ResourceKind, key: &str) -> bool {
        self.index(kind).is_some_and(|i| i.read().contains_key(key))
    }

    /// Objects of `kind` in key order, optionally restricted to one namespace.
    pub fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Vec<ResourceObject> {
        let Some(index) = self.index(kind) else {
            return Vec::new();
        };
        let index = index.read();
        match namespace {
            Some(ns) => index.values().filter(|o| o.namespace() == Some(ns)).cloned().collect(),
            None => index.values().cloned().collect(),
        }
    }

    /// Insert or replace; returns the previous object.
    pub fn insert(&self, kind: ResourceKind, obj: ResourceObject) -> Option<ResourceObject> {
        let index = self.index(kind)?;
        index.write().insert(obj.key(), obj)
    }

    pub fn remove(&self, kind: ResourceKind, key: &str) -> Option<ResourceObject> {
        self.index(kind)?.write().remove(key)
    }

    /// Drop every entry of `kind` whose key is not in `keep`. Returns the number dropped.
    pub fn retain(&self, kind: ResourceKind, keep: &HashSet<String>) -> usize {
        let Some(index) = self.index(kind) else {
            return 0;
        };
        let mut index = index.write();
        let before = index.len();
        index.retain(|key, _| keep.contains(key));
        before - index.len()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.index(kind).map_or(0, |i| i.read().len())
    }
}
