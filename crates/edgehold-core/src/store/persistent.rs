//! SQLite-backed ordered key-value rows.
//!
//! One row per object, key `{Kind}-{namespace/name|name}`, value is the JSON document.
//! Per-kind scans are key-range scans over the `{Kind}-` prefix.

use edgehold_types::ResourceKind;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::AppResult;

/// Persisted row key for an object key of `kind`.
pub fn row_key(kind: ResourceKind, key: &str) -> String {
    format!("{}-{}", kind.as_str(), key)
}

/// Split a row key back into its kind name and object key.
pub fn split_row_key(row: &str) -> Option<(&str, &str)> {
    row.split_once('-')
}

const LOCAL_VERSION: &str = "local_version";

/// Half-open key range covering every row of `kind`.
fn kind_range(kind: ResourceKind) -> (String, String) {
    // '.' sorts right after '-'
    (format!("{}-", kind.as_str()), format!("{}.", kind.as_str()))
}

pub struct PersistentStore {
    conn: Mutex<Connection>,
}

impl PersistentStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS objects (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) WITHOUT ROWID",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            ) WITHOUT ROWID",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn get(&self, kind: ResourceKind, key: &str) -> AppResult<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM objects WHERE key = ?1", params![row_key(kind, key)], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, kind: ResourceKind, key: &str, value: &str) -> AppResult<()> {
        let conn = self.conn.lock();
        let _rows_affected: usize = conn.execute(
            "INSERT INTO objects (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![row_key(kind, key), value],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, kind: ResourceKind, key: &str) -> AppResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM objects WHERE key = ?1", params![row_key(kind, key)])?;
        Ok(removed > 0)
    }

    /// `(object key, value)` rows of one kind, in key order.
    pub fn scan(&self, kind: ResourceKind) -> AppResult<Vec<(String, String)>> {
        let (start, end) = kind_range(kind);
        let prefix_len = start.len();
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT key, value FROM objects WHERE key >= ?1 AND key < ?2 ORDER BY key")?;
        let rows = stmt
            .query_map(params![start, end], |row| {
                let key: String = row.get(0)?;
                Ok((key[prefix_len..].to_string(), row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every row key, in key order.
    pub fn scan_keys(&self) -> AppResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM objects ORDER BY key")?;
        let keys = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Delete the given row keys in one transaction.
    pub fn delete_rows(&self, rows: &[String]) -> AppResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM objects WHERE key = ?1")?;
            for row in rows {
                removed += stmt.execute(params![row])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Allocate a local resourceVersion above both `floor` and every value handed out before.
    /// The counter lives in the database so it never goes backwards across restarts.
    pub fn next_local_version(&self, floor: u64) -> AppResult<u64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let last: Option<i64> = tx
            .query_row("SELECT value FROM meta WHERE name = ?1", params![LOCAL_VERSION], |row| {
                row.get(0)
            })
            .optional()?;
        let last = last.and_then(|v| u64::try_from(v).ok()).unwrap_or(0);
        let next = last.max(floor).saturating_add(1);
        tx.execute(
            "INSERT INTO meta (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![LOCAL_VERSION, i64::try_from(next).unwrap_or(i64::MAX)],
        )?;
        tx.commit()?;
        Ok(next)
    }

    pub fn count(&self) -> AppResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_scan_keeps_kinds_apart() {
        let db = PersistentStore::open_in_memory().unwrap();
        db.put(ResourceKind::PersistentVolume, "pv1", "{}").unwrap();
        db.put(ResourceKind::PersistentVolumeClaim, "ns/claim", "{}").unwrap();
        db.put(ResourceKind::Pod, "ns/b", "{\"b\":1}").unwrap();
        db.put(ResourceKind::Pod, "ns/a", "{}").unwrap();
        db.put(ResourceKind::Pod, "ns/b", "{\"b\":2}").unwrap();

        let pods = db.scan(ResourceKind::Pod).unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].0, "ns/a");
        assert_eq!(pods[1], ("ns/b".to_string(), "{\"b\":2}".to_string()));
        assert_eq!(db.scan(ResourceKind::PersistentVolume).unwrap().len(), 1);
        assert_eq!(db.count().unwrap(), 4);
    }

    #[test]
    fn test_batch_delete() {
        let db = PersistentStore::open_in_memory().unwrap();
        db.put(ResourceKind::ConfigMap, "ns/a", "{}").unwrap();
        db.put(ResourceKind::ConfigMap, "ns/b", "{}").unwrap();
        let removed = db
            .delete_rows(&[row_key(ResourceKind::ConfigMap, "ns/a"), "Missing-x".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.scan_keys().unwrap(), vec!["ConfigMap-ns/b".to_string()]);
        assert!(!db.delete(ResourceKind::ConfigMap, "ns/a").unwrap());
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        PersistentStore::open(&path).unwrap().put(ResourceKind::Node, "edge-1", "{}").unwrap();
        let reopened = PersistentStore::open(&path).unwrap();
        assert_eq!(reopened.get(ResourceKind::Node, "edge-1").unwrap().as_deref(), Some("{}"));
        assert_eq!(split_row_key("Pod-ns/a"), Some(("Pod", "ns/a")));
    }

    #[test]
    fn test_local_version_counter_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let db = PersistentStore::open(&path).unwrap();
            assert_eq!(db.next_local_version(0).unwrap(), 1);
            assert_eq!(db.next_local_version(10).unwrap(), 11);
            // A lower floor never rewinds the counter.
            assert_eq!(db.next_local_version(3).unwrap(), 12);
        }
        let reopened = PersistentStore::open(&path).unwrap();
        assert_eq!(reopened.next_local_version(0).unwrap(), 13);
        assert_eq!(reopened.count().unwrap(), 0);
    }
}
