use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on the summed size of cached JSON values.
pub const DEFAULT_CACHE_BUDGET_BYTES: u64 = 2 * 1024 * 1024;
/// Notifications kept before the oldest are dropped.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no data directory available")]
    NoDataDir,
    #[error("cache entry {key} is {size} bytes, over the {budget}-byte budget")]
    TooLarge { key: String, size: u64, budget: u64 },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Local cache for offline use.
///
/// Two bounded areas: a JSON key-value cache evicted least-recently-used
/// once its byte total passes the budget, and a notification history that
/// keeps only the newest `notification_capacity` records.
pub struct Store {
    conn: Connection,
    budget_bytes: u64,
    notification_capacity: usize,
}

impl Store {
    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("com", "example", "QuakeReady")?;
        Some(proj.data_dir().join("cache.sqlite"))
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_default() -> Result<Self, StorageError> {
        let path = Self::default_path().ok_or(StorageError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn with_limits(mut self, budget_bytes: u64, notification_capacity: usize) -> Self {
        self.budget_bytes = budget_bytes;
        self.notification_capacity = notification_capacity;
        self
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        // In-memory databases answer "memory" here, which is fine.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                bytes INTEGER NOT NULL,
                accessed_seq INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn,
            budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        })
    }

    fn next_seq(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COALESCE(MAX(accessed_seq), 0) + 1 FROM cache", [], |row| row.get(0))
    }

    /// Cache `value` under `key`, evicting older entries to stay in budget.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        let size = json.len() as u64;
        if size > self.budget_bytes {
            return Err(StorageError::TooLarge { key: key.to_string(), size, budget: self.budget_bytes });
        }

        let tx = self.conn.transaction()?;
        let seq = Self::next_seq(&tx)?;
        tx.execute(
            r#"
            INSERT INTO cache (key, value, bytes, accessed_seq)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value=excluded.value,
                bytes=excluded.bytes,
                accessed_seq=excluded.accessed_seq
            "#,
            params![key, json, size as i64, seq],
        )?;

        let mut total: i64 = tx.query_row("SELECT COALESCE(SUM(bytes), 0) FROM cache", [], |row| row.get(0))?;
        while (total as u64) > self.budget_bytes {
            let victim: Option<(String, i64)> = tx
                .query_row(
                    "SELECT key, bytes FROM cache WHERE key != ?1 ORDER BY accessed_seq ASC LIMIT 1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((victim, bytes)) = victim else { break };
            tx.execute("DELETE FROM cache WHERE key = ?1", params![victim])?;
            debug!("evicted cache entry {victim} ({bytes} bytes)");
            total -= bytes;
        }
        tx.commit()?;
        Ok(())
    }

    /// Read a cached value and mark it recently used.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM cache WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        let Some(value) = value else {
            return Ok(None);
        };
        let seq = Self::next_seq(&self.conn)?;
        self.conn
            .execute("UPDATE cache SET accessed_seq = ?1 WHERE key = ?2", params![seq, key])?;
        Ok(Some(serde_json::from_str(&value)?))
    }

    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.conn.execute("DELETE FROM cache WHERE key = ?1", params![key])? > 0)
    }

    pub fn cache_bytes(&self) -> Result<u64, StorageError> {
        let total: i64 = self
            .conn
            .query_row("SELECT COALESCE(SUM(bytes), 0) FROM cache", [], |row| row.get(0))?;
        Ok(total as u64)
    }

    pub fn push_notification(&self, title: &str, body: &str) -> Result<NotificationRecord, StorageError> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO notifications (title, body, created_at) VALUES (?1, ?2, ?3)",
            params![title, body, created_at],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn.execute(
            "DELETE FROM notifications WHERE id NOT IN (SELECT id FROM notifications ORDER BY id DESC LIMIT ?1)",
            params![self.notification_capacity as i64],
        )?;
        Ok(NotificationRecord { id, title: title.to_string(), body: body.to_string(), created_at })
    }

    /// Newest first.
    pub fn notifications(&self, limit: Option<usize>) -> Result<Vec<NotificationRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, body, created_at FROM notifications ORDER BY id DESC LIMIT ?1")?;
        let lim = limit.unwrap_or(self.notification_capacity) as i64;
        let rows = stmt.query_map(params![lim], |row| {
            Ok(NotificationRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn evicts_least_recently_used_to_stay_in_budget() {
        // "aaaaaaaaaa" serializes to 12 bytes including quotes.
        let mut store = Store::open_in_memory().unwrap().with_limits(30, 10);
        store.put("a", &"a".repeat(10)).unwrap();
        store.put("b", &"b".repeat(10)).unwrap();
        assert_eq!(store.get::<String>("a").unwrap().as_deref(), Some("aaaaaaaaaa"));

        store.put("c", &"c".repeat(10)).unwrap();
        assert!(store.get::<String>("b").unwrap().is_none());
        assert!(store.get::<String>("a").unwrap().is_some());
        assert!(store.get::<String>("c").unwrap().is_some());
        assert_eq!(store.cache_bytes().unwrap(), 24);
    }

    #[test]
    fn rejects_entries_larger_than_budget() {
        let mut store = Store::open_in_memory().unwrap().with_limits(8, 10);
        let err = store.put("big", &"x".repeat(20)).unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { size: 22, budget: 8, .. }));
        assert_eq!(store.cache_bytes().unwrap(), 0);
    }

    #[test]
    fn overwriting_a_key_replaces_its_size() {
        let mut store = Store::open_in_memory().unwrap();
        store.put("k", &vec![1, 2, 3]).unwrap();
        store.put("k", &vec![1]).unwrap();
        assert_eq!(store.get::<Vec<i32>>("k").unwrap(), Some(vec![1]));
        assert_eq!(store.cache_bytes().unwrap(), 3);
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
    }

    #[test]
    fn notification_ring_keeps_newest() {
        let store = Store::open_in_memory().unwrap().with_limits(1024, 3);
        for i in 0..5 {
            store.push_notification(&format!("t{i}"), "body").unwrap();
        }
        let titles: Vec<_> = store.notifications(None).unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["t4", "t3", "t2"]);
        assert_eq!(store.notifications(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite");
        {
            let mut store = Store::open(&path).unwrap();
            store.put("quakes", &vec!["x"]).unwrap();
            store.push_notification("Sent", "Anne").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.get::<Vec<String>>("quakes").unwrap(), Some(vec!["x".to_string()]));
        assert_eq!(store.notifications(None).unwrap()[0].body, "Anne");
    }
}
