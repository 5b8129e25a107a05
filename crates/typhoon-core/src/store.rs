//! Key-value blob store with opaque put/get/increment.
//!
//! Two backends: an in-process map (tests, `store.backend = "memory"`) and a
//! SQLite file that several processes can share.

use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::config::{StoreConfig, expand_path};
use crate::error::{Result, TyphoonError};

/// Minimal blob store contract used by the repositories.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn delete(&self, key: &str) -> Result<()>;
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
    /// Atomically bump a named counter and return the new value (first call yields 1).
    fn increment(&self, counter: &str) -> Result<u64>;
}

/// Open the backend selected in config.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn BlobStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Box::new(MemoryBlobStore::new())),
        "sqlite" => {
            let path = expand_path(&config.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Box::new(SqliteBlobStore::open(&path)?))
        }
        other => Err(TyphoonError::Config(format!(
            "Unknown store backend '{other}' (expected sqlite or memory)"
        ))),
    }
}

fn poisoned() -> TyphoonError {
    TyphoonError::Store("store lock poisoned".into())
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryBlobStore {
    values: Mutex<HashMap<String, String>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }

    fn increment(&self, counter: &str) -> Result<u64> {
        let mut counters = self.counters.lock().map_err(|_| poisoned())?;
        let value = counters.entry(counter.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

/// SQLite-backed store.
pub struct SqliteBlobStore {
    conn: Mutex<Connection>,
}

impl SqliteBlobStore {
    /// Open or create the store database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| TyphoonError::Store(format!("DB open error: {e}")))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TyphoonError::Store(format!("DB open error: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;

             CREATE TABLE IF NOT EXISTS blobs (
                 key        TEXT PRIMARY KEY,
                 value      TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS counters (
                 name  TEXT PRIMARY KEY,
                 value INTEGER NOT NULL
             );",
        )
        .map_err(|e| TyphoonError::Store(format!("Migration: {e}")))?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl BlobStore for SqliteBlobStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(%key, "stored blob");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let value = conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute("DELETE FROM blobs WHERE key = ?1", [key])?;
        Ok(())
    }

    fn increment(&self, counter: &str) -> Result<u64> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        // Single statement: concurrent processes never observe the same value.
        let value: i64 = conn.query_row(
            "INSERT INTO counters (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
            [counter],
            |row| row.get(0),
        )?;
        Ok(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn BlobStore) {
        assert_eq!(store.get("missing").unwrap(), None);
        store.put("k", "v1").unwrap();
        store.put("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert!(store.exists("k").unwrap());
        store.delete("k").unwrap();
        assert!(!store.exists("k").unwrap());

        assert_eq!(store.increment("c").unwrap(), 1);
        assert_eq!(store.increment("c").unwrap(), 2);
        assert_eq!(store.increment("other").unwrap(), 1);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryBlobStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        exercise(&SqliteBlobStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_counter_shared_between_connections() {
        let path = std::env::temp_dir().join(format!("typhoon-store-{}.db", uuid::Uuid::new_v4()));
        let a = SqliteBlobStore::open(&path).unwrap();
        let b = SqliteBlobStore::open(&path).unwrap();
        assert_eq!(a.increment("results").unwrap(), 1);
        assert_eq!(b.increment("results").unwrap(), 2);
        a.put("x", "from-a").unwrap();
        assert_eq!(b.get("x").unwrap().as_deref(), Some("from-a"));
        drop(a);
        drop(b);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unknown_backend() {
        let config = StoreConfig {
            backend: "redis".into(),
            path: String::new(),
        };
        assert!(matches!(open_store(&config), Err(TyphoonError::Config(_))));
    }
}
