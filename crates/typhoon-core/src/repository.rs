//! Repositories layered over a [`BlobStore`]: execution results and generated scripts.
//! Each hands out monotonically issued decimal ids from its own counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Result, TyphoonError};
use crate::store::BlobStore;

const RESULT_COUNTER: &str = "result_counter";
const SCRIPT_COUNTER: &str = "script_counter";

/// Outcome of one scheduled URL invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: String,
    pub url: String,
    pub status_code: u16,
    pub body: String,
    pub executed_at: DateTime<Utc>,
}

/// Append-only store of execution outcomes.
#[derive(Clone)]
pub struct ResultStore {
    store: Arc<dyn BlobStore>,
}

impl ResultStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Persist a record and return its generated key.
    pub fn put(&self, record: &ResultRecord) -> Result<String> {
        let id = self.store.increment(RESULT_COUNTER)?.to_string();
        self.store.put(&Self::key(&id), &serde_json::to_string(record)?)?;
        tracing::debug!(result_id = %id, task_id = %record.task_id, "result stored");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<ResultRecord>> {
        match self.store.get(&Self::key(id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Like [`ResultStore::get`] but a missing record is an error.
    pub fn find(&self, id: &str) -> Result<ResultRecord> {
        self.get(id)?
            .ok_or_else(|| TyphoonError::NotFound(format!("Result with id '{id}' not found")))
    }

    fn key(id: &str) -> String {
        format!("result:{id}")
    }
}

/// Storage for generated script documents (kept as encoded text).
#[derive(Clone)]
pub struct ScriptRepository {
    store: Arc<dyn BlobStore>,
}

impl ScriptRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, script: &str) -> Result<String> {
        let id = self.store.increment(SCRIPT_COUNTER)?.to_string();
        self.store.put(&Self::key(&id), script)?;
        tracing::info!(script_id = %id, "script stored");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<String>> {
        self.store.get(&Self::key(id))
    }

    pub fn find(&self, id: &str) -> Result<String> {
        self.get(id)?
            .ok_or_else(|| TyphoonError::NotFound(format!("Script with id '{id}' not found")))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(&Self::key(id))
    }

    fn key(id: &str) -> String {
        format!("script:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;

    fn record(task_id: &str) -> ResultRecord {
        ResultRecord {
            task_id: task_id.into(),
            url: "http://example.com/hook".into(),
            status_code: 200,
            body: "ok".into(),
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn test_result_ids_are_monotonic_digits() {
        let results = ResultStore::new(Arc::new(MemoryBlobStore::new()));
        let first = results.put(&record("a")).unwrap();
        let second = results.put(&record("b")).unwrap();
        assert_eq!(first, "1");
        assert_eq!(second, "2");
        assert!(first.chars().all(|c| c.is_ascii_digit()));

        let loaded = results.find(&second).unwrap();
        assert_eq!(loaded.task_id, "b");
        assert_eq!(loaded.status_code, 200);
    }

    #[test]
    fn test_missing_result() {
        let results = ResultStore::new(Arc::new(MemoryBlobStore::new()));
        assert!(results.get("42").unwrap().is_none());
        let err = results.find("42").unwrap_err();
        assert!(matches!(err, TyphoonError::NotFound(_)));
    }

    #[test]
    fn test_repositories_share_a_store_without_collisions() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let results = ResultStore::new(store.clone());
        let scripts = ScriptRepository::new(store);

        let result_id = results.put(&record("t")).unwrap();
        let script_id = scripts.save("{\"a\":{\"kind\":\"passthrough\"}}").unwrap();
        assert_eq!(result_id, script_id);

        assert_eq!(results.find(&result_id).unwrap().task_id, "t");
        assert!(scripts.find(&script_id).unwrap().contains("passthrough"));

        scripts.delete(&script_id).unwrap();
        let err = scripts.find(&script_id).unwrap_err();
        assert!(err.to_string().contains("Script with id '1' not found"));
    }
}
