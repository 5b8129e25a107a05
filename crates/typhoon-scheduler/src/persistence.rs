//! SQLite persistence for scheduled tasks.
//!
//! Several executor processes may share one database file. Ownership of a task
//! is taken with a single conditional `UPDATE` (the claim), so at most one
//! executor acts on a task per lease period.

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use typhoon_core::{Result, TyphoonError};

use crate::tasks::{ScheduledTask, timestamp, validate_url};

const COLUMNS: &str = "id, url, due_at, created_at, updated_at, completed_at, \
                       response_code, result_ref, claimed_by, claimed_at, attempts";

/// Task table access. One connection per store; share the store via `Arc`.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    /// Open or create the task database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                due_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT,
                response_code INTEGER,
                result_ref TEXT,
                claimed_by TEXT,
                claimed_at TEXT,
                attempts INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed_at);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TyphoonError::Store("task store lock poisoned".into()))
    }

    /// Persist a new pending task. The URL must be absolute http/https.
    pub fn create(&self, url: &str, due_at: DateTime<Utc>) -> Result<ScheduledTask> {
        validate_url(url)?;
        let task = ScheduledTask::new(url, due_at);
        self.conn()?.execute(
            "INSERT INTO tasks (id, url, due_at, created_at, updated_at, attempts)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                task.id,
                task.url,
                timestamp(task.due_at),
                timestamp(task.created_at),
                timestamp(task.updated_at),
            ],
        )?;
        tracing::debug!(task_id = %task.id, url = %task.url, "task created");
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Result<Option<ScheduledTask>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Due, incomplete tasks, oldest first.
    pub fn pending(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM tasks
             WHERE completed_at IS NULL AND due_at <= ?1
             ORDER BY due_at"
        ))?;
        let tasks = stmt
            .query_map(params![timestamp(now)], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Take ownership of a task for `owner`. Succeeds only when the task is
    /// incomplete and unclaimed, or its claim is older than `lease`.
    pub fn claim(&self, id: &str, owner: &str, now: DateTime<Utc>, lease: Duration) -> Result<bool> {
        let now_ts = timestamp(now);
        let cutoff = now.checked_sub_signed(lease).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let changed = self.conn()?.execute(
            "UPDATE tasks
             SET claimed_by = ?2, claimed_at = ?3, updated_at = ?3, attempts = attempts + 1
             WHERE id = ?1 AND completed_at IS NULL
               AND (claimed_at IS NULL OR claimed_at < ?4)",
            params![id, owner, now_ts, timestamp(cutoff)],
        )?;
        Ok(changed == 1)
    }

    /// Mark a claimed task completed. Returns false when `owner` no longer
    /// holds the claim or the task is already complete.
    pub fn complete(
        &self,
        id: &str,
        owner: &str,
        response_code: u16,
        result_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now_ts = timestamp(now);
        let changed = self.conn()?.execute(
            "UPDATE tasks
             SET completed_at = ?3, updated_at = ?3, response_code = ?4, result_ref = ?5
             WHERE id = ?1 AND claimed_by = ?2 AND completed_at IS NULL",
            params![id, owner, now_ts, response_code, result_ref],
        )?;
        Ok(changed == 1)
    }

    /// Drop `owner`'s claim so the task is picked up again on a later run.
    pub fn release(&self, id: &str, owner: &str) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE tasks
             SET claimed_by = NULL, claimed_at = NULL, updated_at = ?3
             WHERE id = ?1 AND claimed_by = ?2 AND completed_at IS NULL",
            params![id, owner, timestamp(Utc::now())],
        )?;
        Ok(changed == 1)
    }

    /// Every task, newest due time first.
    pub fn list(&self) -> Result<Vec<ScheduledTask>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tasks ORDER BY due_at DESC"))?;
        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}

#[cfg(test)]
impl TaskStore {
    /// Leave the connection lock poisoned so every later call fails.
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.conn.lock();
            panic!("poisoning task store");
        }));
    }
}

fn parse_ts(idx: usize, text: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|text| parse_ts(idx, text))
        .transpose()
}

fn row_to_task(row: &Row) -> rusqlite::Result<ScheduledTask> {
    Ok(ScheduledTask {
        id: row.get(0)?,
        url: row.get(1)?,
        due_at: parse_ts(2, row.get(2)?)?,
        created_at: parse_ts(3, row.get(3)?)?,
        updated_at: parse_ts(4, row.get(4)?)?,
        completed_at: opt_ts(row, 5)?,
        response_code: row.get(6)?,
        result_ref: row.get(7)?,
        claimed_by: row.get(8)?,
        claimed_at: opt_ts(row, 9)?,
        attempts: row.get(10)?,
    })
}
