//! Task-scheduling entry point.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use typhoon_core::{Result, ValidationError};

use crate::persistence::TaskStore;
use crate::tasks::ScheduledTask;

/// Accepts "invoke `url` at `at`" requests.
#[derive(Clone)]
pub struct TaskScheduler {
    tasks: Arc<TaskStore>,
}

impl TaskScheduler {
    pub fn new(tasks: Arc<TaskStore>) -> Self {
        Self { tasks }
    }

    /// Persist a task; `at` is already resolved to an absolute time.
    pub fn schedule(&self, url: &str, at: DateTime<Utc>) -> Result<ScheduledTask> {
        let task = self.tasks.create(url, at)?;
        tracing::info!("📅 Task scheduled: {} at {} ({})", task.url, task.due_at, task.id);
        Ok(task)
    }
}

/// Resolve a time expression: RFC 3339, `now`, or `+<n><unit>` with unit
/// `s`, `m`, `h` or `d`.
pub fn resolve_at(expr: &str, now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, ValidationError> {
    let expr = expr.trim();
    if expr.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    if let Some(rel) = expr.strip_prefix('+') {
        let invalid = || ValidationError::field("at", format!("Invalid relative time: {expr}"));
        let unit_at = rel.len().checked_sub(1).ok_or_else(invalid)?;
        let (amount, unit) = rel.split_at(unit_at);
        let amount: i64 = amount.parse().map_err(|_| invalid())?;
        let offset = match unit {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        return now.checked_add_signed(offset).ok_or_else(invalid);
    }
    DateTime::parse_from_rfc3339(expr)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ValidationError::field("at", format!("Invalid time '{expr}': {e}")))
}
