//! Scheduled task entity: "invoke this URL once at or after `due_at`".

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use typhoon_core::ValidationError;

/// A persisted deferred invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub url: String,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once, never cleared.
    pub completed_at: Option<DateTime<Utc>>,
    pub response_code: Option<u16>,
    /// Key of the stored result record.
    pub result_ref: Option<String>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Number of claims taken on this task.
    pub attempts: u32,
}

impl ScheduledTask {
    /// Fresh pending task with a generated id.
    pub fn new(url: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            due_at,
            created_at: now,
            updated_at: now,
            completed_at: None,
            response_code: None,
            result_ref: None,
            claimed_by: None,
            claimed_at: None,
            attempts: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.completed_at.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.due_at <= now
    }
}

/// Accept only absolute http/https URLs with a host.
pub fn validate_url(url: &str) -> Result<Url, ValidationError> {
    let parsed =
        Url::parse(url).map_err(|e| ValidationError::field("url", format!("Invalid URL '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::field(
            "url",
            format!("Invalid URL '{url}': scheme must be http or https"),
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::field("url", format!("Invalid URL '{url}': missing host")));
    }
    Ok(parsed)
}

/// Fixed-width UTC timestamp; lexical order matches time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
