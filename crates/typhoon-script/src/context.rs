//! Run-scoped accumulator threaded through every operation of one pipeline run.

use serde::{Deserialize, Serialize};

/// One audit line appended by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub status: String,
}

/// Mutable pipeline state: ordered audit entries plus a single text payload.
///
/// Created fresh per run and never shared between runs.
#[derive(Debug, Default)]
pub struct Context {
    entries: Vec<Entry>,
    payload: String,
}

/// Immutable view of a finished [`Context`], ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    pub payload: String,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an audit entry.
    pub fn append_entry(&mut self, label: impl Into<String>, status: impl Into<String>) -> &mut Self {
        self.entries.push(Entry {
            label: label.into(),
            status: status.into(),
        });
        self
    }

    /// Replace the payload.
    pub fn set_payload(&mut self, text: impl Into<String>) -> &mut Self {
        self.payload = text.into();
        self
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
