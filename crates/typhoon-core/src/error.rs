//! Error taxonomy shared by every Typhoon crate.

use thiserror::Error;

/// Number of diagnostic lines kept when an unexpected error is logged.
pub const DIAGNOSTIC_LINE_LIMIT: usize = 5;

/// Maximum characters kept when an unexpected error is logged.
pub const DIAGNOSTIC_CHAR_LIMIT: usize = 500;

/// A client-caused failure: malformed input that must never be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Offending field or name, when one can be pinned down.
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// Core error type.
#[derive(Debug, Error)]
pub enum TyphoonError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for TyphoonError {
    fn from(e: rusqlite::Error) -> Self {
        TyphoonError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TyphoonError>;

/// Shorten an error description for logging: at most
/// [`DIAGNOSTIC_LINE_LIMIT`] lines and [`DIAGNOSTIC_CHAR_LIMIT`] characters.
pub fn truncate_diagnostic(text: &str) -> String {
    let mut out = text
        .lines()
        .take(DIAGNOSTIC_LINE_LIMIT)
        .collect::<Vec<_>>()
        .join("\n");
    if out.chars().count() > DIAGNOSTIC_CHAR_LIMIT {
        out = out.chars().take(DIAGNOSTIC_CHAR_LIMIT).collect();
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_keeps_field() {
        let err = ValidationError::field("to", "Invalid email address: nope");
        assert_eq!(err.field.as_deref(), Some("to"));
        assert_eq!(err.to_string(), "Invalid email address: nope");

        let wrapped: TyphoonError = err.into();
        assert!(wrapped.to_string().starts_with("Validation failed"));
    }

    #[test]
    fn test_truncate_diagnostic() {
        let long = (0..20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let short = truncate_diagnostic(&long);
        assert_eq!(short.lines().count(), DIAGNOSTIC_LINE_LIMIT);

        let wide = "x".repeat(2000);
        let cut = truncate_diagnostic(&wide);
        assert_eq!(cut.len(), DIAGNOSTIC_CHAR_LIMIT + 3);
        assert!(cut.ends_with("..."));
    }
}
