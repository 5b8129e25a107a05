//! Pipeline error types.

use thiserror::Error;
use typhoon_core::{TyphoonError, ValidationError};

/// Mail transport failure inside the notify operation.
#[derive(Debug, Error)]
#[error("Email delivery failed: {message}")]
pub struct DeliveryError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DeliveryError {
    pub fn wrap<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }
}

/// Template resolution failure.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' is not allowed")]
    NotAllowed(String),

    #[error("Invalid template path: template '{name}' not found at {path}")]
    Missing { name: String, path: String },

    #[error("Template '{name}' could not be read: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Anything an operation can fail with, at construction or execution.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Pipeline-level failure, surfaced whole to the caller.
#[derive(Debug, Error)]
pub enum ScriptExecutionError {
    #[error("Invalid encoding: {0}")]
    Encoding(String),

    /// Structural problem with the document; the message names the step when there is one.
    #[error("{0}")]
    Structure(String),

    #[error("Failed at step '{step}': {source}")]
    Step {
        step: String,
        #[source]
        source: OperationError,
    },

    #[error("Script unavailable: {0}")]
    Store(#[from] TyphoonError),

    #[error("Failed to serialize context: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScriptExecutionError {
    /// Name of the failing step, if the failure happened inside one.
    pub fn step(&self) -> Option<&str> {
        match self {
            ScriptExecutionError::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}
