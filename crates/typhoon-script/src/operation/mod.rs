//! Operations, the typed steps of a script.
//!
//! The variant set is closed: every kind is one struct here plus one entry in
//! the factory registry. Each variant validates its `data` block when it is
//! constructed, so `execute` only ever runs on well-formed commands.

mod append;
mod notify;
mod passthrough;
mod render;

pub use append::Append;
pub use notify::Notify;
pub use passthrough::Passthrough;
pub use render::Render;

use serde_json::{Map, Value};
use std::sync::Arc;
use typhoon_core::ValidationError;

use crate::context::Context;
use crate::error::OperationError;
use crate::mailer::Mailer;
use crate::template::TemplateRenderer;

/// Status recorded for a step that finished normally.
pub const STATUS_OK: &str = "ok";

/// Shared, read-only services operations call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub templates: TemplateRenderer,
    pub mailer: Arc<dyn Mailer>,
}

/// A constructed, validated step.
#[derive(Debug, Clone)]
pub enum Operation {
    Render(Render),
    Notify(Notify),
    Append(Append),
    Passthrough(Passthrough),
}

impl Operation {
    /// Label written to the context's audit log.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Render(_) => Render::LABEL,
            Operation::Notify(_) => Notify::LABEL,
            Operation::Append(_) => Append::LABEL,
            Operation::Passthrough(_) => Passthrough::LABEL,
        }
    }

    /// Run against the shared context, handing the same context back.
    pub async fn execute<'c>(
        &self,
        ctx: &'c mut Context,
        services: &Collaborators,
    ) -> Result<&'c mut Context, OperationError> {
        match self {
            Operation::Render(op) => op.execute(ctx, &services.templates),
            Operation::Notify(op) => op.execute(ctx, services.mailer.as_ref()).await,
            Operation::Append(op) => Ok(op.execute(ctx)),
            Operation::Passthrough(op) => Ok(op.execute(ctx)),
        }
    }
}

/// Fail unless every key is present; all missing keys are listed.
pub(crate) fn require_keys(data: &Map<String, Value>, keys: &[&str]) -> Result<(), ValidationError> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| !data.contains_key(*k))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        let list = missing.join(", ");
        Err(ValidationError::field(
            list.clone(),
            format!("Missing required data keys: {list}"),
        ))
    }
}

pub(crate) fn string_field(data: &Map<String, Value>, key: &str) -> Result<String, ValidationError> {
    match data.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::field(key, format!("Data key '{key}' must be a string"))),
        None => Err(ValidationError::field(key, format!("Missing required data keys: {key}"))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_require_keys_lists_all_missing() {
        let err = require_keys(&map(json!({})), &["field1", "field2"]).unwrap_err();
        assert!(err.message.contains("field1, field2"));

        let err = require_keys(&map(json!({"field1": 1})), &["field1", "field2"]).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("field2"));

        assert!(require_keys(&map(json!({"field1": 1, "field2": 2, "extra": 3})), &["field1", "field2"]).is_ok());
    }

    #[test]
    fn test_string_field_shape() {
        let data = map(json!({"text": 5}));
        assert!(string_field(&data, "text").unwrap_err().message.contains("must be a string"));
    }
}
