//! Kind → operation construction.
//!
//! The registry is a fixed table. A new kind is one [`Operation`] variant plus
//! one row in [`REGISTRY`].

use serde_json::{Map, Value};
use tracing::warn;
use typhoon_core::ValidationError;

use crate::operation::{Append, Collaborators, Notify, Operation, Passthrough, Render};

type Builder = fn(&Map<String, Value>) -> Result<Operation, ValidationError>;

fn build_render(data: &Map<String, Value>) -> Result<Operation, ValidationError> {
    Render::from_data(data).map(Operation::Render)
}

fn build_notify(data: &Map<String, Value>) -> Result<Operation, ValidationError> {
    Notify::from_data(data).map(Operation::Notify)
}

fn build_append(data: &Map<String, Value>) -> Result<Operation, ValidationError> {
    Append::from_data(data).map(Operation::Append)
}

fn build_passthrough(_: &Map<String, Value>) -> Result<Operation, ValidationError> {
    Ok(Operation::Passthrough(Passthrough::default()))
}

static REGISTRY: &[(&str, Builder)] = &[
    (Render::LABEL, build_render),
    (Notify::LABEL, build_notify),
    (Append::LABEL, build_append),
    (Passthrough::LABEL, build_passthrough),
];

/// Builds validated operations from `{kind, data}` specs.
#[derive(Clone)]
pub struct OperationFactory {
    services: Collaborators,
}

impl OperationFactory {
    pub fn new(services: Collaborators) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Collaborators {
        &self.services
    }

    /// Every registered kind, in registry order.
    pub fn available_kinds() -> Vec<&'static str> {
        REGISTRY.iter().map(|(kind, _)| *kind).collect()
    }

    /// Construct the operation `spec` describes.
    ///
    /// Unknown kinds do not fail: they become a [`Passthrough`] and a warning
    /// is logged.
    pub fn build(&self, spec: &Value) -> Result<Operation, ValidationError> {
        let spec = spec
            .as_object()
            .ok_or_else(|| ValidationError::new("Operation spec must be a mapping"))?;
        let kind = match spec.get("kind") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(_) => return Err(ValidationError::field("kind", "Field 'kind' must be a string")),
            None => return Err(ValidationError::field("kind", "Missing 'kind' field")),
        };
        let data = match spec.get("data") {
            Some(Value::Object(data)) => data,
            Some(_) => return Err(ValidationError::field("data", "Field 'data' must be a mapping")),
            None => return Err(ValidationError::field("data", "Missing 'data' field")),
        };

        match REGISTRY.iter().find(|(name, _)| *name == kind) {
            Some((_, builder)) => builder(data),
            None => {
                warn!(kind, "⚠️ Unknown operation kind, falling back to passthrough");
                Ok(Operation::Passthrough(Passthrough::fallback_for(kind)))
            }
        }
    }
}
