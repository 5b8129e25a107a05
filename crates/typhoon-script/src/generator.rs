//! Script generation from high-level actions.
//!
//! An action request `{action, data}` expands into a full script document,
//! which is stored as JSON text. Operation data is checked when the stored
//! script runs, not here.

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{error, info};
use typhoon_core::{ScriptRepository, TyphoonError};

/// Actions [`ScriptGenerator::build`] understands.
pub const SUPPORTED_ACTIONS: &[&str] = &["send_email"];

const DEFAULT_EMAIL_TEMPLATE: &str = "email";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Unknown action '{action}'. Supported actions: {}", SUPPORTED_ACTIONS.join(", "))]
    UnknownAction { action: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] TyphoonError),
}

pub struct ScriptGenerator {
    scripts: ScriptRepository,
}

impl ScriptGenerator {
    pub fn new(scripts: ScriptRepository) -> Self {
        Self { scripts }
    }

    /// Generate and store the script for `request`, returning its id.
    pub fn build(&self, request: &Value) -> Result<String, GenerationError> {
        let result = self.generate(request).and_then(|script| {
            let id = self.scripts.save(&script.to_string())?;
            info!(script_id = %id, "📝 Script generated");
            Ok(id)
        });
        if let Err(e) = &result {
            error!("Script generation failed: {e}");
        }
        result
    }

    /// Stored script text for `id`.
    pub fn get(&self, id: &str) -> Result<String, GenerationError> {
        Ok(self.scripts.find(id)?)
    }

    fn generate(&self, request: &Value) -> Result<Value, GenerationError> {
        let action = request.get("action").and_then(Value::as_str).unwrap_or_default();
        let empty = Map::new();
        let data = match request.get("data") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(data)) => data,
            Some(_) => return Err(GenerationError::InvalidRequest("'data' must be a mapping".into())),
        };
        match action {
            "send_email" => Ok(send_email_script(data)),
            other => Err(GenerationError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }
}

/// `render` into the email body, then `notify` the recipient.
fn send_email_script(data: &Map<String, Value>) -> Value {
    let text = |key: &str| data.get(key).cloned().unwrap_or_else(|| json!(""));
    let template = data
        .get("template")
        .cloned()
        .unwrap_or_else(|| json!(DEFAULT_EMAIL_TEMPLATE));
    let template_data = data
        .get("template_data")
        .cloned()
        .unwrap_or_else(|| Value::Object(data.clone()));

    json!({
        "render_body": {
            "kind": "render",
            "data": {"template": template, "template_data": template_data},
        },
        "send_email": {
            "kind": "notify",
            "data": {"to": text("to"), "subject": text("subject")},
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use typhoon_core::MemoryBlobStore;

    fn generator() -> ScriptGenerator {
        ScriptGenerator::new(ScriptRepository::new(Arc::new(MemoryBlobStore::new())))
    }

    fn request() -> Value {
        json!({
            "action": "send_email",
            "data": {"to": "test@example.com", "subject": "Test Email", "name": "Test User"},
        })
    }

    #[test]
    fn test_generates_and_stores() {
        let g = generator();
        let id1 = g.build(&request()).unwrap();
        let id2 = g.build(&request()).unwrap();
        assert!(id1.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(id2.parse::<u64>().unwrap(), id1.parse::<u64>().unwrap() + 1);

        let script = g.get(&id1).unwrap();
        assert!(script.contains("test@example.com"));
        assert!(script.contains("Test Email"));
    }

    #[test]
    fn test_render_precedes_notify() {
        let g = generator();
        let id = g.build(&request()).unwrap();
        let doc: Value = serde_json::from_str(&g.get(&id).unwrap()).unwrap();
        let kinds: Vec<&str> = doc
            .as_object()
            .unwrap()
            .values()
            .map(|step| step["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["render", "notify"]);
        assert_eq!(doc["render_body"]["data"]["template"], "email");
        assert_eq!(doc["render_body"]["data"]["template_data"]["name"], "Test User");
    }

    #[test]
    fn test_missing_data_is_tolerated() {
        let g = generator();
        assert!(g.build(&json!({"action": "send_email", "data": {}})).is_ok());
        assert!(g.build(&json!({"action": "send_email"})).is_ok());
    }

    #[test]
    fn test_unknown_action() {
        let err = generator()
            .build(&json!({"action": "unknown_action", "data": {}}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown action 'unknown_action'. Supported actions: send_email"
        );
    }

    #[test]
    fn test_get_missing() {
        let err = generator().get("999").unwrap_err();
        assert!(err.to_string().contains("Script with id '999' not found"));
    }
}
