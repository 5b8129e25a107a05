//! Pipeline engine: validate a script document, then run its steps in order
//! against one fresh [`Context`].
//!
//! Steps run in the document's insertion order. A failing step aborts the run;
//! effects of earlier steps (a sent email) are not compensated.

use serde_json::{Map, Value};
use tracing::{debug, error, info};
use typhoon_core::ScriptRepository;

use crate::context::{Context, Snapshot};
use crate::error::{OperationError, ScriptExecutionError};
use crate::factory::OperationFactory;

/// A script either already decoded or still as encoded text.
#[derive(Debug, Clone)]
pub enum ScriptInput {
    Document(Value),
    Text(String),
}

impl From<Value> for ScriptInput {
    fn from(v: Value) -> Self {
        ScriptInput::Document(v)
    }
}

impl From<String> for ScriptInput {
    fn from(s: String) -> Self {
        ScriptInput::Text(s)
    }
}

impl From<&str> for ScriptInput {
    fn from(s: &str) -> Self {
        ScriptInput::Text(s.to_string())
    }
}

impl ScriptInput {
    fn into_document(self) -> Result<Value, ScriptExecutionError> {
        match self {
            ScriptInput::Document(v) => Ok(v),
            ScriptInput::Text(text) => serde_json::from_str(&text)
                .map_err(|e| ScriptExecutionError::Encoding(e.to_string())),
        }
    }
}

pub struct PipelineEngine {
    factory: OperationFactory,
}

impl PipelineEngine {
    pub fn new(factory: OperationFactory) -> Self {
        Self { factory }
    }

    /// Run a script and return the serialized final context.
    pub async fn run(&self, script: impl Into<ScriptInput>) -> Result<String, ScriptExecutionError> {
        Ok(self.run_snapshot(script).await?.to_json()?)
    }

    /// Run a script previously stored under `id`.
    pub async fn run_stored(
        &self,
        scripts: &ScriptRepository,
        id: &str,
    ) -> Result<String, ScriptExecutionError> {
        let text = scripts.find(id)?;
        info!(script_id = %id, "▶️ Running stored script");
        self.run(text).await
    }

    /// Run a script and return the final context without serializing it.
    pub async fn run_snapshot(
        &self,
        script: impl Into<ScriptInput>,
    ) -> Result<Snapshot, ScriptExecutionError> {
        let document = script.into().into_document()?;
        let steps = validate(&document)?;
        info!("Executing script with {} steps", steps.len());

        let mut ctx = Context::new();
        for (name, spec) in steps {
            debug!(step = %name, "executing step");
            let op = self
                .factory
                .build(spec)
                .map_err(|e| step_failed(name, e.into()))?;
            op.execute(&mut ctx, self.factory.services())
                .await
                .map_err(|e| step_failed(name, e))?;
        }
        Ok(ctx.snapshot())
    }
}

fn step_failed(step: &str, source: OperationError) -> ScriptExecutionError {
    error!(step, "❌ Script failed: {source}");
    ScriptExecutionError::Step {
        step: step.to_string(),
        source,
    }
}

/// Structural checks on the whole document before anything runs.
fn validate(document: &Value) -> Result<&Map<String, Value>, ScriptExecutionError> {
    let steps = document
        .as_object()
        .ok_or_else(|| ScriptExecutionError::Structure("Script must be a mapping".into()))?;
    if steps.is_empty() {
        return Err(ScriptExecutionError::Structure("Script cannot be empty".into()));
    }
    for (name, spec) in steps {
        let spec = spec.as_object().ok_or_else(|| {
            ScriptExecutionError::Structure(format!("Step '{name}' must be a mapping"))
        })?;
        if !spec.contains_key("kind") {
            return Err(ScriptExecutionError::Structure(format!(
                "Step '{name}' missing 'kind' field"
            )));
        }
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::testing::{RecordingMailer, services};
    use serde_json::json;
    use std::sync::Arc;
    use typhoon_core::MemoryBlobStore;

    fn engine_with(mailer: Arc<RecordingMailer>) -> PipelineEngine {
        PipelineEngine::new(OperationFactory::new(services(mailer)))
    }

    fn engine() -> PipelineEngine {
        engine_with(Arc::new(RecordingMailer::default()))
    }

    fn append(text: &str) -> Value {
        json!({"kind": "append", "data": {"text": text}})
    }

    #[tokio::test]
    async fn test_appends_fold_in_order() {
        let snap = engine()
            .run_snapshot(json!({"first": append("A"), "second": append("B")}))
            .await
            .unwrap();
        assert_eq!(snap.payload, "AB");
        assert_eq!(snap.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_declared_order_not_key_order() {
        let text = r#"{"c": {"kind": "append", "data": {"text": "1"}},
                       "a": {"kind": "append", "data": {"text": "2"}},
                       "b": {"kind": "append", "data": {"text": "3"}}}"#;
        let snap = engine().run_snapshot(text).await.unwrap();
        assert_eq!(snap.payload, "123");
    }

    #[tokio::test]
    async fn test_failing_step_aborts_and_is_named() {
        let mailer = Arc::new(RecordingMailer::default());
        let script = json!({
            "good": append("x"),
            "bad": {"kind": "append", "data": {}},
            "later": {"kind": "notify", "data": {"to": "a@example.com", "subject": "s"}},
        });
        let err = engine_with(mailer.clone()).run(script).await.unwrap_err();
        assert_eq!(err.step(), Some("bad"));
        assert!(err.to_string().starts_with("Failed at step 'bad'"));
        assert!(err.to_string().contains("text"));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_a_logged_noop() {
        let snap = engine()
            .run_snapshot(json!({"x": {"kind": "frobnicate", "data": {}}}))
            .await
            .unwrap();
        assert_eq!(snap.payload, "");
        assert_eq!(snap.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let e = engine();
        let err = e.run("{not json").await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid encoding"));

        let err = e.run(json!([1, 2])).await.unwrap_err();
        assert_eq!(err.to_string(), "Script must be a mapping");

        let err = e.run(json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Script cannot be empty");

        let err = e.run(json!({"s1": "append"})).await.unwrap_err();
        assert_eq!(err.to_string(), "Step 's1' must be a mapping");

        let err = e.run(json!({"s1": append("a"), "s2": {"data": {}}})).await.unwrap_err();
        assert_eq!(err.to_string(), "Step 's2' missing 'kind' field");
        assert_eq!(err.step(), None);
    }

    #[tokio::test]
    async fn test_render_then_notify() {
        let mailer = Arc::new(RecordingMailer::default());
        let script = json!({
            "render": {"kind": "render", "data": {"template": "email", "template_data": {"name": "World"}}},
            "send": {"kind": "notify", "data": {"to": "user@example.com", "subject": "Hi"}},
        });
        let snap = engine_with(mailer.clone()).run_snapshot(script).await.unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "Hello World");
        assert!(snap.payload.contains("Subject: Hi"));
        assert_eq!(snap.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_delivery_failure_surfaces_as_step_error() {
        let mailer = Arc::new(RecordingMailer {
            fail_with: Some("Connection refused".into()),
            ..Default::default()
        });
        let script = json!({
            "body": append("hello"),
            "mail": {"kind": "notify", "data": {"to": "user@example.com", "subject": "Hi"}},
        });
        let err = engine_with(mailer).run(script).await.unwrap_err();
        assert_eq!(err.step(), Some("mail"));
        assert!(err.to_string().contains("Email delivery failed"));
    }

    #[tokio::test]
    async fn test_serialized_context_shape() {
        let out = engine().run(json!({"a": append("z")})).await.unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["payload"], "z");
        assert_eq!(v["entries"][0]["label"], "append");
    }

    #[tokio::test]
    async fn test_run_stored() {
        let scripts = ScriptRepository::new(Arc::new(MemoryBlobStore::new()));
        let id = scripts.save(&json!({"a": append("stored")}).to_string()).unwrap();
        let out = engine().run_stored(&scripts, &id).await.unwrap();
        assert!(out.contains("stored"));

        let err = engine().run_stored(&scripts, "99").await.unwrap_err();
        assert!(err.to_string().contains("Script with id '99' not found"));
    }
}
