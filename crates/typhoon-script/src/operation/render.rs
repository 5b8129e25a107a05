use serde_json::{Map, Value};
use typhoon_core::ValidationError;

use super::{STATUS_OK, require_keys, string_field};
use crate::context::Context;
use crate::error::OperationError;
use crate::template::{ALLOWED_TEMPLATES, TemplateRenderer, is_allowed};

/// Renders an allow-listed template and replaces the payload with the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Render {
    template: String,
    template_data: Value,
}

impl Render {
    pub const LABEL: &'static str = "render";

    pub fn from_data(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        require_keys(data, &["template", "template_data"])?;
        let template = string_field(data, "template")?;
        if !is_allowed(&template) {
            return Err(ValidationError::field(
                "template",
                format!(
                    "Template '{template}' is not allowed. Allowed templates: {}",
                    ALLOWED_TEMPLATES.join(", ")
                ),
            ));
        }
        let template_data = match data.get("template_data") {
            Some(v @ Value::Object(_)) => v.clone(),
            _ => {
                return Err(ValidationError::field(
                    "template_data",
                    "Data key 'template_data' must be a mapping",
                ));
            }
        };
        Ok(Self {
            template,
            template_data,
        })
    }

    pub fn execute<'c>(
        &self,
        ctx: &'c mut Context,
        templates: &TemplateRenderer,
    ) -> Result<&'c mut Context, OperationError> {
        let rendered = templates.render(&self.template, &self.template_data)?;
        Ok(ctx.append_entry(Self::LABEL, STATUS_OK).set_payload(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::testing::{RecordingMailer, services};
    use serde_json::json;
    use std::sync::Arc;

    fn build(v: Value) -> Result<Render, ValidationError> {
        Render::from_data(v.as_object().unwrap())
    }

    #[test]
    fn test_path_traversal_is_validation_error() {
        for name in ["../../etc/passwd", "../config/database", "malicious"] {
            let err = build(json!({"template": name, "template_data": {}})).unwrap_err();
            assert!(err.message.contains("not allowed"));
            assert!(err.message.contains("Allowed templates: email, report, reminder"));
        }
    }

    #[test]
    fn test_every_allowed_template_constructs() {
        for name in ALLOWED_TEMPLATES {
            assert!(build(json!({"template": name, "template_data": {}})).is_ok());
        }
    }

    #[test]
    fn test_requires_both_keys() {
        let err = build(json!({"template_data": {}})).unwrap_err();
        assert!(err.message.contains("template"));
        let err = build(json!({"template": "email"})).unwrap_err();
        assert!(err.message.contains("template_data"));
        let err = build(json!({"template": "email", "template_data": "x"})).unwrap_err();
        assert!(err.message.contains("mapping"));
    }

    #[test]
    fn test_replaces_payload() {
        let services = services(Arc::new(RecordingMailer::default()));
        let op = build(json!({"template": "email", "template_data": {"name": "World"}})).unwrap();
        let mut ctx = Context::new();
        ctx.set_payload("discarded");
        op.execute(&mut ctx, &services.templates).unwrap();
        assert_eq!(ctx.payload(), "Hello World");
        assert_eq!(ctx.entries()[0].label, "render");
    }

    #[test]
    fn test_missing_template_fails_at_execute() {
        let services = services(Arc::new(RecordingMailer::default()));
        let op = build(json!({"template": "reminder", "template_data": {}})).unwrap();
        let mut ctx = Context::new();
        let err = op.execute(&mut ctx, &services.templates).unwrap_err();
        assert!(matches!(err, OperationError::Template(_)));
        assert!(ctx.entries().is_empty());
    }
}
