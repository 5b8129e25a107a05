use serde_json::{Map, Value};
use typhoon_core::ValidationError;

use super::{STATUS_OK, require_keys, string_field};
use crate::context::Context;

/// Appends `text` to the current payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Append {
    text: String,
}

impl Append {
    pub const LABEL: &'static str = "append";

    pub fn from_data(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        require_keys(data, &["text"])?;
        Ok(Self {
            text: string_field(data, "text")?,
        })
    }

    pub fn execute<'c>(&self, ctx: &'c mut Context) -> &'c mut Context {
        let joined = format!("{}{}", ctx.payload(), self.text);
        ctx.append_entry(Self::LABEL, STATUS_OK).set_payload(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_appends_in_order() {
        let a = Append::from_data(json!({"text": "A"}).as_object().unwrap()).unwrap();
        let b = Append::from_data(json!({"text": "B"}).as_object().unwrap()).unwrap();
        let mut ctx = Context::new();
        b.execute(a.execute(&mut ctx));
        assert_eq!(ctx.payload(), "AB");
        assert_eq!(ctx.entries().len(), 2);
    }

    #[test]
    fn test_requires_text() {
        let err = Append::from_data(json!({}).as_object().unwrap()).unwrap_err();
        assert!(err.message.contains("text"));
    }
}
