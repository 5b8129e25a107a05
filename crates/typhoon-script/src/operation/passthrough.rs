use super::STATUS_OK;
use crate::context::Context;

/// No-op step; also stands in for kinds the factory does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Passthrough {
    /// Kind that was requested when this is a fallback.
    pub requested_kind: Option<String>,
}

impl Passthrough {
    pub const LABEL: &'static str = "passthrough";

    pub fn fallback_for(kind: &str) -> Self {
        Self {
            requested_kind: Some(kind.to_string()),
        }
    }

    pub fn execute<'c>(&self, ctx: &'c mut Context) -> &'c mut Context {
        ctx.append_entry(Self::LABEL, STATUS_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_and_keeps_payload() {
        let mut ctx = Context::new();
        ctx.set_payload("keep");
        Passthrough::fallback_for("frobnicate").execute(&mut ctx);
        assert_eq!(ctx.payload(), "keep");
        assert_eq!(ctx.entries().len(), 1);
        assert_eq!(ctx.entries()[0].label, "passthrough");
    }
}
