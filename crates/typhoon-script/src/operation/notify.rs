use serde_json::{Map, Value};
use typhoon_core::ValidationError;

use super::{STATUS_OK, require_keys, string_field};
use crate::context::Context;
use crate::email::is_valid_address;
use crate::error::OperationError;
use crate::mailer::{Mailer, OutgoingMail};

/// Mails the current payload to `to`, then stores the sent message as payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notify {
    to: String,
    subject: String,
}

impl Notify {
    pub const LABEL: &'static str = "notify";

    pub fn from_data(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        require_keys(data, &["to", "subject"])?;
        let to = string_field(data, "to")?;
        if !is_valid_address(&to) {
            return Err(ValidationError::field("to", format!("Invalid email address: {to}")));
        }
        Ok(Self {
            to,
            subject: string_field(data, "subject")?,
        })
    }

    pub async fn execute<'c>(
        &self,
        ctx: &'c mut Context,
        mailer: &dyn Mailer,
    ) -> Result<&'c mut Context, OperationError> {
        let mail = OutgoingMail {
            to: self.to.clone(),
            subject: self.subject.clone(),
            body: ctx.payload().to_string(),
        };
        let sent = mailer.send(&mail).await.map_err(|e| {
            tracing::error!(to = %self.to, "Failed to send email: {e}");
            e
        })?;
        Ok(ctx.append_entry(Self::LABEL, STATUS_OK).set_payload(sent))
    }
}
