//! Mail transport: async SMTP via lettre.

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use typhoon_core::config::EmailConfig;

use crate::error::DeliveryError;

/// A message to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Sends mail and returns the canonical text of what was sent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<String, DeliveryError>;
}

/// Build the RFC 5322 message for `mail`.
pub fn build_message(from: &Mailbox, mail: &OutgoingMail) -> Result<Message, DeliveryError> {
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| DeliveryError::wrap(format!("Invalid to: {}", mail.to), e))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| DeliveryError::wrap("Build email", e))
}

/// Canonical string form of a built message (headers + encoded body).
pub fn canonical(message: &Message) -> String {
    String::from_utf8_lossy(&message.formatted()).into_owned()
}

/// SMTP mailer.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, DeliveryError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| DeliveryError::wrap(format!("Invalid from: {}", config.from), e))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| DeliveryError::wrap("SMTP relay", e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        builder = builder.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<String, DeliveryError> {
        let message = build_message(&self.from, mail)?;
        let text = canonical(&message);
        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::wrap("SMTP send", e))?;
        tracing::info!("📤 Email sent to: {}", mail.to);
        Ok(text)
    }
}
