//! # Typhoon Script
//!
//! Declarative script pipelines. A script is an ordered mapping of step name
//! to `{kind, data}`; each step becomes a validated [`Operation`] and runs
//! against one shared [`Context`].
//!
//! ## Operation kinds
//! - `render`: fill an allow-listed template, replacing the payload
//! - `append`: append text to the payload
//! - `notify`: mail the payload, keep the sent message as payload
//! - `passthrough`: no-op; also the fallback for unknown kinds

pub mod context;
pub mod email;
pub mod engine;
pub mod error;
pub mod factory;
pub mod generator;
pub mod mailer;
pub mod operation;
pub mod template;

pub use context::{Context, Entry, Snapshot};
pub use engine::{PipelineEngine, ScriptInput};
pub use error::{DeliveryError, OperationError, ScriptExecutionError, TemplateError};
pub use factory::OperationFactory;
pub use generator::{GenerationError, ScriptGenerator};
pub use mailer::{Mailer, OutgoingMail, SmtpMailer};
pub use operation::{Collaborators, Operation};
pub use template::{FileTemplates, TemplateRenderer, TemplateSource};
