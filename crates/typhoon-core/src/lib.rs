//! # Typhoon Core
//!
//! Configuration, the shared error taxonomy, and the key-value blob store
//! with the repositories built on it (execution results, generated scripts).

pub mod config;
pub mod error;
pub mod repository;
pub mod store;

pub use config::TyphoonConfig;
pub use error::{Result, TyphoonError, ValidationError};
pub use repository::{ResultRecord, ResultStore, ScriptRepository};
pub use store::{BlobStore, MemoryBlobStore, SqliteBlobStore};
