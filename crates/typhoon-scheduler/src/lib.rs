//! # Typhoon Scheduler
//!
//! Deferred URL invocation. Tasks live in SQLite; an executor claims each due
//! task atomically, performs one GET, stores the response in the result store
//! and marks the task complete.
//!
//! ## Task lifecycle
//! - `pending`: created, `completed_at` unset
//! - `claimed`: owned by one executor until its lease expires
//! - `completed`: terminal; any HTTP status counts

pub mod engine;
pub mod error;
pub mod executor;
pub mod http;
pub mod persistence;
pub mod scheduler;
pub mod tasks;

pub use engine::{RetryPolicy, RetryStats, run_with_retry, spawn_executor};
pub use error::ExecutorError;
pub use executor::{ExecutorSettings, RunSummary, TaskExecutor};
pub use http::{HttpClient, HttpResponse, ReqwestClient, TransportError};
pub use persistence::TaskStore;
pub use scheduler::{TaskScheduler, resolve_at};
pub use tasks::ScheduledTask;
