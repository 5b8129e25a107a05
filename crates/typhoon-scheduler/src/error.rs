//! Executor error types.

use thiserror::Error;
use typhoon_core::TyphoonError;

use crate::http::TransportError;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The scheduled URL could not be reached; the task stays pending.
    #[error("Transport error for task {task_id} ({url}): {source}")]
    Transport {
        task_id: String,
        url: String,
        #[source]
        source: TransportError,
    },

    /// One run finished with transport failures on some tasks.
    #[error("{} task(s) failed with transport errors", .0.len())]
    Retryable(Vec<ExecutorError>),

    #[error(transparent)]
    Store(#[from] TyphoonError),
}

impl ExecutorError {
    /// Whether a later attempt of the same run may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutorError::Transport { .. } | ExecutorError::Retryable(_) => true,
            ExecutorError::Store(TyphoonError::Store(_)) => true,
            _ => false,
        }
    }
}
