//! Task executor: one polling pass over due tasks.
//!
//! Per task: claim → GET → store result → complete. Any HTTP response counts
//! as delivered, whatever its status. Transport failures release the claim and
//! fail the run as retryable once every other task has been attempted.

use chrono::Utc;
use futures::{StreamExt, stream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use typhoon_core::config::SchedulerConfig;
use typhoon_core::error::truncate_diagnostic;
use typhoon_core::{ResultRecord, ResultStore};

use crate::error::ExecutorError;
use crate::http::HttpClient;
use crate::persistence::TaskStore;
use crate::tasks::ScheduledTask;

/// Slack a claim lease keeps over the HTTP timeout.
pub const LEASE_MARGIN: Duration = Duration::from_secs(30);

/// Tunables for one executor.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub http_timeout: Duration,
    /// Age after which another executor may take over a claim. Raised to
    /// `http_timeout + LEASE_MARGIN` when shorter.
    pub lease: Duration,
    /// Maximum tasks in flight per run.
    pub concurrency: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for ExecutorSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            http_timeout: Duration::from_secs(config.http_timeout_secs),
            lease: Duration::from_secs(config.lease_secs),
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Counts for one [`TaskExecutor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Due, incomplete tasks seen by the query.
    pub found: usize,
    /// Tasks this executor won the claim on.
    pub claimed: usize,
    pub completed: usize,
    /// Tasks owned by another executor, or lost before completion.
    pub skipped: usize,
}

enum Outcome {
    Completed,
    Skipped,
}

pub struct TaskExecutor {
    tasks: Arc<TaskStore>,
    results: ResultStore,
    http: Arc<dyn HttpClient>,
    settings: ExecutorSettings,
    lease: chrono::Duration,
    owner: String,
}

impl TaskExecutor {
    pub fn new(
        tasks: Arc<TaskStore>,
        results: ResultStore,
        http: Arc<dyn HttpClient>,
        settings: ExecutorSettings,
    ) -> Self {
        let lease = effective_lease(&settings);
        Self {
            tasks,
            results,
            http,
            settings,
            lease,
            owner: owner_id(),
        }
    }

    /// Lease actually applied to claims.
    pub fn lease(&self) -> chrono::Duration {
        self.lease
    }

    /// Claim owner written to the task table.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Execute every due, incomplete task once.
    pub async fn run(&self) -> Result<RunSummary, ExecutorError> {
        let due = self.tasks.pending(Utc::now())?;
        info!("🔍 Found {} pending tasks", due.len());

        let mut summary = RunSummary {
            found: due.len(),
            ..RunSummary::default()
        };
        let outcomes: Vec<(bool, Result<Outcome, ExecutorError>)> = stream::iter(due)
            .map(|task| self.execute(task))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut transport_failures = Vec::new();
        let mut unexpected = None;
        for (claimed, outcome) in outcomes {
            if claimed {
                summary.claimed += 1;
            }
            match outcome {
                Ok(Outcome::Completed) => summary.completed += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e @ ExecutorError::Transport { .. }) => transport_failures.push(e),
                Err(e) => {
                    error!("❌ Task execution failed: {}", truncate_diagnostic(&e.to_string()));
                    unexpected.get_or_insert(e);
                }
            }
        }
        info!(
            found = summary.found,
            claimed = summary.claimed,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = transport_failures.len(),
            "Executor run finished"
        );

        if let Some(e) = unexpected {
            return Err(e);
        }
        if !transport_failures.is_empty() {
            return Err(ExecutorError::Retryable(transport_failures));
        }
        Ok(summary)
    }

    /// Returns whether the claim was won, and the outcome.
    async fn execute(&self, task: ScheduledTask) -> (bool, Result<Outcome, ExecutorError>) {
        match self.tasks.claim(&task.id, &self.owner, Utc::now(), self.lease) {
            Ok(true) => (true, self.invoke(&task).await),
            Ok(false) => {
                debug!(task_id = %task.id, "task claimed by another executor");
                (false, Ok(Outcome::Skipped))
            }
            Err(e) => (false, Err(e.into())),
        }
    }

    async fn invoke(&self, task: &ScheduledTask) -> Result<Outcome, ExecutorError> {
        info!(task_id = %task.id, "🌐 Executing task: {}", task.url);
        let response = match self.http.get(&task.url, self.settings.http_timeout).await {
            Ok(response) => response,
            Err(source) => {
                warn!(
                    task_id = %task.id,
                    timed_out = source.timed_out,
                    "⚠️ Task request failed: {source}"
                );
                if let Err(e) = self.tasks.release(&task.id, &self.owner) {
                    error!(task_id = %task.id, "❌ Could not release claim: {e}");
                }
                return Err(ExecutorError::Transport {
                    task_id: task.id.clone(),
                    url: task.url.clone(),
                    source,
                });
            }
        };

        let record = ResultRecord {
            task_id: task.id.clone(),
            url: task.url.clone(),
            status_code: response.status,
            body: response.body,
            executed_at: Utc::now(),
        };
        let result_ref = self.results.put(&record)?;
        if self
            .tasks
            .complete(&task.id, &self.owner, response.status, &result_ref, Utc::now())?
        {
            info!(task_id = %task.id, result_ref = %result_ref, "✅ Task completed with status {}", response.status);
            Ok(Outcome::Completed)
        } else {
            warn!(task_id = %task.id, "⚠️ Claim lost before completion; result {result_ref} is orphaned");
            Ok(Outcome::Skipped)
        }
    }
}

/// A claim must outlive the longest request, or a second executor could take
/// the task over while the first is still waiting on it.
fn effective_lease(settings: &ExecutorSettings) -> chrono::Duration {
    let floor = settings.http_timeout.saturating_add(LEASE_MARGIN);
    let lease = if settings.lease < floor {
        warn!(
            configured_secs = settings.lease.as_secs(),
            applied_secs = floor.as_secs(),
            "⚠️ Claim lease shorter than HTTP timeout plus margin; raising it"
        );
        floor
    } else {
        settings.lease
    };
    chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX)
}

fn owner_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".into());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{host}:{}:{}", std::process::id(), &suffix[..8])
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::http::{HttpResponse, TransportError};

    /// Counts calls; answers with a fixed status or a transport failure.
    pub struct FakeHttp {
        pub calls: AtomicUsize,
        pub urls: Mutex<Vec<String>>,
        pub status: u16,
        pub fail: bool,
        pub delay: Duration,
    }

    impl FakeHttp {
        pub fn ok(status: u16) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
                status,
                fail: false,
                delay: Duration::ZERO,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok(0)
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClient for FakeHttp {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(TransportError::new("connection refused"));
            }
            Ok(HttpResponse {
                status: self.status,
                body: format!("hello from {url}"),
            })
        }
    }
}
