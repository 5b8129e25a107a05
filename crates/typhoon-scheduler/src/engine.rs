//! Executor loop: runs the executor on a fixed interval with bounded retry.
//! Uses tokio::interval; a `watch` channel stops the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use typhoon_core::config::SchedulerConfig;

use crate::error::ExecutorError;
use crate::executor::{RunSummary, TaskExecutor};

/// How often a failed run is re-attempted before it is dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for RetryPolicy {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Counters across all runs of one loop.
#[derive(Debug, Default)]
pub struct RetryStats {
    runs: AtomicU64,
    retries: AtomicU64,
    dead_lettered: AtomicU64,
}

impl RetryStats {
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }
}

/// Run the executor, re-attempting retryable failures per `policy`.
///
/// After the last attempt the run is logged as dead-lettered and the final
/// error returned. Non-retryable errors return immediately.
pub async fn run_with_retry(
    executor: &TaskExecutor,
    policy: &RetryPolicy,
    stats: &RetryStats,
) -> Result<RunSummary, ExecutorError> {
    let mut attempt = 1;
    loop {
        stats.runs.fetch_add(1, Ordering::Relaxed);
        match executor.run().await {
            Ok(summary) => return Ok(summary),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(
                    "🔁 Executor run failed (attempt {}/{}): {}",
                    attempt,
                    policy.max_attempts,
                    e
                );
                stats.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(policy.delay(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("💀 Executor run dead-lettered after {} attempts: {}", attempt, e);
                }
                return Err(e);
            }
        }
    }
}

/// Spawn the polling loop. Send `true` on `shutdown` (or drop the sender) to stop it.
pub fn spawn_executor(
    executor: Arc<TaskExecutor>,
    policy: RetryPolicy,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (Arc<RetryStats>, JoinHandle<()>) {
    let stats = Arc::new(RetryStats::default());
    let loop_stats = stats.clone();
    let handle = tokio::spawn(async move {
        tracing::info!("⏰ Executor started (poll every {}s)", interval.as_secs());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = run_with_retry(&executor, &policy, &loop_stats).await {
                        tracing::error!("❌ Executor run failed: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("🛑 Executor stopped");
    });
    (stats, handle)
}
