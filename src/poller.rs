//! Waiting for asynchronous device tasks.
//!
//! FAST, AS3 and DO accept a declaration, answer with a task ID and keep
//! working in the background. [`TaskPoller::wait`] polls the task until it
//! settles, sleeping with bounded exponential backoff between polls.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Backoff and deadline settings for task polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep after the first pending poll.
    pub initial_interval: Duration,
    /// Upper bound for the sleep between polls.
    pub max_interval: Duration,
    /// Factor applied to the sleep after each pending poll.
    pub multiplier: u32,
    /// Overall time budget for one task.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 2,
            timeout: Duration::from_secs(1200),
        }
    }
}

impl PollConfig {
    /// Same backoff, different overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current
            .checked_mul(self.multiplier)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// One observation of a device task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Still running.
    Pending,
    /// Finished; carries the final task document.
    Done(Value),
    /// Finished unsuccessfully.
    Failed(String),
}

impl TaskStatus {
    /// Classify a task by HTTP status alone: 202 is pending, 200 is done,
    /// anything else is a failure.
    pub fn from_status(status: u16, body: Value) -> Self {
        match status {
            202 => Self::Pending,
            200 => Self::Done(body),
            other => Self::Failed(format!("task status endpoint answered HTTP {other}")),
        }
    }
}

/// Polls one task at a time with the configured backoff.
#[derive(Debug, Clone)]
pub struct TaskPoller {
    config: PollConfig,
    cancel: CancellationToken,
}

impl TaskPoller {
    /// Create a poller that stops early when `cancel` fires.
    pub fn new(config: PollConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Poll `task_id` until it is done.
    ///
    /// Returns the final task document on success,
    /// [`ProviderError::TaskFailed`] when the device reports failure,
    /// [`ProviderError::DeadlineExceeded`] when the task is still pending at
    /// the deadline and [`ProviderError::Cancelled`] when the provider is
    /// stopping. Errors from `check` itself are returned unchanged.
    pub async fn wait<F, Fut>(&self, task_id: &str, mut check: F) -> Result<Value, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TaskStatus, ProviderError>>,
    {
        let started = Instant::now();
        // Timeouts past what `Instant` can represent never expire.
        let deadline = started.checked_add(self.config.timeout);
        let mut interval = self.config.initial_interval;
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(task_id));
            }

            attempt += 1;
            match check().await? {
                TaskStatus::Done(body) => {
                    debug!(task_id, attempt, elapsed = ?started.elapsed(), "task finished");
                    return Ok(body);
                }
                TaskStatus::Failed(message) => {
                    warn!(task_id, attempt, %message, "task failed");
                    return Err(ProviderError::TaskFailed {
                        task_id: task_id.to_string(),
                        message,
                    });
                }
                TaskStatus::Pending => {
                    debug!(task_id, attempt, "task pending");
                }
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(ProviderError::DeadlineExceeded(format!(
                        "task {task_id} still pending after {:?}",
                        self.config.timeout
                    )));
                }
                Some(deadline) => interval.min(deadline - now),
                None => interval,
            };
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(self.cancelled(task_id)),
                () = tokio::time::sleep(pause) => {}
            }
            interval = self.config.next_interval(interval);
        }
    }

    fn cancelled(&self, task_id: &str) -> ProviderError {
        ProviderError::Cancelled(format!("stopped while waiting for task {task_id}"))
    }
}
