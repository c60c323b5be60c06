//! Supervised execution of a single worker.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::TaskError;
use super::state::{HealthState, TaskMonitor};
use super::worker::{TaskContext, Worker};

/// Default delay before re-invoking a failed body.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

type RetryPredicate = Arc<dyn Fn(&TaskError) -> bool + Send + Sync>;

/// Decides whether and when a failed body is retried.
#[derive(Clone)]
pub struct RetryPolicy {
    delay: Duration,
    predicate: RetryPredicate,
}

impl RetryPolicy {
    /// Default classification with a custom delay.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Replace the retry classification.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&TaskError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn should_retry(&self, error: &TaskError) -> bool {
        (self.predicate)(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            predicate: Arc::new(TaskError::is_retryable),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// A worker wrapped with health tracking and a retry loop.
pub struct SupervisedTask {
    worker: Arc<dyn Worker>,
    policy: RetryPolicy,
    monitor: TaskMonitor,
}

impl SupervisedTask {
    pub fn new(worker: impl Worker) -> Self {
        Self::with_policy(worker, RetryPolicy::default())
    }

    pub fn with_policy(worker: impl Worker, policy: RetryPolicy) -> Self {
        let monitor = TaskMonitor::new(worker.name(), worker.kind());
        Self {
            worker: Arc::new(worker),
            policy,
            monitor,
        }
    }

    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    /// Read-only view of this task's state, for registration.
    pub fn monitor(&self) -> TaskMonitor {
        self.monitor.clone()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the body until it completes, is cancelled, or fails fatally.
    ///
    /// Retryable failures are recorded and the body is re-invoked after the
    /// policy delay, as many times as needed. A fatal failure leaves the task
    /// `Stopped` and is returned to the caller, even when it is raised during
    /// shutdown. Cancellation (including during the retry delay) otherwise
    /// stops the task and returns `Ok`.
    pub async fn run(self, cancellation_token: CancellationToken) -> Result<(), TaskError> {
        let name = self.monitor.name().to_string();
        let ctx = TaskContext::new(self.monitor.clone(), cancellation_token.clone());

        info!(task = %name, kind = %self.worker.kind(), "Background task starting");

        loop {
            if cancellation_token.is_cancelled() {
                return self.stop(&name);
            }

            self.monitor.set_state(HealthState::Running);

            let err = match self.worker.run(ctx.clone()).await {
                Ok(()) => {
                    info!(task = %name, "Background task completed");
                    return self.stop(&name);
                }
                Err(TaskError::Cancelled) => return self.stop(&name),
                Err(err) => err,
            };

            if !self.policy.should_retry(&err) {
                error!(task = %name, error = %err, "Background task failed with non-retryable error");
                self.monitor
                    .record_failure(err.to_string(), HealthState::Unhealthy);
                self.monitor.set_state(HealthState::Stopped);
                return Err(err);
            }

            if cancellation_token.is_cancelled() {
                self.monitor.record_error(err.to_string());
                debug!(task = %name, error = %err, "Background task failed during shutdown");
                return self.stop(&name);
            }

            warn!(
                task = %name,
                error = %err,
                retry_in_secs = self.policy.delay().as_secs_f64(),
                "Background task failed, retrying"
            );
            self.monitor
                .record_failure(err.to_string(), HealthState::Unhealthy);

            let retry_at = TimeDelta::from_std(self.policy.delay())
                .ok()
                .and_then(|delay| Utc::now().checked_add_signed(delay));
            self.monitor.set_idle_until(retry_at);

            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    self.monitor.set_idle_until(None);
                    return self.stop(&name);
                }
                _ = tokio::time::sleep(self.policy.delay()) => {}
            }

            self.monitor.set_idle_until(None);
            self.monitor.record_restart();
        }
    }

    fn stop(&self, name: &str) -> Result<(), TaskError> {
        self.monitor.set_state(HealthState::Stopped);
        info!(task = %name, "Background task stopped");
        Ok(())
    }
}

impl fmt::Debug for SupervisedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedTask")
            .field("name", &self.monitor.name())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
