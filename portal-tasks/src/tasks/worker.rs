//! Worker contract.
//!
//! A worker is anything that can run until cancelled. Supervision (health,
//! retry, activity tracking) is layered on top by
//! [`SupervisedTask`](super::SupervisedTask), so workers never implement it
//! themselves.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::error::TaskError;
use super::state::TaskMonitor;
use crate::scheduler::ScheduledTimer;

/// A unit of long-running background work.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Unique name used as the registry key.
    fn name(&self) -> &str;

    /// Descriptive label shown in health snapshots.
    fn kind(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Run until cancelled, or until an error occurs.
    ///
    /// Called again by the supervising task after a retryable error, never
    /// concurrently with itself.
    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError>;
}

/// Adapter turning an async closure into a [`Worker`].
pub struct WorkerFn<F> {
    name: String,
    kind: String,
    body: F,
}

impl<F> WorkerFn<F> {
    pub fn new<Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: "WorkerFn".to_string(),
            body,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

#[async_trait]
impl<F, Fut> Worker for WorkerFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        (self.body)(ctx).await
    }
}

/// Handle passed to a worker body on every invocation.
#[derive(Debug, Clone)]
pub struct TaskContext {
    monitor: TaskMonitor,
    cancellation_token: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(monitor: TaskMonitor, cancellation_token: CancellationToken) -> Self {
        Self {
            monitor,
            cancellation_token,
        }
    }

    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.cancellation_token.cancelled().await
    }

    /// Refresh the last-activity timestamp.
    pub fn report_activity(&self) {
        self.monitor.touch();
    }

    /// Record an error the body recovered from. The health state is unchanged.
    pub fn report_handled_error(&self, error: &dyn std::fmt::Display, operation: &str) {
        warn!(
            task = %self.monitor.name(),
            operation,
            error = %error,
            "Handled error in background task"
        );
        self.monitor.record_error(format!("{operation}: {error}"));
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// The task counts as live for the whole sleep. Returns `false` if the
    /// sleep was cut short by cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let until = TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta));
        self.monitor.set_idle_until(until);

        let completed = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        };

        self.monitor.set_idle_until(None);
        completed
    }

    /// Wait for the next trigger of `timer`.
    ///
    /// The task counts as live until the trigger is due, so long schedules do
    /// not read as stale. Returns `None` once the timer has ended.
    pub async fn wait_for_trigger(&self, timer: &mut ScheduledTimer) -> Option<DateTime<Utc>> {
        if !timer.is_finished() {
            self.monitor
                .set_idle_until(Some(timer.next_deadline(Utc::now())));
        }

        let fired = timer.next().await;
        self.monitor.set_idle_until(None);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::HealthState;

    struct CleanupWorker;

    #[async_trait]
    impl Worker for CleanupWorker {
        fn name(&self) -> &str {
            "cleanup"
        }

        async fn run(&self, _ctx: TaskContext) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn test_default_kind_is_type_name() {
        assert_eq!(CleanupWorker.kind(), "CleanupWorker");
    }

    #[tokio::test]
    async fn test_worker_fn_runs_closure() {
        let worker = WorkerFn::new("echo", |ctx: TaskContext| async move {
            ctx.report_activity();
            Err(TaskError::failed(format!("from {}", ctx.name())))
        })
        .with_kind("Echo");

        assert_eq!(worker.name(), "echo");
        assert_eq!(worker.kind(), "Echo");

        let monitor = TaskMonitor::new("echo", "Echo");
        let ctx = TaskContext::new(monitor, CancellationToken::new());
        let err = worker.run(ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "from echo");
    }

    #[test]
    fn test_report_handled_error_keeps_state() {
        let monitor = TaskMonitor::new("sync", "Sync");
        monitor.set_state(HealthState::Running);
        let ctx = TaskContext::new(monitor.clone(), CancellationToken::new());

        ctx.report_handled_error(&"connection reset", "fetch alerts");

        let record = monitor.snapshot();
        assert_eq!(record.state, HealthState::Running);
        assert_eq!(
            record.last_error.as_deref(),
            Some("fetch alerts: connection reset")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_sleep_is_cancellable() {
        let token = CancellationToken::new();
        let ctx = TaskContext::new(TaskMonitor::new("sleepy", "Sleepy"), token.clone());

        assert!(ctx.sleep(Duration::from_secs(5)).await);

        token.cancel();
        assert!(!ctx.sleep(Duration::from_secs(5)).await);
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_trigger_marks_task_live() {
        let token = CancellationToken::new();
        let monitor = TaskMonitor::new("hourly", "Hourly");
        let ctx = TaskContext::new(monitor.clone(), token.clone());
        let mut timer = ScheduledTimer::new(crate::scheduler::presets::hourly(), token);

        let observe = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            monitor.snapshot().idle_until
        };
        let (fired, idle_until) = tokio::join!(ctx.wait_for_trigger(&mut timer), observe);

        assert!(fired.is_some());
        assert!(idle_until.unwrap() > Utc::now() + TimeDelta::minutes(59));
        assert!(monitor.snapshot().idle_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_marks_task_live() {
        let monitor = TaskMonitor::new("sleepy", "Sleepy");
        let ctx = TaskContext::new(monitor.clone(), CancellationToken::new());

        let observe = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            monitor.snapshot().idle_until
        };
        let (completed, idle_until) = tokio::join!(ctx.sleep(Duration::from_secs(600)), observe);

        assert!(completed);
        assert!(idle_until.unwrap() > Utc::now() + TimeDelta::minutes(9));
        assert!(monitor.snapshot().idle_until.is_none());
    }
}
