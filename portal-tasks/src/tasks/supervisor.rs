//! Supervisor: spawns supervised tasks and coordinates shutdown.
//!
//! Each task runs on its own tokio task inside a `JoinSet`, with a child
//! cancellation token of the supervisor's token. Fatal task errors surface
//! through [`Supervisor::join_next`]; the host decides what to do with them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::TaskError;
use super::registry::TaskRegistry;
use super::state::HealthState;
use super::supervised::SupervisedTask;
use crate::Result;

/// Default time allowed for tasks to stop after cancellation.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A finished supervised task.
#[derive(Debug)]
pub struct TaskExit {
    pub name: String,
    pub result: std::result::Result<(), TaskError>,
}

impl TaskExit {
    /// Whether the task stopped on a fatal error (or panicked).
    pub fn is_fatal(&self) -> bool {
        self.result.is_err()
    }

    pub fn error_message(&self) -> Option<String> {
        self.result.as_ref().err().map(ToString::to_string)
    }
}

/// Outcome of [`Supervisor::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks still running when shutdown started.
    pub total_tasks: usize,
    /// Tasks that stopped cleanly after cancellation.
    pub graceful_stops: usize,
    /// Tasks that returned an error or panicked while stopping.
    pub failed: usize,
    /// Tasks aborted after the timeout.
    pub forced_terminations: usize,
}

impl ShutdownReport {
    pub fn all_graceful(&self) -> bool {
        self.failed == 0 && self.forced_terminations == 0
    }
}

/// Host layer for supervised tasks.
pub struct Supervisor {
    registry: Arc<TaskRegistry>,
    task_set: JoinSet<TaskExit>,
    task_names: HashMap<Id, String>,
    cancellation_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl Supervisor {
    pub fn new(cancellation_token: CancellationToken, registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            task_set: JoinSet::new(),
            task_names: HashMap::new(),
            cancellation_token,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Register and start a task.
    ///
    /// Fails without spawning if the name is already registered.
    pub fn spawn(&mut self, task: SupervisedTask) -> Result<()> {
        self.registry.register(task.monitor())?;

        let name = task.name().to_string();
        let token = self.cancellation_token.child_token();
        let task_name = name.clone();
        let handle = self.task_set.spawn(async move {
            let result = task.run(token).await;
            TaskExit {
                name: task_name,
                result,
            }
        });
        self.task_names.insert(handle.id(), name.clone());

        debug!(task = %name, "Spawned background task");
        Ok(())
    }

    /// Number of tasks still running.
    pub fn pending_count(&self) -> usize {
        self.task_set.len()
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.task_set.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Request every task to stop.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Wait for the next task to finish.
    ///
    /// Returns `None` when no tasks remain.
    pub async fn join_next(&mut self) -> Option<TaskExit> {
        let joined = self.task_set.join_next_with_id().await?;
        let exit = self.collect(joined);

        match &exit.result {
            Ok(()) => info!(task = %exit.name, "Background task exited"),
            Err(err) => error!(task = %exit.name, error = %err, "Background task exited with fatal error"),
        }

        Some(exit)
    }

    /// Cancel every task and wait for them to stop.
    ///
    /// Tasks still running after the shutdown timeout are aborted.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport {
            total_tasks: self.task_set.len(),
            ..Default::default()
        };

        info!(
            tasks = report.total_tasks,
            timeout = ?self.shutdown_timeout,
            "Shutting down background tasks"
        );
        self.cancellation_token.cancel();

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;

        while !self.task_set.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let remaining = self.task_set.len();
                    warn!(remaining, "Shutdown timeout reached, aborting remaining tasks");
                    report.forced_terminations = remaining;
                    self.task_set.abort_all();
                    while let Some(joined) = self.task_set.join_next_with_id().await {
                        self.collect(joined);
                    }
                    break;
                }
                joined = self.task_set.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    let exit = self.collect(joined);
                    match exit.result {
                        Ok(()) => report.graceful_stops += 1,
                        Err(err) => {
                            warn!(task = %exit.name, error = %err, "Background task failed during shutdown");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        info!(
            "Shutdown complete: {} total, {} graceful, {} failed, {} forced",
            report.total_tasks, report.graceful_stops, report.failed, report.forced_terminations
        );

        report
    }

    /// Turn a join result into a `TaskExit`, recording panics on the monitor.
    fn collect(&mut self, joined: std::result::Result<(Id, TaskExit), JoinError>) -> TaskExit {
        match joined {
            Ok((id, exit)) => {
                self.task_names.remove(&id);
                exit
            }
            Err(join_error) => {
                let name = self
                    .task_names
                    .remove(&join_error.id())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let message = if join_error.is_cancelled() {
                    "task aborted".to_string()
                } else {
                    format!("task panicked: {join_error}")
                };

                if let Some(monitor) = self.registry.monitor(&name) {
                    monitor.record_failure(message.clone(), HealthState::Stopped);
                }

                TaskExit {
                    name,
                    result: Err(TaskError::Failed(message)),
                }
            }
        }
    }
}
