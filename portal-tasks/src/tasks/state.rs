//! Per-task lifecycle state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Coarse lifecycle phase of a supervised task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HealthState {
    /// Created, body not yet started.
    #[default]
    Starting,
    /// Body is executing.
    Running,
    /// Body failed; waiting to retry, or about to stop.
    Unhealthy,
    /// Terminal.
    Stopped,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Unhealthy => "Unhealthy",
            Self::Stopped => "Stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a supervised task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    /// Descriptive label of the worker implementation.
    pub kind: String,
    pub state: HealthState,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_error: Option<String>,
    /// Number of times the body was re-invoked after a retryable failure.
    pub restarts: u32,
    /// Set while the body is parked on a known wait (scheduled trigger,
    /// interval sleep). The task counts as live until this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_until: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Latest instant the task is known to be live: its last activity, or
    /// the end of the wait it is parked on, whichever is later.
    pub fn live_until(&self) -> DateTime<Utc> {
        self.idle_until
            .map_or(self.last_activity, |until| until.max(self.last_activity))
    }
}

/// Shared handle onto a task's record.
///
/// Cloning is cheap. Readers always get a whole-record copy, never a partially
/// updated one. Only the owning task (and its worker body, through the task
/// context) mutates the record.
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    name: Arc<str>,
    record: Arc<RwLock<TaskRecord>>,
}

impl TaskMonitor {
    pub(crate) fn new(name: &str, kind: &str) -> Self {
        let now = Utc::now();
        Self {
            name: Arc::from(name),
            record: Arc::new(RwLock::new(TaskRecord {
                name: name.to_string(),
                kind: kind.to_string(),
                state: HealthState::Starting,
                started_at: now,
                last_activity: now,
                last_error: None,
                restarts: 0,
                idle_until: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> HealthState {
        self.record.read().state
    }

    pub fn snapshot(&self) -> TaskRecord {
        self.record.read().clone()
    }

    /// Move to `state`. Leaving `Stopped` is ignored.
    ///
    /// Uptime counts from the first move out of `Starting` into `Running`.
    pub(crate) fn set_state(&self, state: HealthState) {
        self.update(|record| {
            if record.state.is_terminal() {
                return;
            }
            let now = Utc::now();
            if record.state == HealthState::Starting && state == HealthState::Running {
                record.started_at = now;
            }
            record.state = state;
            record.last_activity = now;
        });
    }

    /// Record `error` and move to `state` as one update.
    pub(crate) fn record_failure(&self, error: impl Into<String>, state: HealthState) {
        let error = error.into();
        self.update(|record| {
            record.last_error = Some(error);
            record.last_activity = Utc::now();
            if !record.state.is_terminal() {
                record.state = state;
            }
        });
    }

    /// Mark the task as parked until `until` (or clear the mark).
    pub(crate) fn set_idle_until(&self, until: Option<DateTime<Utc>>) {
        self.update(|record| {
            record.idle_until = until;
            record.last_activity = Utc::now();
        });
    }

    /// Apply `f` under a single write lock, so readers never see a partial update.
    pub(crate) fn update(&self, f: impl FnOnce(&mut TaskRecord)) {
        f(&mut self.record.write());
    }

    pub(crate) fn touch(&self) {
        self.record.write().last_activity = Utc::now();
    }

    pub(crate) fn record_error(&self, error: impl Into<String>) {
        let mut record = self.record.write();
        record.last_error = Some(error.into());
        record.last_activity = Utc::now();
    }

    pub(crate) fn record_restart(&self) {
        let mut record = self.record.write();
        record.restarts = record.restarts.saturating_add(1);
    }

    #[cfg(test)]
    pub(crate) fn with_record(record: TaskRecord) -> Self {
        Self {
            name: Arc::from(record.name.as_str()),
            record: Arc::new(RwLock::new(record)),
        }
    }
}
