//! Task registry for tracking supervised tasks.
//!
//! The `TaskRegistry` is the directory health probes read from:
//! - Tracks task monitors by unique name
//! - Aggregates per-task state into an overall verdict
//! - Produces ordered snapshots and health-check payloads
//!
//! It holds read-only monitors, never the tasks themselves, and is shared via
//! `Arc` rather than as a global.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use super::health::{HealthReport, OverallHealth, TaskHealthCheck, TaskSnapshot};
use super::state::{HealthState, TaskMonitor, TaskRecord};
use crate::{Error, Result};

/// Concurrency-safe directory of supervised tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: DashMap<String, TaskMonitor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task monitor under its name.
    ///
    /// Registering a name twice fails with [`Error::AlreadyRegistered`] and
    /// keeps the first registration.
    pub fn register(&self, monitor: TaskMonitor) -> Result<()> {
        match self.tasks.entry(monitor.name().to_string()) {
            Entry::Occupied(entry) => Err(Error::AlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(task = %monitor.name(), "Registered background task");
                entry.insert(monitor);
                Ok(())
            }
        }
    }

    /// Remove a task from the registry.
    pub fn unregister(&self, name: &str) -> Option<TaskMonitor> {
        let removed = self.tasks.remove(name).map(|(_, monitor)| monitor);
        if removed.is_some() {
            debug!(task = %name, "Unregistered background task");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Current health state of a task, if registered.
    pub fn health_of(&self, name: &str) -> Option<HealthState> {
        self.tasks.get(name).map(|monitor| monitor.state())
    }

    /// Aggregate health of every registered task.
    pub fn overall_health(&self) -> OverallHealth {
        OverallHealth::from_records(&self.records())
    }

    /// Per-task snapshots ordered by name.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.snapshot_at(Utc::now())
    }

    /// Per-task snapshots with uptime measured at `now`.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<TaskSnapshot> {
        self.records()
            .iter()
            .map(|record| TaskSnapshot::from_record(record, now))
            .collect()
    }

    /// Aggregate plus per-task details.
    pub fn health_report(&self) -> HealthReport {
        let now = Utc::now();
        let records = self.records();
        let overall = OverallHealth::from_records(&records);
        let services = records
            .iter()
            .map(|record| TaskSnapshot::from_record(record, now))
            .collect();
        HealthReport::new(overall, services, now)
    }

    /// Probe a single task by name.
    pub fn task_health(&self, name: &str) -> TaskHealthCheck {
        match self.tasks.get(name) {
            Some(monitor) => {
                let record = monitor.snapshot();
                TaskHealthCheck::from_snapshot(TaskSnapshot::from_record(&record, Utc::now()))
            }
            None => TaskHealthCheck::not_found(name),
        }
    }

    /// Names of non-stopped tasks whose last activity is older than `threshold`.
    ///
    /// A task parked on a known wait counts as live until the wait ends.
    ///
    /// Diagnostic only: nothing is cancelled.
    pub fn stale_tasks(&self, threshold: Duration) -> Vec<String> {
        self.stale_tasks_at(threshold, Utc::now())
    }

    pub fn stale_tasks_at(&self, threshold: Duration, now: DateTime<Utc>) -> Vec<String> {
        let Ok(threshold) = chrono::TimeDelta::from_std(threshold) else {
            return Vec::new();
        };

        self.records()
            .into_iter()
            .filter(|record| !record.state.is_terminal())
            .filter(|record| now - record.live_until() > threshold)
            .map(|record| record.name)
            .collect()
    }

    pub(crate) fn monitor(&self, name: &str) -> Option<TaskMonitor> {
        self.tasks.get(name).map(|monitor| monitor.clone())
    }

    /// Whole-record copies of every task, ordered by name.
    fn records(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.tasks.iter().map(|entry| entry.value().snapshot()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}
