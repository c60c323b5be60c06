//! Health probe payloads.
//!
//! Everything here is derived from [`TaskRecord`] snapshots at read time and
//! serialises to the camelCase shape consumed by liveness/readiness probes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{HealthState, TaskRecord};

/// Aggregate health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Whether the process can still serve (healthy or degraded).
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Overall health of every registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    pub status: HealthStatus,
    pub message: String,
    pub unhealthy_services: Vec<String>,
    pub stopped_services: Vec<String>,
}

impl OverallHealth {
    /// Aggregate `records`: any Unhealthy task wins over any Stopped one.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TaskRecord>) -> Self {
        let mut total = 0usize;
        let mut unhealthy_services = Vec::new();
        let mut stopped_services = Vec::new();

        for record in records {
            total += 1;
            match record.state {
                HealthState::Unhealthy => unhealthy_services.push(record.name.clone()),
                HealthState::Stopped => stopped_services.push(record.name.clone()),
                HealthState::Starting | HealthState::Running => {}
            }
        }

        unhealthy_services.sort();
        stopped_services.sort();

        let (status, message) = if total == 0 {
            (HealthStatus::Healthy, "No services registered".to_string())
        } else if !unhealthy_services.is_empty() {
            (
                HealthStatus::Unhealthy,
                format!("{} service(s) are unhealthy", unhealthy_services.len()),
            )
        } else if !stopped_services.is_empty() {
            (
                HealthStatus::Degraded,
                format!("{} service(s) are stopped", stopped_services.len()),
            )
        } else {
            (
                HealthStatus::Healthy,
                "All services running normally".to_string(),
            )
        };

        Self {
            status,
            message,
            unhealthy_services,
            stopped_services,
        }
    }
}

/// Per-task probe record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: HealthState,
    /// Time since start, formatted `dd.hh:mm:ss`.
    pub uptime: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_error: Option<String>,
    pub restarts: u32,
}

impl TaskSnapshot {
    pub fn from_record(record: &TaskRecord, now: DateTime<Utc>) -> Self {
        Self {
            name: record.name.clone(),
            kind: record.kind.clone(),
            status: record.state,
            uptime: format_uptime(now - record.started_at),
            start_time: record.started_at,
            last_activity: record.last_activity,
            last_error: record.last_error.clone(),
            restarts: record.restarts,
        }
    }
}

/// Full health-check payload: aggregate plus per-task details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    pub total_services: usize,
    pub running_services: usize,
    pub unhealthy_services: Vec<String>,
    pub stopped_services: Vec<String>,
    pub services: Vec<TaskSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn new(overall: OverallHealth, services: Vec<TaskSnapshot>, now: DateTime<Utc>) -> Self {
        let running_services = services
            .iter()
            .filter(|s| s.status == HealthState::Running)
            .count();

        Self {
            status: overall.status,
            message: overall.message,
            total_services: services.len(),
            running_services,
            unhealthy_services: overall.unhealthy_services,
            stopped_services: overall.stopped_services,
            services,
            timestamp: now,
        }
    }
}

/// Probe result for a single named task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHealthCheck {
    pub service_name: String,
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<TaskSnapshot>,
}

impl TaskHealthCheck {
    pub fn not_found(name: &str) -> Self {
        Self {
            service_name: name.to_string(),
            status: HealthStatus::Unhealthy,
            message: format!("Service '{name}' not found"),
            details: None,
        }
    }

    pub fn from_snapshot(snapshot: TaskSnapshot) -> Self {
        let name = snapshot.name.clone();
        let (status, message) = match snapshot.status {
            HealthState::Running => (
                HealthStatus::Healthy,
                format!("Service '{name}' is running normally"),
            ),
            HealthState::Starting => (
                HealthStatus::Degraded,
                format!("Service '{name}' is starting"),
            ),
            HealthState::Stopped => (
                HealthStatus::Degraded,
                format!("Service '{name}' is stopped"),
            ),
            HealthState::Unhealthy => (
                HealthStatus::Unhealthy,
                format!("Service '{name}' is unhealthy"),
            ),
        };

        Self {
            service_name: name,
            status,
            message,
            details: Some(snapshot),
        }
    }
}

/// Format a duration as `dd.hh:mm:ss`. Negative durations format as zero.
pub fn format_uptime(uptime: chrono::TimeDelta) -> String {
    let total = uptime.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days:02}.{hours:02}:{minutes:02}:{seconds:02}")
}
