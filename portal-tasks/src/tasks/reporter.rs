//! Periodic health reporting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::TaskError;
use super::health::{HealthStatus, OverallHealth};
use super::registry::TaskRegistry;
use super::worker::{TaskContext, Worker};
use crate::scheduler::{ScheduleSpec, ScheduledTimer, presets};

pub const HEALTH_REPORTER_NAME: &str = "health-reporter";

/// Worker logging the registry's overall health and stale tasks on a schedule.
#[derive(Debug)]
pub struct HealthReporter {
    registry: Arc<TaskRegistry>,
    schedule: ScheduleSpec,
    stale_threshold: Duration,
}

/// Result of one health evaluation.
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub overall: OverallHealth,
    pub stale_tasks: Vec<String>,
}

impl HealthReporter {
    pub fn new(registry: Arc<TaskRegistry>, stale_threshold: Duration) -> Self {
        Self {
            registry,
            schedule: presets::hourly(),
            stale_threshold,
        }
    }

    pub fn with_schedule(mut self, schedule: ScheduleSpec) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn schedule(&self) -> &ScheduleSpec {
        &self.schedule
    }

    /// Evaluate the registry once and log the outcome.
    pub fn evaluate(&self) -> HealthSummary {
        let overall = self.registry.overall_health();
        let stale_tasks = self.registry.stale_tasks(self.stale_threshold);

        match overall.status {
            HealthStatus::Healthy => info!(
                services = self.registry.len(),
                message = %overall.message,
                "Health check"
            ),
            status => warn!(
                %status,
                message = %overall.message,
                unhealthy = ?overall.unhealthy_services,
                stopped = ?overall.stopped_services,
                "Health check"
            ),
        }

        if !stale_tasks.is_empty() {
            warn!(
                tasks = ?stale_tasks,
                threshold_secs = self.stale_threshold.as_secs(),
                "Tasks have not reported activity recently"
            );
        }

        HealthSummary {
            overall,
            stale_tasks,
        }
    }
}

#[async_trait]
impl Worker for HealthReporter {
    fn name(&self) -> &str {
        HEALTH_REPORTER_NAME
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        let mut timer = ScheduledTimer::new(self.schedule.clone(), ctx.cancellation_token().clone());

        while ctx.wait_for_trigger(&mut timer).await.is_some() {
            ctx.report_activity();
            self.evaluate();
        }

        debug!("Health reporter shutting down");
        Ok(())
    }
}
