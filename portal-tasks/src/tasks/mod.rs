//! Background task supervision.
//!
//! - [`Worker`] / [`WorkerFn`]: the unit of work, run until cancelled
//! - [`SupervisedTask`]: health tracking and the retry loop around a worker
//! - [`TaskRegistry`]: name-keyed directory and health aggregation
//! - [`Supervisor`]: spawns tasks and coordinates shutdown
//! - [`HealthReporter`]: logs aggregate health on a schedule

mod error;
pub mod health;
pub mod registry;
pub mod reporter;
pub mod state;
pub mod supervised;
pub mod supervisor;
pub mod worker;

pub use error::TaskError;
pub use health::{
    HealthReport, HealthStatus, OverallHealth, TaskHealthCheck, TaskSnapshot, format_uptime,
};
pub use registry::TaskRegistry;
pub use reporter::{HEALTH_REPORTER_NAME, HealthReporter, HealthSummary};
pub use state::{HealthState, TaskMonitor, TaskRecord};
pub use supervised::{DEFAULT_RETRY_DELAY, RetryPolicy, SupervisedTask};
pub use supervisor::{DEFAULT_SHUTDOWN_TIMEOUT, ShutdownReport, Supervisor, TaskExit};
pub use worker::{TaskContext, Worker, WorkerFn};
