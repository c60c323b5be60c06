//! Logging setup with a reloadable filter and daily-rolling log files.
//!
//! This module provides:
//! - Runtime log level changes via `tracing_subscriber::reload`
//! - Console and file output with local timezone timestamps
//! - A supervised worker deleting log files past the retention period

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeDelta, Utc};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

use crate::scheduler::{ScheduleSpec, ScheduledTimer, presets};
use crate::tasks::{TaskContext, TaskError, Worker};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "portal_tasks=info";

/// Prefix of rolled log files (`portal-tasks.log.YYYY-MM-DD`).
const LOG_FILE_PREFIX: &str = "portal-tasks.log";

/// Log retention period in days.
const LOG_RETENTION_DAYS: i64 = 7;

/// Timer formatting timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Handle onto the installed subscriber.
pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: PathBuf,
}

impl LoggingConfig {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Replace the filter directive (e.g. `"portal_tasks=debug"`).
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::config(format!("Invalid filter directive: {e}")))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {e}")))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Worker deleting rolled log files older than the retention period.
    pub fn retention_worker(&self) -> LogRetentionWorker {
        LogRetentionWorker::new(self.log_dir.clone())
    }
}

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over `filter`. Keep the returned guard alive
/// for the lifetime of the process, or buffered file output is lost.
pub fn init_logging(log_dir: &str, filter: &str) -> crate::Result<(Arc<LoggingConfig>, WorkerGuard)> {
    let log_path = PathBuf::from(log_dir);
    std::fs::create_dir_all(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let initial_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| crate::Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    let config = Arc::new(LoggingConfig {
        handle: filter_handle,
        log_dir: log_path,
    });

    Ok((config, guard))
}

/// Supervised worker running log retention on a schedule.
#[derive(Debug)]
pub struct LogRetentionWorker {
    log_dir: PathBuf,
    retention_days: i64,
    schedule: ScheduleSpec,
}

impl LogRetentionWorker {
    pub fn new(log_dir: PathBuf) -> Self {
        Self {
            log_dir,
            retention_days: LOG_RETENTION_DAYS,
            schedule: presets::daily_at_2am(),
        }
    }
}

#[async_trait]
impl Worker for LogRetentionWorker {
    fn name(&self) -> &str {
        "log-retention"
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        let mut timer = ScheduledTimer::new(self.schedule.clone(), ctx.cancellation_token().clone());

        while ctx.wait_for_trigger(&mut timer).await.is_some() {
            ctx.report_activity();
            match cleanup_old_logs(&self.log_dir, self.retention_days, Utc::now().date_naive()).await {
                Ok(0) => {}
                Ok(count) => info!(count, "Cleaned up old log files"),
                Err(e) => ctx.report_handled_error(&e, "cleaning up old logs"),
            }
        }

        debug!("Log retention worker shutting down");
        Ok(())
    }
}

/// Delete rolled log files dated more than `retention_days` before `today`.
///
/// Returns the number of files deleted.
async fn cleanup_old_logs(
    log_dir: &Path,
    retention_days: i64,
    today: NaiveDate,
) -> std::io::Result<usize> {
    let cutoff = today - TimeDelta::days(retention_days);
    let date_prefix = format!("{LOG_FILE_PREFIX}.");

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(date_prefix.as_str()))
        else {
            continue;
        };

        let Ok(file_date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted_count += 1;
                    debug!(path = %path.display(), "Deleted old log file");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old log file"),
            }
        }
    }

    Ok(deleted_count)
}
