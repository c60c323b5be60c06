//! Runtime configuration.
//!
//! Every option has a default; environment variables override them.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::DEFAULT_LOG_FILTER;
use crate::{Error, Result};

/// Notification delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Pause between queue drains, in seconds.
    #[serde(default = "default_queue_interval_secs")]
    pub queue_processing_interval_secs: u64,
    /// Maximum dequeues per drain.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Failed deliveries are retried this many times before being dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before a failed delivery becomes eligible again, in seconds.
    #[serde(default = "default_delivery_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_queue_interval_secs() -> u64 {
    10
}

fn default_max_batch_size() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_delivery_retry_delay_secs() -> u64 {
    5 * 60
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_processing_interval_secs: default_queue_interval_secs(),
            max_batch_size: default_max_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_delivery_retry_delay_secs(),
        }
    }
}

impl NotificationConfig {
    pub fn queue_processing_interval(&self) -> Duration {
        Duration::from_secs(self.queue_processing_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Task supervision settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Delay before a failed task body is re-invoked, in seconds.
    #[serde(default = "default_task_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Time allowed for tasks to stop on shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Last-activity age after which a task is reported stale, in seconds.
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_activity_threshold_secs: u64,
}

fn default_task_retry_delay_secs() -> u64 {
    60
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_stale_threshold_secs() -> u64 {
    5 * 60
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_task_retry_delay_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            stale_activity_threshold_secs: default_stale_threshold_secs(),
        }
    }
}

impl SupervisorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn stale_activity_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_activity_threshold_secs)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_filter: default_log_filter(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `PORTAL_LOG_DIR`, `PORTAL_LOG_FILTER`
    /// - `NOTIFICATION_QUEUE_INTERVAL_SECS`, `NOTIFICATION_MAX_BATCH_SIZE`,
    ///   `NOTIFICATION_MAX_RETRIES`, `NOTIFICATION_RETRY_DELAY_SECS`
    /// - `TASK_RETRY_DELAY_SECS`, `TASK_SHUTDOWN_TIMEOUT_SECS`,
    ///   `TASK_STALE_THRESHOLD_SECS`
    ///
    /// A variable that is set but not a valid number is a configuration error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("PORTAL_LOG_DIR")
            && !dir.trim().is_empty()
        {
            config.logging.log_dir = dir;
        }
        if let Some(filter) = lookup("PORTAL_LOG_FILTER")
            && !filter.trim().is_empty()
        {
            config.logging.log_filter = filter;
        }

        let notification = &mut config.notification;
        override_with(
            &lookup,
            "NOTIFICATION_QUEUE_INTERVAL_SECS",
            &mut notification.queue_processing_interval_secs,
        )?;
        override_with(&lookup, "NOTIFICATION_MAX_BATCH_SIZE", &mut notification.max_batch_size)?;
        override_with(&lookup, "NOTIFICATION_MAX_RETRIES", &mut notification.max_retries)?;
        override_with(&lookup, "NOTIFICATION_RETRY_DELAY_SECS", &mut notification.retry_delay_secs)?;

        let supervisor = &mut config.supervisor;
        override_with(&lookup, "TASK_RETRY_DELAY_SECS", &mut supervisor.retry_delay_secs)?;
        override_with(&lookup, "TASK_SHUTDOWN_TIMEOUT_SECS", &mut supervisor.shutdown_timeout_secs)?;
        override_with(
            &lookup,
            "TASK_STALE_THRESHOLD_SECS",
            &mut supervisor.stale_activity_threshold_secs,
        )?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.notification.max_batch_size == 0 {
            return Err(Error::config("max_batch_size must be greater than zero"));
        }
        if self.notification.queue_processing_interval_secs == 0 {
            return Err(Error::config(
                "queue_processing_interval_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }

    *target = raw
        .parse()
        .map_err(|e| Error::config(format!("Invalid value for {key} ({raw:?}): {e}")))?;
    Ok(())
}
