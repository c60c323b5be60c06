use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use portal_tasks::config::AppConfig;
use portal_tasks::logging::init_logging;
use portal_tasks::notification::{DeliveryQueue, NotificationWorker, TransportRouter};
use portal_tasks::tasks::{HealthReporter, RetryPolicy, SupervisedTask, Supervisor, TaskRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let (logging, _log_guard) = init_logging(&config.logging.log_dir, &config.logging.log_filter)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_dir = %logging.log_dir().display(),
        filter = %logging.get_filter(),
        "portal-tasks starting"
    );

    let registry = Arc::new(TaskRegistry::new());
    let mut supervisor = Supervisor::new(CancellationToken::new(), registry.clone())
        .with_shutdown_timeout(config.supervisor.shutdown_timeout());
    let policy = RetryPolicy::with_delay(config.supervisor.retry_delay());

    let queue = Arc::new(DeliveryQueue::new(
        Arc::new(TransportRouter::logging()),
        &config.notification,
    ));
    supervisor.spawn(SupervisedTask::with_policy(
        NotificationWorker::new(queue, &config.notification),
        policy.clone(),
    ))?;
    supervisor.spawn(SupervisedTask::with_policy(
        HealthReporter::new(registry.clone(), config.supervisor.stale_activity_threshold()),
        policy.clone(),
    ))?;
    supervisor.spawn(SupervisedTask::with_policy(logging.retention_worker(), policy))?;

    info!(tasks = ?registry.names(), "Background tasks started");

    tokio::select! {
        result = shutdown_signal() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        }
        _ = wait_for_fatal_exit(&mut supervisor) => {}
    }

    let report = supervisor.shutdown().await;
    if !report.all_graceful() {
        warn!(?report, "Some background tasks did not stop cleanly");
    }

    let health = registry.overall_health();
    info!(status = %health.status, message = %health.message, "portal-tasks stopped");
    Ok(())
}

/// Resolve once a task exits with a fatal error, or every task has exited.
async fn wait_for_fatal_exit(supervisor: &mut Supervisor) {
    while let Some(exit) = supervisor.join_next().await {
        if exit.is_fatal() {
            error!(task = %exit.name, "Shutting down after fatal task failure");
            return;
        }
    }
    warn!("All background tasks have exited");
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Ctrl+C received");
            }
            _ = terminate.recv() => {
                info!("SIGTERM received");
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C received");
        Ok(())
    }
}
