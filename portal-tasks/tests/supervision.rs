//! End-to-end supervision: supervisor, registry and health probes together.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use portal_tasks::Error;
use portal_tasks::tasks::{
    HealthState, HealthStatus, RetryPolicy, SupervisedTask, Supervisor, TaskContext, TaskError,
    TaskRegistry, WorkerFn,
};
use tokio_util::sync::CancellationToken;

async fn idle(ctx: TaskContext) -> Result<(), TaskError> {
    loop {
        ctx.report_activity();
        if !ctx.sleep(Duration::from_secs(1)).await {
            return Ok(());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn flaky_task_recovers_and_reports_health() {
    let registry = Arc::new(TaskRegistry::new());
    let mut supervisor = Supervisor::new(CancellationToken::new(), registry.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let body_calls = calls.clone();
    let flaky = WorkerFn::new("flaky", move |ctx: TaskContext| {
        let calls = body_calls.clone();
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= 5 {
                return Err(TaskError::failed(format!("failure {call}")));
            }
            idle(ctx).await
        }
    });

    supervisor
        .spawn(SupervisedTask::with_policy(
            flaky,
            RetryPolicy::with_delay(Duration::from_secs(60)),
        ))
        .unwrap();
    supervisor
        .spawn(SupervisedTask::new(WorkerFn::new("steady", idle)))
        .unwrap();

    // Five failures, each followed by a 60s retry delay.
    tokio::time::sleep(Duration::from_secs(5 * 60 + 30)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(registry.health_of("flaky"), Some(HealthState::Running));

    let snapshot = registry.snapshot();
    let names: Vec<_> = snapshot.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["flaky", "steady"]);
    assert_eq!(snapshot[0].last_error.as_deref(), Some("failure 5"));
    assert_eq!(snapshot[0].restarts, 5);

    let report = registry.health_report();
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.total_services, 2);
    assert_eq!(report.running_services, 2);

    let shutdown = supervisor.shutdown().await;
    assert!(shutdown.all_graceful());
    assert_eq!(shutdown.graceful_stops, 2);

    let overall = registry.overall_health();
    assert_eq!(overall.status, HealthStatus::Degraded);
    assert_eq!(overall.stopped_services, ["flaky", "steady"]);
}

#[tokio::test]
async fn fatal_error_surfaces_and_marks_unhealthy_probe() {
    let registry = Arc::new(TaskRegistry::new());
    let mut supervisor = Supervisor::new(CancellationToken::new(), registry.clone());

    supervisor
        .spawn(SupervisedTask::new(WorkerFn::new("misconfigured", |_ctx| async {
            Err(TaskError::invalid_operation("queue not configured"))
        })))
        .unwrap();

    let exit = supervisor.join_next().await.unwrap();
    assert_eq!(exit.name, "misconfigured");
    assert!(exit.is_fatal());
    assert!(matches!(exit.result, Err(TaskError::InvalidOperation(_))));

    let check = registry.task_health("misconfigured");
    assert_eq!(check.status, HealthStatus::Degraded);
    let details = check.details.unwrap();
    assert_eq!(details.status, HealthState::Stopped);
    assert_eq!(
        details.last_error.as_deref(),
        Some("Invalid operation: queue not configured")
    );

    let missing = registry.task_health("nope");
    assert_eq!(missing.status, HealthStatus::Unhealthy);
    assert!(missing.details.is_none());
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let registry = Arc::new(TaskRegistry::new());
    let mut supervisor = Supervisor::new(CancellationToken::new(), registry.clone());

    supervisor
        .spawn(SupervisedTask::new(WorkerFn::new("worker", idle)))
        .unwrap();
    let err = supervisor
        .spawn(SupervisedTask::new(WorkerFn::new("worker", idle)))
        .unwrap_err();

    assert!(matches!(err, Error::AlreadyRegistered(name) if name == "worker"));
    assert_eq!(registry.len(), 1);
    assert_eq!(supervisor.pending_count(), 1);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn probe_json_uses_camel_case() {
    let registry = Arc::new(TaskRegistry::new());
    let mut supervisor = Supervisor::new(CancellationToken::new(), registry.clone());
    supervisor
        .spawn(SupervisedTask::new(WorkerFn::new("json", idle).with_kind("JsonWorker")))
        .unwrap();
    tokio::task::yield_now().await;

    let value = serde_json::to_value(registry.snapshot()).unwrap();
    let task = &value[0];
    assert_eq!(task["name"], "json");
    assert_eq!(task["type"], "JsonWorker");
    assert!(task["uptime"].as_str().unwrap().starts_with("00.00:00:"));
    assert!(task.get("startTime").is_some());
    assert!(task.get("lastActivity").is_some());
    assert!(task.get("lastError").is_none());

    let overall = serde_json::to_value(registry.overall_health()).unwrap();
    assert!(overall.get("unhealthyServices").is_some());
    assert!(overall.get("stoppedServices").is_some());

    supervisor.shutdown().await;
}
