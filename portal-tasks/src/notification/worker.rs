//! Background worker draining the delivery queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::queue::DeliveryQueue;
use crate::config::NotificationConfig;
use crate::tasks::{TaskContext, TaskError, Worker};

pub const NOTIFICATION_WORKER_NAME: &str = "notification-service";

/// Worker that drains a [`DeliveryQueue`] at a fixed interval.
#[derive(Debug)]
pub struct NotificationWorker {
    queue: Arc<DeliveryQueue>,
    interval: Duration,
    max_batch_size: usize,
}

impl NotificationWorker {
    pub fn new(queue: Arc<DeliveryQueue>, config: &NotificationConfig) -> Self {
        Self {
            queue,
            interval: config.queue_processing_interval(),
            max_batch_size: config.max_batch_size,
        }
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }
}

#[async_trait]
impl Worker for NotificationWorker {
    fn name(&self) -> &str {
        NOTIFICATION_WORKER_NAME
    }

    fn kind(&self) -> &str {
        "NotificationWorker"
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        if self.max_batch_size == 0 {
            return Err(TaskError::invalid_argument("max_batch_size must be non-zero"));
        }

        info!(
            interval = ?self.interval,
            max_batch_size = self.max_batch_size,
            "Notification worker started"
        );

        loop {
            ctx.report_activity();

            let report = self.queue.drain_once(self.max_batch_size).await;
            for failure in &report.failed {
                error!(
                    notification_id = %failure.request.id,
                    channel = %failure.request.channel,
                    attempts = failure.request.retry_count + 1,
                    error = %failure.error,
                    "Notification dropped after exhausting retries"
                );
            }
            if report.attempted > 0 {
                debug!(
                    delivered = report.delivered,
                    pending = self.queue.len(),
                    "Notification batch complete"
                );
            }

            if !ctx.sleep(self.interval).await {
                debug!("Notification worker cancelled");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{LoggingTransport, NotificationChannel, NotificationRequest};
    use crate::tasks::{HealthState, SupervisedTask};
    use tokio_util::sync::CancellationToken;

    #[tokio::test(start_paused = true)]
    async fn test_worker_drains_until_cancelled() {
        let config = NotificationConfig {
            max_batch_size: 2,
            ..Default::default()
        };
        let queue = Arc::new(DeliveryQueue::new(Arc::new(LoggingTransport), &config));
        for i in 0..5 {
            queue
                .enqueue(NotificationRequest::new(
                    NotificationChannel::Push,
                    ["device-1"],
                    format!("n{i}"),
                    "body",
                ))
                .unwrap();
        }

        let task = SupervisedTask::new(NotificationWorker::new(queue.clone(), &config));
        let monitor = task.monitor();
        let token = CancellationToken::new();
        let handle = tokio::spawn(task.run(token.clone()));

        // Batches of two every 10s: three passes empty the queue.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(queue.is_empty());
        assert_eq!(queue.stats().delivered, 5);
        assert_eq!(monitor.state(), HealthState::Running);

        token.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(monitor.state(), HealthState::Stopped);
    }

    #[tokio::test]
    async fn test_zero_batch_is_fatal() {
        let config = NotificationConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        let queue = Arc::new(DeliveryQueue::new(Arc::new(LoggingTransport), &config));
        let task = SupervisedTask::new(NotificationWorker::new(queue, &config));

        let result = task.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(TaskError::InvalidArgument(_))));
    }
}
