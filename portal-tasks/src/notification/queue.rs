//! Delivery queue with batched draining and retry backoff.
//!
//! Producers enqueue from any thread; one worker drains. Each drain performs at
//! most `min(max_batch_size, queue length at call start)` dequeues, so requests
//! that go back to the tail (not yet due, or failed with an immediate retry)
//! are never looped over within the same pass.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::request::NotificationRequest;
use super::transport::NotificationTransport;
use crate::Result;
use crate::config::NotificationConfig;

/// A request dropped after exhausting its retries.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub request: NotificationRequest,
    pub error: String,
}

/// Outcome of one [`DeliveryQueue::drain_once`] pass.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Deliveries attempted.
    pub attempted: usize,
    pub delivered: usize,
    /// Failed deliveries re-enqueued for a later attempt.
    pub retried: usize,
    /// Not-yet-due requests put back at the tail.
    pub deferred: usize,
    /// Requests dropped permanently.
    pub failed: Vec<DeliveryFailure>,
}

/// Lifetime counters of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,
}

/// Concurrency-safe FIFO of outbound notifications.
pub struct DeliveryQueue {
    items: Mutex<VecDeque<NotificationRequest>>,
    transport: Arc<dyn NotificationTransport>,
    max_retries: u32,
    retry_delay: Duration,
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn NotificationTransport>, config: &NotificationConfig) -> Self {
        Self::with_retry(transport, config.max_retries, config.retry_delay())
    }

    pub fn with_retry(
        transport: Arc<dyn NotificationTransport>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            transport,
            max_retries,
            retry_delay,
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Append a request to the tail.
    ///
    /// Never waits for capacity. Malformed requests are rejected with a
    /// validation error and never enter the queue.
    pub fn enqueue(&self, request: NotificationRequest) -> Result<()> {
        request.validate()?;

        debug!(
            notification_id = %request.id,
            channel = %request.channel,
            subject = %request.subject,
            "Queued notification"
        );
        self.items.lock().push_back(request);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Attempt delivery of up to `max_batch_size` queued requests.
    ///
    /// A failed request is re-enqueued with a backoff while its retry count is
    /// below the configured maximum, otherwise it is dropped and returned in
    /// [`DrainReport::failed`].
    pub async fn drain_once(&self, max_batch_size: usize) -> DrainReport {
        let mut report = DrainReport::default();
        let budget = max_batch_size.min(self.len());

        for _ in 0..budget {
            let Some(mut request) = self.items.lock().pop_front() else {
                break;
            };

            if !request.is_eligible(Utc::now()) {
                self.items.lock().push_back(request);
                report.deferred += 1;
                continue;
            }

            report.attempted += 1;
            match self.transport.send(&request).await {
                Ok(()) => {
                    report.delivered += 1;
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if request.retry_count < self.max_retries => {
                    request.retry_count += 1;
                    request.next_retry_at = Some(Utc::now() + self.backoff());
                    warn!(
                        notification_id = %request.id,
                        channel = %request.channel,
                        retry_count = request.retry_count,
                        error = %err,
                        "Notification delivery failed, will retry"
                    );
                    self.items.lock().push_back(request);
                    report.retried += 1;
                    self.retried.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(
                        notification_id = %request.id,
                        channel = %request.channel,
                        retry_count = request.retry_count,
                        error = %err,
                        "Notification delivery failed permanently"
                    );
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    report.failed.push(DeliveryFailure {
                        request,
                        error: err.to_string(),
                    });
                }
            }
        }

        if report.attempted > 0 {
            debug!(
                attempted = report.attempted,
                delivered = report.delivered,
                retried = report.retried,
                failed = report.failed.len(),
                deferred = report.deferred,
                "Processed notification batch"
            );
        }

        report
    }

    fn backoff(&self) -> TimeDelta {
        TimeDelta::from_std(self.retry_delay).unwrap_or(TimeDelta::MAX)
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("pending", &self.len())
            .field("transport", &self.transport.name())
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}
