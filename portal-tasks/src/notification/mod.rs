//! Notification delivery.
//!
//! - [`NotificationRequest`]: the outbound message, with factory constructors
//! - [`DeliveryQueue`]: FIFO with batched draining and retry backoff
//! - [`NotificationTransport`] / [`TransportRouter`]: per-channel delivery
//! - [`NotificationWorker`]: supervised worker that drains the queue

pub mod queue;
pub mod request;
pub mod transport;
pub mod worker;

pub use queue::{DeliveryFailure, DeliveryQueue, DrainReport, QueueStats};
pub use request::{NotificationChannel, NotificationPriority, NotificationRequest};
pub use transport::{LoggingTransport, NotificationTransport, TransportRouter};
pub use worker::{NOTIFICATION_WORKER_NAME, NotificationWorker};
