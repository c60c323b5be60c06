//! Notification transports.
//!
//! A transport performs the actual delivery of one request. Real transports
//! (SMTP, SMS gateways, push services) live outside this crate; the
//! [`LoggingTransport`] only records deliveries through `tracing`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::request::{NotificationChannel, NotificationRequest};
use crate::{Error, Result};

/// Trait for notification transports.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Short transport name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver a single request.
    async fn send(&self, request: &NotificationRequest) -> Result<()>;
}

/// Routes each request to the transport registered for its channel.
#[derive(Default, Clone)]
pub struct TransportRouter {
    transports: HashMap<NotificationChannel, Arc<dyn NotificationTransport>>,
}

impl TransportRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router sending every channel through a [`LoggingTransport`].
    pub fn logging() -> Self {
        let transport: Arc<dyn NotificationTransport> = Arc::new(LoggingTransport);
        NotificationChannel::ALL
            .into_iter()
            .fold(Self::new(), |router, channel| {
                router.with_transport(channel, transport.clone())
            })
    }

    pub fn with_transport(
        mut self,
        channel: NotificationChannel,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        self.transports.insert(channel, transport);
        self
    }

    pub fn has_transport(&self, channel: NotificationChannel) -> bool {
        self.transports.contains_key(&channel)
    }
}

impl std::fmt::Debug for TransportRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels: Vec<_> = self.transports.keys().map(|c| c.as_str()).collect();
        channels.sort_unstable();
        f.debug_struct("TransportRouter")
            .field("channels", &channels)
            .finish()
    }
}

#[async_trait]
impl NotificationTransport for TransportRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn send(&self, request: &NotificationRequest) -> Result<()> {
        let transport = self.transports.get(&request.channel).ok_or_else(|| {
            Error::delivery(
                request.channel.as_str(),
                "no transport configured for channel",
            )
        })?;

        debug!(
            notification_id = %request.id,
            channel = %request.channel,
            transport = transport.name(),
            "Dispatching notification"
        );
        transport.send(request).await
    }
}

/// Transport that only logs the delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTransport;

#[async_trait]
impl NotificationTransport for LoggingTransport {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn send(&self, request: &NotificationRequest) -> Result<()> {
        let recipients = request.recipients.join(", ");
        match request.channel {
            NotificationChannel::Email => {
                info!(subject = %request.subject, recipients = %recipients, "Email sent")
            }
            NotificationChannel::Sms => {
                info!(message = %request.body, recipients = %recipients, "SMS sent")
            }
            NotificationChannel::Push => {
                info!(title = %request.subject, recipients = %recipients, "Push notification sent")
            }
            NotificationChannel::Realtime => info!(
                method = request.realtime_method.as_deref().unwrap_or("DefaultMethod"),
                group = request.realtime_group.as_deref().unwrap_or_default(),
                recipients = %recipients,
                "Realtime notification sent"
            ),
        }
        Ok(())
    }
}
