//! Outbound notification requests.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    /// Real-time push to connected clients (method + group).
    Realtime,
}

impl NotificationChannel {
    pub const ALL: [NotificationChannel; 4] = [Self::Email, Self::Sms, Self::Push, Self::Realtime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
            Self::Realtime => "realtime",
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationChannel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "push" => Ok(Self::Push),
            "realtime" | "signalr" => Ok(Self::Realtime),
            other => Err(Error::validation(format!(
                "Unknown notification channel: {other}"
            ))),
        }
    }
}

/// Priority level for notifications.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl NotificationPriority {
    /// Lenient parse of a business priority label.
    ///
    /// `medium` maps to `Normal`; anything unrecognised is `Normal`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "normal" => Self::Normal,
            "low" => Self::Low,
            _ => Self::Normal,
        }
    }
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A notification waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: Uuid,
    pub channel: NotificationChannel,
    /// Ordered, duplicates allowed.
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub priority: NotificationPriority,
    pub template_name: Option<String>,
    #[serde(default)]
    pub template_data: HashMap<String, Value>,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    pub realtime_method: Option<String>,
    pub realtime_group: Option<String>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

impl NotificationRequest {
    pub fn new(
        channel: NotificationChannel,
        recipients: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            recipients: recipients.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            template_name: None,
            template_data: HashMap::new(),
            data: HashMap::new(),
            realtime_method: None,
            realtime_group: None,
            retry_count: 0,
            next_retry_at: None,
            created_at: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_template(
        mut self,
        name: impl Into<String>,
        data: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        self.template_name = Some(name.into());
        self.template_data = data.into_iter().collect();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Check the request is deliverable.
    ///
    /// A request needs at least one recipient. Real-time requests may
    /// address a group instead.
    pub fn validate(&self) -> Result<()> {
        let addresses_group = self.channel == NotificationChannel::Realtime
            && self.realtime_group.as_deref().is_some_and(|g| !g.is_empty());

        if self.recipients.is_empty() && !addresses_group {
            return Err(Error::validation(format!(
                "Notification {} has no recipients",
                self.id
            )));
        }
        Ok(())
    }

    /// Whether a retry backoff (if any) has elapsed at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.is_none_or(|at| at <= now)
    }

    /// Email sent when a security incident is created.
    pub fn incident_created(
        incident_id: Uuid,
        title: &str,
        priority: &str,
        recipients: Vec<String>,
    ) -> Self {
        let fields = [
            ("IncidentId".to_string(), Value::from(incident_id.to_string())),
            ("Title".to_string(), Value::from(title)),
            ("Priority".to_string(), Value::from(priority)),
        ];

        let mut request = Self::new(
            NotificationChannel::Email,
            recipients,
            format!("Security Incident Created: {title}"),
            format!("A new security incident has been created with priority {priority}."),
        )
        .with_priority(NotificationPriority::parse(priority))
        .with_template("incident-created", fields.clone());
        request.data = fields.into_iter().collect();
        request
    }

    /// Alert notification: SMS for critical alerts, email otherwise.
    pub fn alert_triggered(
        alert_id: Uuid,
        title: &str,
        priority: &str,
        plant_id: Uuid,
        recipients: Vec<String>,
    ) -> Self {
        let parsed = NotificationPriority::parse(priority);
        let channel = if parsed == NotificationPriority::Critical {
            NotificationChannel::Sms
        } else {
            NotificationChannel::Email
        };
        let fields = [
            ("AlertId".to_string(), Value::from(alert_id.to_string())),
            ("Title".to_string(), Value::from(title)),
            ("Priority".to_string(), Value::from(priority)),
            ("PlantId".to_string(), Value::from(plant_id.to_string())),
        ];

        let mut request = Self::new(
            channel,
            recipients,
            format!("Security Alert: {title}"),
            format!("Security alert triggered with priority {priority}."),
        )
        .with_priority(parsed)
        .with_template("alert-triggered", fields.clone());
        request.data = fields.into_iter().collect();
        request
    }

    /// Real-time push of `payload` to a client group.
    pub fn realtime(method: impl Into<String>, group: impl Into<String>, payload: Value) -> Self {
        let mut request = Self::new(
            NotificationChannel::Realtime,
            Vec::<String>::new(),
            String::new(),
            String::new(),
        )
        .with_priority(NotificationPriority::High)
        .with_data("payload", payload);
        request.realtime_method = Some(method.into());
        request.realtime_group = Some(group.into());
        request
    }
}
