use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Created,
    Updated,
    Cancelled,
    StatusUpdated,
    /// Any type this build does not know; rendered with the generic template.
    #[serde(other)]
    Unknown,
}

/// Lifecycle event as it travels through the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub appointment_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<Uuid>,
    #[serde(default)]
    pub patient_email: Option<String>,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default, alias = "doctor_name")]
    pub provider_name: String,
    pub appointment_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Entry written to the dead-letter list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadLetter {
    pub payload: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Delivered,
    DeadLettered { reason: String },
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// How long one blocking reserve waits before the loop re-checks shutdown.
    pub poll_timeout: Duration,
    pub handler_timeout: Duration,
    pub error_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(5),
            handler_timeout: Duration::from_secs(30),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl ConsumerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            poll_timeout: Duration::from_secs(config.notification_poll_timeout_seconds.max(1)),
            handler_timeout: Duration::from_secs(config.notification_handler_timeout_seconds.max(1)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub delivered: u64,
    pub dead_lettered: u64,
}
