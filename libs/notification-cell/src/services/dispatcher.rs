use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::services::queue::NotificationQueue;
use crate::{NotificationError, NotificationEvent};

/// Producer side of the pipeline. Publishing never fails the caller:
/// errors are logged and the event is dropped. A publish is bounded in time,
/// so an unreachable queue cannot stall the request that triggered it.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, event: NotificationEvent);
}

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct NotificationDispatcher {
    queue: Arc<dyn NotificationQueue>,
    publish_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(queue: Arc<dyn NotificationQueue>) -> Self {
        Self::with_timeout(queue, DEFAULT_PUBLISH_TIMEOUT)
    }

    pub fn with_timeout(queue: Arc<dyn NotificationQueue>, publish_timeout: Duration) -> Self {
        Self { queue, publish_timeout }
    }

    /// Serialize and push, surfacing the error. A push still pending after
    /// `publish_timeout` is abandoned.
    pub async fn try_publish(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(event)?;
        match tokio::time::timeout(self.publish_timeout, self.queue.push(payload)).await {
            Ok(pushed) => pushed.map_err(|e| NotificationError::DeliveryFailure(e.to_string())),
            Err(_) => Err(NotificationError::DeliveryFailure(format!(
                "queue push timed out after {}ms",
                self.publish_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl NotificationPublisher for NotificationDispatcher {
    async fn publish(&self, event: NotificationEvent) {
        match self.try_publish(&event).await {
            Ok(()) => info!(
                "Queued {:?} notification for appointment {}",
                event.kind, event.appointment_id
            ),
            Err(e) => error!(
                "Failed to queue {:?} notification for appointment {}: {}",
                event.kind, event.appointment_id, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::queue::InMemoryNotificationQueue;
    use crate::NotificationType;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use uuid::Uuid;

    struct BrokenQueue;

    #[async_trait]
    impl NotificationQueue for BrokenQueue {
        async fn push(&self, _payload: String) -> Result<(), NotificationError> {
            Err(NotificationError::QueueError("connection refused".to_string()))
        }
        async fn reserve(&self, _timeout: Duration) -> Result<Option<String>, NotificationError> {
            Ok(None)
        }
        async fn ack(&self, _payload: &str) -> Result<(), NotificationError> {
            Ok(())
        }
        async fn dead_letter(&self, _payload: &str, _reason: &str) -> Result<(), NotificationError> {
            Ok(())
        }
        async fn recover_in_flight(&self) -> Result<usize, NotificationError> {
            Ok(0)
        }
    }

    /// Queue whose pushes never complete, like a blackholed Redis host.
    struct HangingQueue;

    #[async_trait]
    impl NotificationQueue for HangingQueue {
        async fn push(&self, _payload: String) -> Result<(), NotificationError> {
            std::future::pending().await
        }
        async fn reserve(&self, _timeout: Duration) -> Result<Option<String>, NotificationError> {
            Ok(None)
        }
        async fn ack(&self, _payload: &str) -> Result<(), NotificationError> {
            Ok(())
        }
        async fn dead_letter(&self, _payload: &str, _reason: &str) -> Result<(), NotificationError> {
            Ok(())
        }
        async fn recover_in_flight(&self) -> Result<usize, NotificationError> {
            Ok(0)
        }
    }

    fn event() -> NotificationEvent {
        NotificationEvent {
            kind: NotificationType::StatusUpdated,
            appointment_id: Uuid::new_v4(),
            patient_id: Some(Uuid::new_v4()),
            provider_id: Some(Uuid::new_v4()),
            patient_email: Some("jane@example.com".to_string()),
            patient_name: "Jane Doe".to_string(),
            provider_name: "Gregory House".to_string(),
            appointment_time: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            status: Some("completed".to_string()),
        }
    }

    #[tokio::test]
    async fn published_payload_uses_wire_field_names() {
        let queue = Arc::new(InMemoryNotificationQueue::new());
        let dispatcher = NotificationDispatcher::new(queue.clone());

        dispatcher.publish(event()).await;

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        let wire: serde_json::Value = serde_json::from_str(&pending[0]).unwrap();
        assert_eq!(wire["type"], "status_updated");
        assert_eq!(wire["appointment_time"], "2024-01-02T10:00:00");
        assert_eq!(wire["provider_name"], "Gregory House");
        assert_eq!(wire["status"], "completed");
    }

    #[tokio::test]
    async fn queue_failure_is_swallowed() {
        let dispatcher = NotificationDispatcher::new(Arc::new(BrokenQueue));

        dispatcher.publish(event()).await;

        assert!(dispatcher.try_publish(&event()).await.is_err());
    }

    #[tokio::test]
    async fn unresponsive_queue_is_abandoned_after_the_timeout() {
        let dispatcher = NotificationDispatcher::with_timeout(Arc::new(HangingQueue), Duration::from_millis(50));

        tokio::time::timeout(Duration::from_secs(1), dispatcher.publish(event()))
            .await
            .expect("publish must not hang on a stalled queue");

        assert_matches!(
            dispatcher.try_publish(&event()).await,
            Err(NotificationError::DeliveryFailure(msg)) if msg.contains("timed out")
        );
    }
}
