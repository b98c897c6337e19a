use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::services::email::EmailTransport;
use crate::services::queue::NotificationQueue;
use crate::services::templates::render;
use crate::{ConsumerConfig, ConsumerStats, MessageOutcome, NotificationError, NotificationEvent};

/// Long-running consumer. Each message is acknowledged only once it has been
/// delivered or recorded on the dead-letter list.
pub struct NotificationConsumerService {
    queue: Arc<dyn NotificationQueue>,
    transport: Arc<dyn EmailTransport>,
    config: ConsumerConfig,
    is_running: RwLock<bool>,
    stats: RwLock<ConsumerStats>,
}

impl NotificationConsumerService {
    pub fn new(queue: Arc<dyn NotificationQueue>, transport: Arc<dyn EmailTransport>, config: ConsumerConfig) -> Self {
        Self {
            queue,
            transport,
            config,
            is_running: RwLock::new(false),
            stats: RwLock::new(ConsumerStats::default()),
        }
    }

    /// Runs until `shutdown` is called. The message being handled when the
    /// shutdown arrives is finished first.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), NotificationError> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                warn!("Notification consumer is already running");
                return Ok(());
            }
            *running = true;
        }

        let recovered = self.queue.recover_in_flight().await?;
        info!(
            "Notification consumer started ({} in-flight messages recovered). Waiting for messages...",
            recovered
        );

        while *self.is_running.read().await {
            if let Err(e) = self.process_next().await {
                error!("Notification consumer error: {}", e);
                tokio::time::sleep(self.config.error_backoff).await;
            }
        }

        info!("Notification consumer stopped");
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Initiating notification consumer shutdown");
        *self.is_running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn stats(&self) -> ConsumerStats {
        self.stats.read().await.clone()
    }

    /// Reserve and handle at most one message. `Ok(None)` when the poll timed out.
    pub async fn process_next(&self) -> Result<Option<MessageOutcome>, NotificationError> {
        match self.queue.reserve(self.config.poll_timeout).await? {
            Some(payload) => self.handle_message(&payload).await.map(Some),
            None => Ok(None),
        }
    }

    /// Deliver one reserved message, dead-lettering it on any failure, then ack.
    /// An error here means the ack or dead-letter write failed; the message then
    /// stays in flight and is recovered on the next start.
    pub async fn handle_message(&self, payload: &str) -> Result<MessageOutcome, NotificationError> {
        self.stats.write().await.received += 1;

        let outcome = match timeout(self.config.handler_timeout, self.deliver(payload)).await {
            Ok(Ok(())) => MessageOutcome::Delivered,
            Ok(Err(e)) => MessageOutcome::DeadLettered { reason: e.to_string() },
            Err(_) => MessageOutcome::DeadLettered {
                reason: NotificationError::HandlerTimeout {
                    timeout_seconds: self.config.handler_timeout.as_secs(),
                }
                .to_string(),
            },
        };

        if let MessageOutcome::DeadLettered { reason } = &outcome {
            error!("Error processing notification: {}", reason);
            self.queue.dead_letter(payload, reason).await?;
        }
        self.queue.ack(payload).await?;

        let mut stats = self.stats.write().await;
        match outcome {
            MessageOutcome::Delivered => stats.delivered += 1,
            MessageOutcome::DeadLettered { .. } => stats.dead_lettered += 1,
        }

        Ok(outcome)
    }

    async fn deliver(&self, payload: &str) -> Result<(), NotificationError> {
        let event: NotificationEvent = serde_json::from_str(payload)?;
        debug!("Received {:?} notification for appointment {}", event.kind, event.appointment_id);

        let recipient = event
            .patient_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or(NotificationError::MissingRecipient)?;

        let rendered = render(&event);
        self.transport.send(recipient, &rendered.subject, &rendered.html).await
    }
}
