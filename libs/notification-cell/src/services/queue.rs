use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::{DeadLetter, NotificationError};

/// Durable at-least-once queue.
///
/// `reserve` moves a message into an in-flight set; it stays there until
/// `ack`. Messages stranded in flight by a crashed consumer are put back by
/// `recover_in_flight`.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn push(&self, payload: String) -> Result<(), NotificationError>;

    /// Next message, or `None` if nothing arrived within `timeout`.
    async fn reserve(&self, timeout: Duration) -> Result<Option<String>, NotificationError>;

    async fn ack(&self, payload: &str) -> Result<(), NotificationError>;

    /// Records the payload on the dead-letter list. Does not ack.
    async fn dead_letter(&self, payload: &str, reason: &str) -> Result<(), NotificationError>;

    /// Returns the number of messages moved back to the pending list.
    async fn recover_in_flight(&self) -> Result<usize, NotificationError>;
}

// ==============================================================================
// REDIS
// ==============================================================================

/// Redis reliable-queue: LPUSH to publish, BRPOPLPUSH into a processing list
/// to reserve, LREM from it to ack.
pub struct RedisNotificationQueue {
    pool: Pool,
    queue_key: String,
    processing_key: String,
    dead_letter_key: String,
}

impl RedisNotificationQueue {
    pub async fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            NotificationError::QueueError(format!("Failed to create Redis pool: {}", e))
        })?;

        let queue = Self {
            pool,
            queue_key: config.notification_queue.clone(),
            processing_key: config.processing_queue(),
            dead_letter_key: config.dead_letter_queue(),
        };

        // Test connection
        let mut conn = queue.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification queue '{}' initialized", queue.queue_key);

        Ok(queue)
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| NotificationError::QueueError(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl NotificationQueue for RedisNotificationQueue {
    async fn push(&self, payload: String) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.lpush(&self.queue_key, payload).await?;
        Ok(())
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<String>, NotificationError> {
        let mut conn = self.get_connection().await?;
        let payload: Option<String> = conn
            .brpoplpush(&self.queue_key, &self.processing_key, timeout.as_secs_f64())
            .await?;
        Ok(payload)
    }

    async fn ack(&self, payload: &str) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        let removed: i64 = conn.lrem(&self.processing_key, 1, payload).await?;
        if removed == 0 {
            warn!("Acked message was not in '{}'", self.processing_key);
        }
        Ok(())
    }

    async fn dead_letter(&self, payload: &str, reason: &str) -> Result<(), NotificationError> {
        let entry = DeadLetter {
            payload: payload.to_string(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
        };
        let mut conn = self.get_connection().await?;
        let _: () = conn
            .lpush(&self.dead_letter_key, serde_json::to_string(&entry)?)
            .await?;
        Ok(())
    }

    async fn recover_in_flight(&self) -> Result<usize, NotificationError> {
        let mut conn = self.get_connection().await?;
        let mut recovered = 0;

        // Oldest in-flight message goes back to the consuming end first.
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.queue_key)
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            info!("Recovered {} in-flight notifications", recovered);
        }
        Ok(recovered)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
struct QueueState {
    /// Front is the publish end, back is the consuming end.
    pending: VecDeque<String>,
    in_flight: Vec<String>,
    dead: Vec<DeadLetter>,
}

/// Process-local queue with the same reserve/ack contract as Redis.
#[derive(Default)]
pub struct InMemoryNotificationQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.clone()
    }

    /// Pending payloads in consumption order.
    pub async fn pending(&self) -> Vec<String> {
        self.state.lock().await.pending.iter().rev().cloned().collect()
    }

    async fn try_reserve(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        let payload = state.pending.pop_back()?;
        state.in_flight.push(payload.clone());
        Some(payload)
    }
}

#[async_trait]
impl NotificationQueue for InMemoryNotificationQueue {
    async fn push(&self, payload: String) -> Result<(), NotificationError> {
        self.state.lock().await.pending.push_front(payload);
        self.available.notify_one();
        Ok(())
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<String>, NotificationError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(payload) = self.try_reserve().await {
                return Ok(Some(payload));
            }
            // notify_one leaves a permit when nobody waits, so a push between
            // the check above and this await is not lost.
            if tokio::time::timeout_at(deadline, self.available.notified()).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, payload: &str) -> Result<(), NotificationError> {
        let mut state = self.state.lock().await;
        match state.in_flight.iter().position(|p| p == payload) {
            Some(index) => {
                state.in_flight.remove(index);
            }
            None => debug!("Acked message was not in flight"),
        }
        Ok(())
    }

    async fn dead_letter(&self, payload: &str, reason: &str) -> Result<(), NotificationError> {
        self.state.lock().await.dead.push(DeadLetter {
            payload: payload.to_string(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn recover_in_flight(&self) -> Result<usize, NotificationError> {
        let mut state = self.state.lock().await;
        let stranded: Vec<String> = state.in_flight.drain(..).collect();
        let recovered = stranded.len();
        for payload in stranded {
            state.pending.push_back(payload);
        }
        drop(state);

        for _ in 0..recovered {
            self.available.notify_one();
        }
        Ok(recovered)
    }
}
