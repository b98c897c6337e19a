use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Queue operation failed: {0}")]
    QueueError(String),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("No patient email in notification")]
    MissingRecipient,

    /// Queue publish or email send failed. Never propagated into booking.
    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Handler timeout: processing took longer than {timeout_seconds} seconds")]
    HandlerTimeout { timeout_seconds: u64 },
}
