use std::sync::Arc;

use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_cell::{email_transport, ConsumerConfig, NotificationConsumerService, RedisNotificationQueue};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting notification service");

    let config = AppConfig::from_env();
    let queue = Arc::new(RedisNotificationQueue::new(&config).await?);

    let consumer = Arc::new(NotificationConsumerService::new(
        queue,
        email_transport(&config),
        ConsumerConfig::from_app_config(&config),
    ));

    {
        let consumer = consumer.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => consumer.shutdown().await,
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        });
    }

    consumer.start().await?;

    let stats = consumer.stats().await;
    info!(
        received = stats.received,
        delivered = stats.delivered,
        dead_lettered = stats.dead_lettered,
        "Notification service stopped"
    );
    Ok(())
}
