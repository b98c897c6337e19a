use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::NotificationError;

/// Outbound email channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotificationError>;
}

/// JSON email API: `POST {url}` with a bearer key and `{from, to, subject, html}`.
pub struct HttpEmailTransport {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailTransport {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotificationError> {
        debug!("Sending email '{}' to {}", subject, to);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::DeliveryFailure(format!(
                "email API returned {}: {}",
                status, body
            )));
        }

        info!("Email sent to {}", to);
        Ok(())
    }
}

/// Writes emails to the log instead of sending them. Used when no email API
/// is configured.
pub struct LoggingEmailTransport;

#[async_trait]
impl EmailTransport for LoggingEmailTransport {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotificationError> {
        info!(to, subject, body_len = html.len(), "Email delivery not configured; logging notification");
        Ok(())
    }
}

/// The HTTP transport when an email API is configured, the logging one otherwise.
pub fn email_transport(config: &AppConfig) -> Arc<dyn EmailTransport> {
    if config.is_email_configured() {
        Arc::new(HttpEmailTransport::new(config))
    } else {
        warn!("Email API not configured; notifications will only be logged");
        Arc::new(LoggingEmailTransport)
    }
}
