use std::env;
use std::str::FromStr;
use tracing::warn;

/// Where entity records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    InMemory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" | "postgres" => Ok(StorageBackend::Supabase),
            "memory" | "in-memory" | "in_memory" => Ok(StorageBackend::InMemory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Which queue carries notification events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Redis,
    InMemory,
}

impl FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(QueueBackend::Redis),
            "memory" | "in-memory" | "in_memory" => Ok(QueueBackend::InMemory),
            other => Err(format!("unknown queue backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub storage_backend: StorageBackend,
    pub redis_url: Option<String>,
    pub queue_backend: QueueBackend,
    pub notification_queue: String,
    pub slot_duration_minutes: i64,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub notification_poll_timeout_seconds: u64,
    pub notification_handler_timeout_seconds: u64,
    pub notification_publish_timeout_ms: u64,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            storage_backend: StorageBackend::InMemory,
            redis_url: None,
            queue_backend: QueueBackend::InMemory,
            notification_queue: "notifications".to_string(),
            slot_duration_minutes: 30,
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: "noreply@example.com".to_string(),
            notification_poll_timeout_seconds: 5,
            notification_handler_timeout_seconds: 30,
            notification_publish_timeout_ms: 2000,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let supabase_url = env::var("SUPABASE_URL").unwrap_or_else(|_| {
            warn!("SUPABASE_URL not set, using empty value");
            String::new()
        });
        let supabase_service_key = env::var("SUPABASE_SERVICE_KEY").unwrap_or_else(|_| {
            warn!("SUPABASE_SERVICE_KEY not set, using empty value");
            String::new()
        });
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory storage", e);
                StorageBackend::InMemory
            }),
            Err(_) if !supabase_url.is_empty() => StorageBackend::Supabase,
            Err(_) => {
                warn!("STORAGE_BACKEND not set and Supabase unconfigured, using in-memory storage");
                StorageBackend::InMemory
            }
        };

        let queue_backend = match env::var("QUEUE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory queue", e);
                QueueBackend::InMemory
            }),
            Err(_) if redis_url.is_some() => QueueBackend::Redis,
            Err(_) => {
                warn!("QUEUE_BACKEND not set and REDIS_URL missing, using in-memory queue");
                QueueBackend::InMemory
            }
        };

        let mut config = Self {
            supabase_url,
            supabase_service_key,
            storage_backend,
            redis_url,
            queue_backend,
            notification_queue: env::var("NOTIFICATION_QUEUE")
                .unwrap_or(defaults.notification_queue),
            slot_duration_minutes: parse_or("SLOT_DURATION_MINUTES", defaults.slot_duration_minutes),
            email_api_url: env::var("EMAIL_API_URL").unwrap_or_else(|_| {
                warn!("EMAIL_API_URL not set, email delivery disabled");
                String::new()
            }),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM").unwrap_or(defaults.email_from),
            notification_poll_timeout_seconds: parse_or(
                "NOTIFICATION_POLL_TIMEOUT_SECONDS",
                defaults.notification_poll_timeout_seconds,
            ),
            notification_handler_timeout_seconds: parse_or(
                "NOTIFICATION_HANDLER_TIMEOUT_SECONDS",
                defaults.notification_handler_timeout_seconds,
            ),
            notification_publish_timeout_ms: parse_or(
                "NOTIFICATION_PUBLISH_TIMEOUT_MS",
                defaults.notification_publish_timeout_ms,
            ),
            server_port: parse_or("PORT", defaults.server_port),
        };

        if config.slot_duration_minutes <= 0 {
            warn!("SLOT_DURATION_MINUTES must be positive, using 30");
            config.slot_duration_minutes = 30;
        }

        if config.storage_backend == StorageBackend::Supabase && !config.is_supabase_configured() {
            warn!("Supabase storage selected but SUPABASE_URL or SUPABASE_SERVICE_KEY is missing");
        }

        config
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }

    /// Key of the list holding messages a consumer has taken but not acknowledged.
    pub fn processing_queue(&self) -> String {
        format!("{}:processing", self.notification_queue)
    }

    pub fn dead_letter_queue(&self) -> String {
        format!("{}:dead", self.notification_queue)
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value ({}), using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
