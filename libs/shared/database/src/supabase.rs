use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A unique or exclusion constraint rejected the write (HTTP 409).
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

/// Thin PostgREST client. Every call authenticates with the service key;
/// row-level policy is not this crate's concern.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => DatabaseError::Auth(error_text),
                404 => DatabaseError::NotFound(error_text),
                409 => DatabaseError::Conflict(error_text),
                code => DatabaseError::Api { status: code, message: error_text },
            });
        }

        let text = response.text().await?;
        // PostgREST answers 204 with an empty body when no representation is requested.
        let data = if text.trim().is_empty() {
            serde_json::from_value(Value::Null)
                .or_else(|_| serde_json::from_value(Value::Array(Vec::new())))?
        } else {
            serde_json::from_str(&text)?
        };
        Ok(data)
    }

    /// GET rows from a PostgREST path such as `/rest/v1/doctors?id=eq.<id>`.
    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None).await
    }

    pub async fn select_one<T>(&self, path: &str) -> Result<Option<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    /// POST a row and return the stored representation.
    pub async fn insert<T>(&self, table: &str, body: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<T> = self
            .request_with_headers(Method::POST, &path, Some(body), Some(Self::return_representation()))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Api { status: 200, message: format!("insert into {} returned no rows", table) })
    }

    /// PATCH the rows matched by `path`; `None` when nothing matched.
    pub async fn update<T>(&self, path: &str, body: Value) -> Result<Option<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(Method::PATCH, path, Some(body), Some(Self::return_representation()))
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn delete<T>(&self, path: &str) -> Result<Option<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(Method::DELETE, path, None, Some(Self::return_representation()))
            .await?;
        Ok(rows.into_iter().next())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}

/// Percent-encode a value for use inside a PostgREST filter.
pub fn encode_filter(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
