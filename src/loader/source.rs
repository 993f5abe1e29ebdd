use crate::errors::CalendarError;
use crate::request::CalendarDataRequest;
use async_trait::async_trait;
use serde_json::Value;

/// Where calendar data comes from when the cache misses.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn load(&self, request: &CalendarDataRequest) -> Result<Value, CalendarError>;
}

/// Fetches calendar data from a REST endpoint with `GET endpoint?query`.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// # Errors
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Config(format!("http client: {e}")))?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl CalendarSource for HttpSource {
    async fn load(&self, request: &CalendarDataRequest) -> Result<Value, CalendarError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            };
            return Err(CalendarError::Http { status: status.as_u16(), message });
        }
        response.json::<Value>().await.map_err(|e| CalendarError::Json(e.to_string()))
    }
}
