use crate::errors::CalendarError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the lazy loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub max_concurrency: usize,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub prefetch: bool,
    pub request_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            prefetch: true,
            request_timeout_ms: 10_000,
        }
    }
}

impl LoaderConfig {
    /// Delay before the attempt following `attempt` (1-based): `base * 2^(attempt - 1)`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << shift))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// # Errors
    /// Returns `Config` for a zero concurrency limit or zero attempts.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.max_concurrency == 0 {
            return Err(CalendarError::Config("loader.max_concurrency must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(CalendarError::Config("loader.retry_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
