use crate::errors::CalendarError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which entry gets dropped when the cache is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    #[default]
    Lru,
    Lfu,
    Ttl,
    Size,
}

/// Configuration for the calendar cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_size_mb: f64,
    pub default_ttl_secs: u64,
    pub strategy: EvictionStrategy,
    pub compression: bool,
    pub compression_threshold: usize,
    pub persistence: bool,
    pub storage_key: String,
    pub persist_max_age_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_size_mb: 50.0,
            default_ttl_secs: 300,
            strategy: EvictionStrategy::Lru,
            compression: true,
            compression_threshold: 1024,
            persistence: false,
            storage_key: "calendar_cache".to_string(),
            persist_max_age_secs: 3600,
            cleanup_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    /// Byte budget: `max_size_mb * 1024 * 1024`.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        let bytes = self.max_size_mb * 1024.0 * 1024.0;
        if !bytes.is_finite() || bytes <= 0.0 {
            0
        } else if bytes >= usize::MAX as f64 {
            usize::MAX
        } else {
            bytes as usize
        }
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    #[must_use]
    pub fn persist_max_age(&self) -> Duration {
        Duration::from_secs(self.persist_max_age_secs)
    }

    /// # Errors
    /// Returns `Config` when a limit would make the cache unusable.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.max_entries == 0 {
            return Err(CalendarError::Config("cache.max_entries must be at least 1".into()));
        }
        if !self.max_size_mb.is_finite() || self.max_size_mb <= 0.0 {
            return Err(CalendarError::Config(format!(
                "cache.max_size_mb must be positive, got {}",
                self.max_size_mb
            )));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(CalendarError::Config("cache.cleanup_interval_secs must be non-zero".into()));
        }
        if self.storage_key.trim().is_empty() {
            return Err(CalendarError::Config("cache.storage_key must not be empty".into()));
        }
        Ok(())
    }
}
