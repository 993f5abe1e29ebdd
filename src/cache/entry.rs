use crate::cache::compress::Payload;
use crate::request::CalendarDataRequest;
use crate::types::{CacheKey, Millis, Priority};
use serde::{Deserialize, Serialize};

/// Represents an entry in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub request: CalendarDataRequest,
    pub data: Payload,
    pub timestamp: Millis,
    pub expires: Millis,
    pub hits: u64,
    pub last_accessed: Millis,
    pub size: usize,
    #[serde(default)]
    pub priority: Priority,
}

impl CacheEntry {
    #[must_use]
    pub fn new(
        request: CalendarDataRequest,
        data: Payload,
        now: Millis,
        ttl_ms: i64,
        priority: Priority,
    ) -> Self {
        let key = request.cache_key();
        let size = entry_size(&key, &data);
        Self {
            key,
            request,
            data,
            timestamp: now,
            expires: now.saturating_add(ttl_ms),
            hits: 0,
            last_accessed: now,
            size,
            priority,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires
    }
}

/// Bytes charged against the cache budget: stored payload plus key.
#[inline]
#[must_use]
pub fn entry_size(key: &str, data: &Payload) -> usize {
    key.len() + data.len()
}
