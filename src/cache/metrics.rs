use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for observing cache behavior.
#[derive(Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub inserts: AtomicU64,
    pub removes: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
    pub compressed: AtomicU64,
    pub bytes_saved: AtomicU64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            compressed: self.compressed.load(Ordering::Relaxed),
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64, by: usize) {
        counter.fetch_add(by as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub removes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub compressed: u64,
    pub bytes_saved: u64,
}

/// Point-in-time view of the cache returned by `CalendarCache::stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub total_bytes: usize,
    pub max_bytes: usize,
    pub hit_rate: f64,
    pub compressed_entries: usize,
    pub low_priority_entries: usize,
    #[serde(flatten)]
    pub counters: CacheMetricsSnapshot,
}

impl CacheStats {
    pub(crate) fn hit_rate_of(counters: &CacheMetricsSnapshot) -> f64 {
        let total = counters.hits + counters.misses;
        if total == 0 { 0.0 } else { counters.hits as f64 / total as f64 }
    }
}
