use crate::cache::compress::Payload;
use crate::cache::config::{CacheConfig, EvictionStrategy};
use crate::cache::entry::{CacheEntry, entry_size};
use crate::cache::metrics::{CacheMetrics, CacheMetricsSnapshot, CacheStats};
use crate::cache::persist;
use crate::cache::policy::{expired_keys, select_victim};
use crate::cache::storage::Storage;
use crate::errors::CalendarError;
use crate::request::CalendarDataRequest;
use crate::types::{CacheKey, Millis, Priority, now_millis};
use chrono::NaiveDate;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const METRICS: &str = "slotcache::metrics";

struct CacheState {
    store: LruCache<CacheKey, CacheEntry>,
    total_bytes: usize,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.store.pop(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.total_bytes += entry.size;
        self.store.put(entry.key.clone(), entry);
    }
}

enum Lookup {
    Miss,
    Expired,
    Hit(Vec<u8>),
}

/// Calendar data cache with count and byte limits, pluggable eviction,
/// optional gzip compression and optional persistence.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct CalendarCache {
    state: Arc<Mutex<CacheState>>,
    config: Arc<CacheConfig>,
    metrics: Arc<CacheMetrics>,
    storage: Option<Arc<dyn Storage>>,
}

impl CalendarCache {
    /// Creates an in-memory cache.
    ///
    /// # Errors
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: CacheConfig) -> Result<Self, CalendarError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(CacheState { store: LruCache::unbounded(), total_bytes: 0 })),
            config: Arc::new(config),
            metrics: Arc::new(CacheMetrics::default()),
            storage: None,
        })
    }

    /// Creates a cache backed by `storage`. When `config.persistence` is set,
    /// a previously saved state is restored and every mutation is written back.
    ///
    /// # Errors
    /// Returns `Config` if the configuration is invalid.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn Storage>) -> Result<Self, CalendarError> {
        let mut cache = Self::new(config)?;
        cache.storage = Some(storage);
        if cache.config.persistence {
            cache.restore();
        }
        Ok(cache)
    }

    /// Stores `data` for `request` at normal priority.
    ///
    /// # Errors
    /// See [`CalendarCache::set_with_priority`].
    pub fn set<T: Serialize + ?Sized>(
        &self,
        request: &CalendarDataRequest,
        data: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CalendarError> {
        self.set_with_priority(request, data, ttl, Priority::Normal)
    }

    /// Stores a serialized copy of `data`, evicting until the entry fits.
    /// `ttl` defaults to the configured TTL; a zero TTL stores an entry that
    /// is already expired.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for an inverted range, `Json` if `data` cannot
    /// be serialized and `EntryTooLarge` if the entry alone exceeds the byte
    /// budget. The cache is unchanged on error.
    pub fn set_with_priority<T: Serialize + ?Sized>(
        &self,
        request: &CalendarDataRequest,
        data: &T,
        ttl: Option<Duration>,
        priority: Priority,
    ) -> Result<(), CalendarError> {
        request.validate()?;
        let json = serde_json::to_string(data)?;
        let raw_len = json.len();
        let payload =
            Payload::encode(json, self.config.compression, self.config.compression_threshold);
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let now = now_millis();
        let entry = CacheEntry::new(request.clone(), payload, now, ttl_ms, priority);

        let limit = self.config.max_bytes();
        if entry.size > limit {
            return Err(CalendarError::EntryTooLarge { key: entry.key, size: entry.size, limit });
        }
        if entry.data.is_compressed() {
            CacheMetrics::bump(&self.metrics.compressed, 1);
            CacheMetrics::bump(&self.metrics.bytes_saved, raw_len.saturating_sub(entry.data.len()));
        }

        let mut state = self.state.lock();
        state.remove(&entry.key);
        let evicted = self.make_room(&mut state, entry.size, now, self.config.strategy);
        state.insert(entry);
        CacheMetrics::bump(&self.metrics.inserts, 1);
        if evicted > 0 {
            log::debug!(
                target: METRICS,
                "evicted={evicted} strategy={:?} entries={} bytes={}",
                self.config.strategy,
                state.store.len(),
                state.total_bytes
            );
        }
        self.persist(&state);
        Ok(())
    }

    /// Returns a fresh copy of the cached data, or `None` when absent,
    /// expired or undecodable.
    pub fn get<T: DeserializeOwned>(&self, request: &CalendarDataRequest) -> Option<T> {
        let key = request.cache_key();
        let now = now_millis();
        let mut state = self.state.lock();
        let lookup = match state.store.get_mut(&key) {
            None => Lookup::Miss,
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(entry) => {
                entry.hits += 1;
                entry.last_accessed = now;
                Lookup::Hit(entry.data.decode())
            }
        };
        match lookup {
            Lookup::Miss => {
                CacheMetrics::bump(&self.metrics.misses, 1);
                None
            }
            Lookup::Expired => {
                state.remove(&key);
                CacheMetrics::bump(&self.metrics.expirations, 1);
                CacheMetrics::bump(&self.metrics.misses, 1);
                self.persist(&state);
                None
            }
            Lookup::Hit(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    CacheMetrics::bump(&self.metrics.hits, 1);
                    Some(value)
                }
                Err(e) => {
                    log::warn!("dropping undecodable cache entry {key}: {e}");
                    state.remove(&key);
                    CacheMetrics::bump(&self.metrics.misses, 1);
                    self.persist(&state);
                    None
                }
            },
        }
    }

    /// Whether an unexpired entry exists. Does not affect recency or hit counts.
    pub fn contains(&self, request: &CalendarDataRequest) -> bool {
        let now = now_millis();
        self.state.lock().store.peek(&request.cache_key()).is_some_and(|e| !e.is_expired(now))
    }

    /// Removes the entry for `request`. Returns whether one existed.
    pub fn delete(&self, request: &CalendarDataRequest) -> bool {
        self.delete_key(&request.cache_key())
    }

    /// Removes an entry by its raw key.
    pub fn delete_key(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.remove(key).is_some();
        if removed {
            CacheMetrics::bump(&self.metrics.removes, 1);
            self.persist(&state);
        }
        removed
    }

    /// Clears the cache.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let n = state.store.len();
        state.store.clear();
        state.total_bytes = 0;
        CacheMetrics::bump(&self.metrics.removes, n);
        self.persist(&state);
    }

    /// Removes every expired entry now. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = now_millis();
        let mut state = self.state.lock();
        let keys = expired_keys(&state.store, now);
        for key in &keys {
            state.remove(key);
        }
        if !keys.is_empty() {
            CacheMetrics::bump(&self.metrics.expirations, keys.len());
            log::debug!(target: METRICS, "ttl_purge evicted={}", keys.len());
            self.persist(&state);
        }
        keys.len()
    }

    /// Drops every entry whose request matches `pred`. Returns the number removed.
    pub fn invalidate_where<F>(&self, pred: F) -> usize
    where
        F: Fn(&CalendarDataRequest) -> bool,
    {
        let mut state = self.state.lock();
        let keys: Vec<CacheKey> =
            state.store.iter().filter(|(_, e)| pred(&e.request)).map(|(k, _)| k.clone()).collect();
        for key in &keys {
            state.remove(key);
        }
        if !keys.is_empty() {
            CacheMetrics::bump(&self.metrics.removes, keys.len());
            self.persist(&state);
        }
        keys.len()
    }

    /// Drops entries whose date range intersects `[start, end]`, e.g. after an
    /// appointment in that range was created, moved or cancelled.
    pub fn invalidate_overlapping(&self, start: NaiveDate, end: NaiveDate) -> usize {
        self.invalidate_where(|r| r.overlaps(start, end))
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.state.lock().store.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget.
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a snapshot of metrics.
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.metrics.snapshot();
        let state = self.state.lock();
        CacheStats {
            entries: state.store.len(),
            max_entries: self.config.max_entries,
            total_bytes: state.total_bytes,
            max_bytes: self.config.max_bytes(),
            hit_rate: CacheStats::hit_rate_of(&counters),
            compressed_entries: state.store.iter().filter(|(_, e)| e.data.is_compressed()).count(),
            low_priority_entries: state
                .store
                .iter()
                .filter(|(_, e)| e.priority == Priority::Low)
                .count(),
            counters,
        }
    }

    /// Starts a Tokio task purging expired entries every
    /// `cleanup_interval_secs`. Abort the handle to stop it.
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        let period = Duration::from_secs(self.config.cleanup_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.purge_expired();
            }
        })
    }

    /// Evicts until an entry of `incoming` bytes fits. Returns the eviction count.
    fn make_room(
        &self,
        state: &mut CacheState,
        incoming: usize,
        now: Millis,
        strategy: EvictionStrategy,
    ) -> usize {
        let limit = self.config.max_bytes();
        let mut evicted = 0usize;
        while state.store.len() >= self.config.max_entries
            || state.total_bytes.saturating_add(incoming) > limit
        {
            let Some(victim) = select_victim(&state.store, strategy, now) else {
                break;
            };
            if state.remove(&victim).is_some() {
                evicted += 1;
            }
        }
        CacheMetrics::bump(&self.metrics.evictions, evicted);
        evicted
    }

    fn persist(&self, state: &CacheState) {
        if !self.config.persistence {
            return;
        }
        if let Some(storage) = &self.storage {
            let entries: Vec<&CacheEntry> = state.store.iter().rev().map(|(_, e)| e).collect();
            persist::save(storage.as_ref(), &self.config.storage_key, now_millis(), entries);
        }
    }

    fn restore(&self) {
        let Some(storage) = &self.storage else { return };
        let now = now_millis();
        let max_age_ms = i64::try_from(self.config.persist_max_age().as_millis()).unwrap_or(i64::MAX);
        let Some(snapshot) = persist::load(storage.as_ref(), &self.config.storage_key, now, max_age_ms)
        else {
            return;
        };
        let limit = self.config.max_bytes();
        let mut state = self.state.lock();
        let mut restored = 0usize;
        for mut entry in snapshot.entries {
            if entry.is_expired(now) || entry.key != entry.request.cache_key() {
                continue;
            }
            entry.size = entry_size(&entry.key, &entry.data);
            if entry.size > limit {
                continue;
            }
            state.remove(&entry.key);
            // Snapshots replay oldest first; evicting by recency keeps the newest.
            self.make_room(&mut state, entry.size, now, EvictionStrategy::Lru);
            state.insert(entry);
            restored += 1;
        }
        log::info!("restored {restored} cache entries from storage");
    }
}
