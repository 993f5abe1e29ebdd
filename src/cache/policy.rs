use crate::cache::config::EvictionStrategy;
use crate::cache::entry::CacheEntry;
use crate::types::{CacheKey, Millis};
use lru::LruCache;

/// Picks the next entry to evict under `strategy`, or `None` when empty.
///
/// `LruCache::iter` runs from most to least recently used. Ties always go to
/// the least recently used entry.
pub fn select_victim(
    store: &LruCache<CacheKey, CacheEntry>,
    strategy: EvictionStrategy,
    now: Millis,
) -> Option<CacheKey> {
    match strategy {
        EvictionStrategy::Lru => store.peek_lru().map(|(k, _)| k.clone()),
        EvictionStrategy::Lfu => {
            store.iter().rev().min_by_key(|(_, e)| e.hits).map(|(k, _)| k.clone())
        }
        EvictionStrategy::Ttl => store
            .iter()
            .rev()
            .find(|(_, e)| e.is_expired(now))
            .or_else(|| store.peek_lru())
            .map(|(k, _)| k.clone()),
        // max_by_key keeps the last maximum, so scan MRU to LRU here.
        EvictionStrategy::Size => store.iter().max_by_key(|(_, e)| e.size).map(|(k, _)| k.clone()),
    }
}

/// Keys of every expired entry.
pub fn expired_keys(store: &LruCache<CacheKey, CacheEntry>, now: Millis) -> Vec<CacheKey> {
    store.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect()
}
