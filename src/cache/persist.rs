use crate::cache::entry::CacheEntry;
use crate::cache::storage::Storage;
use crate::types::Millis;
use serde::{Deserialize, Serialize};

/// The blob written under the cache's storage key.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: Millis,
    /// Least to most recently used.
    pub entries: Vec<CacheEntry>,
}

/// Reads the persisted snapshot. Unparseable or stale blobs are removed and
/// treated as absent.
pub fn load(storage: &dyn Storage, key: &str, now: Millis, max_age_ms: i64) -> Option<Snapshot> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("cache storage read failed: {e}");
            return None;
        }
    };
    let snapshot: Snapshot = match serde_json::from_str(&raw) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("discarding unreadable persisted cache: {e}");
            discard(storage, key);
            return None;
        }
    };
    if now.saturating_sub(snapshot.saved_at) > max_age_ms {
        log::info!("discarding persisted cache saved {}ms ago", now - snapshot.saved_at);
        discard(storage, key);
        return None;
    }
    Some(snapshot)
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    saved_at: Millis,
    entries: Vec<&'a CacheEntry>,
}

/// Writes `entries` (least to most recently used); failures are logged and dropped.
pub fn save(storage: &dyn Storage, key: &str, saved_at: Millis, entries: Vec<&CacheEntry>) {
    match serde_json::to_string(&SnapshotRef { saved_at, entries }) {
        Ok(blob) => {
            if let Err(e) = storage.set_item(key, &blob) {
                log::warn!("cache persistence failed: {e}");
            }
        }
        Err(e) => log::warn!("cache snapshot serialization failed: {e}"),
    }
}

pub fn discard(storage: &dyn Storage, key: &str) {
    if let Err(e) = storage.remove_item(key) {
        log::warn!("failed to remove persisted cache: {e}");
    }
}
