mod compress;
mod config;
mod core;
mod entry;
mod metrics;
mod persist;
mod policy;
mod storage;

pub use compress::Payload;
pub use config::{CacheConfig, EvictionStrategy};
pub use self::core::CalendarCache;
pub use entry::CacheEntry;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot, CacheStats};
pub use persist::Snapshot;
pub use storage::{FileStorage, MemoryStorage, Storage};
