use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key derived from a `CalendarDataRequest`.
pub type CacheKey = String;

/// Unix time in milliseconds.
pub type Millis = i64;

/// Scheduling priority for queued loads; also recorded on cache entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

#[must_use]
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}
