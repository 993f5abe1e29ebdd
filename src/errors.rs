use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Entry {key} is {size} bytes, cache limit is {limit} bytes")]
    EntryTooLarge { key: String, size: usize, limit: usize },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("request cancelled")]
    Cancelled,
}

impl CalendarError {
    /// Whether the loader should try the same request again.
    ///
    /// Client errors other than timeouts and rate limiting fail fast.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CalendarError::Http { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            CalendarError::Network(_) | CalendarError::Io(_) | CalendarError::Json(_) => true,
            CalendarError::InvalidRequest(_)
            | CalendarError::EntryTooLarge { .. }
            | CalendarError::Config(_)
            | CalendarError::Storage(_)
            | CalendarError::Cancelled => false,
        }
    }
}

impl From<serde_json::Error> for CalendarError {
    fn from(e: serde_json::Error) -> Self {
        CalendarError::Json(e.to_string())
    }
}

impl From<std::io::Error> for CalendarError {
    fn from(e: std::io::Error) -> Self {
        CalendarError::Io(e.to_string())
    }
}
