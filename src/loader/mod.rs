mod config;
mod manager;
mod source;

pub use config::LoaderConfig;
pub use manager::{LazyLoadManager, LoaderStats};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::CalendarSource;
