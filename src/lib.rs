//! Calendar data layer for a scheduling frontend: a bounded calendar cache,
//! a deduplicating lazy loader in front of the REST backend, and windowing
//! math for virtualized day columns.

pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod loader;
pub mod logger;
pub mod request;
pub mod types;
pub mod virtual_scroll;

pub use cache::{CacheConfig, CalendarCache, EvictionStrategy};
pub use errors::CalendarError;
pub use loader::{CalendarSource, LazyLoadManager, LoaderConfig};
pub use request::{CalendarDataRequest, CalendarView, Direction};
pub use types::Priority;
