use crate::request::CalendarDataRequest;
use chrono::NaiveDate;
use std::path::PathBuf;

pub enum Command {
    // Data access
    Fetch {
        request: CalendarDataRequest,
        prefetch: bool,
    },
    // Virtualized day column preview
    Window {
        appointments: PathBuf,
        date: NaiveDate,
        scroll_top: f64,
        height: f64,
        overscan: usize,
        slot_minutes: u32,
    },
    // Cache maintenance
    Stats,
    Keys,
    Clear,
    Purge,
    Invalidate {
        start: NaiveDate,
        end: NaiveDate,
    },
}
