//! Windowed rendering math for long slot and appointment lists.

mod item;
mod window;

pub use item::{Appointment, ItemKind, SlotGrid, VirtualScrollItem, build_day_items};
pub use window::{PositionedItem, VirtualList, VisibleRange, compute_window, fixed_height_window};
