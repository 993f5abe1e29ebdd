use crate::virtual_scroll::item::{ItemKind, VirtualScrollItem};
use chrono::NaiveDateTime;
use serde::Serialize;

/// The slice of a list to render: `start..end` plus placement info.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct VisibleRange {
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    /// Top offset of the item at `start`.
    pub offset_top: f64,
    pub total_height: f64,
}

impl VisibleRange {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An item with its absolute top offset inside the scroll container.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PositionedItem<'a> {
    pub item: &'a VirtualScrollItem,
    pub top: f64,
}

/// Prefix offsets of a list of heights; `offsets[i]` is the top of item `i`
/// and the last element is the total height.
fn prefix_offsets(heights: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut offsets = vec![0.0];
    let mut acc = 0.0;
    for h in heights {
        acc += h.max(0.0);
        offsets.push(acc);
    }
    offsets
}

/// Clamps the viewport to non-negative finite values.
fn viewport(scroll_top: f64, container_height: f64) -> (f64, f64) {
    let top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };
    let height = if container_height.is_finite() { container_height.max(0.0) } else { 0.0 };
    (top, top + height)
}

fn window_from_offsets(
    offsets: &[f64],
    scroll_top: f64,
    container_height: f64,
    overscan: usize,
) -> VisibleRange {
    let count = offsets.len().saturating_sub(1);
    let total_height = offsets.last().copied().unwrap_or(0.0);
    if count == 0 {
        return VisibleRange { total_height, ..VisibleRange::default() };
    }
    let (view_top, view_bottom) = viewport(scroll_top, container_height);

    // First item whose bottom lies below the viewport top.
    let first = offsets[1..].partition_point(|&bottom| bottom <= view_top);
    // Items whose top lies above the viewport bottom.
    let last = offsets[..count].partition_point(|&top| top < view_bottom).max(first);

    let start = first.saturating_sub(overscan).min(count);
    let end = last.saturating_add(overscan).min(count).max(start);
    VisibleRange { start, end, offset_top: offsets[start], total_height }
}

/// Window over a bare list of heights: the items intersecting
/// `[scroll_top, scroll_top + container_height)` plus `overscan` on each side.
#[must_use]
pub fn compute_window(
    heights: &[f64],
    scroll_top: f64,
    container_height: f64,
    overscan: usize,
) -> VisibleRange {
    let offsets = prefix_offsets(heights.iter().copied());
    window_from_offsets(&offsets, scroll_top, container_height, overscan)
}

/// O(1) window for `count` items of identical height.
#[must_use]
pub fn fixed_height_window(
    count: usize,
    item_height: f64,
    scroll_top: f64,
    container_height: f64,
    overscan: usize,
) -> VisibleRange {
    if count == 0 || !item_height.is_finite() || item_height <= 0.0 {
        return VisibleRange::default();
    }
    let total_height = count as f64 * item_height;
    let (view_top, view_bottom) = viewport(scroll_top, container_height);
    let first = ((view_top / item_height).floor() as usize).min(count);
    let last = ((view_bottom / item_height).ceil() as usize).min(count).max(first);
    let start = first.saturating_sub(overscan);
    let end = last.saturating_add(overscan).min(count);
    VisibleRange { start, end, offset_top: start as f64 * item_height, total_height }
}

/// Items plus their precomputed offsets. Rebuild whenever the items change.
#[derive(Clone, Debug, Default)]
pub struct VirtualList {
    items: Vec<VirtualScrollItem>,
    offsets: Vec<f64>,
}

impl VirtualList {
    #[must_use]
    pub fn new(items: Vec<VirtualScrollItem>) -> Self {
        let offsets = prefix_offsets(items.iter().map(|i| i.height));
        Self { items, offsets }
    }

    #[must_use]
    pub fn items(&self) -> &[VirtualScrollItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn total_height(&self) -> f64 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// Top offset of item `index`, or `None` past the end.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> Option<f64> {
        if index < self.items.len() { self.offsets.get(index).copied() } else { None }
    }

    #[must_use]
    pub fn window(&self, scroll_top: f64, container_height: f64, overscan: usize) -> VisibleRange {
        window_from_offsets(&self.offsets, scroll_top, container_height, overscan)
    }

    /// The items of `range` with their absolute top offsets.
    #[must_use]
    pub fn positioned(&self, range: &VisibleRange) -> Vec<PositionedItem<'_>> {
        let end = range.end.min(self.items.len());
        let start = range.start.min(end);
        self.items[start..end]
            .iter()
            .zip(&self.offsets[start..end])
            .map(|(item, &top)| PositionedItem { item, top })
            .collect()
    }

    /// Scroll offset bringing the first non-header row that ends after `time`
    /// to the top, or the total height when `time` is past every row.
    #[must_use]
    pub fn offset_for_time(&self, time: NaiveDateTime) -> f64 {
        self.items
            .iter()
            .position(|i| i.kind != ItemKind::Header && i.end_time > time)
            .and_then(|idx| self.offsets.get(idx).copied())
            .unwrap_or_else(|| self.total_height())
    }
}
