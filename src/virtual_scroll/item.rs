//! Rows of a day column: hour headers, appointments and empty slots.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Header,
    Appointment,
    EmptySlot,
}

/// One rendered row. Rebuilt on every pass; the id is only stable for the
/// same input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VirtualScrollItem {
    pub id: String,
    pub kind: ItemKind,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub height: f64,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub client_name: String,
    pub service: String,
    #[serde(default)]
    pub barber_id: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub status: Option<String>,
}

impl Appointment {
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

/// Time grid of a day column, in minutes and pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotGrid {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_minutes: u32,
    pub slot_height: f64,
    pub header_height: f64,
    pub hour_headers: bool,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: 30,
            slot_height: 48.0,
            header_height: 28.0,
            hour_headers: true,
        }
    }
}

/// Builds the rows for `date`.
///
/// Appointments are placed in the slot where they start (appointments that
/// began before the grid are clamped to its first slot) and are sized by
/// duration, never shorter than one slot. Slots already covered by an earlier
/// appointment produce no row. Appointments entirely outside the grid are
/// dropped.
#[must_use]
pub fn build_day_items(
    date: NaiveDate,
    appointments: &[Appointment],
    grid: &SlotGrid,
) -> Vec<VirtualScrollItem> {
    let day_start = date.and_time(grid.day_start);
    let day_end = date.and_time(grid.day_end);
    let slot = chrono::Duration::minutes(i64::from(grid.slot_minutes.max(1)));

    let mut todays: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.start < day_end && a.end > day_start && a.start.date() <= date)
        .collect();
    todays.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut items = Vec::new();
    let mut next_appt = 0usize;
    let mut covered_until = day_start;
    let mut cursor = day_start;
    while cursor < day_end {
        let slot_end = (cursor + slot).min(day_end);
        if grid.hour_headers {
            // Every full hour inside [cursor, slot_end) gets a header before the slot row.
            let mut hour = next_full_hour(cursor);
            while hour < slot_end {
                let next = hour + chrono::Duration::hours(1);
                push(
                    &mut items,
                    format!("header-{}", hour.format("%H:%M")),
                    ItemKind::Header,
                    hour,
                    next,
                    grid.header_height,
                    None,
                );
                hour = next;
            }
        }
        let mut placed = false;
        while next_appt < todays.len() && todays[next_appt].start.max(day_start) < slot_end {
            let appt = todays[next_appt];
            let slots = appt.duration_minutes() as f64 / f64::from(grid.slot_minutes.max(1));
            let height = (slots * grid.slot_height).max(grid.slot_height);
            push(
                &mut items,
                format!("appt-{}", appt.id),
                ItemKind::Appointment,
                appt.start,
                appt.end,
                height,
                Some(appt.id.clone()),
            );
            covered_until = covered_until.max(appt.end);
            next_appt += 1;
            placed = true;
        }
        if !placed && covered_until <= cursor {
            push(
                &mut items,
                format!("slot-{}", cursor.format("%H:%M")),
                ItemKind::EmptySlot,
                cursor,
                slot_end,
                grid.slot_height,
                None,
            );
        }
        cursor = slot_end;
    }
    items
}

/// The first full hour at or after `t`.
fn next_full_hour(t: NaiveDateTime) -> NaiveDateTime {
    let floor = t.date().and_time(NaiveTime::from_hms_opt(t.hour(), 0, 0).unwrap_or(NaiveTime::MIN));
    if floor < t { floor + chrono::Duration::hours(1) } else { floor }
}

fn push(
    items: &mut Vec<VirtualScrollItem>,
    id: String,
    kind: ItemKind,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    height: f64,
    appointment_id: Option<String>,
) {
    let index = items.len();
    items.push(VirtualScrollItem { id, kind, start_time, end_time, height, index, appointment_id });
}
