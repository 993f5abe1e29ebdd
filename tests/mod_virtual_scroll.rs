use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use fake::{Fake, faker::name::en::Name};
use slotcache::virtual_scroll::{
    Appointment, ItemKind, SlotGrid, VirtualList, VirtualScrollItem, build_day_items, compute_window,
    fixed_height_window,
};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    monday().and_hms_opt(h, m, 0).unwrap()
}

fn appt(id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Appointment {
    Appointment {
        id: id.into(),
        client_name: Name().fake(),
        service: "Skin fade".into(),
        barber_id: Some("b1".into()),
        start,
        end,
        status: Some("booked".into()),
    }
}

#[test]
fn test_empty_day_has_headers_and_slots() {
    let items = build_day_items(monday(), &[], &SlotGrid::default());
    // 08:00..20:00: 12 headers and 24 half-hour slots.
    assert_eq!(items.iter().filter(|i| i.kind == ItemKind::Header).count(), 12);
    assert_eq!(items.iter().filter(|i| i.kind == ItemKind::EmptySlot).count(), 24);
    assert_eq!(items[0].id, "header-08:00");
    assert_eq!(items[1].id, "slot-08:00");
    let total: f64 = items.iter().map(|i| i.height).sum();
    assert_eq!(total, 12.0 * 28.0 + 24.0 * 48.0);
}

#[test]
fn test_headers_can_be_disabled() {
    let grid = SlotGrid { hour_headers: false, ..SlotGrid::default() };
    let items = build_day_items(monday(), &[], &grid);
    assert!(items.iter().all(|i| i.kind == ItemKind::EmptySlot));
}

fn ids_until(items: &[VirtualScrollItem], n: usize) -> Vec<&str> {
    items.iter().take(n).map(|i| i.id.as_str()).collect()
}

#[test]
fn test_headers_with_slots_that_straddle_hours() {
    let grid = SlotGrid { slot_minutes: 45, ..SlotGrid::default() };
    let items = build_day_items(monday(), &[], &grid);
    let headers = items.iter().filter(|i| i.kind == ItemKind::Header).count();
    assert_eq!(headers, 12);
    assert_eq!(
        ids_until(&items, 9),
        vec![
            "header-08:00",
            "slot-08:00",
            "header-09:00",
            "slot-08:45",
            "header-10:00",
            "slot-09:30",
            "slot-10:15",
            "header-11:00",
            "slot-11:00",
        ]
    );
}

#[test]
fn test_headers_when_day_starts_off_the_hour() {
    let grid = SlotGrid { day_start: NaiveTime::from_hms_opt(8, 15, 0).unwrap(), ..SlotGrid::default() };
    let items = build_day_items(monday(), &[], &grid);
    let headers: Vec<&str> =
        items.iter().filter(|i| i.kind == ItemKind::Header).map(|i| i.id.as_str()).collect();
    assert_eq!(headers.len(), 11);
    assert_eq!(headers[0], "header-09:00");
    assert_eq!(headers[10], "header-19:00");
    assert_eq!(
        ids_until(&items, 6),
        vec!["slot-08:15", "header-09:00", "slot-08:45", "slot-09:15", "header-10:00", "slot-09:45"]
    );
}

#[test]
fn test_appointments_replace_covered_slots() {
    let grid = SlotGrid::default();
    let appts = vec![appt("long", at(10, 0), at(11, 30)), appt("short", at(14, 0), at(14, 15))];
    let items = build_day_items(monday(), &appts, &grid);

    let long = items.iter().find(|i| i.id == "appt-long").unwrap();
    assert_eq!(long.height, 3.0 * 48.0);
    assert_eq!(long.appointment_id.as_deref(), Some("long"));
    // Short appointments still get a full slot.
    let short = items.iter().find(|i| i.id == "appt-short").unwrap();
    assert_eq!(short.height, 48.0);

    for covered in ["slot-10:00", "slot-10:30", "slot-11:00"] {
        assert!(items.iter().all(|i| i.id != covered), "{covered} should be hidden");
    }
    assert!(items.iter().any(|i| i.id == "slot-11:30"));
    assert!(items.iter().any(|i| i.id == "slot-14:30"));
    assert!(items.iter().enumerate().all(|(n, i)| i.index == n));
}

#[test]
fn test_out_of_grid_appointments_are_dropped() {
    let appts = vec![
        appt("early", at(6, 0), at(7, 0)),
        appt("late", at(21, 0), at(22, 0)),
        appt("tomorrow", at(9, 0) + chrono::Duration::days(1), at(10, 0) + chrono::Duration::days(1)),
    ];
    let items = build_day_items(monday(), &appts, &SlotGrid::default());
    assert!(items.iter().all(|i| i.kind != ItemKind::Appointment));
}

#[test]
fn test_back_to_back_appointments_share_a_slot() {
    let appts = vec![appt("a", at(9, 0), at(9, 20)), appt("b", at(9, 20), at(9, 40))];
    let items = build_day_items(monday(), &appts, &SlotGrid::default());
    let ids: Vec<&str> = items
        .iter()
        .filter(|i| i.start_time >= at(9, 0) && i.start_time < at(10, 0))
        .map(|i| i.id.as_str())
        .collect();
    assert_eq!(ids, vec!["header-09:00", "appt-a", "appt-b"]);
}

#[test]
fn test_list_window_and_positions() {
    let grid = SlotGrid {
        day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        hour_headers: false,
        ..SlotGrid::default()
    };
    let list = VirtualList::new(build_day_items(monday(), &[], &grid));
    assert_eq!(list.len(), 16);
    assert_eq!(list.total_height(), 16.0 * 48.0);

    let range = list.window(100.0, 200.0, 1);
    // Rows 2..=6 intersect [100, 300); one extra on each side.
    assert_eq!((range.start, range.end), (1, 8));
    let rows = list.positioned(&range);
    assert_eq!(rows.len(), range.len());
    assert_eq!(rows[0].top, 48.0);
    assert_eq!(rows[0].item.index, 1);
    assert_eq!(list.offset_of(3), Some(144.0));
    assert_eq!(list.offset_of(16), None);
}

#[test]
fn test_offset_for_time() {
    let appts = vec![appt("a", at(12, 0), at(13, 0))];
    let list = VirtualList::new(build_day_items(monday(), &appts, &SlotGrid::default()));
    let noon = list.offset_for_time(at(12, 10));
    let appt_row = list.items().iter().position(|i| i.id == "appt-a").unwrap();
    assert_eq!(Some(noon), list.offset_of(appt_row));
    assert_eq!(list.offset_for_time(at(23, 0)), list.total_height());
    assert_eq!(list.offset_for_time(at(0, 0)), list.offset_of(1).unwrap());
}

#[test]
fn test_empty_list_window() {
    let list = VirtualList::new(Vec::new());
    let r = list.window(0.0, 500.0, 5);
    assert!(r.is_empty());
    assert_eq!(r.total_height, 0.0);
    assert!(list.positioned(&r).is_empty());
}

#[test]
fn test_scroll_past_end_keeps_overscan_tail() {
    let heights = vec![20.0; 50];
    let r = compute_window(&heights, 5_000.0, 300.0, 3);
    assert_eq!((r.start, r.end), (47, 50));
    let f = fixed_height_window(50, 20.0, 5_000.0, 300.0, 3);
    assert_eq!((f.start, f.end), (47, 50));
}

#[test]
fn test_degenerate_inputs() {
    let heights = vec![10.0; 10];
    let r = compute_window(&heights, -50.0, 25.0, 0);
    assert_eq!((r.start, r.end), (0, 3));
    let r = compute_window(&heights, f64::NAN, 25.0, 0);
    assert_eq!(r.start, 0);
    assert!(fixed_height_window(10, 0.0, 0.0, 100.0, 2).is_empty());
}
