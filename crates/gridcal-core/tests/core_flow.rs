use std::ffi::OsString;
use std::fs;

use chrono::{NaiveDate, Utc};
use gridcal_core::datastore::DataStore;
use gridcal_core::drag::{DropOutcome, GridRect, Pointer, apply_drop, resolve_drop};
use gridcal_core::event::{CalendarEvent, EventTheme};
use gridcal_core::grid::{DisplayMode, map_consecutive_point, map_monthly_point};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn june_2024_drop_scenarios() {
    let reference = date(2024, 6, 1);
    assert_eq!(map_monthly_point(150.0, 50.0, 700.0, 600.0, reference), date(2024, 5, 29));
    assert_eq!(map_monthly_point(550.0, 550.0, 700.0, 600.0, reference), date(2024, 6, 29));

    let start = date(2024, 6, 3);
    assert_eq!(map_consecutive_point(0.0, 0.0, 700.0, 500.0, start), start);
    assert_eq!(map_consecutive_point(699.0, 499.0, 700.0, 500.0, start), date(2024, 7, 7));
}

#[test]
fn drag_and_drop_moves_event_between_views() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    let mut event = CalendarEvent::new("Quarterly review".to_string(), date(2024, 6, 10), now);
    event.theme = EventTheme::Warning;
    let event = store.add_event(event).expect("add event");

    // grid rendered at (40, 80) on the page
    let rect = GridRect::new(40.0, 80.0, 700.0, 600.0);
    let moved = apply_drop(
        &store,
        event.id,
        rect,
        Pointer { x: 40.0 + 350.0, y: 80.0 + 300.0 },
        DisplayMode::Monthly,
        date(2024, 6, 10),
        now,
    )
    .expect("apply drop")
    .expect("moved");
    // row 2, col 3: Thursday June 13
    assert_eq!(moved.date, date(2024, 6, 13));
    assert_eq!(moved.theme, EventTheme::Warning);

    let moved = apply_drop(
        &store,
        event.id,
        GridRect::new(0.0, 0.0, 700.0, 500.0),
        Pointer { x: 650.0, y: 450.0 },
        DisplayMode::Consecutive,
        moved.date,
        now,
    )
    .expect("apply drop")
    .expect("moved");
    // window for the week of June 13 starts Monday June 10
    assert_eq!(moved.date, date(2024, 7, 14));

    let stored = store.load_events().expect("load events");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].date, date(2024, 7, 14));

    let restored = store
        .pop_undo_snapshot()
        .expect("pop undo")
        .expect("snapshot");
    assert_eq!(restored[0].date, date(2024, 6, 13));
}

#[test]
fn unmeasured_grid_never_produces_a_date() {
    let outcome = resolve_drop(
        GridRect::new(10.0, 10.0, 0.0, 480.0),
        Pointer { x: 100.0, y: 100.0 },
        DisplayMode::Monthly,
        date(2024, 6, 10),
    );
    assert!(matches!(outcome, DropOutcome::Skipped(_)));
}

#[test]
fn cli_adds_and_drops_an_event() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("gridcalrc");
    fs::write(&rc, "color=off\ndefault.mode=consecutive\n").expect("write rc");
    let data = temp.path().join("data");

    let base = |extra: &[&str]| -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "gridcal".into(),
            "--rc-file".into(),
            rc.clone().into_os_string(),
            "--data".into(),
            data.clone().into_os_string(),
        ];
        args.extend(extra.iter().map(OsString::from));
        args
    };

    gridcal_core::run(base(&["add", "2024-06-03", "Standup", "theme:info", "time:09:15"]))
        .expect("add via cli");

    let store = DataStore::open(&data).expect("open store");
    let events = store.load_events().expect("load events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Standup");
    assert_eq!(events[0].theme, EventTheme::Info);

    let id = events[0].short_id();
    gridcal_core::run(base(&[
        "drop",
        id.as_str(),
        "x:150",
        "y:150",
        "width:700",
        "height:500",
        "date:2024-06-05",
    ]))
    .expect("drop via cli");

    let events = store.load_events().expect("load events");
    // consecutive window from Monday June 3: row 1, col 1
    assert_eq!(events[0].date, date(2024, 6, 11));
    assert!(events[0].time.is_some());

    gridcal_core::run(base(&["undo"])).expect("undo via cli");
    assert_eq!(store.load_events().expect("load events")[0].date, date(2024, 6, 3));

    assert!(gridcal_core::run(base(&["map", "10", "10", "0", "500"])).is_err());
}

#[test]
fn cli_respects_undo_depth_and_rejects_bad_settings() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("gridcalrc");
    fs::write(&rc, "color=n\nundo.depth=1\n").expect("write rc");
    let data = temp.path().join("data");

    let run = |extra: &[&str]| {
        let mut args: Vec<OsString> = vec![
            "gridcal".into(),
            "--rc-file".into(),
            rc.clone().into_os_string(),
            "--data".into(),
            data.clone().into_os_string(),
        ];
        args.extend(extra.iter().map(OsString::from));
        gridcal_core::run(args)
    };

    run(&["add", "2024-06-03", "First"]).expect("add first");
    run(&["add", "2024-06-04", "Second"]).expect("add second");
    run(&["undo"]).expect("undo");

    let store = DataStore::open(&data).expect("open store");
    let events = store.load_events().expect("load events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "First");
    assert!(store.pop_undo_snapshot().expect("pop undo").is_none());

    assert!(run(&["add", "+200000000000d", "Far"]).is_err());
    assert!(run(&["rc.undo.depth=lots", "list"]).is_err());
    assert!(run(&["rc.color=maybe", "list"]).is_err());
}
