//! Scheduler tests: due-time derivation, throttling and dispatch order.

use medibox::app::service::AppService;
use medibox::config::DeviceConfig;
use medibox::repository::model::{DoseResult, Status};

use crate::mock_hw::{FakeClock, FakeHardware, MockStorage, RecordingSink, boot, unthrottled};

const T: u64 = 10_000;

fn schedule_at(app: &mut AppService<MockStorage>, sink: &mut RecordingSink, now: u64, lead: u64, med: &str) {
    let cmd = format!(
        r#"{{"cmd":"schedule","patient":"Ann","med":"{med}","timestamp":{},"now":1000}}"#,
        1000 + lead
    );
    app.handle_command(cmd.as_bytes(), now, sink);
}

#[test]
fn fires_exactly_at_due_time() {
    let storage = MockStorage::new();
    let config = DeviceConfig {
        scheduler_interval_ms: 1,
        ..Default::default()
    };
    let (mut app, mut sink) = boot(&storage, config, T);
    app.handle_command(
        br#"{"cmd":"schedule","patient":"Ann","med":"Zinc","timestamp":5000,"now":1000}"#,
        T,
        &mut sink,
    );
    let mut hw = FakeHardware::cooperative();

    let mut clock = FakeClock::at(T + 3999);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Pending);
    assert_eq!(hw.pulses, 0);

    let mut clock = FakeClock::at(T + 4000);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Done);
    assert_eq!(hw.pulses, 1);
}

#[test]
fn scans_are_throttled_to_the_interval() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, DeviceConfig::default(), T);
    let mut hw = FakeHardware::cooperative();

    // First scan runs immediately and finds nothing due.
    let mut clock = FakeClock::at(T);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);

    schedule_at(&mut app, &mut sink, T, 0, "A");
    let mut clock = FakeClock::at(T + 1499);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Pending);

    let mut clock = FakeClock::at(T + 1500);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
}

#[test]
fn due_reminders_run_sequentially_in_stored_order() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule_at(&mut app, &mut sink, T, 10, "A");
    schedule_at(&mut app, &mut sink, T, 5, "B");
    schedule_at(&mut app, &mut sink, T, 500, "C");
    sink.clear();

    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T + 100);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 2);

    let started: Vec<String> = sink
        .json()
        .iter()
        .filter(|v| v["type"] == "reminder_started")
        .map(|v| v["med"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(started, ["A", "B"]);

    let repo = app.repository_mut();
    let history: Vec<String> = repo.history().into_iter().map(|h| h.id).collect();
    assert_eq!(history, ["1", "2"]);
    assert_eq!(repo.find("3").unwrap().status, Status::Pending);
}

#[test]
fn due_ness_is_judged_at_tick_start() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule_at(&mut app, &mut sink, T, 0, "A");
    // Becomes due while A's cycle is still running.
    schedule_at(&mut app, &mut sink, T, 1000, "B");

    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert!(clock.now > T + 1000);
    assert_eq!(app.repository_mut().find("2").unwrap().status, Status::Pending);

    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert_eq!(app.repository_mut().find("2").unwrap().status, Status::Done);
}

#[test]
fn canceled_and_undated_reminders_never_fire() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule_at(&mut app, &mut sink, T, 0, "A");
    app.handle_command(br#"{"cmd":"cancel","id":"1"}"#, T, &mut sink);
    app.handle_command(
        br#"{"cmd":"schedule","patient":"Ann","med":"B","timestamp":0}"#,
        T,
        &mut sink,
    );

    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T + 1_000_000);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
    assert_eq!(hw.pulses, 0);
}

#[test]
fn start_now_bypasses_the_throttle() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, DeviceConfig::default(), T);
    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);
    app.tick(&mut hw, &mut clock, &mut sink);

    schedule_at(&mut app, &mut sink, T, 60_000, "A");
    app.handle_command(br#"{"cmd":"startNow","id":"1"}"#, T + 10, &mut sink);
    sink.clear();

    clock.now = T + 20;
    assert!(!app.scheduler().scan_due(clock.now));
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert_eq!(sink.kinds()[0], "reminder_started");
    assert!(app.scheduler().armed().is_empty());

    // Dispatched once only.
    clock.now += 10_000;
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
}

#[test]
fn deleting_an_armed_reminder_disarms_it() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule_at(&mut app, &mut sink, T, 60_000, "A");
    app.handle_command(br#"{"cmd":"startNow","id":"1"}"#, T, &mut sink);
    app.handle_command(br#"{"cmd":"delete","id":"1"}"#, T, &mut sink);

    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T + 200);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
    assert!(app.repository_mut().history().is_empty());
}

#[test]
fn unpersisted_running_mark_skips_dispatch() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule_at(&mut app, &mut sink, T, 0, "A");
    storage.fail_writes(true);

    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T + 1);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
    assert_eq!(hw.pulses, 0);

    storage.fail_writes(false);
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Pending);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert_eq!(app.repository_mut().history()[0].result, DoseResult::Taken);
}
