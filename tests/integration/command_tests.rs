//! Command protocol tests: JSON in, notifications and store mutations out.

use medibox::app::events::AppEvent;
use medibox::app::service::AppService;
use medibox::repository::model::Status;
use medibox::scheduler::MAX_ARMED;

use crate::mock_hw::{FakeClock, FakeHardware, MockStorage, RecordingSink, boot, unthrottled};

const T: u64 = 10_000;

fn send(app: &mut AppService<MockStorage>, sink: &mut RecordingSink, json: &str) {
    app.handle_command(json.as_bytes(), T, sink);
}

fn schedule(app: &mut AppService<MockStorage>, sink: &mut RecordingSink, med: &str) {
    let cmd = format!(r#"{{"cmd":"schedule","patient":"Ann","med":"{med}","timestamp":5000,"now":1000}}"#);
    send(app, sink, &cmd);
}

fn error_detail(sink: &RecordingSink) -> Option<&'static str> {
    match sink.last() {
        Some(AppEvent::Error { detail }) => Some(*detail),
        _ => None,
    }
}

// ── schedule ──────────────────────────────────────────────────

#[test]
fn schedule_replies_and_persists() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);

    schedule(&mut app, &mut sink, "Aspirin");

    assert_eq!(sink.kinds(), ["scheduled", "list"]);
    assert_eq!(
        sink.events[0].event,
        AppEvent::Scheduled {
            id: "1".into(),
            patient: "Ann".into(),
            med: "Aspirin".into()
        }
    );
    let json = sink.json();
    assert_eq!(json[1]["count"], 1);
    assert_eq!(json[1]["reminders"][0]["dueAtLocalMs"], T + 4000);
    assert_eq!(json[1]["reminders"][0]["status"], "pending");

    let stored = app.repository_mut().find("1").unwrap();
    assert_eq!(stored.due_at_local_ms, Some(T + 4000));
    assert_eq!(stored.client_now_ms, Some(1000));
    assert_eq!(stored.created_at, T);
    assert_eq!(app.repository().store().read_counter(), 2);
}

#[test]
fn schedule_without_now_is_never_due() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    send(&mut app, &mut sink, r#"{"cmd":"schedule","patient":"Ann","med":"Zinc","timestamp":5000}"#);

    let stored = app.repository_mut().find("1").unwrap();
    assert_eq!(stored.due_at_local_ms, None);
    assert!(!stored.is_due(u64::MAX));
}

#[test]
fn far_future_timestamp_saturates_due_time() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    send(
        &mut app,
        &mut sink,
        r#"{"cmd":"schedule","patient":"Ann","med":"Zinc","timestamp":18446744073709551615,"now":0}"#,
    );

    assert_eq!(sink.kinds(), ["scheduled", "list"]);
    let stored = app.repository_mut().find("1").unwrap();
    assert_eq!(stored.due_at_local_ms, Some(u64::MAX));
    assert!(!stored.is_due(T));
}

#[test]
fn start_now_near_clock_wrap_saturates() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule(&mut app, &mut sink, "A");
    let late = u64::MAX - 10;

    app.handle_command(br#"{"cmd":"startNow","id":"1"}"#, late, &mut sink);
    app.handle_command(br#"{"cmd":"startNow","patient":"Bo","med":"B"}"#, late, &mut sink);

    let repo = app.repository_mut();
    assert_eq!(repo.find("1").unwrap().due_at_local_ms, Some(u64::MAX));
    assert_eq!(repo.find("2").unwrap().due_at_local_ms, Some(u64::MAX));
}

#[test]
fn schedule_missing_field_mutates_nothing() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    let writes = storage.writes();

    send(&mut app, &mut sink, r#"{"cmd":"schedule","patient":"Ann","timestamp":5000}"#);

    assert_eq!(sink.kinds(), ["error"]);
    assert_eq!(error_detail(&sink), Some("missing_fields"));
    assert_eq!(storage.writes(), writes);
    assert_eq!(app.repository().store().read_counter(), 1);
}

#[test]
fn ids_increase_across_commands() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    for med in ["A", "B", "C"] {
        schedule(&mut app, &mut sink, med);
    }
    let ids: Vec<String> = app.repository_mut().list_all().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["1", "2", "3"]);
}

// ── protocol errors ───────────────────────────────────────────

#[test]
fn malformed_payloads_are_reported() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);

    for (payload, detail) in [
        ("{not json", "bad_json"),
        (r#"{"cmd":"reboot"}"#, "unknown_cmd"),
        (r#"{"patient":"Ann"}"#, "unknown_cmd"),
        ("[1,2,3]", "unknown_cmd"),
        (r#"{"cmd":"delete"}"#, "id_required"),
    ] {
        sink.clear();
        send(&mut app, &mut sink, payload);
        assert_eq!(sink.kinds(), ["error"], "payload {payload}");
        assert_eq!(error_detail(&sink), Some(detail), "payload {payload}");
    }
    assert!(app.repository_mut().list_all().is_empty());
}

// ── list / delete ─────────────────────────────────────────────

#[test]
fn list_reports_everything_stored() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule(&mut app, &mut sink, "A");
    schedule(&mut app, &mut sink, "B");
    sink.clear();

    send(&mut app, &mut sink, r#"{"cmd":"list"}"#);
    assert_eq!(sink.json()[0]["count"], 2);
}

#[test]
fn delete_accepts_numeric_id_and_unknown_ids() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule(&mut app, &mut sink, "A");
    schedule(&mut app, &mut sink, "B");
    sink.clear();

    send(&mut app, &mut sink, r#"{"cmd":"delete","id":1}"#);
    assert_eq!(sink.events[0].event, AppEvent::Deleted { detail: "1".into() });
    assert_eq!(sink.json()[1]["count"], 1);
    assert!(app.repository_mut().find("2").is_some());

    sink.clear();
    send(&mut app, &mut sink, r#"{"cmd":"delete","id":"99"}"#);
    assert_eq!(sink.kinds(), ["deleted", "list"]);
}

// ── startNow ──────────────────────────────────────────────────

#[test]
fn start_now_existing_arms_reminder() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule(&mut app, &mut sink, "A");
    sink.clear();

    send(&mut app, &mut sink, r#"{"cmd":"startNow","id":"1"}"#);
    assert_eq!(sink.events[0].event, AppEvent::Starting { detail: "1".into() });

    let r = app.repository_mut().find("1").unwrap();
    assert_eq!(r.status, Status::Running);
    assert_eq!(r.due_at_local_ms, Some(T + 100));
    assert_eq!(app.scheduler().armed(), ["1"]);
}

#[test]
fn start_now_unknown_or_not_pending() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);

    send(&mut app, &mut sink, r#"{"cmd":"startNow","id":"7"}"#);
    assert_eq!(error_detail(&sink), Some("not_found"));

    schedule(&mut app, &mut sink, "A");
    send(&mut app, &mut sink, r#"{"cmd":"cancel","id":"1"}"#);
    sink.clear();
    send(&mut app, &mut sink, r#"{"cmd":"startNow","id":"1"}"#);
    assert_eq!(sink.kinds(), ["error"]);
    assert_eq!(error_detail(&sink), Some("not_pending"));
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Canceled);
}

#[test]
fn start_now_rejected_when_dispatch_queue_is_full() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    for _ in 0..=MAX_ARMED {
        schedule(&mut app, &mut sink, "A");
    }
    for id in 1..=MAX_ARMED {
        send(&mut app, &mut sink, &format!(r#"{{"cmd":"startNow","id":"{id}"}}"#));
    }
    sink.clear();

    let last = MAX_ARMED + 1;
    send(&mut app, &mut sink, &format!(r#"{{"cmd":"startNow","id":"{last}"}}"#));
    assert_eq!(sink.kinds(), ["error"]);
    assert_eq!(error_detail(&sink), Some("busy"));

    // Still pending: the scan will pick it up once due, or it can be retried.
    let r = app.repository_mut().find(&last.to_string()).unwrap();
    assert_eq!(r.status, Status::Pending);
    assert_eq!(app.scheduler().armed().len(), MAX_ARMED);
}

#[test]
fn every_started_reminder_is_dispensed() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    for _ in 0..=MAX_ARMED {
        schedule(&mut app, &mut sink, "A");
    }
    for id in 1..=MAX_ARMED + 1 {
        send(&mut app, &mut sink, &format!(r#"{{"cmd":"startNow","id":"{id}"}}"#));
    }
    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);
    app.tick(&mut hw, &mut clock, &mut sink);

    // The rejected one retries and goes through once the queue drained.
    let last = (MAX_ARMED + 1).to_string();
    send(&mut app, &mut sink, &format!(r#"{{"cmd":"startNow","id":"{last}"}}"#));
    app.tick(&mut hw, &mut clock, &mut sink);

    for r in app.repository_mut().list_all() {
        assert_eq!(r.status, Status::Done, "id {}", r.id);
    }
}

#[test]
fn start_now_manual_creates_pending_one_off() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);

    send(&mut app, &mut sink, r#"{"cmd":"startNow","patient":"Bo","med":"Iron","dosage":"1 tab"}"#);
    assert_eq!(sink.kinds(), ["manual_scheduled", "list"]);

    let r = app.repository_mut().find("1").unwrap();
    assert_eq!(r.status, Status::Pending);
    assert_eq!(r.due_at_local_ms, Some(T + 100));
    assert_eq!(r.dosage.as_deref(), Some("1 tab"));
    assert_eq!(r.client_now_ms, None);
}

// ── cancel ────────────────────────────────────────────────────

#[test]
fn cancel_all_only_touches_pending() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule(&mut app, &mut sink, "A");
    schedule(&mut app, &mut sink, "B");
    send(&mut app, &mut sink, r#"{"cmd":"startNow","id":"2"}"#);
    sink.clear();

    send(&mut app, &mut sink, r#"{"cmd":"cancel"}"#);
    assert_eq!(sink.kinds(), ["canceled_all", "list"]);

    let repo = app.repository_mut();
    assert_eq!(repo.find("1").unwrap().status, Status::Canceled);
    assert_eq!(repo.find("2").unwrap().status, Status::Running);
}

#[test]
fn cancel_running_reminder_is_a_no_op() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    schedule(&mut app, &mut sink, "A");
    send(&mut app, &mut sink, r#"{"cmd":"startNow","id":"1"}"#);
    sink.clear();

    send(&mut app, &mut sink, r#"{"cmd":"cancel","id":"1"}"#);
    assert_eq!(sink.events[0].event, AppEvent::Canceled { detail: "1".into() });
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Running);
    // Still queued, so it is not stranded.
    assert_eq!(app.scheduler().armed(), ["1"]);
}

// ── history ───────────────────────────────────────────────────

#[test]
fn history_roundtrip_and_clear() {
    let storage = MockStorage::new();
    storage.put_raw(
        "history",
        br#"[{"id":"4","patient":"Ann","med":"A","timestampMs":1,"result":"taken","whenMs":9}]"#,
    );
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);

    send(&mut app, &mut sink, r#"{"cmd":"getHistory"}"#);
    let json = sink.json();
    assert_eq!(json[0]["type"], "history");
    assert_eq!(json[0]["count"], 1);
    assert_eq!(json[0]["history"][0]["result"], "taken");

    sink.clear();
    send(&mut app, &mut sink, r#"{"cmd":"clearHistory"}"#);
    assert_eq!(sink.kinds(), ["history_cleared"]);
    assert!(app.repository_mut().history().is_empty());
    assert_eq!(storage.raw("history").as_deref(), Some("[]"));
}

// ── store faults ──────────────────────────────────────────────

#[test]
fn write_failure_surfaces_store_fault() {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    storage.fail_writes(true);

    schedule(&mut app, &mut sink, "A");
    assert_eq!(sink.kinds(), ["error"]);
    assert_eq!(error_detail(&sink), Some("store_fault"));

    storage.fail_writes(false);
    assert!(app.repository_mut().list_all().is_empty());
}
