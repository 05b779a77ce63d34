//! Persistence across reboots, boot seeding and corrupted-slot recovery.

use medibox::repository::model::Status;

use crate::mock_hw::{FakeClock, FakeHardware, MockStorage, boot, unthrottled};

#[test]
fn first_boot_seeds_all_slots() {
    let storage = MockStorage::new();
    let _ = boot(&storage, unthrottled(), 0);

    assert_eq!(storage.raw("reminders").as_deref(), Some("[]"));
    assert_eq!(storage.raw("history").as_deref(), Some("[]"));
    assert_eq!(storage.raw("seqid").as_deref(), Some("1"));
}

#[test]
fn reminders_survive_a_reboot() {
    let storage = MockStorage::new();
    {
        let (mut app, mut sink) = boot(&storage, unthrottled(), 0);
        app.handle_command(
            br#"{"cmd":"schedule","patient":"Ann","med":"A","timestamp":9000,"now":1000}"#,
            0,
            &mut sink,
        );
        app.handle_command(br#"{"cmd":"startNow","id":"1"}"#, 5, &mut sink);
    }

    let (mut app, mut sink) = boot(&storage, unthrottled(), 0);
    let r = app.repository_mut().find("1").unwrap();
    assert_eq!(r.status, Status::Running);
    assert_eq!(r.med, "A");

    // The counter carried over too.
    app.handle_command(
        br#"{"cmd":"schedule","patient":"Ann","med":"B","timestamp":9000}"#,
        0,
        &mut sink,
    );
    assert!(app.repository_mut().find("2").is_some());
}

#[test]
fn started_reminder_is_dispensed_after_a_reboot() {
    let storage = MockStorage::new();
    {
        let (mut app, mut sink) = boot(&storage, unthrottled(), 0);
        app.handle_command(
            br#"{"cmd":"schedule","patient":"Ann","med":"A","timestamp":9000}"#,
            0,
            &mut sink,
        );
        app.handle_command(br#"{"cmd":"startNow","id":"1"}"#, 5, &mut sink);
    }

    let (mut app, mut sink) = boot(&storage, unthrottled(), 0);
    assert_eq!(app.scheduler().armed(), ["1"]);

    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(0);
    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert_eq!(hw.pulses, 1);
    assert_eq!(app.repository_mut().find("1").unwrap().status, Status::Done);
    assert_eq!(app.repository_mut().history().len(), 1);
}

#[test]
fn corrupted_reminders_slot_is_reset() {
    let storage = MockStorage::new();
    storage.put_raw("reminders", b"{\"oops\":");
    let (mut app, mut sink) = boot(&storage, unthrottled(), 0);

    app.handle_command(br#"{"cmd":"list"}"#, 0, &mut sink);
    assert_eq!(sink.json()[0]["count"], 0);
    assert_eq!(storage.raw("reminders").as_deref(), Some("[]"));
}

#[test]
fn corrupted_history_slot_reports_empty() {
    let storage = MockStorage::new();
    storage.put_raw("history", b"[{\"id\":\"1\",");
    let (mut app, mut sink) = boot(&storage, unthrottled(), 0);

    app.handle_command(br#"{"cmd":"getHistory"}"#, 0, &mut sink);
    let json = sink.json();
    assert_eq!(json[0]["type"], "history");
    assert_eq!(json[0]["count"], 0);
    assert_eq!(storage.raw("history").as_deref(), Some("[]"));
}

#[test]
fn partially_written_records_still_load() {
    let storage = MockStorage::new();
    storage.put_raw("reminders", br#"[{"id":"3","med":"Zinc"}]"#);
    let (mut app, _) = boot(&storage, unthrottled(), 0);

    let r = app.repository_mut().find("3").unwrap();
    assert_eq!(r.status, Status::Pending);
    assert_eq!(r.patient, "");
    assert_eq!(r.due_at_local_ms, None);
}

#[test]
fn lost_counter_resumes_above_existing_ids() {
    let storage = MockStorage::new();
    storage.put_raw("reminders", br#"[{"id":"4"},{"id":"11"}]"#);
    storage.put_raw("history", br#"[{"id":"17","result":"missed"}]"#);
    storage.put_raw("seqid", b"not a number");
    let (mut app, mut sink) = boot(&storage, unthrottled(), 0);

    app.handle_command(
        br#"{"cmd":"schedule","patient":"Ann","med":"A","timestamp":1}"#,
        0,
        &mut sink,
    );
    assert!(app.repository_mut().find("18").is_some());
    assert_eq!(storage.raw("seqid").as_deref(), Some("19"));
}

#[test]
fn missing_counter_is_rebuilt_at_boot() {
    let storage = MockStorage::new();
    storage.put_raw("reminders", br#"[{"id":"2"}]"#);
    storage.put_raw("history", b"[]");
    let _ = boot(&storage, unthrottled(), 0);
    assert_eq!(storage.raw("seqid").as_deref(), Some("3"));
}
