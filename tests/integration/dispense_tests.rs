//! End-to-end dispense-verify cycles through `AppService::tick`.

use medibox::app::events::AppEvent;
use medibox::app::service::AppService;
use medibox::repository::model::{DoseResult, Status};

use crate::mock_hw::{FakeClock, FakeHardware, MockStorage, RecordingSink, boot, unthrottled};

const T: u64 = 50_000;

/// Boot, schedule one reminder due immediately, return the pieces.
fn due_now(med: &str) -> (MockStorage, AppService<MockStorage>, RecordingSink) {
    let storage = MockStorage::new();
    let (mut app, mut sink) = boot(&storage, unthrottled(), T);
    let cmd = format!(r#"{{"cmd":"schedule","patient":"Ann","med":"{med}","timestamp":1000,"now":1000}}"#);
    app.handle_command(cmd.as_bytes(), T, &mut sink);
    sink.clear();
    (storage, app, sink)
}

#[test]
fn pill_dropped_and_taken() {
    let (_storage, mut app, mut sink) = due_now("Aspirin");
    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);

    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);

    assert_eq!(sink.kinds(), ["reminder_started", "dispense_attempt", "taken"]);
    assert_eq!(
        sink.events[0].event,
        AppEvent::ReminderStarted {
            id: "1".into(),
            patient: "Ann".into(),
            med: "Aspirin".into()
        }
    );
    assert_eq!(hw.pulses, 1);
    assert_eq!(hw.cues, 1);
    assert!(!hw.motor_on && !hw.cue_on && !hw.indicator);

    assert!(hw.screens.contains(&("Dispensing...".into(), "Aspirin".into())));
    assert!(hw.shown("Check hand..."));
    assert!(hw.screens.contains(&("Taken".into(), "Aspirin".into())));
    assert_eq!(hw.last_screen().unwrap().0, "Waiting...");

    let repo = app.repository_mut();
    assert_eq!(repo.find("1").unwrap().status, Status::Done);
    let history = repo.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, DoseResult::Taken);
    assert_eq!(history[0].med, "Aspirin");
}

#[test]
fn jammed_carousel_is_a_missed_dose() {
    let (_storage, mut app, mut sink) = due_now("Iron");
    let mut hw = FakeHardware::jammed();
    let mut clock = FakeClock::at(T);

    app.tick(&mut hw, &mut clock, &mut sink);

    assert_eq!(
        sink.kinds(),
        ["reminder_started", "dispense_attempt", "dispense_failed", "missed"]
    );
    assert_eq!(sink.json()[2]["detail"], "no_pill");
    assert_eq!(hw.pulses, 20);
    assert_eq!(hw.cues, 0);
    assert!(hw.indicator);
    assert!(!hw.motor_on);
    assert!(hw.shown("DROP FAIL"));
    assert!(!hw.shown("Check hand..."));

    let repo = app.repository_mut();
    assert_eq!(repo.find("1").unwrap().status, Status::Done);
    assert_eq!(repo.history()[0].result, DoseResult::Missed);
}

#[test]
fn nobody_at_the_tray_is_a_missed_dose() {
    let (_storage, mut app, mut sink) = due_now("Zinc");
    let mut hw = FakeHardware::absent_patient();
    let mut clock = FakeClock::at(T);

    app.tick(&mut hw, &mut clock, &mut sink);

    assert_eq!(sink.kinds(), ["reminder_started", "dispense_attempt", "missed"]);
    // Two 30 s hand-check cycles of 1 s cue periods.
    assert_eq!(hw.cues, 60);
    assert!(!hw.cue_on);
    assert!(hw.indicator);
    assert!(hw.screens.contains(&("MISSED".into(), "Zinc".into())));
    assert!(clock.now - T >= 60_000);
}

#[test]
fn next_taken_dose_clears_the_indicator() {
    let (_storage, mut app, mut sink) = due_now("A");
    let mut hw = FakeHardware::jammed();
    let mut clock = FakeClock::at(T);
    app.tick(&mut hw, &mut clock, &mut sink);
    assert!(hw.indicator);

    app.handle_command(br#"{"cmd":"startNow","patient":"Ann","med":"B"}"#, clock.now, &mut sink);
    hw.drop_after_pulses = Some(hw.pulses + 1);
    hw.hand_after_cues = Some(1);
    clock.now += 100;
    app.tick(&mut hw, &mut clock, &mut sink);

    assert!(!hw.indicator);
    assert_eq!(app.repository_mut().history()[1].result, DoseResult::Taken);
}

#[test]
fn long_medication_names_are_cut_for_the_display() {
    let (_storage, mut app, mut sink) = due_now("Acetylsalicylic acid 500");
    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);
    app.tick(&mut hw, &mut clock, &mut sink);

    assert!(hw.screens.contains(&("Dispensing...".into(), "Acetylsalicylic ".into())));
    // The full name still goes out on the link.
    assert_eq!(sink.json()[0]["med"], "Acetylsalicylic acid 500");
}

#[test]
fn history_write_failure_does_not_interrupt_cycle() {
    let (storage, mut app, mut sink) = due_now("A");
    storage.fail_key("history");
    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);

    assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 1);
    assert_eq!(sink.kinds().last(), Some(&"taken"));
    assert_eq!(hw.last_screen().unwrap().0, "Waiting...");

    let repo = app.repository_mut();
    assert_eq!(repo.find("1").unwrap().status, Status::Done);
    assert!(repo.history().is_empty());
}

#[test]
fn a_done_reminder_is_never_dispensed_twice() {
    let (_storage, mut app, mut sink) = due_now("A");
    let mut hw = FakeHardware::cooperative();
    let mut clock = FakeClock::at(T);
    app.tick(&mut hw, &mut clock, &mut sink);
    for _ in 0..5 {
        clock.now += 5_000;
        assert_eq!(app.tick(&mut hw, &mut clock, &mut sink), 0);
    }
    assert_eq!(hw.pulses, 1);
    assert_eq!(app.repository_mut().history().len(), 1);
}
