//! Mock adapters for integration tests.
//!
//! Everything the service touches is faked here: storage (shared between
//! "reboots" and with write-failure injection), scripted hardware, a
//! virtual clock and a recording event sink.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use medibox::app::events::{AppEvent, Notification};
use medibox::app::ports::{
    ActuatorPort, ClockPort, DisplayPort, EventSink, SensorPort, StorageError, StoragePort,
};
use medibox::app::service::AppService;
use medibox::config::DeviceConfig;

// ── MockStorage ───────────────────────────────────────────────

#[derive(Default)]
struct Slots {
    data: HashMap<String, Vec<u8>>,
    fail_all: bool,
    fail_keys: Vec<&'static str>,
    writes: usize,
}

/// In-memory key/value store.  Clones share the same backing map, so a
/// clone handed to a second `AppService` behaves like flash across a
/// reboot.
#[derive(Clone, Default)]
pub struct MockStorage {
    slots: Rc<RefCell<Slots>>,
}

fn composite(namespace: &str, key: &str) -> String {
    format!("{namespace}::{key}")
}

#[allow(dead_code)]
impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, on: bool) {
        self.slots.borrow_mut().fail_all = on;
    }

    /// Make writes to one key fail.
    pub fn fail_key(&self, key: &'static str) {
        self.slots.borrow_mut().fail_keys.push(key);
    }

    pub fn writes(&self) -> usize {
        self.slots.borrow().writes
    }

    /// Raw slot content, as text.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.slots
            .borrow()
            .data
            .get(&composite("smartmed", key))
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Overwrite a slot behind the store's back.
    pub fn put_raw(&self, key: &str, bytes: &[u8]) {
        self.slots
            .borrow_mut()
            .data
            .insert(composite("smartmed", key), bytes.to_vec());
    }

    pub fn remove_raw(&self, key: &str) {
        self.slots.borrow_mut().data.remove(&composite("smartmed", key));
    }
}

impl StoragePort for MockStorage {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.slots
            .borrow()
            .data
            .get(&composite(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut slots = self.slots.borrow_mut();
        if slots.fail_all || slots.fail_keys.iter().any(|k| *k == key) {
            return Err(StorageError::IoError);
        }
        slots.writes += 1;
        slots.data.insert(composite(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.slots.borrow_mut().data.remove(&composite(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.slots.borrow().data.contains_key(&composite(namespace, key))
    }
}

// ── FakeHardware ──────────────────────────────────────────────

/// Scripted sensors plus a record of every actuator and display call.
#[derive(Default)]
pub struct FakeHardware {
    /// The chute sensor reports a pill once this many bursts have run.
    pub drop_after_pulses: Option<u32>,
    /// The tray sensor reports a hand once this many cues have sounded.
    pub hand_after_cues: Option<u32>,

    pub pulses: u32,
    pub cues: u32,
    pub motor_on: bool,
    pub cue_on: bool,
    pub indicator: bool,
    pub screens: Vec<(String, String)>,
}

#[allow(dead_code)]
impl FakeHardware {
    /// Pill drops on the first burst, hand on the first cue.
    pub fn cooperative() -> Self {
        Self {
            drop_after_pulses: Some(1),
            hand_after_cues: Some(1),
            ..Default::default()
        }
    }

    /// Carousel jammed: nothing ever drops.
    pub fn jammed() -> Self {
        Self::default()
    }

    /// Pill drops, nobody picks it up.
    pub fn absent_patient() -> Self {
        Self {
            drop_after_pulses: Some(1),
            ..Default::default()
        }
    }

    pub fn shown(&self, line1: &str) -> bool {
        self.screens.iter().any(|(l1, _)| l1 == line1)
    }

    pub fn last_screen(&self) -> Option<&(String, String)> {
        self.screens.last()
    }
}

impl SensorPort for FakeHardware {
    fn read_dispense_sensor(&mut self) -> bool {
        self.drop_after_pulses.is_some_and(|n| self.pulses >= n)
    }

    fn read_hand_sensor(&mut self) -> bool {
        self.hand_after_cues.is_some_and(|n| self.cues >= n)
    }
}

impl ActuatorPort for FakeHardware {
    fn motor_forward(&mut self) {
        self.pulses += 1;
        self.motor_on = true;
    }

    fn motor_stop(&mut self) {
        self.motor_on = false;
    }

    fn sound_cue(&mut self, on: bool) {
        if on {
            self.cues += 1;
        }
        self.cue_on = on;
    }

    fn set_failure_indicator(&mut self, on: bool) {
        self.indicator = on;
    }
}

impl DisplayPort for FakeHardware {
    fn show_text(&mut self, line1: &str, line2: &str) {
        self.screens.push((line1.to_owned(), line2.to_owned()));
    }
}

// ── FakeClock ─────────────────────────────────────────────────

/// Virtual clock: delays advance time instantly.
#[derive(Default)]
pub struct FakeClock {
    pub now: u64,
}

impl FakeClock {
    pub fn at(now: u64) -> Self {
        Self { now }
    }
}

impl ClockPort for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now += u64::from(ms);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<Notification>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(Notification::kind).collect()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.events.last().map(|n| &n.event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Re-encode every event as JSON (what the central would receive).
    pub fn json(&self) -> Vec<serde_json::Value> {
        self.events
            .iter()
            .map(|n| serde_json::from_slice(&n.to_json().unwrap()).unwrap())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, notification: &Notification) {
        self.events.push(notification.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// Fresh service over `storage`, started at `now`.
#[allow(dead_code)]
pub fn boot(storage: &MockStorage, config: DeviceConfig, now: u64) -> (AppService<MockStorage>, RecordingSink) {
    let mut app = AppService::new(storage.clone(), config);
    let mut sink = RecordingSink::default();
    let mut hw = FakeHardware::default();
    app.start(&mut hw, now, &mut sink);
    sink.clear();
    (app, sink)
}

/// Default timings with the scan throttle switched off.
#[allow(dead_code)]
pub fn unthrottled() -> DeviceConfig {
    DeviceConfig {
        scheduler_interval_ms: 0,
        ..Default::default()
    }
}
