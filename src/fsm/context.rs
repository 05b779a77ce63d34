//! Shared mutable context threaded through every FSM handler.
//!
//! `CycleContext` is the single struct that state handlers read from and
//! write to during one dispense-verify cycle: the reminder being served,
//! the hardware and clock ports, the timing table, and the running
//! counters.  Think of it as the "blackboard" in a blackboard
//! architecture.  It lives for exactly one cycle.

use crate::app::ports::{ClockPort, DeviceHardware};
use crate::config::DispenseTiming;
use crate::repository::model::{DoseResult, Reminder};

// ---------------------------------------------------------------------------
// Cycle observer (persistence + notifications, owned by the service)
// ---------------------------------------------------------------------------

/// Receives the cycle's externally visible milestones.
///
/// The state machine only drives hardware; recording the outcome
/// (status `done`, history entry, notification) is the observer's job.
pub trait CycleObserver {
    /// The first burst is about to start.
    fn dispense_attempt(&mut self, reminder: &Reminder, now_ms: u64);

    /// Every burst ran without the chute sensor firing.
    fn dispense_failed(&mut self, reminder: &Reminder, now_ms: u64);

    /// Terminal outcome.  Called exactly once per cycle.
    fn outcome(&mut self, reminder: &Reminder, result: DoseResult, now_ms: u64);
}

// ---------------------------------------------------------------------------
// CycleContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct CycleContext<'a> {
    // -- Collaborators --
    pub hw: &'a mut dyn DeviceHardware,
    pub clock: &'a mut dyn ClockPort,
    pub observer: &'a mut dyn CycleObserver,

    // -- Inputs --
    pub timing: &'a DispenseTiming,
    pub reminder: &'a Reminder,

    // -- Progress --
    /// Bursts fired so far.
    pub bursts: u32,
    /// Hand-check cue periods completed so far.
    pub cue_periods: u32,
    /// The chute sensor fired during dispensing.
    pub dropped: bool,
    /// Set by the terminal state that decided the cycle.
    pub result: Option<DoseResult>,
    /// Delay observed by `Done` before control returns to the scheduler.
    pub settle_ms: u32,
}

impl<'a> CycleContext<'a> {
    pub fn new(
        hw: &'a mut dyn DeviceHardware,
        clock: &'a mut dyn ClockPort,
        observer: &'a mut dyn CycleObserver,
        timing: &'a DispenseTiming,
        reminder: &'a Reminder,
    ) -> Self {
        Self {
            hw,
            clock,
            observer,
            timing,
            reminder,
            bursts: 0,
            cue_periods: 0,
            dropped: false,
            result: None,
            settle_ms: 0,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn delay_ms(&mut self, ms: u32) {
        if ms > 0 {
            self.clock.delay_ms(ms);
        }
    }

    /// Poll the chute sensor `polls` times, `every_ms` apart.  Returns as
    /// soon as it fires.
    pub fn poll_dispense_sensor(&mut self, polls: u32, every_ms: u32) -> bool {
        for _ in 0..polls {
            if self.hw.read_dispense_sensor() {
                return true;
            }
            self.delay_ms(every_ms);
        }
        false
    }
}

/// First 16 characters of `text` (one LCD line).
pub fn lcd_line(text: &str) -> &str {
    match text.char_indices().nth(16) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
