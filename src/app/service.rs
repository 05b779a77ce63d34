//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the reminder repository and the scheduler and is
//! the single code path that mutates either.  It exposes a clean,
//! hardware-agnostic API.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  LinkEvent ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                │        AppService        │
//!  ClockPort ──▶ │ Interpreter · Scheduler  │ ◀─▶ StoragePort
//!                │   dispense-verify FSM    │
//! DeviceHardware◀└──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{DeviceConfig, DispenseTiming};
use crate::events::LinkEvent;
use crate::fsm::context::{CycleContext, CycleObserver};
use crate::fsm::run_cycle;
use crate::repository::model::{DoseResult, HistoryEntry, Reminder, Status};
use crate::repository::{ReminderRepository, Transition};
use crate::scheduler::Scheduler;

use super::commands::Command;
use super::events::{AppEvent, Notification};
use super::interpreter::Interpreter;
use super::ports::{
    ClockPort, DeviceHardware, DisplayPort, EventSink, SchedulerDelegate, StoragePort,
};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService<S> {
    repo: ReminderRepository<S>,
    scheduler: Scheduler,
    config: DeviceConfig,
}

impl<S: StoragePort> AppService<S> {
    /// Construct the service over `storage`.
    ///
    /// Does **not** touch the store — call [`start`](Self::start) next.
    pub fn new(storage: S, config: DeviceConfig) -> Self {
        let scheduler = Scheduler::new(config.scheduler_interval_ms);
        Self {
            repo: ReminderRepository::new(storage),
            scheduler,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Seed missing slots, re-arm reminders a reset left `running`, show
    /// the splash screen and announce readiness.
    pub fn start(&mut self, display: &mut impl DisplayPort, now_ms: u64, sink: &mut impl EventSink) {
        if let Err(e) = self.repo.ensure_defaults() {
            warn!("Store seeding failed: {}", e);
        }
        self.scheduler.rearm_stranded(&mut self.repo);
        display.show_text("SmartMed BLE", "Ready...");
        sink.emit(&Notification::new(AppEvent::Ready, now_ms));
        info!(
            "AppService started: {} reminders, next id {}",
            self.repo.list_all().len(),
            self.repo.store().read_counter()
        );
    }

    // ── Link input ────────────────────────────────────────────

    /// Process one event drained from the link queue.
    pub fn on_link_event(&mut self, event: LinkEvent, now_ms: u64, sink: &mut impl EventSink) {
        match event {
            LinkEvent::Connected => {
                info!("LINK: central connected");
                sink.emit(&Notification::new(AppEvent::BleConnected, now_ms));
            }
            LinkEvent::Disconnected => {
                info!("LINK: central disconnected");
                sink.emit(&Notification::new(AppEvent::BleDisconnected, now_ms));
            }
            LinkEvent::Command(frame) => self.handle_command(&frame, now_ms, sink),
        }
    }

    /// Parse and execute one raw command.  Every failure becomes a single
    /// `error` notification.
    pub fn handle_command(&mut self, raw: &[u8], now_ms: u64, sink: &mut impl EventSink) {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        info!("CMD <- {}", String::from_utf8_lossy(raw));

        let result = Command::parse(raw).and_then(|cmd| {
            Interpreter {
                repo: &mut self.repo,
                scheduler: &mut self.scheduler,
                config: &self.config,
                sink: &mut *sink,
                now_ms,
            }
            .execute(cmd)
        });

        if let Err(e) = result {
            warn!("CMD rejected: {}", e);
            sink.emit(&Notification::new(AppEvent::Error { detail: e.detail() }, now_ms));
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one scheduler pass.  Each due reminder gets a full, blocking
    /// dispense-verify cycle.  Returns the number of cycles run.
    pub fn tick(
        &mut self,
        hw: &mut impl DeviceHardware,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> usize {
        let now_ms = clock.now_ms();
        let mut runner = DispenseRunner {
            hw,
            clock,
            sink,
            timing: &self.config.dispense,
        };
        self.scheduler.tick(now_ms, &mut self.repo, &mut runner)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn repository(&self) -> &ReminderRepository<S> {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut ReminderRepository<S> {
        &mut self.repo
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

// ───────────────────────────────────────────────────────────────
// Dispense cycle plumbing
// ───────────────────────────────────────────────────────────────

/// Scheduler delegate that runs the FSM for each due reminder.
struct DispenseRunner<'a, H, C, E> {
    hw: &'a mut H,
    clock: &'a mut C,
    sink: &'a mut E,
    timing: &'a DispenseTiming,
}

impl<S, H, C, E> SchedulerDelegate<S> for DispenseRunner<'_, H, C, E>
where
    S: StoragePort,
    H: DeviceHardware,
    C: ClockPort,
    E: EventSink,
{
    fn on_reminder_due(&mut self, reminder: &Reminder, repo: &mut ReminderRepository<S>) {
        self.sink.emit(&Notification::new(
            AppEvent::ReminderStarted {
                id: reminder.id.clone(),
                patient: reminder.patient.clone(),
                med: reminder.med.clone(),
            },
            self.clock.now_ms(),
        ));

        let mut writer = OutcomeWriter {
            repo,
            sink: &mut *self.sink,
        };
        let mut ctx = CycleContext::new(
            &mut *self.hw,
            &mut *self.clock,
            &mut writer,
            self.timing,
            reminder,
        );
        let report = run_cycle(&mut ctx);
        info!(
            "Cycle id={} -> {} ({} bursts, {} cue periods)",
            reminder.id,
            report.result.as_str(),
            report.bursts,
            report.cue_periods
        );
    }
}

/// Persists the cycle outcome and emits its notifications.
struct OutcomeWriter<'a, S, E> {
    repo: &'a mut ReminderRepository<S>,
    sink: &'a mut E,
}

impl<S: StoragePort, E: EventSink> OutcomeWriter<'_, S, E> {
    fn emit(&mut self, event: AppEvent, now_ms: u64) {
        self.sink.emit(&Notification::new(event, now_ms));
    }
}

impl<S: StoragePort, E: EventSink> CycleObserver for OutcomeWriter<'_, S, E> {
    fn dispense_attempt(&mut self, reminder: &Reminder, now_ms: u64) {
        self.emit(AppEvent::DispenseAttempt { id: reminder.id.clone() }, now_ms);
    }

    fn dispense_failed(&mut self, reminder: &Reminder, now_ms: u64) {
        self.emit(
            AppEvent::DispenseFailed {
                id: reminder.id.clone(),
                detail: "no_pill",
            },
            now_ms,
        );
    }

    fn outcome(&mut self, reminder: &Reminder, result: DoseResult, now_ms: u64) {
        // Store faults are logged; the physical cycle has already happened.
        match self.repo.transition(&reminder.id, Status::Done) {
            Ok(Transition::Applied { .. }) => {}
            Ok(other) => warn!("Cycle id={}: not marked done ({:?})", reminder.id, other),
            Err(e) => warn!("Cycle id={}: status write failed ({})", reminder.id, e),
        }
        if let Err(e) = self
            .repo
            .append_history(HistoryEntry::from_reminder(reminder, result, now_ms))
        {
            warn!("Cycle id={}: history write failed ({})", reminder.id, e);
        }

        let id = reminder.id.clone();
        let event = match result {
            DoseResult::Taken => AppEvent::Taken { id },
            DoseResult::Missed => AppEvent::Missed { id },
        };
        self.emit(event, now_ms);
    }
}
