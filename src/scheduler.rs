//! Rate-limited reminder scheduler.
//!
//! The scheduler owns no reminders; it scans the repository and hands
//! each reminder it has just marked `running` to a [`SchedulerDelegate`],
//! which runs the dispense cycle.
//!
//! ```text
//!  main loop ──tick(now)──▶ Scheduler
//!                              │  armed ids              — every tick
//!                              │  due pending reminders  — ≥ interval apart
//!                              ▼
//!                    mark_running (persisted)
//!                              │
//!                              ▼
//!                 SchedulerDelegate::on_reminder_due
//!                   (one full dispense-verify cycle)
//! ```
//!
//! Armed ids come from `startNow` and from reminders found `running` at
//! boot.  Due reminders are handled strictly in stored order, one after the
//! other, never concurrently.  Due-ness is judged against the time the
//! tick started, so a long cycle does not make later entries "more due"
//! within the same pass.

use log::{debug, info, warn};

use crate::app::ports::{SchedulerDelegate, StoragePort};
use crate::repository::model::Status;
use crate::repository::{ReminderRepository, Transition};

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Upper bound on manually started reminders waiting for dispatch.
pub const MAX_ARMED: usize = 8;

pub struct Scheduler {
    /// Minimum spacing between full scans.
    interval_ms: u32,
    /// Start time of the last full scan; `None` until the first one.
    last_scan_ms: Option<u64>,
    /// Ids already moved to `running`, awaiting dispatch.  `startNow`
    /// keeps this within [`MAX_ARMED`]; boot recovery may exceed it.
    armed: Vec<String>,
}

impl Scheduler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_scan_ms: None,
            armed: Vec::new(),
        }
    }

    /// Whether [`arm`](Self::arm) would accept `id` without exceeding
    /// [`MAX_ARMED`].
    pub fn can_arm(&self, id: &str) -> bool {
        self.armed.len() < MAX_ARMED || self.armed.iter().any(|a| a == id)
    }

    /// Queue a `running` reminder for dispatch on the next tick,
    /// regardless of the scan interval.  Callers check
    /// [`can_arm`](Self::can_arm) before persisting `running`.
    pub fn arm(&mut self, id: &str) {
        if self.armed.iter().any(|a| a == id) {
            return;
        }
        self.armed.push(id.to_owned());
        info!("Scheduler: armed id={}", id);
    }

    /// Re-queue every reminder left `running` by a reset.  A cycle never
    /// survives a reboot, so each one restarts from the first burst.
    pub fn rearm_stranded<S: StoragePort>(&mut self, repo: &mut ReminderRepository<S>) -> usize {
        let mut count = 0;
        for reminder in repo.list_all().iter().filter(|r| r.status == Status::Running) {
            warn!("Scheduler: id={} was running at boot, re-armed", reminder.id);
            self.arm(&reminder.id);
            count += 1;
        }
        count
    }

    /// Drop a queued id (deleted or canceled before dispatch).
    pub fn disarm(&mut self, id: &str) {
        self.armed.retain(|a| a != id);
    }

    pub fn armed(&self) -> &[String] {
        &self.armed
    }

    /// Whether a full scan would run at `now_ms`.
    pub fn scan_due(&self, now_ms: u64) -> bool {
        self.last_scan_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= u64::from(self.interval_ms))
    }

    /// Run one scheduler pass.  Returns how many cycles were dispatched.
    pub fn tick<S: StoragePort>(
        &mut self,
        now_ms: u64,
        repo: &mut ReminderRepository<S>,
        delegate: &mut dyn SchedulerDelegate<S>,
    ) -> usize {
        let mut fired = 0;

        for id in core::mem::take(&mut self.armed) {
            match repo.find(&id) {
                Some(reminder) if reminder.status == Status::Running => {
                    info!("Scheduler: dispatching armed id={}", id);
                    delegate.on_reminder_due(&reminder, repo);
                    fired += 1;
                }
                Some(reminder) => {
                    debug!("Scheduler: armed id={} is {}, skipped", id, reminder.status.as_str());
                }
                None => debug!("Scheduler: armed id={} no longer exists", id),
            }
        }

        if !self.scan_due(now_ms) {
            return fired;
        }
        self.last_scan_ms = Some(now_ms);

        let snapshot = repo.list_all();
        for reminder in snapshot
            .iter()
            .filter(|r| r.status == Status::Pending && r.is_due(now_ms))
        {
            match repo.mark_running(&reminder.id) {
                Ok(Transition::Applied { .. }) => {
                    info!(
                        "Scheduler: id={} due ({} <= {}), dispatching",
                        reminder.id,
                        reminder.due_at_local_ms.unwrap_or_default(),
                        now_ms
                    );
                    let mut running = reminder.clone();
                    running.status = Status::Running;
                    delegate.on_reminder_due(&running, repo);
                    fired += 1;
                }
                Ok(other) => debug!("Scheduler: id={} not started ({:?})", reminder.id, other),
                // Not persisted as running: dispensing now would repeat
                // on the next scan.
                Err(e) => warn!("Scheduler: id={} could not be marked running ({})", reminder.id, e),
            }
        }
        fired
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
