//! Outbound notifications.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  On the wire every
//! notification is one JSON object tagged by `type` and stamped with the
//! local `time_ms`:
//!
//! ```text
//! {"type":"scheduled","id":"3","patient":"Ann","med":"Aspirin","time_ms":81234}
//! {"type":"deleted","detail":"3","time_ms":81400}
//! {"type":"error","detail":"bad_json","time_ms":81500}
//! ```
//!
//! `deleted`, `starting` and `canceled` carry the affected id in
//! `detail`; cycle progress and outcome events carry it in `id`.

use serde::Serialize;

use crate::repository::model::{HistoryEntry, Reminder};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ── Lifecycle ─────────────────────────────────────────────
    /// Boot finished; store seeded.
    Ready,
    BleConnected,
    BleDisconnected,

    /// A command was rejected; `detail` is the error code.
    Error { detail: &'static str },

    // ── Command replies ───────────────────────────────────────
    Scheduled { id: String, patient: String, med: String },
    List { count: usize, reminders: Vec<Reminder> },
    Deleted { detail: String },
    Starting { detail: String },
    ManualScheduled { id: String, patient: String, med: String },
    Canceled { detail: String },
    CanceledAll,
    History { count: usize, history: Vec<HistoryEntry> },
    HistoryCleared,

    // ── Dispense cycle ────────────────────────────────────────
    ReminderStarted { id: String, patient: String, med: String },
    DispenseAttempt { id: String },
    DispenseFailed { id: String, detail: &'static str },
    Taken { id: String },
    Missed { id: String },
}

impl AppEvent {
    pub fn list(reminders: Vec<Reminder>) -> Self {
        Self::List {
            count: reminders.len(),
            reminders,
        }
    }

    pub fn history(history: Vec<HistoryEntry>) -> Self {
        Self::History {
            count: history.len(),
            history,
        }
    }
}

/// An [`AppEvent`] stamped with the local time it was emitted at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(flatten)]
    pub event: AppEvent,
    pub time_ms: u64,
}

impl Notification {
    pub fn new(event: AppEvent, time_ms: u64) -> Self {
        Self { event, time_ms }
    }

    /// Compact JSON encoding sent over the link.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The `type` tag, for logging and test assertions.
    pub fn kind(&self) -> &'static str {
        match &self.event {
            AppEvent::Ready => "ready",
            AppEvent::BleConnected => "ble_connected",
            AppEvent::BleDisconnected => "ble_disconnected",
            AppEvent::Error { .. } => "error",
            AppEvent::Scheduled { .. } => "scheduled",
            AppEvent::List { .. } => "list",
            AppEvent::Deleted { .. } => "deleted",
            AppEvent::Starting { .. } => "starting",
            AppEvent::ManualScheduled { .. } => "manual_scheduled",
            AppEvent::Canceled { .. } => "canceled",
            AppEvent::CanceledAll => "canceled_all",
            AppEvent::History { .. } => "history",
            AppEvent::HistoryCleared => "history_cleared",
            AppEvent::ReminderStarted { .. } => "reminder_started",
            AppEvent::DispenseAttempt { .. } => "dispense_attempt",
            AppEvent::DispenseFailed { .. } => "dispense_failed",
            AppEvent::Taken { .. } => "taken",
            AppEvent::Missed { .. } => "missed",
        }
    }
}
