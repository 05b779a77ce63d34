//! Persisted records: reminders, history entries and their enums.
//!
//! Field names on the wire and in flash are camelCase, matching what the
//! companion app sends (`timestampMs`, `dueAtLocalMs`, ...).
//!
//! ```text
//!  pending ──▶ running ──▶ done
//!     │
//!     └──────▶ canceled
//! ```

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Running,
    Done,
    Canceled,
}

impl Status {
    /// The only edges a reminder may take.  Self-loops are not edges.
    pub const fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Running)
                | (Status::Pending, Status::Canceled)
                | (Status::Running, Status::Done)
        )
    }

    /// `done` and `canceled` never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Canceled)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Done => "done",
            Status::Canceled => "canceled",
        }
    }
}

// ---------------------------------------------------------------------------
// Reminder
// ---------------------------------------------------------------------------

/// A single scheduled dose.
///
/// Every field defaults on load so a partially written record still
/// parses; `status` defaults to `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub patient: String,
    #[serde(default)]
    pub med: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    /// Client wall-clock target instant (ms since epoch).
    #[serde(default)]
    pub timestamp_ms: u64,
    /// Local monotonic instant at which the reminder becomes due.
    /// Absent means the reminder is never picked up by the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at_local_ms: Option<u64>,
    /// Client clock at the moment the command was sent.
    #[serde(default, rename = "nowSentMs", skip_serializing_if = "Option::is_none")]
    pub client_now_ms: Option<u64>,
    #[serde(default)]
    pub status: Status,
    /// Local ms at creation.
    #[serde(default)]
    pub created_at: u64,
}

impl Reminder {
    /// Due at or before `now_ms`.  Reminders without a local due instant
    /// are never due.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.due_at_local_ms.is_some_and(|due| now_ms >= due)
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Outcome of a completed dispense cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseResult {
    Taken,
    Missed,
}

impl DoseResult {
    pub const fn as_str(self) -> &'static str {
        match self {
            DoseResult::Taken => "taken",
            DoseResult::Missed => "missed",
        }
    }
}

/// Immutable record of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub patient: String,
    #[serde(default)]
    pub med: String,
    #[serde(default)]
    pub timestamp_ms: u64,
    pub result: DoseResult,
    /// Local ms at completion.
    #[serde(default)]
    pub when_ms: u64,
}

impl HistoryEntry {
    pub fn from_reminder(reminder: &Reminder, result: DoseResult, when_ms: u64) -> Self {
        Self {
            id: reminder.id.clone(),
            patient: reminder.patient.clone(),
            med: reminder.med.clone(),
            timestamp_ms: reminder.timestamp_ms,
            result,
            when_ms,
        }
    }
}
