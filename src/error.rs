//! Command error taxonomy for the SmartMed firmware.
//!
//! Every failure the command interpreter can report funnels into
//! [`CommandError`].  Each variant maps to the `detail` string carried by
//! the `{"type":"error"}` notification, so the wire vocabulary lives in
//! exactly one place.  All variants are `Copy`.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Payload was not parseable JSON.
    BadJson,
    /// `cmd` missing, not a string, or not one of the known commands.
    UnknownCmd,
    /// `schedule` without all of `patient`, `med`, `timestamp`.
    MissingFields,
    /// `delete` without an `id`.
    IdRequired,
    /// `startNow` referenced an id that does not exist.
    NotFound,
    /// `startNow` referenced a reminder that is no longer pending.
    NotPending,
    /// The persistent store rejected a write.
    StoreFault,
    /// `startNow` while the dispatch queue is full.
    Busy,
}

impl CommandError {
    /// Wire `detail` value for the error notification.
    pub const fn detail(self) -> &'static str {
        match self {
            Self::BadJson => "bad_json",
            Self::UnknownCmd => "unknown_cmd",
            Self::MissingFields => "missing_fields",
            Self::IdRequired => "id_required",
            Self::NotFound => "not_found",
            Self::NotPending => "not_pending",
            Self::StoreFault => "store_fault",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadJson => write!(f, "payload is not valid JSON"),
            Self::UnknownCmd => write!(f, "unknown or missing command"),
            Self::MissingFields => write!(f, "schedule requires patient, med and timestamp"),
            Self::IdRequired => write!(f, "id is required"),
            Self::NotFound => write!(f, "reminder not found"),
            Self::NotPending => write!(f, "reminder is not pending"),
            Self::StoreFault => write!(f, "persistent store write failed"),
            Self::Busy => write!(f, "too many reminders waiting for dispatch"),
        }
    }
}

impl From<StorageError> for CommandError {
    fn from(_: StorageError) -> Self {
        Self::StoreFault
    }
}
