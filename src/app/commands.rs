//! Inbound commands to the application service.
//!
//! A command arrives as one JSON object with a `cmd` discriminator.
//! Parsing is deliberately lenient about value types (the companion app
//! has sent ids both as strings and numbers) and strict only about
//! field *presence*:
//!
//! | cmd            | required                      | optional                 |
//! |----------------|-------------------------------|--------------------------|
//! | `schedule`     | `patient`, `med`, `timestamp` | `dosage`, `now`          |
//! | `list`         | —                             | —                        |
//! | `delete`       | `id`                          | —                        |
//! | `startNow`     | —                             | `id` *or* manual fields  |
//! | `cancel`       | —                             | `id`                     |
//! | `getHistory`   | —                             | —                        |
//! | `clearHistory` | —                             | —                        |

use serde_json::{Map, Value};

use crate::error::CommandError;

/// Fields of a new reminder supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFields {
    pub patient: String,
    pub med: String,
    pub dosage: Option<String>,
    pub timestamp_ms: u64,
}

/// Commands that the link adapter can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a new pending reminder.  `client_now_ms` is the client's
    /// clock when it sent the command; without it no local due time can
    /// be derived.
    Schedule {
        fields: ReminderFields,
        client_now_ms: Option<u64>,
    },
    List,
    Delete { id: String },
    /// Trigger an existing pending reminder immediately.
    StartExisting { id: String },
    /// Create and trigger a one-off reminder.
    StartManual(ReminderFields),
    /// Cancel one reminder, or every pending one when `id` is `None`.
    Cancel { id: Option<String> },
    GetHistory,
    ClearHistory,
}

impl Command {
    /// Parse one raw link payload.
    pub fn parse(raw: &[u8]) -> Result<Self, CommandError> {
        let value: Value = serde_json::from_slice(raw).map_err(|_| CommandError::BadJson)?;
        let Value::Object(obj) = value else {
            return Err(CommandError::UnknownCmd);
        };
        let cmd = obj
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or(CommandError::UnknownCmd)?;

        match cmd {
            "schedule" => {
                if !["patient", "med", "timestamp"].iter().all(|k| obj.contains_key(*k)) {
                    return Err(CommandError::MissingFields);
                }
                Ok(Self::Schedule {
                    fields: reminder_fields(&obj),
                    client_now_ms: obj.get("now").filter(|v| !v.is_null()).map(lenient_u64),
                })
            }
            "list" => Ok(Self::List),
            "delete" => {
                let id = obj.get("id").ok_or(CommandError::IdRequired)?;
                Ok(Self::Delete { id: id_text(id) })
            }
            "startNow" => match obj.get("id") {
                Some(id) => Ok(Self::StartExisting { id: id_text(id) }),
                None => Ok(Self::StartManual(reminder_fields(&obj))),
            },
            "cancel" => Ok(Self::Cancel {
                id: obj.get("id").map(id_text),
            }),
            "getHistory" => Ok(Self::GetHistory),
            "clearHistory" => Ok(Self::ClearHistory),
            _ => Err(CommandError::UnknownCmd),
        }
    }

    /// The wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Schedule { .. } => "schedule",
            Self::List => "list",
            Self::Delete { .. } => "delete",
            Self::StartExisting { .. } | Self::StartManual(_) => "startNow",
            Self::Cancel { .. } => "cancel",
            Self::GetHistory => "getHistory",
            Self::ClearHistory => "clearHistory",
        }
    }
}

// ── Field helpers ─────────────────────────────────────────────

fn reminder_fields(obj: &Map<String, Value>) -> ReminderFields {
    ReminderFields {
        patient: text(obj, "patient"),
        med: text(obj, "med"),
        dosage: obj.get("dosage").and_then(Value::as_str).map(str::to_owned),
        timestamp_ms: obj.get("timestamp").map_or(0, lenient_u64),
    }
}

/// Text field; anything that is not a string reads as empty.
fn text(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Ids are matched as text; numeric ids are rendered in decimal.
fn id_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Millisecond values: integers, floats (truncated) or numeric strings.
/// Negative or non-numeric values read as 0.
fn lenient_u64(v: &Value) -> u64 {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
