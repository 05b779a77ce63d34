//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, actuators, display, clock, storage, link)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** writes MUST be atomic per key (NVS commit semantics).
//! - All port errors are typed — callers must handle every variant explicitly.

use crate::config::DeviceConfig;
use crate::repository::ReminderRepository;
use crate::repository::model::Reminder;

use super::events::Notification;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the two IR presence sensors.
pub trait SensorPort {
    /// `true` while the dispense-chute sensor sees an object.
    fn read_dispense_sensor(&mut self) -> bool;

    /// `true` while the pickup-tray sensor sees a hand.
    fn read_hand_sensor(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the dispense motor, audible cue and failure LED.
pub trait ActuatorPort {
    /// Drive the dispense motor forward.
    fn motor_forward(&mut self);

    /// Stop the dispense motor (both bridge inputs low).
    fn motor_stop(&mut self);

    /// Switch the audible cue on or off.
    fn sound_cue(&mut self, on: bool);

    /// Light or clear the missed-dose indicator.
    fn set_failure_indicator(&mut self, on: bool);

    /// Motor stopped, cue silent — safe idle.  The failure indicator is
    /// left as-is so a missed dose stays visible.
    fn all_off(&mut self) {
        self.motor_stop();
        self.sound_cue(false);
    }
}

// ───────────────────────────────────────────────────────────────
// Display port
// ───────────────────────────────────────────────────────────────

/// Two-line character display.  Lines longer than the panel are truncated
/// by the adapter.
pub trait DisplayPort {
    fn show_text(&mut self, line1: &str, line2: &str);
}

/// Everything the dispense cycle drives.  Blanket-implemented so a single
/// adapter (or mock) satisfies it by implementing the three ports.
pub trait DeviceHardware: SensorPort + ActuatorPort + DisplayPort {}

impl<T: SensorPort + ActuatorPort + DisplayPort> DeviceHardware for T {}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic local time plus a blocking delay.
pub trait ClockPort {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block the calling task for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → BLE notify / log)
// ───────────────────────────────────────────────────────────────

/// The domain emits [`Notification`]s through this port.  Adapters decide
/// where they go (BLE status characteristic, serial log, test recorder).
pub trait EventSink {
    fn emit(&mut self, notification: &Notification);
}

// ───────────────────────────────────────────────────────────────
// Link port (transport: domain → central)
// ───────────────────────────────────────────────────────────────

/// Outbound half of a command link.  Inbound traffic arrives through the
/// [`LinkQueue`](crate::events::LinkQueue) so transport callbacks never
/// touch domain state.
pub trait LinkPort {
    /// Whether a central is currently connected.
    fn is_connected(&self) -> bool;

    /// Push one notification payload to the connected central.
    fn notify(&mut self, payload: &[u8]);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// never silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigError::NotFound`] if nothing is stored yet.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic — no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a whole value.
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the dispense cycle)
// ───────────────────────────────────────────────────────────────

/// Callback the [`Scheduler`](crate::scheduler::Scheduler) invokes for
/// each reminder it has just marked `running`.
///
/// The scheduler knows nothing about motors or sensors; the service
/// implements this by running one full dispense-verify cycle.
pub trait SchedulerDelegate<S: StoragePort> {
    fn on_reminder_due(&mut self, reminder: &Reminder, repo: &mut ReminderRepository<S>);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
