//! Persistent store: three named slots in one NVS namespace.
//!
//! | Slot        | Content                         | Default |
//! |-------------|---------------------------------|---------|
//! | `reminders` | JSON array of [`Reminder`]      | `[]`    |
//! | `history`   | JSON array of [`HistoryEntry`]  | `[]`    |
//! | `seqid`     | JSON integer, next id to issue  | `1`     |
//!
//! Loads never fail.  A slot that is missing or unreadable yields an
//! empty list; a slot whose content does not parse is reset to `[]` on
//! flash so the corruption does not resurface on the next boot.  Writes
//! replace the whole slot and surface [`StorageError`] to the caller.

use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{StorageError, StoragePort};

use super::model::{HistoryEntry, Reminder};

pub const NAMESPACE: &str = "smartmed";
pub const REMINDERS_KEY: &str = "reminders";
pub const HISTORY_KEY: &str = "history";
pub const COUNTER_KEY: &str = "seqid";

/// Counter value when nothing has been issued yet.
pub const FIRST_ID: u64 = 1;

pub struct PersistentStore<S> {
    storage: S,
}

impl<S: StoragePort> PersistentStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Seed missing slots with their defaults (first boot).
    pub fn ensure_defaults(&mut self) -> Result<(), StorageError> {
        if !self.storage.exists(NAMESPACE, REMINDERS_KEY) {
            self.storage.write(NAMESPACE, REMINDERS_KEY, b"[]")?;
            info!("store: seeded empty '{}'", REMINDERS_KEY);
        }
        if !self.storage.exists(NAMESPACE, HISTORY_KEY) {
            self.storage.write(NAMESPACE, HISTORY_KEY, b"[]")?;
            info!("store: seeded empty '{}'", HISTORY_KEY);
        }
        if !self.storage.exists(NAMESPACE, COUNTER_KEY) {
            self.write_counter(FIRST_ID)?;
            info!("store: seeded '{}' = {}", COUNTER_KEY, FIRST_ID);
        }
        Ok(())
    }

    /// Whether either record slot holds anything but `[]`.
    pub fn has_records(&self) -> bool {
        [REMINDERS_KEY, HISTORY_KEY].iter().any(|key| {
            self.storage
                .read(NAMESPACE, key)
                .is_ok_and(|bytes| bytes.iter().any(|b| !b"[] \r\n\t".contains(b)))
        })
    }

    // ── Reminders ─────────────────────────────────────────────

    pub fn load_reminders(&mut self) -> Vec<Reminder> {
        self.load_slot(REMINDERS_KEY)
    }

    pub fn save_reminders(&mut self, reminders: &[Reminder]) -> Result<(), StorageError> {
        self.save_slot(REMINDERS_KEY, reminders)
    }

    // ── History ───────────────────────────────────────────────

    pub fn load_history(&mut self) -> Vec<HistoryEntry> {
        self.load_slot(HISTORY_KEY)
    }

    pub fn save_history(&mut self, history: &[HistoryEntry]) -> Result<(), StorageError> {
        self.save_slot(HISTORY_KEY, history)
    }

    // ── Counter ───────────────────────────────────────────────

    /// Next id to issue; `1` if the slot is missing or malformed.
    pub fn read_counter(&self) -> u64 {
        self.stored_counter().unwrap_or(FIRST_ID)
    }

    /// The counter as stored, or `None` if it is missing or malformed.
    pub fn stored_counter(&self) -> Option<u64> {
        let bytes = self.storage.read(NAMESPACE, COUNTER_KEY).ok()?;
        match serde_json::from_slice::<u64>(&bytes) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("store: counter slot malformed ({})", e);
                None
            }
        }
    }

    pub fn write_counter(&mut self, next: u64) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&next).map_err(|_| StorageError::IoError)?;
        self.storage.write(NAMESPACE, COUNTER_KEY, &bytes)
    }

    // ── Internal ──────────────────────────────────────────────

    fn load_slot<T: DeserializeOwned + Serialize>(&mut self, key: &str) -> Vec<T> {
        let bytes = match self.storage.read(NAMESPACE, key) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound) => {
                debug!("store: '{}' not found, treating as empty", key);
                return Vec::new();
            }
            Err(e) => {
                warn!("store: read '{}' failed ({}), treating as empty", key, e);
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(list) => list,
            Err(e) => {
                warn!(
                    "store: '{}' corrupted ({} bytes, {}), resetting to []",
                    key,
                    bytes.len(),
                    e
                );
                if let Err(e) = self.storage.write(NAMESPACE, key, b"[]") {
                    warn!("store: reset of '{}' failed ({})", key, e);
                }
                Vec::new()
            }
        }
    }

    fn save_slot<T: Serialize>(&mut self, key: &str, items: &[T]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(items).map_err(|_| StorageError::IoError)?;
        self.storage.write(NAMESPACE, key, &bytes).inspect_err(|e| {
            warn!("store: write '{}' ({} bytes) failed ({})", key, bytes.len(), e);
        })
    }
}
