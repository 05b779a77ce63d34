//! Reminder repository — typed operations over the persistent store.
//!
//! Every mutation is a full read-modify-write of the affected slot keyed
//! by reminder id, so a mutation never writes back a stale copy of
//! records it did not touch.  All status changes are checked against
//! [`Status::can_transition_to`].
//!
//! ```text
//!  Interpreter ──┐
//!                ├──▶ ReminderRepository ──▶ PersistentStore ──▶ StoragePort
//!  Scheduler  ───┘
//! ```

pub mod model;
pub mod store;

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};

use model::{HistoryEntry, Reminder, Status};
use store::{FIRST_ID, PersistentStore};

/// Result of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changed; `from` is the previous status.
    Applied { from: Status },
    /// The edge is not in the lifecycle graph; nothing changed.
    Rejected { from: Status },
    /// No reminder carries the requested id.
    NotFound,
}

pub struct ReminderRepository<S> {
    store: PersistentStore<S>,
}

impl<S: StoragePort> ReminderRepository<S> {
    pub fn new(storage: S) -> Self {
        Self {
            store: PersistentStore::new(storage),
        }
    }

    pub fn store(&self) -> &PersistentStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PersistentStore<S> {
        &mut self.store
    }

    /// Seed missing slots.  A counter lost while records survive is
    /// rebuilt from the highest id on flash instead of restarting at 1.
    pub fn ensure_defaults(&mut self) -> Result<(), StorageError> {
        if self.store.stored_counter().is_none() && self.store.has_records() {
            let next = self.recover_counter();
            self.store.write_counter(next)?;
        }
        self.store.ensure_defaults()
    }

    // ── Ids ───────────────────────────────────────────────────

    /// Issue the next id.  The counter is advanced on flash before the id
    /// is returned, so an id is never handed out twice.
    pub fn next_id(&mut self) -> Result<String, StorageError> {
        let n = match self.store.stored_counter() {
            Some(n) => n,
            None => self.recover_counter(),
        };
        self.store.write_counter(n.saturating_add(1))?;
        Ok(n.to_string())
    }

    /// Counter slot lost: resume above every numeric id still on flash.
    fn recover_counter(&mut self) -> u64 {
        let reminders = self.store.load_reminders();
        let history = self.store.load_history();
        let highest = reminders
            .iter()
            .map(|r| r.id.as_str())
            .chain(history.iter().map(|h| h.id.as_str()))
            .filter_map(|id| id.parse::<u64>().ok())
            .max();
        let next = highest.map_or(FIRST_ID, |h| h.saturating_add(1)).max(FIRST_ID);
        warn!("repo: id counter missing, resuming at {}", next);
        next
    }

    // ── Reminders ─────────────────────────────────────────────

    pub fn list_all(&mut self) -> Vec<Reminder> {
        self.store.load_reminders()
    }

    pub fn find(&mut self, id: &str) -> Option<Reminder> {
        self.store.load_reminders().into_iter().find(|r| r.id == id)
    }

    /// Load the reminder list, apply `f`, write the whole list back.
    pub fn modify_reminders<T>(
        &mut self,
        f: impl FnOnce(&mut Vec<Reminder>) -> T,
    ) -> Result<T, StorageError> {
        let mut list = self.store.load_reminders();
        let out = f(&mut list);
        self.store.save_reminders(&list)?;
        Ok(out)
    }

    pub fn add(&mut self, reminder: Reminder) -> Result<(), StorageError> {
        info!(
            "repo: add id={} med='{}' due={:?}",
            reminder.id, reminder.med, reminder.due_at_local_ms
        );
        self.modify_reminders(|list| list.push(reminder))
    }

    /// Remove every reminder with `id`.  Returns whether one was removed;
    /// deleting an unknown id is not an error.
    pub fn delete(&mut self, id: &str) -> Result<bool, StorageError> {
        let removed = self.modify_reminders(|list| {
            let before = list.len();
            list.retain(|r| r.id != id);
            before != list.len()
        })?;
        info!("repo: delete id={} removed={}", id, removed);
        Ok(removed)
    }

    /// Move reminder `id` to `next` if the lifecycle allows it.
    pub fn transition(&mut self, id: &str, next: Status) -> Result<Transition, StorageError> {
        self.transition_with(id, next, |_| {})
    }

    /// `pending → running` for the reminder about to be dispensed.
    pub fn mark_running(&mut self, id: &str) -> Result<Transition, StorageError> {
        self.transition(id, Status::Running)
    }

    /// `pending → running` with a fresh local due instant (manual start).
    pub fn start_now(&mut self, id: &str, due_at_local_ms: u64) -> Result<Transition, StorageError> {
        self.transition_with(id, Status::Running, |r| {
            r.due_at_local_ms = Some(due_at_local_ms);
        })
    }

    /// Cancel every pending reminder.  Returns how many changed.
    pub fn cancel_all_pending(&mut self) -> Result<usize, StorageError> {
        let n = self.modify_reminders(|list| {
            let mut n = 0;
            for r in list.iter_mut().filter(|r| r.status == Status::Pending) {
                r.status = Status::Canceled;
                n += 1;
            }
            n
        })?;
        info!("repo: canceled {} pending reminder(s)", n);
        Ok(n)
    }

    fn transition_with(
        &mut self,
        id: &str,
        next: Status,
        also: impl FnOnce(&mut Reminder),
    ) -> Result<Transition, StorageError> {
        let outcome = self.modify_reminders(|list| match list.iter_mut().find(|r| r.id == id) {
            None => Transition::NotFound,
            Some(r) if r.status.can_transition_to(next) => {
                let from = r.status;
                r.status = next;
                also(r);
                Transition::Applied { from }
            }
            Some(r) => Transition::Rejected { from: r.status },
        })?;
        match outcome {
            Transition::Applied { from } => {
                info!("repo: id={} {} -> {}", id, from.as_str(), next.as_str());
            }
            Transition::Rejected { from } => {
                info!("repo: id={} stays {} (no edge to {})", id, from.as_str(), next.as_str());
            }
            Transition::NotFound => warn!("repo: id={} not found", id),
        }
        Ok(outcome)
    }

    // ── History ───────────────────────────────────────────────

    pub fn history(&mut self) -> Vec<HistoryEntry> {
        self.store.load_history()
    }

    pub fn append_history(&mut self, entry: HistoryEntry) -> Result<(), StorageError> {
        let mut history = self.store.load_history();
        info!(
            "repo: history += id={} {} (total {})",
            entry.id,
            entry.result.as_str(),
            history.len() + 1
        );
        history.push(entry);
        self.store.save_history(&history)
    }

    pub fn clear_history(&mut self) -> Result<(), StorageError> {
        info!("repo: history cleared");
        self.store.save_history(&[])
    }
}
