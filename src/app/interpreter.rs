//! Command dispatch: one parsed [`Command`] in, zero or more
//! [`Notification`]s out.
//!
//! Each handler performs its read-modify-write through the repository and
//! then emits its replies.  Errors bubble up as [`CommandError`] and are
//! turned into a single `error` notification by the service.

use log::info;

use crate::config::DeviceConfig;
use crate::error::CommandError;
use crate::repository::model::{Reminder, Status};
use crate::repository::{ReminderRepository, Transition};
use crate::scheduler::Scheduler;

use super::commands::{Command, ReminderFields};
use super::events::{AppEvent, Notification};
use super::ports::{EventSink, StoragePort};

pub struct Interpreter<'a, S, E> {
    pub repo: &'a mut ReminderRepository<S>,
    pub scheduler: &'a mut Scheduler,
    pub config: &'a DeviceConfig,
    pub sink: &'a mut E,
    /// Local time the command is processed at.
    pub now_ms: u64,
}

impl<S: StoragePort, E: EventSink> Interpreter<'_, S, E> {
    pub fn execute(&mut self, cmd: Command) -> Result<(), CommandError> {
        info!("CMD {} @ {}ms", cmd.name(), self.now_ms);
        match cmd {
            Command::Schedule {
                fields,
                client_now_ms,
            } => self.schedule(fields, client_now_ms),
            Command::List => {
                self.emit_list();
                Ok(())
            }
            Command::Delete { id } => self.delete(id),
            Command::StartExisting { id } => self.start_existing(id),
            Command::StartManual(fields) => self.start_manual(fields),
            Command::Cancel { id } => self.cancel(id),
            Command::GetHistory => {
                let history = self.repo.history();
                self.emit(AppEvent::history(history));
                Ok(())
            }
            Command::ClearHistory => {
                self.repo.clear_history()?;
                self.emit(AppEvent::HistoryCleared);
                Ok(())
            }
        }
    }

    // ── Handlers ──────────────────────────────────────────────

    fn schedule(
        &mut self,
        fields: ReminderFields,
        client_now_ms: Option<u64>,
    ) -> Result<(), CommandError> {
        // The client's clock is not comparable to ours; only the lead
        // time it asks for is.
        let due_at_local_ms =
            client_now_ms.map(|now| self.now_ms.saturating_add(fields.timestamp_ms.saturating_sub(now)));
        let reminder = self.new_reminder(fields, due_at_local_ms, client_now_ms)?;
        let event = AppEvent::Scheduled {
            id: reminder.id.clone(),
            patient: reminder.patient.clone(),
            med: reminder.med.clone(),
        };
        self.repo.add(reminder)?;
        self.emit(event);
        self.emit_list();
        Ok(())
    }

    fn delete(&mut self, id: String) -> Result<(), CommandError> {
        self.repo.delete(&id)?;
        self.scheduler.disarm(&id);
        self.emit(AppEvent::Deleted { detail: id });
        self.emit_list();
        Ok(())
    }

    fn start_existing(&mut self, id: String) -> Result<(), CommandError> {
        if !self.scheduler.can_arm(&id) {
            return Err(CommandError::Busy);
        }
        let due = self.start_now_due();
        match self.repo.start_now(&id, due)? {
            Transition::Applied { .. } => {
                self.scheduler.arm(&id);
                self.emit(AppEvent::Starting { detail: id });
                Ok(())
            }
            Transition::Rejected { .. } => Err(CommandError::NotPending),
            Transition::NotFound => Err(CommandError::NotFound),
        }
    }

    fn start_manual(&mut self, fields: ReminderFields) -> Result<(), CommandError> {
        let due = self.start_now_due();
        let reminder = self.new_reminder(fields, Some(due), None)?;
        let event = AppEvent::ManualScheduled {
            id: reminder.id.clone(),
            patient: reminder.patient.clone(),
            med: reminder.med.clone(),
        };
        self.repo.add(reminder)?;
        self.emit(event);
        self.emit_list();
        Ok(())
    }

    fn cancel(&mut self, id: Option<String>) -> Result<(), CommandError> {
        match id {
            Some(id) => {
                // Only pending reminders can be canceled; anything else is
                // left as-is (a running one stays armed) and the reply is
                // the same.
                self.repo.transition(&id, Status::Canceled)?;
                self.emit(AppEvent::Canceled { detail: id });
            }
            None => {
                self.repo.cancel_all_pending()?;
                self.emit(AppEvent::CanceledAll);
            }
        }
        self.emit_list();
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────

    fn start_now_due(&self) -> u64 {
        self.now_ms
            .saturating_add(u64::from(self.config.start_now_lead_ms))
    }

    fn new_reminder(
        &mut self,
        fields: ReminderFields,
        due_at_local_ms: Option<u64>,
        client_now_ms: Option<u64>,
    ) -> Result<Reminder, CommandError> {
        Ok(Reminder {
            id: self.repo.next_id()?,
            patient: fields.patient,
            med: fields.med,
            dosage: fields.dosage,
            timestamp_ms: fields.timestamp_ms,
            due_at_local_ms,
            client_now_ms,
            status: Status::Pending,
            created_at: self.now_ms,
        })
    }

    fn emit_list(&mut self) {
        let reminders = self.repo.list_all();
        self.emit(AppEvent::list(reminders));
    }

    fn emit(&mut self, event: AppEvent) {
        self.sink.emit(&Notification::new(event, self.now_ms));
    }
}
