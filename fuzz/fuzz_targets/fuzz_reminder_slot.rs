//! Fuzz target: corrupted `reminders` / `history` / `seqid` slots.
//!
//! Plants arbitrary bytes in the three store slots and loads a repository on
//! top of them.  Loading must never panic, a slot that does not parse
//! must be reset to `[]`, and with the counter lost the next id must
//! land above every numeric id still present.
//!
//! cargo fuzz run fuzz_reminder_slot

#![no_main]

use libfuzzer_sys::fuzz_target;
use medibox::adapters::nvs::NvsAdapter;
use medibox::app::ports::StoragePort;
use medibox::repository::ReminderRepository;
use medibox::repository::model::Reminder;
use medibox::repository::store::{COUNTER_KEY, HISTORY_KEY, NAMESPACE, REMINDERS_KEY};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let cut_a = usize::from(data[0]) % data.len();
    let cut_b = cut_a + usize::from(data[1]) % (data.len() - cut_a + 1);
    let (reminders, rest) = data.split_at(cut_a);
    let (history, counter) = rest.split_at(cut_b - cut_a);

    let mut storage = NvsAdapter::default();
    let _ = storage.write(NAMESPACE, REMINDERS_KEY, reminders);
    let _ = storage.write(NAMESPACE, HISTORY_KEY, history);
    let _ = storage.write(NAMESPACE, COUNTER_KEY, counter);

    let reminders_ok = serde_json::from_slice::<Vec<Reminder>>(reminders).is_ok();

    let mut repo = ReminderRepository::new(storage);
    let _ = repo.ensure_defaults();
    let listed = repo.list_all();
    let _ = repo.history();

    if !reminders_ok {
        assert!(listed.is_empty());
        let raw = repo.store().storage().read(NAMESPACE, REMINDERS_KEY).unwrap_or_default();
        assert_eq!(raw, b"[]");
    }

    // A lost counter resumes above every numeric id still on flash.
    let counter_lost = serde_json::from_slice::<u64>(counter).is_err();
    let highest = listed
        .iter()
        .map(|r| r.id.clone())
        .chain(repo.history().into_iter().map(|h| h.id))
        .filter_map(|id| id.parse::<u64>().ok())
        .max();
    if let Ok(id) = repo.next_id() {
        let n: u64 = id.parse().unwrap();
        if counter_lost {
            if let Some(h) = highest {
                assert!(n > h || h == u64::MAX, "id {} not above {}", n, h);
            }
        }
    }
});
