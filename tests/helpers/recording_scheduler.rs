//! Reopen triggers that record every call and can be told to fail

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use QueueBuddy::models::{GroupId, Schedule};
use QueueBuddy::services::{trigger_key, ReopenTriggers};
use QueueBuddy::{QueueBuddyError, Result};

#[derive(Debug, Default)]
pub struct RecordingScheduler {
    registered: Mutex<BTreeMap<String, Schedule>>,
    cancelled: Mutex<Vec<String>>,
    fail_registrations: AtomicBool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `register` call fail
    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::SeqCst);
    }

    pub fn registered_keys(&self) -> Vec<String> {
        self.registered.lock().unwrap().keys().cloned().collect()
    }

    pub fn schedule_of(&self, group_id: GroupId, course_id: &str) -> Option<Schedule> {
        self.registered.lock().unwrap().get(&trigger_key(group_id, course_id)).cloned()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl ReopenTriggers for RecordingScheduler {
    fn register(&self, group_id: GroupId, course_id: &str, schedule: &Schedule) -> Result<()> {
        if self.fail_registrations.load(Ordering::SeqCst) {
            return Err(QueueBuddyError::Scheduler("job store unavailable".to_string()));
        }
        self.registered
            .lock()
            .unwrap()
            .insert(trigger_key(group_id, course_id), schedule.clone());
        Ok(())
    }

    fn cancel(&self, group_id: GroupId, course_id: &str) -> bool {
        let key = trigger_key(group_id, course_id);
        let existed = self.registered.lock().unwrap().remove(&key).is_some();
        self.cancelled.lock().unwrap().push(key);
        existed
    }
}
