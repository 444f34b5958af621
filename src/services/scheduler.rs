//! Weekly registration reopening
//!
//! Every course carries a weekly slot at which its registration opens
//! again. The store only knows the [`ReopenTriggers`] seam; the tokio-backed
//! [`WeeklyReopenScheduler`] sleeps until each slot and reports it as a
//! [`ReopenEvent`] on a channel that the binary feeds back into the store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{GroupId, Schedule};
use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::helpers::now_in;

/// Job key of a course trigger
pub fn trigger_key(group_id: GroupId, course_id: &str) -> String {
    format!("{}:{}", group_id, course_id)
}

/// Registration of weekly reopen triggers, keyed by group and course
pub trait ReopenTriggers: Send + Sync {
    /// Register or replace the trigger of a course
    fn register(&self, group_id: GroupId, course_id: &str, schedule: &Schedule) -> Result<()>;

    /// Drop the trigger of a course. Returns whether one existed.
    fn cancel(&self, group_id: GroupId, course_id: &str) -> bool;
}

/// A weekly slot that came due
#[derive(Debug, Clone, PartialEq)]
pub struct ReopenEvent {
    pub group_id: GroupId,
    pub course_id: String,
    pub fired_at: DateTime<FixedOffset>,
}

/// Next occurrence of `schedule` strictly after `now`, in `now`'s offset
pub fn next_reopen_after(schedule: &Schedule, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    if schedule.day > 6 {
        return None;
    }
    let time = schedule.time_of_day()?;

    let today = now.weekday().num_days_from_monday() as i64;
    let days_ahead = (schedule.day as i64 - today).rem_euclid(7);
    let date = now.date_naive() + Duration::days(days_ahead);
    let candidate = now.offset().from_local_datetime(&date.and_time(time)).single()?;

    if candidate > now {
        Some(candidate)
    } else {
        Some(candidate + Duration::weeks(1))
    }
}

/// Triggers backed by one tokio task per course
#[derive(Debug)]
pub struct WeeklyReopenScheduler {
    offset: FixedOffset,
    runtime: Handle,
    events: mpsc::UnboundedSender<ReopenEvent>,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl WeeklyReopenScheduler {
    pub fn new(offset: FixedOffset, runtime: Handle) -> (Self, mpsc::UnboundedReceiver<ReopenEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            offset,
            runtime,
            events,
            jobs: Mutex::new(HashMap::new()),
        };
        (scheduler, receiver)
    }

    fn jobs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>>> {
        self.jobs
            .lock()
            .map_err(|_| QueueBuddyError::Scheduler("job table lock poisoned".to_string()))
    }

    /// Keys of all running jobs, sorted
    pub fn job_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match self.jobs() {
            Ok(jobs) => jobs.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    /// Abort every job and wait for the tasks to wind down
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = match self.jobs() {
            Ok(mut jobs) => jobs.drain().map(|(_, handle)| handle).collect(),
            Err(e) => {
                warn!(error = %e, "Cannot stop reopen jobs");
                return;
            }
        };
        for handle in &handles {
            handle.abort();
        }
        let count = handles.len();
        futures::future::join_all(handles).await;
        info!(jobs = count, "Stopped weekly reopen jobs");
    }

    async fn run_job(
        group_id: GroupId,
        course_id: String,
        schedule: Schedule,
        offset: FixedOffset,
        events: mpsc::UnboundedSender<ReopenEvent>,
    ) {
        let mut after = now_in(&offset);
        loop {
            let Some(next) = next_reopen_after(&schedule, after) else {
                warn!(group_id = group_id, course_id = %course_id, "Schedule has no next slot, stopping job");
                return;
            };
            let wait = (next - now_in(&offset)).to_std().unwrap_or_default();
            debug!(group_id = group_id, course_id = %course_id, next = %next, "Waiting for reopen slot");
            tokio::time::sleep(wait).await;

            let event = ReopenEvent {
                group_id,
                course_id: course_id.clone(),
                fired_at: now_in(&offset),
            };
            if events.send(event).is_err() {
                debug!(group_id = group_id, course_id = %course_id, "Event receiver gone, stopping job");
                return;
            }
            after = std::cmp::max(next, now_in(&offset));
        }
    }
}

impl ReopenTriggers for WeeklyReopenScheduler {
    fn register(&self, group_id: GroupId, course_id: &str, schedule: &Schedule) -> Result<()> {
        let next = next_reopen_after(schedule, now_in(&self.offset)).ok_or_else(|| {
            QueueBuddyError::Scheduler(format!(
                "Invalid schedule for {}: day {} at '{}'",
                trigger_key(group_id, course_id),
                schedule.day,
                schedule.time
            ))
        })?;

        let key = trigger_key(group_id, course_id);
        let task = self.runtime.spawn(Self::run_job(
            group_id,
            course_id.to_string(),
            schedule.clone(),
            self.offset,
            self.events.clone(),
        ));

        if let Some(previous) = self.jobs()?.insert(key.clone(), task) {
            previous.abort();
        }
        info!(job = %key, schedule = %schedule.describe(), next = %next, "Scheduled registration reopening");
        Ok(())
    }

    fn cancel(&self, group_id: GroupId, course_id: &str) -> bool {
        let key = trigger_key(group_id, course_id);
        match self.jobs().map(|mut jobs| jobs.remove(&key)) {
            Ok(Some(task)) => {
                task.abort();
                info!(job = %key, "Removed registration reopen job");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(job = %key, error = %e, "Could not remove reopen job");
                false
            }
        }
    }
}

impl Drop for WeeklyReopenScheduler {
    fn drop(&mut self) {
        if let Ok(jobs) = self.jobs.get_mut() {
            for (_, task) in jobs.drain() {
                task.abort();
            }
        }
    }
}

/// Triggers that only remember what was registered. Used when automatic
/// reopening is disabled; slots can still be fired by hand through the store.
#[derive(Debug, Default)]
pub struct ManualTriggers {
    registered: Mutex<BTreeMap<String, Schedule>>,
}

impl ManualTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> BTreeMap<String, Schedule> {
        self.registered.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ReopenTriggers for ManualTriggers {
    fn register(&self, group_id: GroupId, course_id: &str, schedule: &Schedule) -> Result<()> {
        if !schedule.is_valid() {
            return Err(QueueBuddyError::Scheduler(format!(
                "Invalid schedule for {}",
                trigger_key(group_id, course_id)
            )));
        }
        self.registered
            .lock()
            .map_err(|_| QueueBuddyError::Scheduler("trigger table lock poisoned".to_string()))?
            .insert(trigger_key(group_id, course_id), schedule.clone());
        Ok(())
    }

    fn cancel(&self, group_id: GroupId, course_id: &str) -> bool {
        self.registered
            .lock()
            .map(|mut r| r.remove(&trigger_key(group_id, course_id)).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moscow() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_next_reopen_later_same_week() {
        // 2024-09-02 is a Monday
        let now = moscow().with_ymd_and_hms(2024, 9, 2, 12, 0, 0).unwrap();
        let next = next_reopen_after(&Schedule::new(2, "20:00"), now).unwrap();
        assert_eq!(next, moscow().with_ymd_and_hms(2024, 9, 4, 20, 0, 0).unwrap());
    }

    #[test]
    fn test_next_reopen_rolls_over_week() {
        let now = moscow().with_ymd_and_hms(2024, 9, 4, 20, 0, 0).unwrap();
        let next = next_reopen_after(&Schedule::new(2, "20:00"), now).unwrap();
        assert_eq!(next, moscow().with_ymd_and_hms(2024, 9, 11, 20, 0, 0).unwrap());

        let now = moscow().with_ymd_and_hms(2024, 9, 8, 23, 59, 0).unwrap();
        let next = next_reopen_after(&Schedule::new(0, "00:00"), now).unwrap();
        assert_eq!(next, moscow().with_ymd_and_hms(2024, 9, 9, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_reopen_rejects_invalid_schedule() {
        let now = moscow().with_ymd_and_hms(2024, 9, 2, 12, 0, 0).unwrap();
        assert!(next_reopen_after(&Schedule::new(7, "20:00"), now).is_none());
        assert!(next_reopen_after(&Schedule::new(1, "8pm"), now).is_none());
    }

    #[test]
    fn test_manual_triggers() {
        let triggers = ManualTriggers::new();
        triggers.register(-1, "math", &Schedule::default()).unwrap();
        assert!(triggers.registered().contains_key("-1:math"));
        assert!(triggers.register(-1, "bad", &Schedule::new(9, "20:00")).is_err());
        assert!(triggers.cancel(-1, "math"));
        assert!(!triggers.cancel(-1, "math"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_fires_and_cancels() {
        let (scheduler, mut events) = WeeklyReopenScheduler::new(moscow(), Handle::current());

        scheduler.register(-5, "math", &Schedule::default()).unwrap();
        scheduler.register(-5, "phys", &Schedule::new(4, "18:30")).unwrap();
        assert_eq!(scheduler.job_keys(), vec!["-5:math".to_string(), "-5:phys".to_string()]);

        assert!(scheduler.cancel(-5, "phys"));
        assert_eq!(scheduler.job_keys(), vec!["-5:math".to_string()]);

        let event = tokio::time::timeout(std::time::Duration::from_secs(8 * 24 * 3600), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.group_id, -5);
        assert_eq!(event.course_id, "math");

        scheduler.shutdown().await;
        assert!(scheduler.job_keys().is_empty());
    }
}
