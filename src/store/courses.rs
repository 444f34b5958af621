//! Course and group lifecycle operations

use tracing::{error, info, warn};

use crate::models::{Course, CourseAdded, GroupId, GroupInfo, Schedule};
use crate::services::scheduler::next_reopen_after;
use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::helpers::{normalize_course_id, parse_time_of_day};
use crate::utils::logging::log_group_event;
use chrono::{DateTime, FixedOffset};
use super::{require_course, require_group, Documents, EntityStore, StoreState};

impl EntityStore {
    /// Add a course to a group and register its weekly reopen trigger.
    /// Nothing is kept when any step fails.
    pub fn add_course(
        &self,
        group_id: GroupId,
        course_id: &str,
        name: &str,
        day: i64,
        time: &str,
    ) -> Result<CourseAdded> {
        let mut live = self.lock()?;
        let group_name = require_group(&live, group_id)?.name.clone();

        let course_id = normalize_course_id(course_id).ok_or(QueueBuddyError::InvalidCourseId)?;
        if live.course(group_id, &course_id).is_some() {
            return Err(QueueBuddyError::CourseAlreadyExists { course_id });
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(QueueBuddyError::InvalidInput("Course name cannot be empty!".to_string()));
        }
        if !(0..=6).contains(&day) {
            return Err(QueueBuddyError::InvalidWeekday(day));
        }
        if parse_time_of_day(time).is_none() {
            return Err(QueueBuddyError::InvalidTime(time.to_string()));
        }
        let schedule = Schedule::new(day as u8, time.trim());

        let mut staged = live.clone();
        insert_course(&mut staged, group_id, &course_id, name, schedule.clone());

        self.triggers.register(group_id, &course_id, &schedule)?;
        if let Err(e) = self.commit(&mut live, staged, Documents::Both) {
            self.triggers.cancel(group_id, &course_id);
            error!(group_id = group_id, course_id = %course_id, error = %e, "Adding course failed, rolled back");
            return Err(e);
        }

        info!(
            group_id = group_id,
            course_id = %course_id,
            schedule = %schedule.describe(),
            "Added course"
        );
        Ok(CourseAdded {
            course_id,
            course_name: name.to_string(),
            group_name,
            schedule,
        })
    }

    /// Remove a course with an empty queue. Returns its display name.
    pub fn remove_course(&self, group_id: GroupId, course_id: &str) -> Result<String> {
        let removed = self.mutate(Documents::Both, |state| {
            let course_name = require_course(state, group_id, course_id)?.name.clone();
            let count = state.queue(group_id, course_id).len();
            if count > 0 {
                return Err(QueueBuddyError::CourseHasRegistrants { course_name, count });
            }

            state.courses_mut(group_id).remove(course_id);
            state.registration_mut(group_id).remove(course_id);
            state.group_queues_mut(group_id).remove(course_id);
            Ok(course_name)
        })?;

        if !self.triggers.cancel(group_id, course_id) {
            warn!(group_id = group_id, course_id = course_id, "No reopen trigger to remove");
        }
        info!(group_id = group_id, course_id = course_id, "Removed course");
        Ok(removed)
    }

    /// Create a group with the seed courses. Returns false when the group
    /// already existed.
    pub fn initialize_group(&self, group_id: GroupId, name: Option<&str>) -> Result<bool> {
        let mut live = self.lock()?;
        if live.has_group(group_id) {
            return Ok(false);
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| GroupInfo::fallback_name(group_id));

        let mut staged = live.clone();
        staged.groups.insert(group_id, GroupInfo::new(name.clone(), self.now()));
        staged.courses_mut(group_id);
        for seed in &self.seed_courses {
            insert_course(&mut staged, group_id, &seed.id, &seed.name, Schedule::new(seed.day, seed.time.clone()));
        }

        self.commit(&mut live, staged, Documents::Both)?;

        for seed in &self.seed_courses {
            let schedule = Schedule::new(seed.day, seed.time.clone());
            if let Err(e) = self.triggers.register(group_id, &seed.id, &schedule) {
                warn!(group_id = group_id, course_id = %seed.id, error = %e, "Could not schedule seed course");
            }
        }

        log_group_event(group_id, "initialized", Some(&name));
        Ok(true)
    }

    /// Delete a group and everything that belongs to it. Returns false when
    /// nothing was stored for the group.
    pub fn remove_stale_group(&self, group_id: GroupId) -> Result<bool> {
        let removed_courses = self.mutate(Documents::Both, |state| {
            let mut found = state.groups.remove(&group_id).is_some();
            let courses: Vec<String> = state
                .courses
                .remove(&group_id)
                .map(|courses| courses.into_keys().collect())
                .unwrap_or_default();
            found |= !courses.is_empty();
            found |= state.queues.remove(&group_id).is_some();
            found |= state.registration.remove(&group_id).is_some();
            found |= state.group_admins.remove(&group_id).is_some();
            found |= state.queue_sizes.remove(&group_id).is_some();
            state.user_groups.retain(|_, associated| *associated != group_id);

            if found {
                Ok(Some(courses))
            } else {
                Ok(None)
            }
        });

        match removed_courses? {
            Some(courses) => {
                for course_id in &courses {
                    self.triggers.cancel(group_id, course_id);
                }
                log_group_event(group_id, "removed_stale", None);
                Ok(true)
            }
            None => {
                info!(group_id = group_id, "No data stored for group");
                Ok(false)
            }
        }
    }

    pub fn open_registration(&self, group_id: GroupId, course_id: &str) -> Result<()> {
        self.set_registration(group_id, course_id, true)
    }

    pub fn close_registration(&self, group_id: GroupId, course_id: &str) -> Result<()> {
        self.set_registration(group_id, course_id, false)
    }

    fn set_registration(&self, group_id: GroupId, course_id: &str, open: bool) -> Result<()> {
        self.mutate(Documents::Runtime, |state| {
            require_course(state, group_id, course_id)?;
            state.registration_mut(group_id).insert(course_id.to_string(), open);
            Ok(())
        })?;

        info!(group_id = group_id, course_id = course_id, open = open, "Registration status changed");
        Ok(())
    }

    /// Open every course of a group. Returns the number of courses.
    pub fn open_group_registration(&self, group_id: GroupId) -> Result<usize> {
        self.set_group_registration(group_id, true)
    }

    /// Close every course of a group. Returns the number of courses.
    pub fn close_group_registration(&self, group_id: GroupId) -> Result<usize> {
        self.set_group_registration(group_id, false)
    }

    fn set_group_registration(&self, group_id: GroupId, open: bool) -> Result<usize> {
        let count = self.mutate(Documents::Runtime, |state| {
            require_group(state, group_id)?;
            let course_ids: Vec<String> = state.group_courses(group_id).map(|c| c.id.clone()).collect();
            let statuses = state.registration_mut(group_id);
            for course_id in &course_ids {
                statuses.insert(course_id.clone(), open);
            }
            Ok(course_ids.len())
        })?;

        log_group_event(group_id, if open { "registration_opened" } else { "registration_closed" }, None);
        Ok(count)
    }

    /// Handle a weekly reopen slot. Slots of courses that no longer exist
    /// are ignored.
    pub fn on_scheduled_reopen(&self, group_id: GroupId, course_id: &str) -> Result<bool> {
        let known = self.lock()?.course(group_id, course_id).is_some();
        if !known {
            warn!(group_id = group_id, course_id = course_id, "Reopen slot for unknown course ignored");
            return Ok(false);
        }

        self.open_registration(group_id, course_id)?;
        info!(group_id = group_id, course_id = course_id, "Registration reopened on schedule");
        Ok(true)
    }

    pub fn is_registration_open(&self, group_id: GroupId, course_id: &str) -> Result<bool> {
        Ok(self.lock()?.is_open(group_id, course_id))
    }

    pub fn registration_label(&self, group_id: GroupId, course_id: &str) -> Result<&'static str> {
        Ok(if self.is_registration_open(group_id, course_id)? {
            "🟢 Open"
        } else {
            "🔴 Closed"
        })
    }

    /// Earliest upcoming reopen slot among the courses of a group
    pub fn next_group_reopen(&self, group_id: GroupId) -> Result<Option<(Course, DateTime<FixedOffset>)>> {
        let state = self.lock()?;
        require_group(&state, group_id)?;
        let now = self.now();

        Ok(state
            .group_courses(group_id)
            .filter_map(|course| next_reopen_after(&course.schedule, now).map(|at| (course.clone(), at)))
            .min_by_key(|(_, at)| *at))
    }
}

/// Insert a closed course with an empty queue
fn insert_course(state: &mut StoreState, group_id: GroupId, course_id: &str, name: &str, schedule: Schedule) {
    state.courses_mut(group_id).insert(
        course_id.to_string(),
        Course {
            id: course_id.to_string(),
            name: name.to_string(),
            schedule,
        },
    );
    state.registration_mut(group_id).insert(course_id.to_string(), false);
    state.queue_mut(group_id, course_id).clear();
}
