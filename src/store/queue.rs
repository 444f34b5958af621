//! Queue operations of the entity store

use tracing::{info, warn};

use crate::models::{
    CourseSummary, EnqueueReceipt, EnqueueRequest, GroupId, QueueEntry, QueueSnapshot, RemovedEntry,
    SlotChange, SwapOutcome, UserId,
};
use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::logging::log_queue_action;
use super::{require_course, require_group, Documents, EntityStore, StoreState};

impl EntityStore {
    /// Append a registration to a course queue
    pub fn enqueue(&self, group_id: GroupId, course_id: &str, request: EnqueueRequest) -> Result<EnqueueReceipt> {
        let registered_at = self.now();
        let receipt = self.mutate(Documents::Runtime, |state| {
            if state.blacklist.contains(&request.user_id) {
                warn!(user_id = request.user_id, group_id = group_id, "Blacklisted user tried to register");
                return Err(QueueBuddyError::Blacklisted);
            }
            require_group(state, group_id)?;

            if !state.is_open(group_id, course_id) {
                let course_name = state
                    .course(group_id, course_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| course_id.to_string());
                return Err(QueueBuddyError::RegistrationClosed { course_name });
            }
            let course_name = require_course(state, group_id, course_id)?.name.clone();

            let full_name = request.full_name.trim();
            if full_name.is_empty() {
                return Err(QueueBuddyError::InvalidInput("Name cannot be empty".to_string()));
            }

            let wanted = full_name.to_lowercase();
            if let Some(existing) = state
                .queue(group_id, course_id)
                .iter()
                .find(|entry| entry.full_name.to_lowercase() == wanted)
            {
                return Err(QueueBuddyError::DuplicateName {
                    full_name: full_name.to_string(),
                    course_name,
                    registered_by: existing.registered_by(),
                });
            }

            let capacity = state.capacity(group_id);
            let queue = state.queue_mut(group_id, course_id);
            if queue.len() >= capacity {
                return Err(QueueBuddyError::QueueFull { capacity });
            }

            let position = queue.len() + 1;
            queue.push(QueueEntry {
                user_id: request.user_id,
                username: request.username.clone(),
                full_name: full_name.to_string(),
                registered_at,
                position,
            });

            Ok(EnqueueReceipt {
                course_name,
                full_name: full_name.to_string(),
                position,
            })
        })?;

        log_queue_action(group_id, course_id, Some(request.user_id), "enqueue", Some(receipt.position));
        Ok(receipt)
    }

    /// Remove the `index`-th (0-based) entry among those submitted by `user_id`
    pub fn remove_entry(&self, group_id: GroupId, course_id: &str, user_id: UserId, index: usize) -> Result<RemovedEntry> {
        let removed = self.mutate(Documents::Runtime, |state| {
            let course_name = require_course(state, group_id, course_id)?.name.clone();

            let target = state
                .queue(group_id, course_id)
                .iter()
                .filter(|entry| entry.user_id == user_id)
                .nth(index)
                .cloned()
                .ok_or(QueueBuddyError::EntryNotFound { user_id, index })?;

            let queue = state.queue_mut(group_id, course_id);
            queue.retain(|entry| !entry.same_registration(&target));
            StoreState::renumber(queue);
            let remaining_for_user = queue.iter().filter(|entry| entry.user_id == user_id).count();

            Ok(RemovedEntry {
                course_name,
                entry: target,
                remaining_for_user,
            })
        })?;

        log_queue_action(group_id, course_id, Some(user_id), "remove", Some(removed.entry.position));
        Ok(removed)
    }

    /// Exchange the entries at two 1-based positions
    pub fn swap_positions(&self, group_id: GroupId, course_id: &str, first: usize, second: usize) -> Result<SwapOutcome> {
        let outcome = self.mutate(Documents::Runtime, |state| {
            let course_name = require_course(state, group_id, course_id)?.name.clone();
            let queue = state.queue_mut(group_id, course_id);
            let len = queue.len();

            for position in [first, second] {
                if position == 0 || position > len {
                    return Err(QueueBuddyError::InvalidPosition { position, len });
                }
            }
            if first == second {
                return Err(QueueBuddyError::SamePosition(first));
            }

            queue.swap(first - 1, second - 1);
            queue[first - 1].position = first;
            queue[second - 1].position = second;

            Ok(SwapOutcome {
                course_name,
                first: SlotChange { position: first, full_name: queue[first - 1].full_name.clone() },
                second: SlotChange { position: second, full_name: queue[second - 1].full_name.clone() },
                queue: queue.clone(),
            })
        })?;

        info!(
            group_id = group_id,
            course_id = course_id,
            first = first,
            second = second,
            "Swapped queue positions"
        );
        Ok(outcome)
    }

    /// Empty one course queue. Returns how many entries were dropped.
    pub fn clear_queue(&self, group_id: GroupId, course_id: &str) -> Result<usize> {
        let cleared = self.mutate(Documents::Runtime, |state| {
            require_course(state, group_id, course_id)?;
            let queue = state.queue_mut(group_id, course_id);
            let cleared = queue.len();
            queue.clear();
            Ok(cleared)
        })?;

        log_queue_action(group_id, course_id, None, "clear", None);
        Ok(cleared)
    }

    /// Empty every queue of a group. Returns how many entries were dropped.
    pub fn clear_all_queues(&self, group_id: GroupId) -> Result<usize> {
        let cleared = self.mutate(Documents::Runtime, |state| {
            require_group(state, group_id)?;
            let queues = state.group_queues_mut(group_id);
            let mut cleared = 0;
            for queue in queues.values_mut() {
                cleared += queue.len();
                queue.clear();
            }
            Ok(cleared)
        })?;

        info!(group_id = group_id, entries = cleared, "Cleared all queues of group");
        Ok(cleared)
    }

    pub fn queue_snapshot(&self, group_id: GroupId, course_id: &str) -> Result<QueueSnapshot> {
        let state = self.lock()?;
        let course = require_course(&state, group_id, course_id)?;

        Ok(QueueSnapshot {
            course_id: course.id.clone(),
            course_name: course.name.clone(),
            is_open: state.is_open(group_id, course_id),
            capacity: state.capacity(group_id),
            entries: state.queue(group_id, course_id).to_vec(),
        })
    }

    /// Listing of a queue as shown in chat
    pub fn format_queue_status(&self, group_id: GroupId, course_id: &str) -> Result<String> {
        Ok(self.queue_snapshot(group_id, course_id)?.render())
    }

    /// Registration counts and status of every course in a group
    pub fn group_summary(&self, group_id: GroupId) -> Result<Vec<CourseSummary>> {
        let state = self.lock()?;
        require_group(&state, group_id)?;

        Ok(state
            .group_courses(group_id)
            .map(|course| CourseSummary {
                course_id: course.id.clone(),
                course_name: course.name.clone(),
                registered: state.queue(group_id, &course.id).len(),
                is_open: state.is_open(group_id, &course.id),
            })
            .collect())
    }

    /// Entries submitted by `user_id`, in queue order. `remove_entry`
    /// indexes into this list.
    pub fn user_entries(&self, group_id: GroupId, course_id: &str, user_id: UserId) -> Result<Vec<QueueEntry>> {
        let state = self.lock()?;
        Ok(state
            .queue(group_id, course_id)
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect())
    }

    /// Entries submitted by `user_id` across every course of a group
    pub fn user_registrations(&self, group_id: GroupId, user_id: UserId) -> Result<Vec<(String, QueueEntry)>> {
        let state = self.lock()?;
        let mut registrations = Vec::new();
        for course in state.group_courses(group_id) {
            for entry in state.queue(group_id, &course.id).iter().filter(|e| e.user_id == user_id) {
                registrations.push((course.name.clone(), entry.clone()));
            }
        }
        Ok(registrations)
    }
}
