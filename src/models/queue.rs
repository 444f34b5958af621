//! Queue models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, FixedOffset};
use super::group::UserId;

/// Maximum number of entries listed by [`QueueSnapshot::render`]
pub const STATUS_LIST_LIMIT: usize = 10;

/// One registration in a course queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// User who submitted the registration
    pub user_id: UserId,
    /// Handle of the submitting user
    pub username: String,
    /// Registrant; may be a third party registered by `user_id`
    pub full_name: String,
    pub registered_at: DateTime<FixedOffset>,
    /// 1-based, always equal to index + 1
    pub position: usize,
}

impl QueueEntry {
    /// Identity used to locate an entry inside the full queue
    pub fn same_registration(&self, other: &QueueEntry) -> bool {
        self.user_id == other.user_id
            && self.full_name == other.full_name
            && self.registered_at == other.registered_at
    }

    /// "@handle", or "User {id}" when the handle is unknown
    pub fn registered_by(&self) -> String {
        if self.username.is_empty() || self.username == "Unknown" {
            format!("User {}", self.user_id)
        } else {
            format!("@{}", self.username)
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
}

impl EnqueueRequest {
    pub fn new(user_id: UserId, username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            full_name: full_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueReceipt {
    pub course_name: String,
    pub full_name: String,
    pub position: usize,
}

impl EnqueueReceipt {
    pub fn message(&self) -> String {
        format!(
            "Successfully registered '{}' for {}! Position: {}",
            self.full_name, self.course_name, self.position
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEntry {
    pub course_name: String,
    pub entry: QueueEntry,
    /// Entries the same user still holds in this queue
    pub remaining_for_user: usize,
}

/// Result of exchanging two queue slots. Each slot keeps its number and
/// reports the registrant that moved into it.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub course_name: String,
    pub first: SlotChange,
    pub second: SlotChange,
    pub queue: Vec<QueueEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotChange {
    pub position: usize,
    pub full_name: String,
}

impl SwapOutcome {
    pub fn message(&self) -> String {
        let mut text = format!("Swap completed - {}\n", self.course_name);
        for slot in [&self.first, &self.second] {
            text.push_str(&format!("Position {}: {}\n", slot.position, slot.full_name));
        }
        text
    }
}

/// Per-course counters for a group overview
#[derive(Debug, Clone, PartialEq)]
pub struct CourseSummary {
    pub course_id: String,
    pub course_name: String,
    pub registered: usize,
    pub is_open: bool,
}

/// Consistent view of one course queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub course_id: String,
    pub course_name: String,
    pub is_open: bool,
    pub capacity: usize,
    pub entries: Vec<QueueEntry>,
}

impl QueueSnapshot {
    /// Listing of the first entries, as shown in chat
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return format!("{}: No registrations yet", self.course_name);
        }

        let mut status = format!("📚 {} ({} registered):\n", self.course_name, self.entries.len());
        for entry in self.entries.iter().take(STATUS_LIST_LIMIT) {
            status.push_str(&format!("{}. {} ({})\n", entry.position, entry.full_name, entry.registered_by()));
        }

        if self.entries.len() > STATUS_LIST_LIMIT {
            status.push_str(&format!("... and {} more", self.entries.len() - STATUS_LIST_LIMIT));
        }

        status
    }
}
