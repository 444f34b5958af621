//! Group model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, FixedOffset};

/// Chat identifier of a group. Supergroups use negative identifiers.
pub type GroupId = i64;

/// Telegram user identifier
pub type UserId = i64;

/// Fallback group used when migrating single-group documents
pub const LEGACY_GROUP_ID: GroupId = -1001234567890;

/// Display name given to the migrated single group
pub const LEGACY_GROUP_NAME: &str = "Default Group";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub created_at: DateTime<FixedOffset>,
}

impl GroupInfo {
    pub fn new(name: impl Into<String>, created_at: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            created_at,
        }
    }

    /// Name shown for groups that never reported a title
    pub fn fallback_name(group_id: GroupId) -> String {
        format!("Group {}", group_id)
    }
}
