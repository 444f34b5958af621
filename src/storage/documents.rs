//! Persisted document shapes
//!
//! Two JSON documents are kept on disk: the configuration document (groups,
//! courses, access lists, capacities) and the runtime document (queues,
//! registration flags, user associations). The `Raw*` types accept every
//! historical shape; the plain types are what gets written back.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::models::{QueueEntry, Schedule};

/// Version tag written into every current runtime document
pub const RUNTIME_FORMAT_VERSION: &str = "2.0";

/// Capacity used when a document carries no `max_queue_size`
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;

/// Configuration document as written by the current format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub groups: BTreeMap<String, GroupDocument>,
    pub dev_users: Vec<i64>,
    pub group_admins: BTreeMap<String, Vec<i64>>,
    pub max_queue_size: usize,
    pub group_queue_sizes: BTreeMap<String, i64>,
    pub blacklist: Vec<i64>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
            dev_users: Vec::new(),
            group_admins: BTreeMap::new(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            group_queue_sizes: BTreeMap::new(),
            blacklist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    pub name: String,
    pub created_at: String,
    pub courses: BTreeMap<String, CourseDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDocument {
    pub name: String,
    pub schedule: Schedule,
}

/// Configuration document as found on disk, any version
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigDocument {
    #[serde(default)]
    pub groups: Option<BTreeMap<String, RawGroupDocument>>,
    /// Single-group layout used before groups existed
    #[serde(default)]
    pub courses: Option<BTreeMap<String, CourseConfig>>,
    #[serde(default)]
    pub dev_users: Vec<i64>,
    #[serde(default)]
    pub group_admins: BTreeMap<String, Vec<i64>>,
    #[serde(default)]
    pub max_queue_size: Option<usize>,
    #[serde(default)]
    pub group_queue_sizes: BTreeMap<String, i64>,
    #[serde(default)]
    pub blacklist: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGroupDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub courses: BTreeMap<String, CourseConfig>,
}

/// Course entry in any of its historical shapes
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CourseConfig {
    /// `"course_id": "Display name"`
    V1(String),
    /// `"course_id": {"name": ..., "schedule": {"day": .., "time": ..}}`
    V2 {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        schedule: Option<Schedule>,
    },
    Other(serde_json::Value),
}

/// Runtime document in the current format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeDocument {
    pub format_version: String,
    #[serde(default)]
    pub group_queues: BTreeMap<String, BTreeMap<String, Vec<QueueEntry>>>,
    #[serde(default)]
    pub group_registration_status: BTreeMap<String, BTreeMap<String, bool>>,
    #[serde(default)]
    pub user_groups: BTreeMap<String, i64>,
    #[serde(default)]
    pub last_updated: String,
}

impl Default for RuntimeDocument {
    fn default() -> Self {
        Self {
            format_version: RUNTIME_FORMAT_VERSION.to_string(),
            group_queues: BTreeMap::new(),
            group_registration_status: BTreeMap::new(),
            user_groups: BTreeMap::new(),
            last_updated: String::new(),
        }
    }
}

/// Runtime document written before groups existed
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyRuntimeDocument {
    #[serde(default)]
    pub queues: BTreeMap<String, Vec<QueueEntry>>,
    #[serde(default)]
    pub course_registration_status: BTreeMap<String, bool>,
    #[serde(default)]
    pub registration_open: Option<bool>,
}

/// Runtime document found on disk, discriminated by its version tag
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeDocumentVersion {
    Current(RuntimeDocument),
    Legacy(LegacyRuntimeDocument),
}

impl RuntimeDocumentVersion {
    /// Classify a parsed runtime document by its `format_version`
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let is_current = value
            .get("format_version")
            .and_then(|v| v.as_str())
            .map_or(false, |v| v == RUNTIME_FORMAT_VERSION);

        if is_current {
            Ok(Self::Current(serde_json::from_value(value)?))
        } else {
            Ok(Self::Legacy(serde_json::from_value(value)?))
        }
    }
}
