//! Legacy document migration
//!
//! Rewrites single-group documents into the multi-group layout. Every
//! function here is pure and idempotent: feeding a migrated document back in
//! yields the same document and reports no migration.

use std::collections::BTreeMap;
use chrono::FixedOffset;
use tracing::{info, warn};

use crate::models::{Schedule, LEGACY_GROUP_ID, LEGACY_GROUP_NAME, GroupInfo};
use crate::utils::helpers::{normalize_course_id, now_in};
use super::documents::{
    ConfigDocument, CourseConfig, CourseDocument, GroupDocument, LegacyRuntimeDocument,
    RawConfigDocument, RawGroupDocument, RuntimeDocument, RuntimeDocumentVersion,
};

/// Outcome of normalizing a configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMigration {
    pub document: ConfigDocument,
    /// A pre-multigroup layout was converted
    pub migrated: bool,
    /// The on-disk shape differs from what will be written back
    pub needs_rewrite: bool,
}

/// Outcome of normalizing a runtime document
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeMigration {
    pub document: RuntimeDocument,
    pub migrated: bool,
}

#[derive(Debug, Clone)]
pub struct LegacyMigrator {
    offset: FixedOffset,
    default_capacity: usize,
}

impl LegacyMigrator {
    pub fn new(offset: FixedOffset, default_capacity: usize) -> Self {
        Self { offset, default_capacity }
    }

    /// Normalize any configuration layout into the current one
    pub fn migrate_config(&self, raw: RawConfigDocument) -> ConfigMigration {
        let mut needs_rewrite = raw.max_queue_size.is_none();
        let mut migrated = false;

        let raw_groups = match (raw.groups, raw.courses) {
            (Some(groups), legacy_courses) if !groups.is_empty() || legacy_courses.is_none() => {
                if legacy_courses.is_some() {
                    needs_rewrite = true;
                }
                groups
            }
            (_, Some(courses)) => {
                info!(courses = courses.len(), "Migrating single-group config to group-aware format");
                migrated = true;
                let mut groups = BTreeMap::new();
                groups.insert(
                    LEGACY_GROUP_ID.to_string(),
                    RawGroupDocument {
                        name: Some(LEGACY_GROUP_NAME.to_string()),
                        created_at: None,
                        courses,
                    },
                );
                groups
            }
            (_, None) => BTreeMap::new(),
        };

        let mut groups = BTreeMap::new();
        for (group_key, raw_group) in raw_groups {
            let (group, changed) = self.normalize_group(&group_key, raw_group);
            needs_rewrite |= changed;
            groups.insert(group_key, group);
        }

        let document = ConfigDocument {
            groups,
            dev_users: raw.dev_users,
            group_admins: raw.group_admins,
            max_queue_size: raw.max_queue_size.unwrap_or(self.default_capacity),
            group_queue_sizes: raw.group_queue_sizes,
            blacklist: raw.blacklist,
        };

        ConfigMigration {
            document,
            migrated,
            needs_rewrite: needs_rewrite || migrated,
        }
    }

    fn normalize_group(&self, group_key: &str, raw: RawGroupDocument) -> (GroupDocument, bool) {
        let mut changed = false;

        let name = match raw.name {
            Some(name) => name,
            None => {
                changed = true;
                GroupInfo::fallback_name(group_key.parse().unwrap_or_default())
            }
        };
        let created_at = match raw.created_at {
            Some(created_at) => created_at,
            None => {
                changed = true;
                now_in(&self.offset).to_rfc3339()
            }
        };

        let mut courses = BTreeMap::new();
        for (raw_id, config) in raw.courses {
            let Some(course_id) = normalize_course_id(&raw_id) else {
                warn!(group = group_key, "Dropping course with empty ID");
                changed = true;
                continue;
            };
            if course_id != raw_id {
                changed = true;
            }
            if courses.contains_key(&course_id) {
                warn!(group = group_key, course_id = %course_id, "Dropping course whose ID collides after lowercasing");
                changed = true;
                continue;
            }

            let (course, course_changed) = normalize_course(&course_id, config);
            changed |= course_changed;
            courses.insert(course_id, course);
        }

        (GroupDocument { name, created_at, courses }, changed)
    }

    /// Normalize the runtime document, converting a legacy snapshot onto the
    /// single group of `config`
    pub fn migrate_runtime(&self, version: RuntimeDocumentVersion, config: &ConfigDocument) -> RuntimeMigration {
        match version {
            RuntimeDocumentVersion::Current(document) => RuntimeMigration { document, migrated: false },
            RuntimeDocumentVersion::Legacy(legacy) => RuntimeMigration {
                document: self.convert_legacy_runtime(legacy, config),
                migrated: true,
            },
        }
    }

    fn convert_legacy_runtime(&self, legacy: LegacyRuntimeDocument, config: &ConfigDocument) -> RuntimeDocument {
        info!("Migrating legacy queue data to group-aware format");

        let mut document = RuntimeDocument {
            last_updated: now_in(&self.offset).to_rfc3339(),
            ..RuntimeDocument::default()
        };

        let legacy_key = LEGACY_GROUP_ID.to_string();
        let target = if config.groups.contains_key(&legacy_key) {
            Some(legacy_key)
        } else {
            config.groups.keys().next().cloned()
        };
        let Some(group_key) = target else {
            warn!("Legacy queue data found but no group to migrate it into; discarding");
            return document;
        };
        let Some(group) = config.groups.get(&group_key) else {
            return document;
        };

        let mut queues = BTreeMap::new();
        for (course_id, queue) in legacy.queues {
            match normalize_course_id(&course_id) {
                Some(id) if group.courses.contains_key(&id) => {
                    queues.insert(id, queue);
                }
                _ => warn!(course_id = %course_id, "Discarding legacy queue for unknown course"),
            }
        }

        let mut statuses = BTreeMap::new();
        for (course_id, open) in &legacy.course_registration_status {
            if let Some(id) = normalize_course_id(course_id).filter(|id| group.courses.contains_key(id)) {
                statuses.insert(id, *open);
            }
        }
        if legacy.course_registration_status.is_empty() {
            if let Some(open) = legacy.registration_open {
                for course_id in group.courses.keys() {
                    statuses.insert(course_id.clone(), open);
                }
            }
        }

        document.group_queues.insert(group_key.clone(), queues);
        document.group_registration_status.insert(group_key, statuses);
        document
    }
}

/// Collapse a course entry of any shape into the current one
pub fn normalize_course(course_id: &str, config: CourseConfig) -> (CourseDocument, bool) {
    match config {
        CourseConfig::V1(name) => (CourseDocument { name, schedule: Schedule::default() }, true),
        CourseConfig::V2 { name, schedule } => {
            let mut changed = name.is_none() || schedule.is_none();
            let schedule = match schedule {
                Some(schedule) if schedule.is_valid() => schedule,
                Some(schedule) => {
                    warn!(course_id = course_id, day = schedule.day, time = %schedule.time, "Invalid schedule, using default");
                    changed = true;
                    Schedule::default()
                }
                None => Schedule::default(),
            };
            let name = name.unwrap_or_else(|| course_id.to_string());
            (CourseDocument { name, schedule }, changed)
        }
        CourseConfig::Other(value) => {
            warn!(course_id = course_id, "Unrecognised course entry, keeping its name only");
            let name = value
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                });
            (CourseDocument { name, schedule: Schedule::default() }, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn migrator() -> LegacyMigrator {
        LegacyMigrator::new(FixedOffset::east_opt(3 * 3600).unwrap(), 50)
    }

    fn raw(value: serde_json::Value) -> RawConfigDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_single_group_config_is_wrapped() {
        let result = migrator().migrate_config(raw(json!({
            "courses": {"oop_lab": "ООП Лаб", "Math": {"name": "Math", "schedule": {"day": 1, "time": "09:00"}}}
        })));

        assert!(result.migrated);
        let group = &result.document.groups[&LEGACY_GROUP_ID.to_string()];
        assert_eq!(group.name, LEGACY_GROUP_NAME);
        assert_eq!(group.courses["oop_lab"].schedule, Schedule::default());
        assert_eq!(group.courses["math"].schedule, Schedule::new(1, "09:00"));
        assert_eq!(result.document.max_queue_size, 50);
    }

    #[test]
    fn test_config_migration_is_idempotent() {
        let m = migrator();
        let first = m.migrate_config(raw(json!({"courses": {"a": "A"}, "blacklist": [5]})));
        let bytes = serde_json::to_vec(&first.document).unwrap();

        let second = m.migrate_config(serde_json::from_slice(&bytes).unwrap());
        assert_eq!(second.document, first.document);
        assert!(!second.migrated);
        assert!(!second.needs_rewrite);
    }

    #[test]
    fn test_invalid_schedule_falls_back_to_default() {
        let (course, changed) = normalize_course(
            "x",
            CourseConfig::V2 { name: None, schedule: Some(Schedule::new(9, "99:99")) },
        );
        assert!(changed);
        assert_eq!(course.name, "x");
        assert_eq!(course.schedule, Schedule::default());
    }

    #[test]
    fn test_legacy_runtime_maps_onto_single_group() {
        let m = migrator();
        let config = m.migrate_config(raw(json!({"courses": {"math": "Math", "phys": "Physics"}}))).document;
        let legacy = RuntimeDocumentVersion::from_value(json!({
            "queues": {"math": [{
                "user_id": 1, "username": "a", "full_name": "Alice",
                "registered_at": "2024-09-04T20:00:01+03:00", "position": 1
            }], "gone": []},
            "registration_open": true
        }))
        .unwrap();

        let result = m.migrate_runtime(legacy, &config);
        assert!(result.migrated);
        let key = LEGACY_GROUP_ID.to_string();
        assert_eq!(result.document.group_queues[&key]["math"].len(), 1);
        assert!(!result.document.group_queues[&key].contains_key("gone"));
        assert_eq!(result.document.group_registration_status[&key]["phys"], true);
    }

    #[test]
    fn test_runtime_migration_is_idempotent() {
        let m = migrator();
        let config = m.migrate_config(raw(json!({"courses": {"math": "Math"}}))).document;
        let legacy = RuntimeDocumentVersion::from_value(json!({"course_registration_status": {"math": true}})).unwrap();

        let first = m.migrate_runtime(legacy, &config);
        let reparsed = RuntimeDocumentVersion::from_value(serde_json::to_value(&first.document).unwrap()).unwrap();
        let second = m.migrate_runtime(reparsed, &config);

        assert!(!second.migrated);
        assert_eq!(second.document, first.document);
    }
}
