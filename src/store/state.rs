//! In-memory state of the entity store
//!
//! Plain maps keyed by group and course. The `*_mut` accessors create the
//! child collection on first use so callers never deal with missing levels.

use std::collections::BTreeMap;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use tracing::warn;

use crate::models::{Course, CourseId, GroupId, GroupInfo, QueueEntry, UserId};
use crate::storage::documents::{ConfigDocument, CourseDocument, GroupDocument, RuntimeDocument, RUNTIME_FORMAT_VERSION};
use crate::utils::helpers::{normalize_course_id, now_in};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub groups: BTreeMap<GroupId, GroupInfo>,
    pub courses: BTreeMap<GroupId, BTreeMap<CourseId, Course>>,
    pub registration: BTreeMap<GroupId, BTreeMap<CourseId, bool>>,
    pub queues: BTreeMap<GroupId, BTreeMap<CourseId, Vec<QueueEntry>>>,
    pub group_admins: BTreeMap<GroupId, Vec<UserId>>,
    /// Dev list of the configuration document. Only consulted when the
    /// deployment supplies no dev users of its own.
    pub file_dev_users: Vec<UserId>,
    pub blacklist: Vec<UserId>,
    pub max_queue_size: usize,
    pub queue_sizes: BTreeMap<GroupId, usize>,
    pub user_groups: BTreeMap<UserId, GroupId>,
}

/// Problems fixed while building state from documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairReport {
    pub skipped_keys: Vec<String>,
    pub renumbered_queues: usize,
    pub dropped_orphans: usize,
    pub deduplicated: usize,
    /// Runtime course keys folded into their normalized form
    pub merged_queues: usize,
    pub dropped_duplicate_names: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.skipped_keys.is_empty()
            && self.renumbered_queues == 0
            && self.dropped_orphans == 0
            && self.deduplicated == 0
            && self.merged_queues == 0
            && self.dropped_duplicate_names == 0
    }
}

impl StoreState {
    pub fn has_group(&self, group_id: GroupId) -> bool {
        self.groups.contains_key(&group_id)
    }

    pub fn course(&self, group_id: GroupId, course_id: &str) -> Option<&Course> {
        self.courses.get(&group_id).and_then(|courses| courses.get(course_id))
    }

    /// Courses of a group, empty for unknown groups
    pub fn group_courses(&self, group_id: GroupId) -> impl Iterator<Item = &Course> {
        self.courses.get(&group_id).into_iter().flat_map(|courses| courses.values())
    }

    pub fn courses_mut(&mut self, group_id: GroupId) -> &mut BTreeMap<CourseId, Course> {
        self.courses.entry(group_id).or_default()
    }

    /// Queue of a course, empty when none was ever created
    pub fn queue(&self, group_id: GroupId, course_id: &str) -> &[QueueEntry] {
        self.queues
            .get(&group_id)
            .and_then(|queues| queues.get(course_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn queue_mut(&mut self, group_id: GroupId, course_id: &str) -> &mut Vec<QueueEntry> {
        self.queues
            .entry(group_id)
            .or_default()
            .entry(course_id.to_string())
            .or_default()
    }

    pub fn group_queues_mut(&mut self, group_id: GroupId) -> &mut BTreeMap<CourseId, Vec<QueueEntry>> {
        self.queues.entry(group_id).or_default()
    }

    pub fn is_open(&self, group_id: GroupId, course_id: &str) -> bool {
        self.registration
            .get(&group_id)
            .and_then(|statuses| statuses.get(course_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn registration_mut(&mut self, group_id: GroupId) -> &mut BTreeMap<CourseId, bool> {
        self.registration.entry(group_id).or_default()
    }

    pub fn admins(&self, group_id: GroupId) -> &[UserId] {
        self.group_admins.get(&group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn admins_mut(&mut self, group_id: GroupId) -> &mut Vec<UserId> {
        self.group_admins.entry(group_id).or_default()
    }

    pub fn capacity(&self, group_id: GroupId) -> usize {
        self.queue_sizes.get(&group_id).copied().unwrap_or(self.max_queue_size)
    }

    /// Rewrite every position of a queue to its index + 1
    pub fn renumber(queue: &mut [QueueEntry]) -> bool {
        let mut changed = false;
        for (index, entry) in queue.iter_mut().enumerate() {
            if entry.position != index + 1 {
                entry.position = index + 1;
                changed = true;
            }
        }
        changed
    }

    /// Build state from normalized documents, skipping keys that do not
    /// parse and restoring every structural invariant
    pub fn from_documents(
        config: ConfigDocument,
        runtime: RuntimeDocument,
        offset: &FixedOffset,
    ) -> (StoreState, RepairReport) {
        let mut report = RepairReport::default();
        let mut state = StoreState {
            max_queue_size: config.max_queue_size,
            file_dev_users: dedup(config.dev_users, &mut report),
            blacklist: dedup(config.blacklist, &mut report),
            ..StoreState::default()
        };

        for (key, group) in config.groups {
            let Some(group_id) = parse_key(&key, "groups", &mut report) else { continue };

            let created_at = parse_created_at(&group.created_at, offset);
            state.groups.insert(group_id, GroupInfo::new(group.name, created_at));

            let courses = state.courses_mut(group_id);
            for (course_id, course) in group.courses {
                courses.insert(
                    course_id.clone(),
                    Course { id: course_id, name: course.name, schedule: course.schedule },
                );
            }
        }

        for (key, admins) in config.group_admins {
            let Some(group_id) = parse_key(&key, "group_admins", &mut report) else { continue };
            let admins = dedup(admins, &mut report);
            state.admins_mut(group_id).extend(admins);
        }

        for (key, size) in config.group_queue_sizes {
            let Some(group_id) = parse_key(&key, "group_queue_sizes", &mut report) else { continue };
            if size <= 0 {
                warn!(group_id = group_id, size = size, "Ignoring non-positive queue size");
                report.skipped_keys.push(format!("group_queue_sizes.{}", key));
                continue;
            }
            state.queue_sizes.insert(group_id, size as usize);
        }

        for (key, queues) in runtime.group_queues {
            let Some(group_id) = parse_key(&key, "group_queues", &mut report) else { continue };
            for (raw_course, mut queue) in queues {
                let known = normalize_course_id(&raw_course)
                    .filter(|course_id| state.course(group_id, course_id).is_some());
                let Some(course_id) = known else {
                    if !queue.is_empty() {
                        warn!(group_id = group_id, course_id = %raw_course, entries = queue.len(), "Dropping queue of unknown course");
                    }
                    report.dropped_orphans += 1;
                    continue;
                };
                if raw_course != course_id {
                    report.merged_queues += 1;
                }
                state.queue_mut(group_id, &course_id).append(&mut queue);
            }
        }

        // Keys that only differ in case were merged above, so names and
        // positions are checked on the final queues
        for (group_id, queues) in state.queues.iter_mut() {
            for (course_id, queue) in queues.iter_mut() {
                let dropped = drop_duplicate_names(queue);
                if dropped > 0 {
                    warn!(group_id = *group_id, course_id = %course_id, dropped = dropped, "Dropped entries with duplicate names");
                    report.dropped_duplicate_names += dropped;
                }
                if Self::renumber(queue) {
                    warn!(group_id = *group_id, course_id = %course_id, "Queue positions drifted, renumbered");
                    report.renumbered_queues += 1;
                }
            }
        }

        for (key, statuses) in runtime.group_registration_status {
            let Some(group_id) = parse_key(&key, "group_registration_status", &mut report) else { continue };
            for (raw_course, open) in statuses {
                match normalize_course_id(&raw_course).filter(|id| state.course(group_id, id).is_some()) {
                    Some(course_id) => {
                        if raw_course != course_id {
                            report.merged_queues += 1;
                        }
                        state.registration_mut(group_id).insert(course_id, open);
                    }
                    None => report.dropped_orphans += 1,
                }
            }
        }

        for (key, group_id) in runtime.user_groups {
            let Some(user_id) = parse_key(&key, "user_groups", &mut report) else { continue };
            state.user_groups.insert(user_id, group_id);
        }

        // Every course gets a status and a queue, closed and empty by default
        let course_keys: Vec<(GroupId, CourseId)> = state
            .courses
            .iter()
            .flat_map(|(group_id, courses)| courses.keys().map(move |id| (*group_id, id.clone())))
            .collect();
        for (group_id, course_id) in course_keys {
            state.registration_mut(group_id).entry(course_id.clone()).or_insert(false);
            state.queue_mut(group_id, &course_id);
        }

        (state, report)
    }

    /// Configuration document describing this state
    pub fn config_document(&self) -> ConfigDocument {
        let groups = self
            .groups
            .iter()
            .map(|(group_id, info)| {
                let courses = self
                    .group_courses(*group_id)
                    .map(|course| {
                        (
                            course.id.clone(),
                            CourseDocument { name: course.name.clone(), schedule: course.schedule.clone() },
                        )
                    })
                    .collect();
                let document = GroupDocument {
                    name: info.name.clone(),
                    created_at: info.created_at.to_rfc3339(),
                    courses,
                };
                (group_id.to_string(), document)
            })
            .collect();

        ConfigDocument {
            groups,
            dev_users: self.file_dev_users.clone(),
            group_admins: self
                .group_admins
                .iter()
                .map(|(group_id, admins)| (group_id.to_string(), admins.clone()))
                .collect(),
            max_queue_size: self.max_queue_size,
            group_queue_sizes: self
                .queue_sizes
                .iter()
                .map(|(group_id, size)| (group_id.to_string(), *size as i64))
                .collect(),
            blacklist: self.blacklist.clone(),
        }
    }

    /// Runtime document describing this state
    pub fn runtime_document(&self, offset: &FixedOffset) -> RuntimeDocument {
        RuntimeDocument {
            format_version: RUNTIME_FORMAT_VERSION.to_string(),
            group_queues: self
                .queues
                .iter()
                .map(|(group_id, queues)| (group_id.to_string(), queues.clone()))
                .collect(),
            group_registration_status: self
                .registration
                .iter()
                .map(|(group_id, statuses)| (group_id.to_string(), statuses.clone()))
                .collect(),
            user_groups: self
                .user_groups
                .iter()
                .map(|(user_id, group_id)| (user_id.to_string(), *group_id))
                .collect(),
            last_updated: now_in(offset).to_rfc3339(),
        }
    }
}

fn parse_key(key: &str, section: &str, report: &mut RepairReport) -> Option<i64> {
    match key.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(section = section, key = key, "Skipping invalid identifier key");
            report.skipped_keys.push(format!("{}.{}", section, key));
            None
        }
    }
}

fn dedup(ids: Vec<i64>, report: &mut RepairReport) -> Vec<i64> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if unique.contains(&id) {
            report.deduplicated += 1;
        } else {
            unique.push(id);
        }
    }
    unique
}

/// Keep the first entry of every case-insensitive full name. Returns how
/// many entries were removed.
fn drop_duplicate_names(queue: &mut Vec<QueueEntry>) -> usize {
    let before = queue.len();
    let mut seen = std::collections::HashSet::new();
    queue.retain(|entry| seen.insert(entry.full_name.trim().to_lowercase()));
    before - queue.len()
}

/// Accept RFC 3339 and the offset-less ISO timestamps older documents carry
fn parse_created_at(raw: &str, offset: &FixedOffset) -> DateTime<FixedOffset> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        if let Some(timestamp) = offset.from_local_datetime(&naive).single() {
            return timestamp;
        }
    }
    warn!(created_at = raw, "Unparseable group creation time, using now");
    now_in(offset)
}
