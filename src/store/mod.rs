//! Entity store
//!
//! Owns all groups, courses, queues, access lists and user associations.
//! The store is a monitor: every operation runs under one lock, and every
//! mutation is applied to a staged copy that only replaces the live state
//! after the affected documents were written successfully.

pub mod access;
pub mod courses;
pub mod queue;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard};
use chrono::{DateTime, FixedOffset};
use tracing::{error, info, warn};

use crate::config::{SeedCourse, Settings};
use crate::models::{Course, GroupId, GroupInfo, QueueEntry};
use crate::services::permissions::PermissionResolver;
use crate::services::scheduler::ReopenTriggers;
use crate::storage::{LegacyMigrator, PersistenceCodec, RuntimeDocument, RuntimeMigration};
use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::helpers::parse_utc_offset;

pub use state::{RepairReport, StoreState};

/// Which documents a mutation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Documents {
    Config,
    Runtime,
    Both,
}

/// Store construction parameters
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub config_path: String,
    pub data_path: String,
    /// Dev users supplied by the deployment
    pub env_dev_users: Vec<i64>,
    pub default_capacity: usize,
    pub seed_courses: Vec<SeedCourse>,
    pub offset: FixedOffset,
}

impl StoreOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let offset = parse_utc_offset(&settings.scheduler.utc_offset).ok_or_else(|| {
            QueueBuddyError::Config(format!("Invalid UTC offset: {}", settings.scheduler.utc_offset))
        })?;

        Ok(Self {
            config_path: settings.storage.config_path.clone(),
            data_path: settings.storage.data_path.clone(),
            env_dev_users: settings.access.dev_user_ids.clone(),
            default_capacity: settings.queue.default_capacity,
            seed_courses: settings.queue.seed_courses.clone(),
            offset,
        })
    }
}

/// What happened while loading the documents
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub migrated_config: bool,
    pub migrated_runtime: bool,
    /// The runtime document could not be read and was replaced
    pub discarded_runtime: bool,
    pub duplicate_queue_size_keys: Vec<String>,
    pub repairs: RepairReport,
    pub rewritten: bool,
}

pub struct EntityStore {
    state: Mutex<StoreState>,
    codec: PersistenceCodec,
    permissions: PermissionResolver,
    triggers: Arc<dyn ReopenTriggers>,
    seed_courses: Vec<SeedCourse>,
    offset: FixedOffset,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("codec", &self.codec)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Load both documents, migrate and repair them, and register a reopen
    /// trigger for every known course
    pub fn open(options: StoreOptions, triggers: Arc<dyn ReopenTriggers>) -> Result<(Self, LoadReport)> {
        let codec = PersistenceCodec::new(&options.config_path, &options.data_path);
        let migrator = LegacyMigrator::new(options.offset, options.default_capacity);

        let loaded = codec.load_config()?;
        let config = migrator.migrate_config(loaded.raw);

        let mut discarded_runtime = false;
        let runtime = match codec.load_runtime() {
            Ok(Some(version)) => migrator.migrate_runtime(version, &config.document),
            Ok(None) => RuntimeMigration { document: RuntimeDocument::default(), migrated: false },
            // Queues and statuses are rebuilt empty from the configured courses
            Err(e @ (QueueBuddyError::Persistence(_) | QueueBuddyError::Serialization(_))) => {
                error!(
                    path = %codec.data_path().display(),
                    error = %e,
                    "Runtime document is unreadable, starting with empty queues"
                );
                discarded_runtime = true;
                RuntimeMigration { document: RuntimeDocument::default(), migrated: false }
            }
            Err(e) => return Err(e),
        };

        let (state, repairs) = StoreState::from_documents(config.document, runtime.document, &options.offset);

        let mut report = LoadReport {
            migrated_config: config.migrated,
            migrated_runtime: runtime.migrated,
            discarded_runtime,
            duplicate_queue_size_keys: loaded.duplicate_queue_size_keys,
            repairs,
            rewritten: false,
        };

        let store = Self {
            state: Mutex::new(state),
            codec,
            permissions: PermissionResolver::new(options.env_dev_users),
            triggers,
            seed_courses: options.seed_courses,
            offset: options.offset,
        };

        {
            let state = store.lock()?;
            let config_dirty = config.needs_rewrite
                || !report.duplicate_queue_size_keys.is_empty()
                || !report.repairs.skipped_keys.is_empty()
                || report.repairs.deduplicated > 0;
            let runtime_dirty = report.migrated_runtime
                || report.discarded_runtime
                || report.repairs.renumbered_queues > 0
                || report.repairs.dropped_orphans > 0
                || report.repairs.merged_queues > 0
                || report.repairs.dropped_duplicate_names > 0;

            if config_dirty && loaded.existed {
                store.codec.save_config(&state.config_document())?;
                report.rewritten = true;
            }
            if runtime_dirty {
                store.codec.save_runtime(&state.runtime_document(&store.offset))?;
                report.rewritten = true;
            }

            for group_id in state.groups.keys() {
                for course in state.group_courses(*group_id) {
                    store.triggers.register(*group_id, &course.id, &course.schedule)?;
                }
            }

            info!(
                groups = state.groups.len(),
                devs = store.permissions.effective_devs(&state).len(),
                admin_groups = state.group_admins.len(),
                blacklisted = state.blacklist.len(),
                migrated_config = report.migrated_config,
                migrated_runtime = report.migrated_runtime,
                discarded_runtime = report.discarded_runtime,
                rewritten = report.rewritten,
                "Entity store loaded"
            );
        }

        Ok((store, report))
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| QueueBuddyError::Persistence("store lock poisoned".to_string()))
    }

    pub(crate) fn persist(&self, state: &StoreState, documents: Documents) -> Result<()> {
        match documents {
            Documents::Config => self.codec.save_config(&state.config_document()),
            Documents::Runtime => self.codec.save_runtime(&state.runtime_document(&self.offset)),
            Documents::Both => {
                self.codec.save_config(&state.config_document())?;
                self.codec.save_runtime(&state.runtime_document(&self.offset))
            }
        }
    }

    /// Run `apply` against a staged copy of the state, persist the copy and
    /// commit it. Nothing changes when `apply` or the write fails.
    pub(crate) fn mutate<T, F>(&self, documents: Documents, apply: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T>,
    {
        let mut live = self.lock()?;
        let mut staged = live.clone();
        let value = apply(&mut staged)?;
        self.commit(&mut live, staged, documents)?;
        Ok(value)
    }

    /// Persist `staged` and make it the live state
    pub(crate) fn commit(&self, live: &mut StoreState, staged: StoreState, documents: Documents) -> Result<()> {
        if let Err(e) = self.persist(&staged, documents) {
            error!(error = %e, documents = ?documents, "Persisting mutation failed, keeping previous state");
            if documents == Documents::Both {
                // The configuration document may already hold the staged state
                if let Err(restore) = self.codec.save_config(&live.config_document()) {
                    warn!(error = %restore, "Could not restore previous configuration document");
                }
            }
            return Err(e);
        }
        *live = staged;
        Ok(())
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    /// Copy of the whole state, taken under the lock
    pub fn snapshot(&self) -> Result<StoreState> {
        Ok(self.lock()?.clone())
    }

    pub fn groups(&self) -> Result<Vec<(GroupId, GroupInfo)>> {
        let state = self.lock()?;
        Ok(state.groups.iter().map(|(id, info)| (*id, info.clone())).collect())
    }

    pub fn group(&self, group_id: GroupId) -> Result<Option<GroupInfo>> {
        Ok(self.lock()?.groups.get(&group_id).cloned())
    }

    pub fn courses(&self, group_id: GroupId) -> Result<Vec<Course>> {
        Ok(self.lock()?.group_courses(group_id).cloned().collect())
    }

    pub fn course(&self, group_id: GroupId, course_id: &str) -> Result<Option<Course>> {
        Ok(self.lock()?.course(group_id, course_id).cloned())
    }

    pub fn queue(&self, group_id: GroupId, course_id: &str) -> Result<Vec<QueueEntry>> {
        Ok(self.lock()?.queue(group_id, course_id).to_vec())
    }

    pub(crate) fn now(&self) -> DateTime<FixedOffset> {
        crate::utils::helpers::now_in(&self.offset)
    }
}

/// Fail with `GroupNotFound` unless the group exists
pub(crate) fn require_group(state: &StoreState, group_id: GroupId) -> Result<&GroupInfo> {
    state.groups.get(&group_id).ok_or(QueueBuddyError::GroupNotFound { group_id })
}

/// Fail with a not-found error unless group and course exist
pub(crate) fn require_course<'a>(state: &'a StoreState, group_id: GroupId, course_id: &str) -> Result<&'a Course> {
    require_group(state, group_id)?;
    state.course(group_id, course_id).ok_or_else(|| QueueBuddyError::CourseNotFound {
        group_id,
        course_id: course_id.to_string(),
    })
}
