//! Entity store fixture backed by a temporary directory

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use QueueBuddy::config::Settings;
use QueueBuddy::store::{EntityStore, LoadReport, StoreOptions};

use super::recording_scheduler::RecordingScheduler;

/// Store plus the files and triggers behind it
pub struct TestStore {
    pub store: EntityStore,
    pub triggers: Arc<RecordingScheduler>,
    pub report: LoadReport,
    pub options: StoreOptions,
    pub temp_dir: TempDir,
}

impl TestStore {
    /// Empty store with default settings
    pub fn new() -> Self {
        Self::with_documents(None, None)
    }

    /// Store opened over the given documents
    pub fn with_documents(config: Option<&Value>, runtime: Option<&Value>) -> Self {
        Self::with_options(config, runtime, |_| {})
    }

    /// Store opened over the given documents with adjusted options
    pub fn with_options(
        config: Option<&Value>,
        runtime: Option<&Value>,
        adjust: impl FnOnce(&mut StoreOptions),
    ) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let temp_dir = tempfile::tempdir().unwrap();
        let mut options = StoreOptions::from_settings(&Settings::default()).unwrap();
        options.config_path = temp_dir.path().join("config.json").display().to_string();
        options.data_path = temp_dir.path().join("queue_data.json").display().to_string();
        adjust(&mut options);

        if let Some(config) = config {
            fs::write(&options.config_path, serde_json::to_vec_pretty(config).unwrap()).unwrap();
        }
        if let Some(runtime) = runtime {
            fs::write(&options.data_path, serde_json::to_vec_pretty(runtime).unwrap()).unwrap();
        }

        let triggers = Arc::new(RecordingScheduler::new());
        let (store, report) = EntityStore::open(options.clone(), triggers.clone()).unwrap();

        Self {
            store,
            triggers,
            report,
            options,
            temp_dir,
        }
    }

    /// Drop the store and open a fresh one over the same files
    pub fn reopen(self) -> Self {
        let TestStore { store, options, temp_dir, .. } = self;
        drop(store);

        let triggers = Arc::new(RecordingScheduler::new());
        let (store, report) = EntityStore::open(options.clone(), triggers.clone()).unwrap();
        Self {
            store,
            triggers,
            report,
            options,
            temp_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(&self.options.config_path)
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.options.data_path)
    }

    pub fn read_config(&self) -> Value {
        serde_json::from_slice(&fs::read(self.config_path()).unwrap()).unwrap()
    }

    pub fn read_runtime(&self) -> Value {
        serde_json::from_slice(&fs::read(self.data_path()).unwrap()).unwrap()
    }

    /// Replace the runtime document with a directory so writes to it fail
    pub fn break_runtime_document(&self) {
        let path = self.data_path();
        let _ = fs::remove_file(&path);
        fs::create_dir(&path).unwrap();
    }

    /// Replace the configuration document with a directory so writes to it fail
    pub fn break_config_document(&self) {
        let path = self.config_path();
        let _ = fs::remove_file(&path);
        fs::create_dir(&path).unwrap();
    }

    /// Group with one course, optional capacity override, registration open
    pub fn group_with_course(&self, group_id: i64, course_id: &str, name: &str, capacity: Option<i64>) {
        self.store.initialize_group(group_id, Some("Test group")).unwrap();
        self.store.add_course(group_id, course_id, name, 2, "20:00").unwrap();
        if let Some(capacity) = capacity {
            self.store.set_queue_capacity(group_id, capacity).unwrap();
        }
        self.store.open_registration(group_id, course_id).unwrap();
    }
}
