//! Storage module
//!
//! This module handles the persisted documents: their shapes, atomic
//! writes, and migration of legacy layouts

pub mod codec;
pub mod documents;
pub mod migration;

// Re-export commonly used storage components
pub use codec::{PersistenceCodec, LoadedConfig, write_atomic, validate_json, find_duplicate_queue_size_keys};
pub use documents::{ConfigDocument, RuntimeDocument, RuntimeDocumentVersion, RawConfigDocument, RUNTIME_FORMAT_VERSION};
pub use migration::{LegacyMigrator, ConfigMigration, RuntimeMigration};
