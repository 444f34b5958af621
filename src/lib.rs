//! QueueBuddy
//!
//! Multi-group course registration queues for study-group chats. The
//! library holds every group's courses, weekly reopening schedules, queues,
//! admins and blacklist, and persists them as two JSON documents. The chat
//! front end calls into [`EntityStore`] and the permission checks it exposes.

#![allow(non_snake_case)]

pub mod config;
pub mod models;
pub mod services;
pub mod storage;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{QueueBuddyError, Result, ErrorKind};

// Re-export main components for easy access
pub use store::{EntityStore, StoreOptions, LoadReport};
pub use services::{PermissionResolver, ReopenTriggers, WeeklyReopenScheduler, ManualTriggers};
pub use storage::{PersistenceCodec, LegacyMigrator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
