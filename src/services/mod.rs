//! Services module
//!
//! Collaborators of the entity store: permission resolution and weekly
//! registration reopening

pub mod permissions;
pub mod scheduler;

// Re-export commonly used services
pub use permissions::{AccessLevel, PermissionResolver};
pub use scheduler::{
    next_reopen_after, trigger_key, ManualTriggers, ReopenEvent, ReopenTriggers, WeeklyReopenScheduler,
};
