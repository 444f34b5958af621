//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod group;
pub mod course;
pub mod queue;

// Re-export commonly used models
pub use group::{GroupId, UserId, GroupInfo, LEGACY_GROUP_ID, LEGACY_GROUP_NAME};
pub use course::{CourseId, Course, CourseAdded, Schedule};
pub use queue::{QueueEntry, EnqueueRequest, EnqueueReceipt, RemovedEntry, SwapOutcome, SlotChange, CourseSummary, QueueSnapshot};
