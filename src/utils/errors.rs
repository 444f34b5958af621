//! Error handling for QueueBuddy
//!
//! This module defines the error type shared by the store, the persistence
//! codec and the permission layer. Every variant belongs to one of the
//! categories reported by [`QueueBuddyError::kind`].

use thiserror::Error;

/// Main error type for QueueBuddy
#[derive(Error, Debug)]
pub enum QueueBuddyError {
    // Validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Course ID cannot be empty!")]
    InvalidCourseId,

    #[error("Day must be between 0 (Monday) and 6 (Sunday), got {0}")]
    InvalidWeekday(i64),

    #[error("Time must be in HH:MM format (e.g. '18:00'), got '{0}'")]
    InvalidTime(String),

    #[error("Queue size must be greater than 0, got {0}")]
    InvalidCapacity(i64),

    #[error("Positions must be between 1 and {len}, got {position}")]
    InvalidPosition { position: usize, len: usize },

    #[error("Cannot swap position {0} with itself")]
    SamePosition(usize),

    // Precondition errors
    #[error("Sorry an error occured. Try again later.")]
    Blacklisted,

    #[error("Registration for {course_name} is currently closed!")]
    RegistrationClosed { course_name: String },

    #[error("Name '{full_name}' is already registered for {course_name} by {registered_by}!")]
    DuplicateName {
        full_name: String,
        course_name: String,
        registered_by: String,
    },

    #[error("Queue is full! Maximum {capacity} entries allowed.")]
    QueueFull { capacity: usize },

    #[error("Cannot remove course '{course_name}' - it has {count} registered students. Clear the queue first.")]
    CourseHasRegistrants { course_name: String, count: usize },

    #[error("Course '{course_id}' already exists in this group!")]
    CourseAlreadyExists { course_id: String },

    #[error("User {user_id} is already an admin of group {group_id}")]
    AlreadyAdmin { user_id: i64, group_id: i64 },

    #[error("User {0} is already blacklisted.")]
    AlreadyBlacklisted(i64),

    #[error("User {0} is a dev and cannot be blacklisted.")]
    CannotBlacklistDev(i64),

    #[error("Access denied: {0}")]
    PermissionDenied(String),

    // Not-found errors
    #[error("Group not found: {group_id}")]
    GroupNotFound { group_id: i64 },

    #[error("Course '{course_id}' does not exist in group {group_id}")]
    CourseNotFound { group_id: i64, course_id: String },

    #[error("User {user_id} has no registration #{index} for this course")]
    EntryNotFound { user_id: i64, index: usize },

    #[error("User {user_id} is not an admin of group {group_id}")]
    AdminNotFound { user_id: i64, group_id: i64 },

    #[error("User {0} is not in the blacklist.")]
    NotBlacklisted(i64),

    // Persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    // Startup
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for QueueBuddy operations
pub type Result<T> = std::result::Result<T, QueueBuddyError>;

/// Error categories reported back to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Precondition,
    NotFound,
    Persistence,
    Configuration,
}

impl QueueBuddyError {
    /// Category of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueBuddyError::InvalidInput(_)
            | QueueBuddyError::InvalidCourseId
            | QueueBuddyError::InvalidWeekday(_)
            | QueueBuddyError::InvalidTime(_)
            | QueueBuddyError::InvalidCapacity(_)
            | QueueBuddyError::InvalidPosition { .. }
            | QueueBuddyError::SamePosition(_) => ErrorKind::Validation,

            QueueBuddyError::Blacklisted
            | QueueBuddyError::RegistrationClosed { .. }
            | QueueBuddyError::DuplicateName { .. }
            | QueueBuddyError::QueueFull { .. }
            | QueueBuddyError::CourseHasRegistrants { .. }
            | QueueBuddyError::CourseAlreadyExists { .. }
            | QueueBuddyError::AlreadyAdmin { .. }
            | QueueBuddyError::AlreadyBlacklisted(_)
            | QueueBuddyError::CannotBlacklistDev(_)
            | QueueBuddyError::PermissionDenied(_) => ErrorKind::Precondition,

            QueueBuddyError::GroupNotFound { .. }
            | QueueBuddyError::CourseNotFound { .. }
            | QueueBuddyError::EntryNotFound { .. }
            | QueueBuddyError::AdminNotFound { .. }
            | QueueBuddyError::NotBlacklisted(_) => ErrorKind::NotFound,

            QueueBuddyError::Persistence(_)
            | QueueBuddyError::Io(_)
            | QueueBuddyError::Serialization(_)
            | QueueBuddyError::Scheduler(_) => ErrorKind::Persistence,

            QueueBuddyError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Check if the error is recoverable by retrying the same call
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QueueBuddyError::Persistence(_) | QueueBuddyError::Io(_) | QueueBuddyError::Scheduler(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::Validation => ErrorSeverity::Info,
            ErrorKind::Precondition | ErrorKind::NotFound => ErrorSeverity::Warning,
            ErrorKind::Persistence => ErrorSeverity::Error,
            ErrorKind::Configuration => ErrorSeverity::Critical,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
