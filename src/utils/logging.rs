//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the QueueBuddy application.

use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::{QueueBuddyError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(non_blocking).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking).boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| QueueBuddyError::Config(format!("Failed to install logger: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log queue mutations with structured data
pub fn log_queue_action(group_id: i64, course_id: &str, user_id: Option<i64>, action: &str, position: Option<usize>) {
    info!(
        group_id = group_id,
        course_id = course_id,
        user_id = user_id,
        action = action,
        position = position,
        "Queue action performed"
    );
}

/// Log group lifecycle events
pub fn log_group_event(group_id: i64, event: &str, details: Option<&str>) {
    info!(
        group_id = group_id,
        event = event,
        details = details,
        "Group event occurred"
    );
}

/// Log admin actions
pub fn log_admin_action(target_user: i64, action: &str, group_id: Option<i64>) {
    warn!(
        target_user = target_user,
        action = action,
        group_id = group_id,
        "Admin action performed"
    );
}

/// Log document writes
pub fn log_persistence(document: &str, path: &str, duration_ms: u64, success: bool) {
    if success {
        debug!(
            document = document,
            path = path,
            duration_ms = duration_ms,
            "Document persisted"
        );
    } else {
        error!(
            document = document,
            path = path,
            duration_ms = duration_ms,
            "Document persistence failed"
        );
    }
}
