//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::helpers::{normalize_course_id, parse_time_of_day, parse_utc_offset};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_storage_config(&settings.storage)?;
    validate_queue_config(&settings.queue)?;
    validate_scheduler_config(&settings.scheduler)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    if config.config_path.trim().is_empty() {
        return Err(QueueBuddyError::Config(
            "Configuration document path is required".to_string()
        ));
    }

    if config.data_path.trim().is_empty() {
        return Err(QueueBuddyError::Config(
            "Runtime document path is required".to_string()
        ));
    }

    if config.config_path == config.data_path {
        return Err(QueueBuddyError::Config(
            "Configuration and runtime documents must use different paths".to_string()
        ));
    }

    Ok(())
}

/// Validate queue defaults and seed courses
fn validate_queue_config(config: &super::QueueConfig) -> Result<()> {
    if config.default_capacity == 0 {
        return Err(QueueBuddyError::Config(
            "Default queue capacity must be greater than 0".to_string()
        ));
    }

    for seed in &config.seed_courses {
        if normalize_course_id(&seed.id).is_none() {
            return Err(QueueBuddyError::Config(
                "Seed course ID cannot be empty".to_string()
            ));
        }
        if seed.name.trim().is_empty() {
            return Err(QueueBuddyError::Config(
                format!("Seed course '{}' has an empty name", seed.id)
            ));
        }
        if seed.day > 6 {
            return Err(QueueBuddyError::Config(
                format!("Seed course '{}' has invalid day {}", seed.id, seed.day)
            ));
        }
        if parse_time_of_day(&seed.time).is_none() {
            return Err(QueueBuddyError::Config(
                format!("Seed course '{}' has invalid time '{}'", seed.id, seed.time)
            ));
        }
    }

    Ok(())
}

/// Validate scheduler configuration
fn validate_scheduler_config(config: &super::SchedulerConfig) -> Result<()> {
    if parse_utc_offset(&config.utc_offset).is_none() {
        return Err(QueueBuddyError::Config(
            format!("Invalid UTC offset: {}. Expected e.g. +03:00", config.utc_offset)
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(QueueBuddyError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(QueueBuddyError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
