//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Environment variable holding the externally-sourced dev user IDs
pub const DEV_USER_IDS_ENV: &str = "DEV_USER_IDS";

/// Main application configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageConfig,
    pub access: AccessConfig,
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Locations of the two persisted documents
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub config_path: String,
    pub data_path: String,
}

/// Global access configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Dev users supplied by the deployment. Takes precedence over the
    /// `dev_users` list of the configuration document.
    pub dev_user_ids: Vec<i64>,
    /// Raw `DEV_USER_IDS` value that failed to parse. Logged once logging is
    /// up, since settings load before the subscriber exists.
    #[serde(skip)]
    pub rejected_dev_user_ids: Option<String>,
}

/// Queue defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub default_capacity: usize,
    pub seed_courses: Vec<SeedCourse>,
}

/// Course created for every newly initialized group
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedCourse {
    pub id: String,
    pub name: String,
    pub day: u8,
    pub time: String,
}

/// Weekly reopen scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Offset the weekly slots are expressed in, e.g. `+03:00`
    pub utc_offset: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    pub json: bool,
}

impl Settings {
    /// Load settings from `queuebuddy.toml` and `QUEUEBUDDY__*` environment
    /// variables. `DEV_USER_IDS` replaces the configured dev list when set.
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::new("queuebuddy", config::FileFormat::Toml).required(false))
            .add_source(config::Environment::with_prefix("QUEUEBUDDY").separator("__"))
            .build()?;

        let mut settings: Settings = settings.try_deserialize()?;
        if let Ok(raw) = std::env::var(DEV_USER_IDS_ENV) {
            match parse_dev_user_ids(&raw) {
                Ok(ids) => settings.access.dev_user_ids = ids,
                Err(_) => {
                    settings.access.dev_user_ids = Vec::new();
                    settings.access.rejected_dev_user_ids = Some(raw);
                }
            }
        }

        Ok(settings)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::QueueBuddyError> {
        super::validation::validate_settings(self)
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String, crate::utils::errors::QueueBuddyError> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::utils::errors::QueueBuddyError::Config(e.to_string()))
    }
}

/// Parse a comma-separated list of user IDs. Callers treat a malformed list
/// as empty so that a typo never grants access.
pub fn parse_dev_user_ids(raw: &str) -> Result<Vec<i64>, std::num::ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<i64>)
        .collect()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            config_path: "config.json".to_string(),
            data_path: "queue_data.json".to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        let seed = |id: &str, name: &str| SeedCourse {
            id: id.to_string(),
            name: name.to_string(),
            day: 2,
            time: "20:00".to_string(),
        };

        Self {
            default_capacity: 50,
            seed_courses: vec![
                seed("oop_lab", "ООП Лаб"),
                seed("cvm_lab", "ЦВМ Лаб"),
                seed("discrete", "Дискретка"),
            ],
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            utc_offset: "+03:00".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "queuebuddy.log".to_string(),
            json: false,
        }
    }
}
