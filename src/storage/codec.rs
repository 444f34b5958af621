//! Document persistence
//!
//! Reads and writes the two JSON documents. Configuration writes go through
//! a temporary file in the target directory that is re-parsed before being
//! renamed over the canonical path, so readers only ever see a complete
//! document. Runtime writes are direct.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::logging::log_persistence;
use super::documents::{ConfigDocument, RawConfigDocument, RuntimeDocument, RuntimeDocumentVersion};

/// JSON persistence for the configuration and runtime documents
#[derive(Debug, Clone)]
pub struct PersistenceCodec {
    config_path: PathBuf,
    data_path: PathBuf,
}

/// Configuration document as read from disk plus load diagnostics
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub raw: RawConfigDocument,
    /// Group keys that appear more than once inside `group_queue_sizes`
    pub duplicate_queue_size_keys: Vec<String>,
    pub existed: bool,
}

impl PersistenceCodec {
    pub fn new(config_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            data_path: data_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Read the configuration document. A missing file is an empty document;
    /// a malformed one is an error.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let bytes = match fs::read(&self.config_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.config_path.display(), "No configuration document found, starting empty");
                return Ok(LoadedConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8_lossy(&bytes);
        let duplicate_queue_size_keys = find_duplicate_queue_size_keys(&text)?;
        if !duplicate_queue_size_keys.is_empty() {
            warn!(
                keys = ?duplicate_queue_size_keys,
                "Duplicate keys detected in group_queue_sizes; the last value wins and the document will be rewritten"
            );
        }

        let raw: RawConfigDocument = serde_json::from_slice(&bytes).map_err(|e| {
            QueueBuddyError::Persistence(format!(
                "Malformed configuration document {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(LoadedConfig {
            raw,
            duplicate_queue_size_keys,
            existed: true,
        })
    }

    /// Read the runtime document, `None` when it does not exist yet
    pub fn load_runtime(&self) -> Result<Option<RuntimeDocumentVersion>> {
        let bytes = match fs::read(&self.data_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            QueueBuddyError::Persistence(format!(
                "Malformed runtime document {}: {}",
                self.data_path.display(),
                e
            ))
        })?;

        Ok(Some(RuntimeDocumentVersion::from_value(value)?))
    }

    /// Atomically replace the configuration document
    pub fn save_config(&self, document: &ConfigDocument) -> Result<()> {
        let started = Instant::now();
        let result = serde_json::to_vec_pretty(document)
            .map_err(QueueBuddyError::from)
            .and_then(|bytes| write_atomic(&self.config_path, &bytes, validate_json));

        log_persistence(
            "config",
            &self.config_path.display().to_string(),
            started.elapsed().as_millis() as u64,
            result.is_ok(),
        );
        result
    }

    /// Overwrite the runtime document in place
    pub fn save_runtime(&self, document: &RuntimeDocument) -> Result<()> {
        let started = Instant::now();
        let result = serde_json::to_vec_pretty(document)
            .map_err(QueueBuddyError::from)
            .and_then(|bytes| fs::write(&self.data_path, bytes).map_err(QueueBuddyError::from));

        log_persistence(
            "runtime",
            &self.data_path.display().to_string(),
            started.elapsed().as_millis() as u64,
            result.is_ok(),
        );
        result
    }
}

/// Check that a written document parses back as JSON
pub fn validate_json(bytes: &[u8]) -> Result<()> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .map(|_| ())
        .map_err(|e| QueueBuddyError::Persistence(format!("Written document failed validation: {}", e)))
}

/// Write `data` to a temporary file next to `path`, validate what was
/// written, then rename it over `path`. The temporary file is removed on any
/// failure and `path` keeps its previous content.
pub fn write_atomic<F>(path: &Path, data: &[u8], validate: F) -> Result<()>
where
    F: FnOnce(&[u8]) -> Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
        QueueBuddyError::Persistence(format!("Failed to create temp file in {}: {}", dir.display(), e))
    })?;
    temp.write_all(data)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| QueueBuddyError::Persistence(format!("Failed to write temp file: {}", e)))?;

    let written = fs::read(temp.path())
        .map_err(|e| QueueBuddyError::Persistence(format!("Failed to re-read temp file: {}", e)))?;
    validate(&written)?;

    temp.persist(path).map_err(|e| {
        QueueBuddyError::Persistence(format!("Failed to replace {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), bytes = data.len(), "Document replaced atomically");
    Ok(())
}

/// Scan raw configuration text for group keys repeated inside the
/// `group_queue_sizes` object
pub fn find_duplicate_queue_size_keys(raw: &str) -> Result<Vec<String>> {
    let section = Regex::new(r#""group_queue_sizes"\s*:\s*\{([^}]*)\}"#)
        .map_err(|e| QueueBuddyError::Persistence(e.to_string()))?;
    let key = Regex::new(r#""(-?\d+)"\s*:"#).map_err(|e| QueueBuddyError::Persistence(e.to_string()))?;

    let Some(body) = section.captures(raw).and_then(|c| c.get(1)) else {
        return Ok(Vec::new());
    };

    let mut seen = std::collections::BTreeSet::new();
    let mut duplicates = Vec::new();
    for capture in key.captures_iter(body.as_str()) {
        let group = capture[1].to_string();
        if !seen.insert(group.clone()) && !duplicates.contains(&group) {
            duplicates.push(group);
        }
    }

    Ok(duplicates)
}
