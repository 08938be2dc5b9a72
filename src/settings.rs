//! Key-value settings persistence.
//!
//! The store keeps a handful of scalar settings (backup folder path, sort
//! predicate, sort direction) process-durable through the narrow
//! [`SettingsStore`] interface. The default implementation persists them as
//! a flat JSON object in a single file.

use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
};

use log::debug;

use crate::{Result, StoreError};

/// Settings key holding the chosen backup folder path.
pub const BACKUP_FOLDER_KEY: &str = "notes_backup_folder";
/// Settings key holding the current sort predicate (a field name).
pub const SORT_PREDICATE_KEY: &str = "sort_predicate";
/// Settings key holding the current sort direction (`ASC`/`DESC`).
pub const SORT_DIRECTION_KEY: &str = "sort_direction";
/// Settings key holding the attachments folder path. Optional; defaults to
/// `attachments/` under the backup folder.
pub const ATTACHMENTS_FOLDER_KEY: &str = "attachments_folder";

/// Narrow interface the store uses to persist scalar settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Settings persisted as a flat JSON object in a single file.
///
/// The whole map is rewritten on every `put`; the values are a few short
/// strings so this stays cheap.
pub struct JsonSettings {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl JsonSettings {
    /// Opens the settings file, treating a missing file as empty settings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };
        debug!(
            "Opened settings file {} with {} entries",
            path.display(),
            values.len()
        );
        Ok(Self { path, values })
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist().map_err(|e| StoreError::SettingsError {
            message: format!("failed to persist {key}: {e}"),
        })
    }
}

/// Non-durable settings backed by a plain map, for tests and embedders that
/// manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
