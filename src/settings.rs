//! Persisted key-value settings
//!
//! The settings form reads and writes a flat string map. The supervisor
//! never interprets the keys; it only passes them to the server as
//! environment variables on start.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Flat key-value settings
pub type Settings = BTreeMap<String, String>;

const SETTINGS_FILE: &str = "settings.json";

/// `getConfig` / `saveConfig` collaborator
pub trait SettingsStore: Send + Sync {
    /// Current persisted settings; empty when nothing was saved yet
    fn get_config(&self) -> Result<Settings>;

    /// Replace the persisted settings (last write wins)
    fn save_config(&self, settings: &Settings) -> Result<()>;
}

/// Settings stored as a pretty-printed JSON object
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/procwarden/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("procwarden")
            .join(SETTINGS_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonSettingsStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get_config(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| Error::SettingsLoadFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        if content.trim().is_empty() {
            return Ok(Settings::new());
        }

        serde_json::from_str(&content).map_err(|e| Error::SettingsLoadFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save_config(&self, settings: &Settings) -> Result<()> {
        let save_error = |reason: String| Error::SettingsSaveFailed {
            path: self.path.clone(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(settings).map_err(|e| save_error(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| save_error(e.to_string()))?;

        debug!(path = %self.path.display(), keys = settings.len(), "Settings saved");
        Ok(())
    }
}

/// In-memory settings, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_config(&self) -> Result<Settings> {
        Ok(self.lock().clone())
    }

    fn save_config(&self, settings: &Settings) -> Result<()> {
        *self.lock() = settings.clone();
        Ok(())
    }
}
