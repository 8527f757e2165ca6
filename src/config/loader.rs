//! Configuration File Loading
//!
//! Finds the configuration file in the usual locations, parses it, and
//! falls back to built-in defaults when nothing is found.

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PROCWARDEN_CONFIG";

const APP_DIR: &str = "procwarden";
const CONFIG_FILE: &str = "config.toml";

/// Configuration file loader
pub struct ConfigLoader {
    /// Candidate files, in priority order
    search_paths: Vec<PathBuf>,
    /// File the configuration was loaded from, if any
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Fall back to defaults when no file exists
    pub create_default: bool,
    /// Validate configuration after loading
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_default: true,
            validate: true,
        }
    }
}

impl ConfigLoader {
    /// Loader over the default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            current_path: None,
        }
    }

    /// Loader that checks `path` before the default search paths
    pub fn with_explicit_path(path: impl Into<PathBuf>) -> Self {
        let mut loader = Self::new();
        loader.search_paths.insert(0, path.into());
        loader
    }

    /// Load configuration with default options
    pub fn load() -> Result<Config> {
        Self::new().load_with_options(LoadOptions::default())
    }

    /// Load from the first existing search path
    pub fn load_with_options(&mut self, options: LoadOptions) -> Result<Config> {
        let config = match self.find_config_file() {
            Some(path) => {
                let config = Self::load_config_file(&path)?;
                info!(path = %path.display(), "Loaded configuration");
                self.current_path = Some(path);
                config
            }
            None if options.create_default => {
                debug!("No configuration file found, using defaults");
                Config::default()
            }
            None => return Err(Error::ConfigNotFound),
        };

        if options.validate {
            config.validate()?;
        }
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.is_file()).cloned()
    }

    /// Load and parse a specific configuration file
    pub fn load_config_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Config::from_toml(&content)
    }

    /// Save configuration to the loaded path or the default location
    pub fn save(&self, config: &Config) -> Result<PathBuf> {
        let path = self
            .current_path
            .clone()
            .unwrap_or_else(Self::get_default_config_path);
        config.save_to(&path)?;
        Ok(path)
    }

    /// Default search paths, highest priority first
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(explicit) = env::var(CONFIG_ENV_VAR) {
            if !explicit.is_empty() {
                paths.push(PathBuf::from(explicit));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR).join(CONFIG_FILE));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(format!(".{}", APP_DIR)).join(CONFIG_FILE));
        }

        paths
    }

    /// Where `save` writes when nothing was loaded
    pub fn get_default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
