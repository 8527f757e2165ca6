//! Configuration management for procwarden
//!
//! TOML configuration for the supervised server, the supervisor's timing
//! and capture settings, prompt detection, and hot reload. Every section
//! falls back to its defaults, so a partial file is always valid input.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::supervisor::classifier::DEFAULT_PROMPT_PHRASES;
use crate::supervisor::{LaunchSpec, SupervisorConfig};

pub use loader::{ConfigLoader, LoadOptions};

/// Upper bound for `supervisor.read_buffer_size`
pub const MAX_READ_BUFFER: usize = 10 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON key-value settings passed to the server as environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,

    pub server: ServerConfig,

    pub supervisor: SupervisorSettings,

    pub prompt: PromptConfig,

    pub reload: ReloadConfig,
}

/// The supervised server process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Executable to launch
    pub command: String,

    /// Arguments passed to the command
    pub args: Vec<String>,

    /// Working directory for the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Static environment added on spawn; persisted settings override it
    pub environment: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "uv".to_string(),
            args: ["run", "python", "-m", "app.main"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            working_directory: None,
            environment: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Launch spec for this server with `overrides` layered over the static environment
    pub fn launch_spec(&self, overrides: &BTreeMap<String, String>) -> LaunchSpec {
        let mut spec = LaunchSpec::new(self.command.clone())
            .args(self.args.iter().cloned())
            .envs(self.environment.clone())
            .envs(overrides.clone());
        if let Some(ref dir) = self.working_directory {
            spec = spec.working_dir(dir.clone());
        }
        spec
    }
}

/// Supervisor timing and capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Wait after a graceful termination request before killing
    pub grace_period_ms: u64,

    /// Wait after a forced kill before reporting failure
    pub kill_timeout_ms: u64,

    /// How long capture may drain after the server exits
    pub drain_timeout_ms: u64,

    /// Bytes per read from each output stream
    pub read_buffer_size: usize,

    /// Remove terminal escape sequences from captured lines
    pub strip_ansi: bool,

    /// Retained events per session for filtering and replay
    pub history_limit: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
            kill_timeout_ms: 2000,
            drain_timeout_ms: 1000,
            read_buffer_size: 8192,
            strip_ansi: true,
            history_limit: 10_000,
        }
    }
}

impl SupervisorSettings {
    pub fn to_supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            grace_period: Duration::from_millis(self.grace_period_ms),
            kill_timeout: Duration::from_millis(self.kill_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            read_buffer_size: self.read_buffer_size,
            strip_ansi: self.strip_ansi,
        }
    }
}

/// Interactive prompt detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Case-sensitive phrases meaning the server waits for Enter
    pub phrases: Vec<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_PROMPT_PHRASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Restart the server when its sources change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub enabled: bool,

    /// Directory watched recursively
    pub watch_dir: PathBuf,

    /// File extensions that trigger a restart
    pub extensions: Vec<String>,

    /// Quiet period before restarting
    pub debounce_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            watch_dir: PathBuf::from("app"),
            extensions: vec!["py".to_string()],
            debounce_ms: 500,
        }
    }
}

impl ReloadConfig {
    /// Whether a change to `path` should trigger a restart
    pub fn is_watched(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.trim_start_matches('.') == ext))
            .unwrap_or(false)
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParseFailed {
            format: "TOML".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigSerializationFailed {
            format: "TOML".to_string(),
            reason: e.to_string(),
        })
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::ConfigSaveFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| Error::ConfigSaveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.server.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if self.supervisor.grace_period_ms == 0 {
            return Err(ConfigError::ZeroGracePeriod);
        }
        if self.supervisor.read_buffer_size == 0
            || self.supervisor.read_buffer_size > MAX_READ_BUFFER
        {
            return Err(ConfigError::InvalidReadBuffer(self.supervisor.read_buffer_size));
        }
        if self.supervisor.history_limit == 0 {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        if self.prompt.phrases.iter().all(|p| p.is_empty()) {
            return Err(ConfigError::NoPromptPhrases);
        }
        if self.reload.enabled && self.reload.extensions.is_empty() {
            return Err(ConfigError::NoReloadExtensions);
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Server command cannot be empty")]
    EmptyCommand,

    #[error("Grace period must be greater than 0")]
    ZeroGracePeriod,

    #[error("Invalid read buffer size: {0} (must be between 1 and {max})", max = MAX_READ_BUFFER)]
    InvalidReadBuffer(usize),

    #[error("History limit must be greater than 0")]
    ZeroHistoryLimit,

    #[error("At least one prompt phrase is required")]
    NoPromptPhrases,

    #[error("Hot reload needs at least one file extension")]
    NoReloadExtensions,
}

impl ConfigError {
    /// Dotted path of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::EmptyCommand => "server.command",
            ConfigError::ZeroGracePeriod => "supervisor.grace_period_ms",
            ConfigError::InvalidReadBuffer(_) => "supervisor.read_buffer_size",
            ConfigError::ZeroHistoryLimit => "supervisor.history_limit",
            ConfigError::NoPromptPhrases => "prompt.phrases",
            ConfigError::NoReloadExtensions => "reload.extensions",
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::ConfigValidationFailed {
            field: err.field().to_string(),
            reason: err.to_string(),
        }
    }
}
