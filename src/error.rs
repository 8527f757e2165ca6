//! Error types and Result aliases for procwarden

use std::fmt;
use std::path::PathBuf;

use crate::models::LogSource;

/// Result type alias for procwarden operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for procwarden
#[derive(Debug)]
pub enum Error {
    // === Supervision errors ===
    /// A child process is already running under this supervisor
    AlreadyRunning {
        pid: u32,
    },

    /// The child process could not be created
    SpawnFailed {
        command: String,
        reason: String,
    },

    /// Forced termination of the child failed
    StopFailed {
        pid: u32,
        reason: String,
    },

    /// Failed to send a signal to the child
    SignalSendFailed {
        signal: String,
        reason: String,
    },

    // === Input bridge errors ===
    /// The child is not blocked on an interactive read
    NotAwaitingInput,

    /// Writing the continue token to the child's stdin failed
    InputWriteFailed {
        reason: String,
    },

    // === Capture errors ===
    /// A captured line contained malformed bytes and was decoded lossily.
    /// Logged, never returned to callers.
    CaptureDecodeDegraded {
        source: LogSource,
        line_bytes: usize,
    },

    // === Configuration errors ===
    /// No configuration file was found
    ConfigNotFound,

    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to save configuration file
    ConfigSaveFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    /// Failed to serialize configuration
    ConfigSerializationFailed {
        format: String,
        reason: String,
    },

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to set up a file watcher
    ConfigWatchFailed {
        reason: String,
    },

    /// Failed to read persisted settings
    SettingsLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to persist settings
    SettingsSaveFailed {
        path: PathBuf,
        reason: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors
    Other(String),
}

impl Error {
    /// Whether this error is the `NotAwaitingInput` rejection
    pub fn is_not_awaiting_input(&self) -> bool {
        matches!(self, Error::NotAwaitingInput)
    }

    /// Whether this error is the `AlreadyRunning` rejection
    pub fn is_already_running(&self) -> bool {
        matches!(self, Error::AlreadyRunning { .. })
    }

    /// Whether this error is a spawn failure
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Error::SpawnFailed { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Supervision errors
            Error::AlreadyRunning { pid } => {
                write!(f, "Server is already running (pid {})", pid)
            }
            Error::SpawnFailed { command, reason } => {
                write!(f, "Failed to start '{}': {}", command, reason)
            }
            Error::StopFailed { pid, reason } => {
                write!(f, "Failed to stop process {}: {}", pid, reason)
            }
            Error::SignalSendFailed { signal, reason } => {
                write!(f, "Failed to send signal '{}': {}", signal, reason)
            }

            // Input bridge errors
            Error::NotAwaitingInput => {
                write!(f, "Server is not waiting for input")
            }
            Error::InputWriteFailed { reason } => {
                write!(f, "Failed to send input to server: {}", reason)
            }

            // Capture errors
            Error::CaptureDecodeDegraded { source, line_bytes } => {
                write!(
                    f,
                    "Malformed bytes on {} ({} byte line), substituted lossily",
                    source, line_bytes
                )
            }

            // Configuration errors
            Error::ConfigNotFound => write!(f, "Configuration file not found"),
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigSaveFailed { path, reason } => {
                write!(f, "Failed to save config to '{}': {}", path.display(), reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }
            Error::ConfigSerializationFailed { format, reason } => {
                write!(f, "Failed to serialize config as {}: {}", format, reason)
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigWatchFailed { reason } => {
                write!(f, "Failed to watch for changes: {}", reason)
            }
            Error::SettingsLoadFailed { path, reason } => {
                write!(f, "Failed to load settings from '{}': {}", path.display(), reason)
            }
            Error::SettingsSaveFailed { path, reason } => {
                write!(f, "Failed to save settings to '{}': {}", path.display(), reason)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            // Generic fallback
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
