//! Log Event Model
//!
//! Represents one classified, ordered line of captured output. Events are
//! created by the capture layer (or by the supervisor for lifecycle notices)
//! and are never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a log event originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Child standard output
    Stdout,
    /// Child standard error
    Stderr,
    /// Lifecycle notice produced by the supervisor itself
    System,
}

impl LogSource {
    /// Whether the event was captured from the child's output streams
    pub fn is_captured(&self) -> bool {
        matches!(self, LogSource::Stdout | LogSource::Stderr)
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Stdout => write!(f, "stdout"),
            LogSource::Stderr => write!(f, "stderr"),
            LogSource::System => write!(f, "system"),
        }
    }
}

/// Derived severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One immutable unit of captured output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Global emission order for the current session, starting at 1
    pub sequence: u64,
    /// Stream the line came from
    pub source: LogSource,
    /// Derived severity
    pub severity: Severity,
    /// Line text without its terminator
    pub message: String,
    /// When the line completed
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    /// Whether the message contains `needle` as a literal substring
    pub fn contains(&self, needle: &str) -> bool {
        self.message.contains(needle)
    }

    /// Convert into the notification shape pushed across the display boundary
    pub fn to_notification(&self) -> LogNotification {
        LogNotification::from(self)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}/{}] {}", self.sequence, self.source, self.severity, self.message)
    }
}

/// `type` field of a log notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Stdout,
    Stderr,
    Info,
    Warning,
    Error,
}

/// Payload pushed to display observers: `{type, message}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
}

impl From<&LogEvent> for LogNotification {
    fn from(event: &LogEvent) -> Self {
        // Captured lines keep their stream name; supervisor notices carry their severity
        let kind = match (event.source, event.severity) {
            (LogSource::Stdout, _) => NotificationKind::Stdout,
            (LogSource::Stderr, _) => NotificationKind::Stderr,
            (LogSource::System, Severity::Info) => NotificationKind::Info,
            (LogSource::System, Severity::Warning) => NotificationKind::Warning,
            (LogSource::System, Severity::Error) => NotificationKind::Error,
        };
        Self {
            kind,
            message: event.message.clone(),
        }
    }
}
