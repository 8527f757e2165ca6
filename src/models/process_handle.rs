//! Process Handle Model
//!
//! Represents the supervised child process: its identity, when it was
//! started, and where it is in its lifecycle. Exclusively owned by the
//! supervisor; everyone else sees clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Spawned and being captured
    #[default]
    Running,
    /// Termination requested, waiting for exit
    Stopping,
    /// Exited, either on its own or via stop
    Stopped,
}

/// Handle to the running child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// Unique identifier for this session
    pub id: String,
    /// OS process identifier
    pub pid: u32,
    /// Executable that was launched
    pub command: String,
    /// Arguments passed to the command
    pub args: Vec<String>,
    /// When the process was started
    pub started_at: DateTime<Utc>,
    /// Current lifecycle state
    pub state: ProcessState,
}

impl ProcessHandle {
    /// Create a handle for a freshly spawned process
    pub fn new(pid: u32, command: String, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pid,
            command,
            args,
            started_at: Utc::now(),
            state: ProcessState::Running,
        }
    }

    /// Check if the process is currently running
    pub fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running)
    }

    /// Time since the process was started
    pub fn uptime(&self) -> std::time::Duration {
        Utc::now()
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Get a display string for the process
    pub fn display_string(&self) -> String {
        let state_str = match self.state {
            ProcessState::Running => "Running",
            ProcessState::Stopping => "Stopping",
            ProcessState::Stopped => "Stopped",
        };

        if self.args.is_empty() {
            format!("{} [{}] - {}", self.command, self.pid, state_str)
        } else {
            format!(
                "{} {} [{}] - {}",
                self.command,
                self.args.join(" "),
                self.pid,
                state_str
            )
        }
    }
}

impl std::fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

/// How the child ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSummary {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal on Unix
    pub signal: Option<i32>,
    /// Whether the exit was requested through stop
    pub requested: bool,
}

impl ExitSummary {
    /// Build a summary from an OS exit status
    pub fn from_status(status: &std::process::ExitStatus, requested: bool) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            requested,
        }
    }

    /// Summary used when the exit status could not be collected
    pub fn unknown(requested: bool) -> Self {
        Self {
            code: None,
            signal: None,
            requested,
        }
    }

    /// Exited normally with code 0
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human readable summary line
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("Server process exited with code {}", code),
            (None, Some(signal)) => format!("Server process terminated by signal {}", signal),
            (None, None) => "Server process exited".to_string(),
        }
    }
}

/// Snapshot returned by `status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub running: bool,
    pub awaiting_input: bool,
}
