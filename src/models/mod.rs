//! Core data models for procwarden
//!
//! This module contains the data structures shared across the supervision
//! layer: the handle of the supervised child, the captured log events, and
//! the snapshots handed to the display boundary.

pub mod log_event;
pub mod process_handle;

// Re-exports for convenience
pub use log_event::{LogEvent, LogNotification, LogSource, NotificationKind, Severity};
pub use process_handle::{ExitSummary, ProcessHandle, ProcessState, ServerStatus};
