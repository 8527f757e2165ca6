//! procwarden - process supervision and live log bridge
//!
//! This library starts and stops one long-running server process, captures
//! its standard output and error as an ordered stream of classified log
//! events, detects when the server blocks waiting for Enter, and relays that
//! single keystroke back into its standard input.
//!
//! ## Module Organization
//!
//! ### Supervision
//!
//! - [`supervisor`] - Process Supervisor, Stream Capture, Log Sink,
//!   Classifier & Filter, Input Bridge
//! - [`platform`] - Signal delivery (process groups on Unix, taskkill on Windows)
//! - [`models`] - Data structures (ProcessHandle, LogEvent, ServerStatus)
//! - [`mod@error`] - Error types and Result aliases
//!
//! ### Display Boundary
//!
//! - [`bridge`] - `start-server`, `stop-server`, `get-server-status`,
//!   `send-input` and log notifications
//! - [`history`] - Retained, filterable log buffer for one session
//! - [`settings`] - Persisted key-value settings passed to the server as environment
//!
//! ### Utilities
//!
//! - [`config`] - TOML configuration loading and validation
//! - [`reload`] - Restart the server when its sources change
//!
//! ## Quick Start
//!
//! ```no_run
//! use procwarden::supervisor::{LaunchSpec, Supervisor};
//!
//! # async fn run() -> procwarden::Result<()> {
//! let supervisor = Supervisor::default();
//! let mut logs = supervisor.subscribe();
//!
//! supervisor
//!     .start(LaunchSpec::new("python3").args(["-m", "app.main"]))
//!     .await?;
//!
//! while let Some(event) = logs.recv().await {
//!     println!("{}", event.message);
//!     if supervisor.status().awaiting_input {
//!         supervisor.send_continue().await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Capture Tasks:** one tokio task per output stream, splitting bytes into lines
//! - **Monitor Task:** waits for the child, drains capture, reports unexpected exit
//! - **Log Sink:** assigns one global sequence per line and delivers in that order
//!
//! Supervisor diagnostics go through `tracing`; captured server output only
//! ever flows through the log sink.

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod bridge;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod platform;
pub mod reload;
pub mod settings;
pub mod supervisor;

// Re-exports for core functionality
pub use bridge::{CommandResult, InputResult, NotificationSubscription, ServerBridge};
pub use config::{Config, ConfigLoader};
pub use error::{Error, Result};
pub use history::LogHistory;
pub use models::{
    ExitSummary, LogEvent, LogNotification, LogSource, ProcessHandle, ProcessState, ServerStatus,
    Severity,
};
pub use settings::{JsonSettingsStore, MemorySettingsStore, Settings, SettingsStore};
pub use supervisor::{LaunchSpec, LogObserver, LogSink, Supervisor, SupervisorConfig};

// Version information
/// The current version of procwarden from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The application description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
