//! Process supervision and log bridge
//!
//! - [`manager`] - Process Supervisor: start/stop/status/restart
//! - [`capture`] - Stream Capture: per-stream readers and line splitting
//! - [`sink`] - Log Sink: ordered fan-out to observers
//! - [`classifier`] - Severity, prompt detection and the tag filter
//! - [`input`] - Input Bridge: relays the continue keystroke
//! - [`state`] - Running flag and AwaitingInputFlag

pub mod capture;
pub mod classifier;
pub mod input;
pub mod manager;
pub mod process;
pub mod sink;
pub mod state;

pub use capture::{strip_ansi, CaptureStats, LineSplitter};
pub use classifier::{
    classify_severity, filter_events, matches, LogClassifier, PhrasePromptDetector,
    PromptDetector, SentinelPromptDetector, ALL_TAG, DEFAULT_PROMPT_PHRASES,
};
pub use input::InputBridge;
pub use manager::{Supervisor, SupervisorConfig};
pub use process::LaunchSpec;
pub use sink::{LogObserver, LogSink, LogSubscription, ObserverId};
pub use state::SessionState;
