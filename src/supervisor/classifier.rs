//! Log Classifier & Filter
//!
//! Two independent functions over each log line: severity/prompt
//! classification, run on every captured event, and the tag filter used by
//! the display layer to re-render retained history.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::state::SessionState;
use crate::models::{LogEvent, LogSource, Severity};

/// Wildcard tag matching every event
pub const ALL_TAG: &str = "all";

/// Phrases that mean the child is blocked on an interactive read
pub const DEFAULT_PROMPT_PHRASES: &[&str] =
    &["Press ENTER to continue", "press ENTER", "Press ENTER"];

/// First level token in a line decides its severity
static LEVEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(CRITICAL|FATAL|ERROR|WARNING|WARN|INFO|DEBUG)\b")
        .expect("level pattern is a valid regex")
});

/// Decides whether a line means the child now waits for a keystroke
pub trait PromptDetector: Send + Sync {
    fn is_prompt(&self, message: &str) -> bool;
}

/// Case-sensitive substring match against a fixed phrase set
#[derive(Debug, Clone)]
pub struct PhrasePromptDetector {
    phrases: Vec<String>,
}

impl PhrasePromptDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for PhrasePromptDetector {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_PHRASES.iter().copied())
    }
}

impl PromptDetector for PhrasePromptDetector {
    fn is_prompt(&self, message: &str) -> bool {
        self.phrases.iter().any(|phrase| message.contains(phrase.as_str()))
    }
}

/// Matches a structured sentinel line, e.g. `@@AWAIT_INPUT@@`, exactly
/// (surrounding whitespace ignored)
#[derive(Debug, Clone)]
pub struct SentinelPromptDetector {
    sentinel: String,
}

impl SentinelPromptDetector {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }
}

impl PromptDetector for SentinelPromptDetector {
    fn is_prompt(&self, message: &str) -> bool {
        message.trim() == self.sentinel
    }
}

/// Derive severity from tag conventions in the message, falling back to the stream
pub fn classify_severity(source: LogSource, message: &str) -> Severity {
    if let Some(caps) = LEVEL_PATTERN.captures(message) {
        return match &caps[1] {
            "CRITICAL" | "FATAL" | "ERROR" => Severity::Error,
            "WARNING" | "WARN" => Severity::Warning,
            _ => Severity::Info,
        };
    }

    if message.starts_with("Traceback") {
        return Severity::Error;
    }

    match source {
        LogSource::Stdout | LogSource::System => Severity::Info,
        LogSource::Stderr => Severity::Error,
    }
}

/// Tag filter: true when `tag` is the wildcard or a literal substring of the message
pub fn matches(event: &LogEvent, tag: &str) -> bool {
    tag == ALL_TAG || event.contains(tag)
}

/// Apply the tag filter to a retained sequence, preserving order
pub fn filter_events<'a, I>(events: I, tag: &str) -> Vec<LogEvent>
where
    I: IntoIterator<Item = &'a LogEvent>,
{
    events
        .into_iter()
        .filter(|event| matches(event, tag))
        .cloned()
        .collect()
}

/// Severity classification plus prompt detection
#[derive(Clone)]
pub struct LogClassifier {
    detector: Arc<dyn PromptDetector>,
}

impl LogClassifier {
    pub fn new(detector: Arc<dyn PromptDetector>) -> Self {
        Self { detector }
    }

    pub fn severity(&self, source: LogSource, message: &str) -> Severity {
        classify_severity(source, message)
    }

    /// Inspect a captured event; raises AwaitingInputFlag for `session` on a
    /// prompt. Returns true only when this call raised the flag.
    pub fn inspect(&self, state: &SessionState, session: u64, event: &LogEvent) -> bool {
        if !event.source.is_captured() || !self.detector.is_prompt(&event.message) {
            return false;
        }

        let raised = state.raise_awaiting(session);
        if raised {
            debug!(sequence = event.sequence, "Interactive prompt detected");
        }
        raised
    }
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::new(Arc::new(PhrasePromptDetector::default()))
    }
}

impl std::fmt::Debug for LogClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogClassifier").finish_non_exhaustive()
    }
}
