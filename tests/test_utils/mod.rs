//! Test Utilities
//!
//! Shared fixtures for the process-level tests: shell launch specs, a
//! supervisor configuration with short timeouts, and helpers that wait on
//! a log subscription without hanging the test run.

#![allow(dead_code)]

use std::time::Duration;

use chrono::Utc;
use procwarden::models::{LogEvent, LogSource, Severity};
use procwarden::supervisor::{LaunchSpec, LogSubscription, SupervisorConfig};

/// Upper bound for any single wait in these tests
pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Run `script` through `/bin/sh -c`
pub fn sh(script: &str) -> LaunchSpec {
    LaunchSpec::new("/bin/sh").args(["-c", script])
}

/// Supervisor settings with timeouts short enough for tests
pub fn quick_config() -> SupervisorConfig {
    SupervisorConfig {
        grace_period: Duration::from_millis(500),
        kill_timeout: Duration::from_millis(2000),
        drain_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

/// Receive events until one satisfies `done`, returning everything seen
/// including the matching event
pub async fn collect_until<F>(sub: &mut LogSubscription, mut done: F) -> Vec<LogEvent>
where
    F: FnMut(&LogEvent) -> bool,
{
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(WAIT_LIMIT, sub.recv()).await {
            Ok(Some(event)) => {
                let finished = done(&event);
                events.push(event);
                if finished {
                    return events;
                }
            }
            Ok(None) => panic!("subscription closed before condition was met: {:?}", events),
            Err(_) => panic!("timed out waiting for log event: {:?}", events),
        }
    }
}

/// Receive until the subscription closes
pub async fn collect_to_close(sub: &mut LogSubscription) -> Vec<LogEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(WAIT_LIMIT, sub.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => return events,
            Err(_) => panic!("timed out waiting for subscription to close: {:?}", events),
        }
    }
}

/// Only the lines captured from the child, without supervisor notices
pub fn captured(events: &[LogEvent]) -> Vec<&LogEvent> {
    events.iter().filter(|e| e.source.is_captured()).collect()
}

/// Messages of the captured lines from one stream
pub fn messages_from(events: &[LogEvent], source: LogSource) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.source == source)
        .map(|e| e.message.clone())
        .collect()
}

/// Build a standalone event for filter tests
pub fn event(sequence: u64, source: LogSource, message: &str) -> LogEvent {
    LogEvent {
        sequence,
        source,
        severity: Severity::Info,
        message: message.to_string(),
        timestamp: Utc::now(),
    }
}
