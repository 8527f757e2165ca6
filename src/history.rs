//! Retained log history
//!
//! Append-only view of one server session's log events, owned by the
//! display side. Filtering re-renders from this buffer without touching
//! the child; it is cleared whenever a new session starts.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::models::LogEvent;
use crate::supervisor::classifier::filter_events;
use crate::supervisor::LogObserver;

/// Default number of retained events
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Bounded in-memory log buffer, registered as a log observer
#[derive(Debug)]
pub struct LogHistory {
    events: Mutex<VecDeque<LogEvent>>,
    /// Oldest events are evicted beyond this
    max_size: usize,
}

impl LogHistory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(max_size: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_size: max_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, event: LogEvent) {
        let mut events = self.lock();
        events.push_back(event);
        while events.len() > self.max_size {
            events.pop_front();
        }
    }

    /// Every retained event in sequence order
    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Retained events matching `tag`; `"all"` returns everything
    pub fn filtered(&self, tag: &str) -> Vec<LogEvent> {
        filter_events(self.lock().iter(), tag)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for LogHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl LogObserver for LogHistory {
    fn on_event(&self, event: &LogEvent) {
        self.push(event.clone());
    }
}
