//! Log Sink
//!
//! Ordered fan-out of log events to registered observers. Stream capture is
//! the only producer; observers come and go at any time.
//!
//! Sequence assignment and delivery happen under the same lock, so every
//! observer sees events in strictly increasing sequence order even though
//! stdout and stderr are read by independent tasks. The observer registry
//! lives behind a separate lock and is only snapshotted per event, which
//! keeps `unregister` safe to call from inside a callback.
//!
//! ```ignore
//! use procwarden::supervisor::LogSink;
//!
//! let sink = LogSink::new();
//! let mut sub = sink.subscribe();
//!
//! // Events published from now on reach `sub`, nothing before it
//! while let Some(event) = sub.recv().await {
//!     println!("{}", event);
//! }
//! ```

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use tokio::sync::mpsc;

use crate::models::{LogEvent, LogSource, Severity};

/// Receives every event published after registration.
///
/// Called synchronously on the capture task while delivery order is held,
/// so implementations should be quick and must not publish to the sink.
pub trait LogObserver: Send + Sync {
    fn on_event(&self, event: &LogEvent);
}

impl<F> LogObserver for F
where
    F: Fn(&LogEvent) + Send + Sync,
{
    fn on_event(&self, event: &LogEvent) {
        self(event)
    }
}

/// Identifies a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<(ObserverId, Arc<dyn LogObserver>)>,
}

#[derive(Default)]
struct SinkInner {
    /// Last assigned sequence number; also serializes delivery
    sequence: Mutex<u64>,
    registry: RwLock<Registry>,
}

impl SinkInner {
    fn unregister(&self, id: ObserverId) -> bool {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = registry.observers.len();
        registry.observers.retain(|(oid, _)| *oid != id);
        registry.observers.len() != before
    }
}

/// Single-producer, multi-observer event bus
#[derive(Clone, Default)]
pub struct LogSink {
    inner: Arc<SinkInner>,
}

impl LogSink {
    /// Create a new sink with no observers
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_sequence(&self) -> MutexGuard<'_, u64> {
        self.inner
            .sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an observer; it receives events from this point forward
    pub fn register(&self, observer: Arc<dyn LogObserver>) -> ObserverId {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.next_id += 1;
        let id = ObserverId(registry.next_id);
        registry.observers.push((id, observer));
        debug!(observer = id.0, "Log observer registered");
        id
    }

    /// Unregister an observer. Unknown or already removed ids are ignored.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let removed = self.inner.unregister(id);
        if removed {
            debug!(observer = id.0, "Log observer unregistered");
        }
        removed
    }

    /// Remove every observer, returning how many were attached
    pub fn detach_all(&self) -> usize {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = registry.observers.len();
        registry.observers.clear();
        if count > 0 {
            debug!(count, "Detached all log observers");
        }
        count
    }

    /// Number of currently registered observers
    pub fn observer_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .observers
            .len()
    }

    /// Subscribe through a channel, decoupling the consumer's pace from capture
    pub fn subscribe(&self) -> LogSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.register(Arc::new(ChannelObserver { sender }));
        LogSubscription {
            id,
            receiver,
            sink: Arc::downgrade(&self.inner),
        }
    }

    /// Publish a new event to every registered observer
    pub fn publish(&self, source: LogSource, severity: Severity, message: String) -> LogEvent {
        self.publish_with(source, severity, message, |_| {})
    }

    /// Publish a new event, running `before_delivery` once the sequence number
    /// is assigned but before any observer sees it
    pub fn publish_with<F>(
        &self,
        source: LogSource,
        severity: Severity,
        message: String,
        before_delivery: F,
    ) -> LogEvent
    where
        F: FnOnce(&LogEvent),
    {
        let mut sequence = self.lock_sequence();
        *sequence += 1;

        let event = LogEvent {
            sequence: *sequence,
            source,
            severity,
            message,
            timestamp: Utc::now(),
        };

        before_delivery(&event);

        let observers: Vec<Arc<dyn LogObserver>> = self
            .inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in &observers {
            observer.on_event(&event);
        }

        event
    }

    /// Restart numbering for a new session; the next event gets sequence 1
    pub(crate) fn reset_sequence(&self) {
        *self.lock_sequence() = 0;
    }

    /// Sequence number of the most recently published event (0 if none)
    pub fn last_sequence(&self) -> u64 {
        *self.lock_sequence()
    }
}

struct ChannelObserver {
    sender: mpsc::UnboundedSender<LogEvent>,
}

impl LogObserver for ChannelObserver {
    fn on_event(&self, event: &LogEvent) {
        // A closed receiver just means the subscriber went away
        let _ = self.sender.send(event.clone());
    }
}

/// Channel-backed observer registration.
///
/// Dropping the subscription unregisters it. After the sink detaches all
/// observers, `recv` drains what was already delivered and then returns `None`.
pub struct LogSubscription {
    id: ObserverId,
    receiver: mpsc::UnboundedReceiver<LogEvent>,
    sink: Weak<SinkInner>,
}

impl LogSubscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Receive the next event, waiting if necessary
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.receiver.recv().await
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently buffered
    pub fn drain(&mut self) -> Vec<LogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.sink.upgrade() {
            inner.unregister(self.id);
        }
    }
}
