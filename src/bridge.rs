//! Display boundary
//!
//! The operations a settings/log window invokes: `start-server`,
//! `stop-server`, `get-server-status`, `send-input`, `get-version`, plus the
//! push stream of `{type, message}` log notifications. Results carry
//! failure messages verbatim; nothing here panics or hangs on failure.
//!
//! Notification subscribers outlive individual server sessions: the
//! bridge re-registers its relay with the supervisor on every start. Each
//! start also gets a fresh history buffer, so filtering only ever sees the
//! current session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};
use crate::history::LogHistory;
use crate::models::{ExitSummary, LogEvent, LogNotification, ServerStatus};
use crate::settings::{JsonSettingsStore, SettingsStore};
use crate::supervisor::{LaunchSpec, LogObserver, PhrasePromptDetector, Supervisor};

const NOTIFICATION_CAPACITY: usize = 1024;

/// Result of `start-server`, `stop-server` and `restart-server`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    fn failed(err: &Error) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
        }
    }
}

/// Result of `send-input`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receives log notifications across server sessions
pub struct NotificationSubscription {
    receiver: broadcast::Receiver<LogNotification>,
}

impl NotificationSubscription {
    /// Receive the next notification, waiting if necessary
    pub async fn recv(&mut self) -> Option<LogNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Notification subscriber lagged by {} events", count);
                }
            }
        }
    }

    /// Try to receive a notification without blocking
    pub fn try_recv(&mut self) -> Option<LogNotification> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!("Notification subscriber lagged by {} events", count);
                }
                Err(_) => return None,
            }
        }
    }
}

struct NotificationRelay {
    sender: broadcast::Sender<LogNotification>,
}

impl LogObserver for NotificationRelay {
    fn on_event(&self, event: &LogEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event.to_notification());
    }
}

/// Boundary between the display layer and the supervisor
pub struct ServerBridge {
    supervisor: Supervisor,
    settings: Arc<dyn SettingsStore>,
    server: ServerConfig,
    history: RwLock<Arc<LogHistory>>,
    history_limit: usize,
    notifications: broadcast::Sender<LogNotification>,
}

impl ServerBridge {
    pub fn new(
        supervisor: Supervisor,
        settings: Arc<dyn SettingsStore>,
        server: ServerConfig,
        history_limit: usize,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            supervisor,
            settings,
            server,
            history: RwLock::new(Arc::new(LogHistory::with_limit(history_limit))),
            history_limit,
            notifications,
        }
    }

    /// Bridge wired from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let detector = Arc::new(PhrasePromptDetector::new(config.prompt.phrases.iter().cloned()));
        let supervisor =
            Supervisor::with_detector(config.supervisor.to_supervisor_config(), detector);
        let settings_path: PathBuf = config
            .settings_path
            .clone()
            .unwrap_or_else(JsonSettingsStore::default_path);

        Self::new(
            supervisor,
            Arc::new(JsonSettingsStore::new(settings_path)),
            config.server.clone(),
            config.supervisor.history_limit,
        )
    }

    /// Observers for a new session, plus the history they fill. The history
    /// is only retained once the session actually started.
    fn session_observers(&self) -> (Arc<LogHistory>, Vec<Arc<dyn LogObserver>>) {
        let history = Arc::new(LogHistory::with_limit(self.history_limit));
        let retained: Arc<dyn LogObserver> = history.clone();
        let relay: Arc<dyn LogObserver> = Arc::new(NotificationRelay {
            sender: self.notifications.clone(),
        });
        (history, vec![retained, relay])
    }

    fn retain_history(&self, history: Arc<LogHistory>) {
        *self
            .history
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = history;
    }

    /// Launch spec with persisted settings layered over the static environment
    pub fn launch_spec(&self) -> Result<LaunchSpec> {
        let settings = self.settings.get_config()?;
        Ok(self.server.launch_spec(&settings))
    }

    /// `start-server`
    pub async fn start_server(&self) -> CommandResult {
        if let Some(handle) = self.supervisor.handle().filter(|_| self.supervisor.is_running()) {
            return CommandResult::failed(&Error::AlreadyRunning { pid: handle.pid });
        }

        let spec = match self.launch_spec() {
            Ok(spec) => spec,
            Err(e) => {
                error!("Cannot start server: {}", e);
                return CommandResult::failed(&e);
            }
        };

        let (history, observers) = self.session_observers();
        match self.supervisor.start_observed(spec, observers).await {
            Ok(handle) => {
                self.retain_history(history);
                CommandResult::ok(format!("Server started (pid {})", handle.pid))
            }
            Err(e) => CommandResult::failed(&e),
        }
    }

    /// `stop-server`
    pub async fn stop_server(&self) -> CommandResult {
        match self.supervisor.stop().await {
            Ok(()) => CommandResult {
                success: true,
                message: None,
            },
            Err(e) => CommandResult::failed(&e),
        }
    }

    /// Stop, then start with freshly read settings
    pub async fn restart_server(&self) -> CommandResult {
        let spec = match self.launch_spec() {
            Ok(spec) => spec,
            Err(e) => return CommandResult::failed(&e),
        };

        let (history, observers) = self.session_observers();
        match self.supervisor.restart_observed(spec, observers).await {
            Ok(handle) => {
                self.retain_history(history);
                CommandResult::ok(format!("Server restarted (pid {})", handle.pid))
            }
            Err(e) => CommandResult::failed(&e),
        }
    }

    /// `get-server-status`
    pub fn get_server_status(&self) -> ServerStatus {
        self.supervisor.status()
    }

    /// `send-input`. Only a single continue keystroke is relayed; `text` is
    /// accepted for compatibility and not forwarded.
    pub async fn send_input(&self, text: &str) -> InputResult {
        if !text.is_empty() {
            debug!(len = text.len(), "Ignoring input text, relaying continue only");
        }
        match self.supervisor.send_continue().await {
            Ok(()) => InputResult {
                success: true,
                error: None,
            },
            Err(e) => InputResult {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// `get-version`
    pub fn get_version(&self) -> &'static str {
        crate::VERSION
    }

    /// Log notifications from now on, across restarts
    pub fn subscribe(&self) -> NotificationSubscription {
        NotificationSubscription {
            receiver: self.notifications.subscribe(),
        }
    }

    /// Retained events of the current session matching `tag`
    pub fn logs(&self, tag: &str) -> Vec<LogEvent> {
        self.history().filtered(tag)
    }

    /// History of the current (or last) session
    pub fn history(&self) -> Arc<LogHistory> {
        Arc::clone(
            &self
                .history
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Wait for the running server to exit
    pub async fn wait_for_exit(&self) -> Option<ExitSummary> {
        self.supervisor.wait_for_exit().await
    }
}
