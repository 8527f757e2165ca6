//! Process Supervisor
//!
//! Owns the lifecycle of at most one child process: start, stop with a
//! bounded grace period, status, restart, and detection of unexpected exit.
//!
//! Each start spawns three tasks: one capture reader per output stream and
//! a monitor that waits for the child, drains the readers and finishes the
//! session. Start and stop are serialized through a control lock; status
//! and input relay never wait on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::capture::{spawn_reader, CapturePipeline, CaptureStats};
use super::classifier::{LogClassifier, PhrasePromptDetector, PromptDetector};
use super::input::InputBridge;
use super::process::{spawn_child, LaunchSpec, SpawnedChild};
use super::sink::{LogObserver, LogSink, LogSubscription, ObserverId};
use super::state::SessionState;
use crate::error::{Error, Result};
use crate::models::{ExitSummary, LogSource, ProcessHandle, ProcessState, ServerStatus, Severity};
use crate::platform::{Platform, SignalOps};

/// Timing and capture settings for the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long to wait after a graceful termination request
    pub grace_period: Duration,
    /// How long to wait after a forced kill before giving up
    pub kill_timeout: Duration,
    /// How long readers may keep draining after the child exits
    pub drain_timeout: Duration,
    pub read_buffer_size: usize,
    pub strip_ansi: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(5000),
            kill_timeout: Duration::from_millis(2000),
            drain_timeout: Duration::from_millis(1000),
            read_buffer_size: 8192,
            strip_ansi: true,
        }
    }
}

type ExitReceiver = watch::Receiver<Option<ExitSummary>>;

struct ActiveSession {
    session: u64,
    handle: ProcessHandle,
    exit_rx: ExitReceiver,
    capture_stop: Arc<watch::Sender<bool>>,
    stop_requested: Arc<AtomicBool>,
    /// Observers registered for this session only
    observers: Vec<ObserverId>,
    monitor: JoinHandle<()>,
}

struct Inner {
    config: SupervisorConfig,
    sink: LogSink,
    state: Arc<SessionState>,
    classifier: LogClassifier,
    input: InputBridge,
    signals: Arc<dyn SignalOps>,
    control: tokio::sync::Mutex<()>,
    active: Mutex<Option<ActiveSession>>,
    last_exit: Mutex<Option<ExitSummary>>,
    last_handle: Mutex<Option<ProcessHandle>>,
}

impl Inner {
    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_exit(&self) -> MutexGuard<'_, Option<ExitSummary>> {
        self.last_exit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_handle(&self) -> MutexGuard<'_, Option<ProcessHandle>> {
        self.last_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notice(&self, severity: Severity, message: String) {
        self.sink.publish(LogSource::System, severity, message);
    }

    /// Take the slot of `session` and mark its handle stopped
    fn retire(&self, session: u64) -> Option<ActiveSession> {
        let mut active = self.lock_active();
        if active.as_ref().map(|a| a.session) != Some(session) {
            return None;
        }
        let mut retired = active.take()?;
        retired.handle.state = ProcessState::Stopped;
        *self.lock_last_handle() = Some(retired.handle.clone());
        Some(retired)
    }

    /// Terminal bookkeeping run by the monitor once the child is gone
    async fn finish_session(&self, session: u64, summary: &ExitSummary) {
        // A new session cannot start until this one has ended, so the
        // summary is published before the end
        let live = self.state.current_session() == session && self.state.is_running();
        if live && !summary.requested {
            if summary.is_success() {
                info!(session, "{}", summary.describe());
                self.notice(Severity::Info, summary.describe());
            } else {
                warn!(session, "{}", summary.describe());
                self.notice(Severity::Error, summary.describe());
            }
        }

        self.state.end(session);
        self.input.detach(session).await;
        *self.lock_last_exit() = Some(summary.clone());

        if let Some(finished) = self.retire(session) {
            for id in finished.observers {
                self.sink.unregister(id);
            }
        }
    }
}

/// Supervises one child process at a time. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Supervisor with the default prompt phrases and platform signals
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_detector(config, Arc::new(PhrasePromptDetector::default()))
    }

    /// Supervisor with a custom prompt detector
    pub fn with_detector(config: SupervisorConfig, detector: Arc<dyn PromptDetector>) -> Self {
        Self::with_parts(config, LogClassifier::new(detector), Platform::signals())
    }

    pub fn with_parts(
        config: SupervisorConfig,
        classifier: LogClassifier,
        signals: Arc<dyn SignalOps>,
    ) -> Self {
        let sink = LogSink::new();
        let state = Arc::new(SessionState::new());
        let input = InputBridge::new(Arc::clone(&state), sink.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                sink,
                state,
                classifier,
                input,
                signals,
                control: tokio::sync::Mutex::new(()),
                active: Mutex::new(None),
                last_exit: Mutex::new(None),
                last_handle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Start the child. Fails with `AlreadyRunning` while one is active.
    pub async fn start(&self, spec: LaunchSpec) -> Result<ProcessHandle> {
        self.start_observed(spec, Vec::new()).await
    }

    /// Start the child with observers that see the session from its first
    /// event and are unregistered when the session ends
    pub async fn start_observed(
        &self,
        spec: LaunchSpec,
        observers: Vec<Arc<dyn LogObserver>>,
    ) -> Result<ProcessHandle> {
        let _control = self.inner.control.lock().await;
        self.start_locked(spec, observers).await
    }

    async fn start_locked(
        &self,
        spec: LaunchSpec,
        observers: Vec<Arc<dyn LogObserver>>,
    ) -> Result<ProcessHandle> {
        if let Some(pid) = self.running_pid() {
            warn!(pid, "Start rejected, server already running");
            return Err(Error::AlreadyRunning { pid });
        }

        let SpawnedChild {
            child,
            pid,
            stdin,
            stdout,
            stderr,
        } = spawn_child(&spec).map_err(|e| {
            error!("{}", e);
            e
        })?;

        let inner = &self.inner;
        let session = inner.state.begin();
        inner.sink.reset_sequence();
        let observer_ids: Vec<ObserverId> = observers
            .into_iter()
            .map(|observer| inner.sink.register(observer))
            .collect();

        let handle = ProcessHandle::new(pid, spec.command.clone(), spec.args.clone());
        info!(pid, session, command = %spec.command_line(), "Server started");
        inner.notice(
            Severity::Info,
            format!("Server started: {} (pid {})", spec.command_line(), pid),
        );

        inner.input.attach(session, stdin).await;

        let (stop_tx, stop_rx) = watch::channel(false);
        let pipeline = CapturePipeline::new(
            session,
            inner.sink.clone(),
            inner.classifier.clone(),
            Arc::clone(&inner.state),
            inner.config.strip_ansi,
        );
        let buffer_size = inner.config.read_buffer_size;
        let readers = vec![
            spawn_reader(
                LogSource::Stdout,
                stdout,
                pipeline.clone(),
                buffer_size,
                stop_rx.clone(),
            ),
            spawn_reader(LogSource::Stderr, stderr, pipeline, buffer_size, stop_rx),
        ];

        let capture_stop = Arc::new(stop_tx);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = watch::channel(None);

        // The monitor cannot clear the slot before it is filled
        let mut active = inner.lock_active();
        if let Some(stale) = active.take() {
            // Previous child exited but its monitor has not finished yet
            for id in stale.observers {
                inner.sink.unregister(id);
            }
        }
        let monitor = tokio::spawn(monitor_child(
            Arc::clone(inner),
            session,
            child,
            readers,
            Arc::clone(&capture_stop),
            Arc::clone(&stop_requested),
            exit_tx,
        ));
        *active = Some(ActiveSession {
            session,
            handle: handle.clone(),
            exit_rx,
            capture_stop,
            stop_requested,
            observers: observer_ids,
            monitor,
        });

        Ok(handle)
    }

    /// Stop the child. Succeeds without side effects when nothing is running.
    pub async fn stop(&self) -> Result<()> {
        let _control = self.inner.control.lock().await;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> Result<()> {
        let inner = &self.inner;
        let target = {
            let mut active = inner.lock_active();
            match active.as_mut() {
                Some(a) => {
                    a.handle.state = ProcessState::Stopping;
                    a.stop_requested.store(true, Ordering::SeqCst);
                    Some((
                        a.session,
                        a.handle.pid,
                        a.exit_rx.clone(),
                        Arc::clone(&a.capture_stop),
                    ))
                }
                None => None,
            }
        };

        let Some((session, pid, mut exit_rx, capture_stop)) = target else {
            debug!("Stop requested with no server running");
            return Ok(());
        };

        info!(pid, session, "Stopping server");
        let result = self.terminate(pid, &mut exit_rx, &capture_stop).await;

        let _ = capture_stop.send(true);
        inner.state.end(session);
        inner.input.detach(session).await;
        inner.notice(Severity::Info, "Server stopped".to_string());
        inner.sink.detach_all();

        if let Some(leftover) = inner.retire(session) {
            if !leftover.monitor.is_finished() {
                debug!(pid, "Aborting exit monitor");
                leftover.monitor.abort();
            }
        }

        match &result {
            Ok(()) => info!(pid, "Server stopped"),
            Err(e) => error!("{}", e),
        }
        result
    }

    async fn terminate(
        &self,
        pid: u32,
        exit_rx: &mut ExitReceiver,
        capture_stop: &watch::Sender<bool>,
    ) -> Result<()> {
        let config = &self.inner.config;
        let signals = &self.inner.signals;

        if exit_rx.borrow().is_some() {
            return Ok(());
        }

        if let Err(e) = signals.send_terminate(pid).await {
            warn!(pid, "Graceful termination request failed: {}", e);
        }
        if wait_for_exit(exit_rx, config.grace_period).await {
            return Ok(());
        }

        warn!(
            pid,
            grace_ms = config.grace_period.as_millis() as u64,
            "Grace period elapsed, killing server"
        );
        let _ = capture_stop.send(true);

        if let Err(e) = signals.send_kill(pid).await {
            if exit_rx.borrow().is_none() {
                return Err(Error::StopFailed {
                    pid,
                    reason: e.to_string(),
                });
            }
            return Ok(());
        }

        if wait_for_exit(exit_rx, config.kill_timeout).await {
            Ok(())
        } else {
            Err(Error::StopFailed {
                pid,
                reason: format!(
                    "process did not exit within {}ms of being killed",
                    config.kill_timeout.as_millis()
                ),
            })
        }
    }

    /// Stop whatever is running, then start `spec`
    pub async fn restart(&self, spec: LaunchSpec) -> Result<ProcessHandle> {
        self.restart_observed(spec, Vec::new()).await
    }

    pub async fn restart_observed(
        &self,
        spec: LaunchSpec,
        observers: Vec<Arc<dyn LogObserver>>,
    ) -> Result<ProcessHandle> {
        let _control = self.inner.control.lock().await;
        self.stop_locked().await?;
        self.start_locked(spec, observers).await
    }

    pub fn status(&self) -> ServerStatus {
        self.inner.state.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.is_running()
    }

    /// Handle of the active child, if any
    pub fn handle(&self) -> Option<ProcessHandle> {
        self.inner.lock_active().as_ref().map(|a| a.handle.clone())
    }

    /// Handle of the most recently finished child, in the `Stopped` state
    pub fn last_handle(&self) -> Option<ProcessHandle> {
        self.inner.lock_last_handle().clone()
    }

    fn running_pid(&self) -> Option<u32> {
        let active = self.inner.lock_active();
        active
            .as_ref()
            .filter(|a| a.session == self.inner.state.current_session() && self.inner.state.is_running())
            .map(|a| a.handle.pid)
    }

    /// Relay one continue keystroke to the child
    pub async fn send_continue(&self) -> Result<()> {
        self.inner.input.send_continue().await
    }

    /// Wait until the current child has exited and its session is finished.
    /// Returns the last exit when nothing is running.
    pub async fn wait_for_exit(&self) -> Option<ExitSummary> {
        let rx = self.inner.lock_active().as_ref().map(|a| a.exit_rx.clone());
        if let Some(mut rx) = rx {
            if let Ok(summary) = rx.wait_for(|s| s.is_some()).await {
                return summary.clone();
            }
        }
        self.inner.lock_last_exit().clone()
    }

    pub fn sink(&self) -> &LogSink {
        &self.inner.sink
    }

    pub fn register(&self, observer: Arc<dyn LogObserver>) -> ObserverId {
        self.inner.sink.register(observer)
    }

    pub fn unregister(&self, id: ObserverId) -> bool {
        self.inner.sink.unregister(id)
    }

    pub fn subscribe(&self) -> LogSubscription {
        self.inner.sink.subscribe()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

/// True once the monitor reported an exit (or went away) within `limit`
async fn wait_for_exit(rx: &mut ExitReceiver, limit: Duration) -> bool {
    match tokio::time::timeout(limit, rx.wait_for(|s| s.is_some())).await {
        Ok(Ok(_)) => true,
        // Sender dropped: the monitor is gone, and the child with it
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}

async fn monitor_child(
    inner: Arc<Inner>,
    session: u64,
    mut child: Child,
    readers: Vec<JoinHandle<CaptureStats>>,
    capture_stop: Arc<watch::Sender<bool>>,
    stop_requested: Arc<AtomicBool>,
    exit_tx: watch::Sender<Option<ExitSummary>>,
) {
    let status = child.wait().await;
    let requested = stop_requested.load(Ordering::SeqCst);
    let summary = match status {
        Ok(status) => ExitSummary::from_status(&status, requested),
        Err(e) => {
            warn!(session, "Failed to collect exit status: {}", e);
            ExitSummary::unknown(requested)
        }
    };
    debug!(session, code = ?summary.code, signal = ?summary.signal, "Child exited");

    let drain = futures::future::join_all(readers);
    tokio::pin!(drain);
    let results = match tokio::time::timeout(inner.config.drain_timeout, &mut drain).await {
        Ok(results) => results,
        Err(_) => {
            debug!(session, "Capture still open after exit, cancelling readers");
            let _ = capture_stop.send(true);
            drain.await
        }
    };
    for result in results {
        if let Err(e) = result {
            warn!(session, "Capture reader failed: {}", e);
        }
    }

    inner.finish_session(session, &summary).await;
    let _ = exit_tx.send(Some(summary));
}
