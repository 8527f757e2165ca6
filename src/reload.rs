//! Hot reload
//!
//! Watches the server's source directory and restarts the server when a
//! file with a watched extension changes. Bursts of changes (editors often
//! save in several steps) collapse into one restart after a quiet period.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::ServerBridge;
use crate::config::ReloadConfig;
use crate::error::{Error, Result};

/// Something that can be restarted when sources change
#[async_trait::async_trait]
pub trait ReloadTarget: Send + Sync + 'static {
    async fn reload(&self, changed: &[PathBuf]);
}

#[async_trait::async_trait]
impl ReloadTarget for ServerBridge {
    async fn reload(&self, changed: &[PathBuf]) {
        info!(files = changed.len(), "Source changed, restarting server");
        let result = self.restart_server().await;
        if !result.success {
            error!(
                "Restart after source change failed: {}",
                result.message.unwrap_or_default()
            );
        }
    }
}

/// Directory watcher driving restarts. Dropping it stops watching.
pub struct ReloadWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
    watch_dir: PathBuf,
}

impl ReloadWatcher {
    /// Start watching `config.watch_dir` recursively
    pub fn spawn<T: ReloadTarget>(target: Arc<T>, config: ReloadConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<PathBuf>();

        let filter = config.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_change(&event.kind) => {
                    for path in event.paths.into_iter().filter(|p| filter.is_watched(p)) {
                        // Closed channel means the watcher is shutting down
                        let _ = event_tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => error!("File watch error: {}", e),
            }
        })
        .map_err(|e| Error::ConfigWatchFailed {
            reason: format!("Failed to create watcher: {}", e),
        })?;

        watcher
            .watch(&config.watch_dir, RecursiveMode::Recursive)
            .map_err(|e| Error::ConfigWatchFailed {
                reason: format!(
                    "Failed to watch directory {}: {}",
                    config.watch_dir.display(),
                    e
                ),
            })?;

        info!(
            dir = %config.watch_dir.display(),
            extensions = ?config.extensions,
            "Watching for source changes"
        );

        let debounce = Duration::from_millis(config.debounce_ms);
        let task = tokio::spawn(run_reload_loop(target, event_rx, debounce));

        Ok(Self {
            _watcher: watcher,
            task,
            watch_dir: config.watch_dir,
        })
    }

    pub fn watch_dir(&self) -> &PathBuf {
        &self.watch_dir
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Collect changed paths until `debounce` passes without a new one,
/// then reload once per burst
async fn run_reload_loop<T: ReloadTarget>(
    target: Arc<T>,
    mut events: mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
) {
    while let Some(first) = events.recv().await {
        let mut changed = vec![first];
        loop {
            match tokio::time::timeout(debounce, events.recv()).await {
                Ok(Some(path)) => {
                    if !changed.contains(&path) {
                        changed.push(path);
                    }
                }
                Ok(None) => return,
                Err(_) => break,
            }
        }

        for path in &changed {
            debug!(path = %path.display(), "Changed");
        }
        target.reload(&changed).await;
    }
    debug!("Reload loop exiting");
}
