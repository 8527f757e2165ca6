//! Input Bridge
//!
//! Relays the single "continue" keystroke into the child's stdin, gated on
//! AwaitingInputFlag. The flag is cleared only after the write was accepted,
//! and only if no newer prompt was detected while writing.

use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::sink::LogSink;
use super::state::SessionState;
use crate::error::{Error, Result};
use crate::models::{LogSource, Severity};

/// Token written to the child for one continue
pub const CONTINUE_TOKEN: &[u8] = b"\n";

/// Echo published after a successful relay
pub const CONTINUE_ECHO: &str = "> (ENTER)";

type ChildStdin = Box<dyn AsyncWrite + Send + Unpin>;

pub struct InputBridge {
    stdin: Mutex<Option<(u64, ChildStdin)>>,
    state: Arc<SessionState>,
    sink: LogSink,
}

impl InputBridge {
    pub fn new(state: Arc<SessionState>, sink: LogSink) -> Self {
        Self {
            stdin: Mutex::new(None),
            state,
            sink,
        }
    }

    /// Take ownership of the stdin of `session`
    pub async fn attach<W>(&self, session: u64, writer: W)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        *self.stdin.lock().await = Some((session, Box::new(writer)));
    }

    /// Drop the stdin of `session`; a newer session's stdin is left alone
    pub async fn detach(&self, session: u64) {
        let mut stdin = self.stdin.lock().await;
        if matches!(&*stdin, Some((owner, _)) if *owner == session) {
            *stdin = None;
        }
    }

    /// Write one continue token if the child is awaiting input
    pub async fn send_continue(&self) -> Result<()> {
        let mut guard = self.stdin.lock().await;

        if !self.state.is_awaiting_input() {
            return Err(Error::NotAwaitingInput);
        }

        let (session, writer) = match &mut *guard {
            Some((session, writer)) if *session == self.state.current_session() => {
                (*session, writer)
            }
            _ => return Err(Error::NotAwaitingInput),
        };
        let epoch = self.state.prompt_epoch();

        let write = async {
            writer.write_all(CONTINUE_TOKEN).await?;
            writer.flush().await
        };
        if let Err(e) = write.await {
            warn!(session, "Failed to relay continue: {}", e);
            return Err(Error::InputWriteFailed {
                reason: e.to_string(),
            });
        }

        if !self.state.clear_awaiting(session, epoch) {
            debug!(session, "Next prompt arrived during relay, keeping flag");
        }
        drop(guard);

        info!(session, "Relayed continue to child");
        self.sink
            .publish(LogSource::System, Severity::Info, CONTINUE_ECHO.to_string());
        Ok(())
    }
}
