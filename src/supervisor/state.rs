//! Session State
//!
//! The cross-cutting flags shared by the supervisor, the capture tasks and
//! the input bridge. Every session gets a fresh generation number so late
//! work from a previous child can never touch the current one.

use std::sync::{Mutex, MutexGuard};

use crate::models::ServerStatus;

#[derive(Debug, Default)]
struct Flags {
    session: u64,
    running: bool,
    awaiting_input: bool,
    /// Bumped on every detected prompt, raised or not
    prompt_epoch: u64,
}

/// Running flag plus AwaitingInputFlag, updated together under one lock
#[derive(Debug, Default)]
pub struct SessionState {
    flags: Mutex<Flags>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new session: running, not awaiting input
    pub(crate) fn begin(&self) -> u64 {
        let mut flags = self.lock();
        flags.session += 1;
        flags.running = true;
        flags.awaiting_input = false;
        flags.session
    }

    /// End `session`. Returns false if it already ended or was superseded.
    pub(crate) fn end(&self, session: u64) -> bool {
        let mut flags = self.lock();
        if flags.session != session || !flags.running {
            return false;
        }
        flags.running = false;
        flags.awaiting_input = false;
        true
    }

    /// Raise AwaitingInputFlag for `session`.
    /// Returns true only on a false -> true transition while that session runs.
    pub(crate) fn raise_awaiting(&self, session: u64) -> bool {
        let mut flags = self.lock();
        if flags.session != session || !flags.running {
            return false;
        }
        flags.prompt_epoch += 1;
        if flags.awaiting_input {
            return false;
        }
        flags.awaiting_input = true;
        true
    }

    /// Clear AwaitingInputFlag for `session`, unless a prompt was detected
    /// after `epoch` was read
    pub(crate) fn clear_awaiting(&self, session: u64, epoch: u64) -> bool {
        let mut flags = self.lock();
        if flags.session != session || flags.prompt_epoch != epoch {
            return false;
        }
        flags.awaiting_input = false;
        true
    }

    /// Count of prompts detected so far
    pub(crate) fn prompt_epoch(&self) -> u64 {
        self.lock().prompt_epoch
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.lock().awaiting_input
    }

    /// Generation number of the current (or last) session
    pub fn current_session(&self) -> u64 {
        self.lock().session
    }

    pub fn snapshot(&self) -> ServerStatus {
        let flags = self.lock();
        ServerStatus {
            running: flags.running,
            awaiting_input: flags.awaiting_input,
        }
    }
}
