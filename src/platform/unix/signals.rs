//! Unix signal operations
//!
//! The supervised child is spawned as the leader of its own process group,
//! so signals go to the whole group first and fall back to the single pid.

use crate::error::{Error, Result};
use crate::platform::traits::SignalOps;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal as NixSignal};
use nix::unistd::Pid;

pub struct UnixSignals;

impl UnixSignals {
    pub fn new() -> Self {
        Self
    }

    fn signal_group(&self, pid: u32, signal: NixSignal) -> Result<()> {
        let target = Pid::from_raw(pid as i32);
        match killpg(target, signal) {
            Ok(()) => Ok(()),
            // Already gone
            Err(Errno::ESRCH) => Ok(()),
            Err(group_err) => {
                debug!(pid, error = %group_err, "killpg failed, signalling process only");
                match kill(target, signal) {
                    Ok(()) | Err(Errno::ESRCH) => Ok(()),
                    Err(e) => Err(Error::SignalSendFailed {
                        signal: signal.as_str().to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }
}

impl Default for UnixSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalOps for UnixSignals {
    async fn send_terminate(&self, pid: u32) -> Result<()> {
        self.signal_group(pid, NixSignal::SIGTERM)
    }

    async fn send_kill(&self, pid: u32) -> Result<()> {
        self.signal_group(pid, NixSignal::SIGKILL)
    }

    fn is_process_running(&self, pid: u32) -> bool {
        // Signal 0 probes for existence without delivering anything
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }
}
