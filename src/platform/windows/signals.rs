//! Windows signal operations
//!
//! Windows has no Unix-style signals; termination goes through `taskkill`
//! on the whole process tree.

use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::platform::traits::SignalOps;

pub struct WindowsSignals;

impl WindowsSignals {
    pub fn new() -> Self {
        Self
    }

    async fn taskkill(&self, pid: u32, force: bool) -> Result<()> {
        let pid_arg = pid.to_string();
        let mut args = vec!["/pid", pid_arg.as_str(), "/t"];
        if force {
            args.push("/f");
        }

        let status = Command::new("taskkill")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::SignalSendFailed {
                signal: if force { "Kill" } else { "Terminate" }.to_string(),
                reason: e.to_string(),
            })?;

        if status.success() || !self.is_process_running(pid) {
            Ok(())
        } else {
            Err(Error::SignalSendFailed {
                signal: if force { "Kill" } else { "Terminate" }.to_string(),
                reason: format!("taskkill exited with {}", status),
            })
        }
    }
}

impl Default for WindowsSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalOps for WindowsSignals {
    async fn send_terminate(&self, pid: u32) -> Result<()> {
        self.taskkill(pid, false).await
    }

    async fn send_kill(&self, pid: u32) -> Result<()> {
        self.taskkill(pid, true).await
    }

    fn is_process_running(&self, pid: u32) -> bool {
        std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }
}
