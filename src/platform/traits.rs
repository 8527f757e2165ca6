//! Platform-specific operation traits
//!
//! These traits define the interface for platform-specific operations,
//! allowing for clean abstraction and easier testing.

use crate::error::Result;

/// Platform-specific signal operations used to stop the supervised child
#[async_trait::async_trait]
pub trait SignalOps: Send + Sync {
    /// Request graceful termination of the process and its group
    async fn send_terminate(&self, pid: u32) -> Result<()>;

    /// Forcefully kill the process and its group
    async fn send_kill(&self, pid: u32) -> Result<()>;

    /// Check if a process is still running
    fn is_process_running(&self, pid: u32) -> bool;
}
