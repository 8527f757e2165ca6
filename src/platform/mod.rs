//! Platform abstraction layer
//!
//! This module provides a unified interface for platform-specific operations,
//! abstracting away differences between Unix and Windows process control.

mod traits;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use std::sync::Arc;

pub use traits::*;

/// Platform implementation factory
pub struct Platform;

impl Platform {
    /// Get the platform-specific signal operations
    pub fn signals() -> Arc<dyn SignalOps> {
        #[cfg(unix)]
        {
            Arc::new(unix::UnixSignals::new())
        }

        #[cfg(windows)]
        {
            Arc::new(windows::WindowsSignals::new())
        }

        #[cfg(not(any(unix, windows)))]
        {
            compile_error!("Unsupported platform");
        }
    }
}
