//! Windows-specific platform implementations

mod signals;

pub use signals::WindowsSignals;
