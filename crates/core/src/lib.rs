//! Shared primitives for dirwatch
//!
//! This crate provides:
//! - Fixed monitoring constants and the `MonitorConfig` value built from them
//! - A `Clock` abstraction so time-driven components can be tested
//! - A cooperative `Shutdown` signal observed at every sleep boundary

pub mod clock;
pub mod config;
pub mod shutdown;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, MonitorConfig};
pub use shutdown::{Shutdown, ShutdownListener};
