//! Scheduled change reports
//!
//! This crate provides:
//! - `TriggerSchedule`: next report time from a fixed set of daily hours
//! - `Report`: grouping and text rendering of a window of changes
//! - `ReportScheduler`: the wait/report loop owning the watermark

pub mod render;
pub mod schedule;
pub mod scheduler;

pub use render::{Report, ReportGroup};
pub use schedule::TriggerSchedule;
pub use scheduler::{ReportScheduler, SchedulerState};
