//! In-memory change journal
//!
//! This crate provides:
//! - Change record data structures (`ChangeKind`, `ChangeRecord`)
//! - The date-bucketed `ChangeJournal` shared by the watcher and the scheduler
//! - Retention policy for dropping old buckets

pub mod journal;
pub mod record;
pub mod retention;

// Re-exports
pub use journal::ChangeJournal;
pub use record::{ChangeKind, ChangeRecord};
pub use retention::RetentionPolicy;
