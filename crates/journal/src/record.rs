//! Change record data structures

use chrono::{DateTime, Local, NaiveDate};
use std::fmt;
use std::path::PathBuf;

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File or directory created
    Created,
    /// File contents or metadata changed
    Modified,
    /// File or directory deleted
    Deleted,
    /// File or directory moved or renamed
    Moved,
}

impl ChangeKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Moved => "moved",
        }
    }

    /// Label used in printed reports
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Created => "新規作成",
            ChangeKind::Modified => "更新",
            ChangeKind::Deleted => "削除",
            ChangeKind::Moved => "移動・リネーム",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// When the change was recorded (not the OS event time)
    pub timestamp: DateTime<Local>,
    /// Kind of change
    pub kind: ChangeKind,
    /// Path affected (destination path for moves)
    pub path: PathBuf,
    /// Whether the path is a directory
    pub is_directory: bool,
    /// Source path of a move; always `None` for other kinds
    pub previous_path: Option<PathBuf>,
}

impl ChangeRecord {
    /// Create a record, dropping `previous_path` unless the kind is `Moved`
    pub fn new(
        timestamp: DateTime<Local>,
        kind: ChangeKind,
        path: impl Into<PathBuf>,
        is_directory: bool,
        previous_path: Option<PathBuf>,
    ) -> Self {
        let previous_path = match kind {
            ChangeKind::Moved => previous_path,
            _ => None,
        };

        Self {
            timestamp,
            kind,
            path: path.into(),
            is_directory,
            previous_path,
        }
    }

    /// Date bucket this record belongs to (local calendar date)
    pub fn bucket_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
