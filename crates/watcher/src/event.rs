//! Translation of `notify` events into journal changes

use dirwatch_journal::ChangeKind;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A change ready to be handed to the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub is_directory: bool,
    pub previous_path: Option<PathBuf>,
}

impl ObservedChange {
    fn new(kind: ChangeKind, path: PathBuf, is_directory: bool) -> Self {
        Self {
            kind,
            path,
            is_directory,
            previous_path: None,
        }
    }

    fn moved(from: PathBuf, to: PathBuf, is_directory: bool) -> Self {
        Self {
            kind: ChangeKind::Moved,
            path: to,
            is_directory,
            previous_path: Some(from),
        }
    }
}

/// How long a lone rename `From` waits for its `To` before counting as a delete
pub const RENAME_PAIR_WINDOW: Duration = Duration::from_secs(1);

/// Matched pairs remembered so a trailing `Both` is not counted again
const RECENT_MOVES: usize = 16;

/// First half of a rename waiting for its partner
#[derive(Debug)]
struct PendingRename {
    path: PathBuf,
    tracker: Option<usize>,
    is_directory: bool,
    seen_at: Instant,
}

/// Stateful mapping of backend events to changes
///
/// inotify sends `From`, `To` and then a `Both` sharing one cookie. Windows
/// sends only the two halves. A move across the watched root boundary arrives
/// as a lone `From` (moved out) or `To` (moved in). Halves are paired here; a
/// lone `To` is a create and a `From` nobody claims is a delete.
///
/// Directory modifications are dropped (they fire for every child change).
#[derive(Debug, Default)]
pub struct EventTranslator {
    pending: Option<PendingRename>,
    recent_moves: VecDeque<(PathBuf, PathBuf)>,
    /// Directories seen during this run; removals often lack a folder flag
    directories: HashSet<PathBuf>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one backend event to zero or more changes
    pub fn translate(&mut self, event: &Event) -> Vec<ObservedChange> {
        let mut changes = Vec::new();

        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                changes.extend(self.flush_pending());
                if let Some(path) = event.paths.first() {
                    self.pending = Some(PendingRename {
                        path: path.clone(),
                        tracker: event.tracker(),
                        is_directory: self.directories.contains(path),
                        seen_at: Instant::now(),
                    });
                }
            }

            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                if let Some(to) = event.paths.first() {
                    match self.pending.take() {
                        Some(from) if from.tracker == event.tracker() => {
                            changes.push(self.paired_move(from.path, to.clone()));
                        }
                        unmatched => {
                            if let Some(from) = unmatched {
                                changes.push(self.deleted(from.path, from.is_directory));
                            }
                            changes.push(self.created(to.clone()));
                        }
                    }
                }
            }

            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to, ..] = event.paths.as_slice() {
                    let key = (from.clone(), to.clone());
                    if let Some(pos) = self.recent_moves.iter().position(|m| *m == key) {
                        // Already reported from its halves
                        self.recent_moves.remove(pos);
                    } else {
                        changes.extend(self.flush_pending());
                        changes.push(self.moved(from.clone(), to.clone()));
                    }
                }
            }

            EventKind::Modify(ModifyKind::Name(_)) => {
                changes.extend(self.flush_pending());
                // Backends that cannot pair renames report each side on its own
                for path in &event.paths {
                    let change = if path.exists() {
                        self.created(path.clone())
                    } else {
                        let is_dir = self.directories.contains(path);
                        self.deleted(path.clone(), is_dir)
                    };
                    changes.push(change);
                }
            }

            EventKind::Create(kind) => {
                changes.extend(self.flush_pending());
                for path in &event.paths {
                    let is_dir = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        _ => path.is_dir(),
                    };
                    changes.push(self.note(ObservedChange::new(
                        ChangeKind::Created,
                        path.clone(),
                        is_dir,
                    )));
                }
            }

            EventKind::Remove(kind) => {
                changes.extend(self.flush_pending());
                for path in &event.paths {
                    // The path is gone; fall back to what this run has seen
                    let is_dir = match kind {
                        RemoveKind::Folder => true,
                        RemoveKind::File => false,
                        _ => self.directories.contains(path),
                    };
                    changes.push(self.deleted(path.clone(), is_dir));
                }
            }

            EventKind::Modify(_) => {
                changes.extend(self.flush_pending());
                changes.extend(
                    event
                        .paths
                        .iter()
                        .filter(|path| !path.is_dir())
                        .map(|path| ObservedChange::new(ChangeKind::Modified, path.clone(), false)),
                );
            }

            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        changes
    }

    /// Report a waiting `From` as deleted
    pub fn flush_pending(&mut self) -> Option<ObservedChange> {
        let from = self.pending.take()?;
        Some(self.deleted(from.path, from.is_directory))
    }

    /// Like `flush_pending`, but only once the `From` has waited `max_age`
    pub fn flush_stale(&mut self, max_age: Duration) -> Option<ObservedChange> {
        let stale = self
            .pending
            .as_ref()
            .is_some_and(|from| from.seen_at.elapsed() >= max_age);
        if stale {
            self.flush_pending()
        } else {
            None
        }
    }

    fn paired_move(&mut self, from: PathBuf, to: PathBuf) -> ObservedChange {
        if self.recent_moves.len() == RECENT_MOVES {
            self.recent_moves.pop_front();
        }
        self.recent_moves.push_back((from.clone(), to.clone()));
        self.moved(from, to)
    }

    fn moved(&mut self, from: PathBuf, to: PathBuf) -> ObservedChange {
        let is_dir = to.is_dir() || self.directories.contains(&from);
        self.forget_directory(&from);
        self.note(ObservedChange::moved(from, to, is_dir))
    }

    fn created(&mut self, path: PathBuf) -> ObservedChange {
        let is_dir = path.is_dir();
        self.note(ObservedChange::new(ChangeKind::Created, path, is_dir))
    }

    fn deleted(&mut self, path: PathBuf, is_directory: bool) -> ObservedChange {
        self.forget_directory(&path);
        ObservedChange::new(ChangeKind::Deleted, path, is_directory)
    }

    fn note(&mut self, change: ObservedChange) -> ObservedChange {
        if change.is_directory {
            self.directories.insert(change.path.clone());
        }
        change
    }

    fn forget_directory(&mut self, path: &Path) {
        if self.directories.remove(path) {
            self.directories.retain(|dir| !dir.starts_with(path));
        }
    }
}
