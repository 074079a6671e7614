//! File system watching for dirwatch
//!
//! This crate provides:
//! - A recursive `notify` watch over the monitored root
//! - Translation of backend events into journal changes
//! - A sink that records changes while the root is reachable
//! - Supervision of the root for network-share outages

pub mod event;
pub mod supervisor;

pub use event::{EventTranslator, ObservedChange, RENAME_PAIR_WINDOW};
pub use supervisor::{root_exists, Availability, Housekeeper, PathSupervisor};

use dirwatch_journal::ChangeJournal;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Watcher errors
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("monitored path does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("file watch backend error: {0}")]
    Notify(#[from] notify::Error),
}

/// Receiver of translated changes
///
/// Called from the backend's notification thread.
pub trait ChangeSink: Send + Sync {
    fn deliver(&self, change: ObservedChange);
}

/// Sink recording changes into the journal while the root is online
pub struct JournalSink {
    journal: Arc<ChangeJournal>,
    availability: Availability,
}

impl JournalSink {
    pub fn new(journal: Arc<ChangeJournal>, availability: Availability) -> Self {
        Self {
            journal,
            availability,
        }
    }
}

impl ChangeSink for JournalSink {
    fn deliver(&self, change: ObservedChange) {
        if !self.availability.is_online() {
            trace!(path = %change.path.display(), "Dropping change while path is offline");
            return;
        }

        self.journal.record(
            change.kind,
            change.path,
            change.is_directory,
            change.previous_path,
        );
    }
}

/// Recursive file system watcher over one root
pub struct Watcher {
    /// Monitored root directory
    root: PathBuf,
    /// Destination for translated changes
    sink: Arc<dyn ChangeSink>,
    /// Rename pairing state shared with the backend callback
    translator: Arc<Mutex<EventTranslator>>,
    /// Live backend watch; dropping it stops event delivery
    inner: Option<RecommendedWatcher>,
}

impl Watcher {
    /// Create a new watcher for the given root
    ///
    /// Fails if the root does not exist.
    pub fn new(root: &Path, sink: Arc<dyn ChangeSink>) -> Result<Self, WatchError> {
        if !root_exists(root) {
            return Err(WatchError::RootMissing(root.to_path_buf()));
        }

        Ok(Self {
            root: root.to_path_buf(),
            sink,
            translator: Arc::new(Mutex::new(EventTranslator::new())),
            inner: None,
        })
    }

    /// Start watching for events
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.inner.is_some() {
            return Ok(());
        }

        let sink = self.sink.clone();
        let translator = self.translator.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let mut translator = translator.lock();
                    if let Some(change) = translator.flush_stale(RENAME_PAIR_WINDOW) {
                        sink.deliver(change);
                    }
                    for change in translator.translate(&event) {
                        sink.deliver(change);
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            },
        )?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!("Watching {} (recursive)", self.root.display());

        self.inner = Some(watcher);
        Ok(())
    }

    /// Drop and re-register the backend watch
    ///
    /// Needed after the root came back from an outage: watches on a
    /// vanished mount do not survive it.
    pub fn restart(&mut self) -> Result<(), WatchError> {
        self.stop();
        if !root_exists(&self.root) {
            return Err(WatchError::RootMissing(self.root.clone()));
        }
        self.start()
    }

    /// Stop watching
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.inner.take() {
            // The root may already be gone; nothing to undo then
            if let Err(e) = watcher.unwatch(&self.root) {
                debug!("Unwatch of {} failed: {}", self.root.display(), e);
            }
            info!("Stopped watching {}", self.root.display());
        }
        if let Some(change) = self.translator.lock().flush_pending() {
            self.sink.deliver(change);
        }
    }

    /// Report rename halves whose partner never arrived
    ///
    /// A file moved out of the root only produces a `From`; without later
    /// events it would otherwise wait forever.
    pub fn flush_stale_renames(&self) {
        let stale = self.translator.lock().flush_stale(RENAME_PAIR_WINDOW);
        if let Some(change) = stale {
            debug!(path = %change.path.display(), "Unpaired rename reported as delete");
            self.sink.deliver(change);
        }
    }

    /// True while a backend watch is registered
    pub fn is_running(&self) -> bool {
        self.inner.is_some()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}
