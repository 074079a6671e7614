//! Date-bucketed change journal

use crate::{ChangeKind, ChangeRecord, RetentionPolicy};
use chrono::{DateTime, Local, NaiveDate};
use dirwatch_core::Clock;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// In-memory journal of filesystem changes, bucketed by local date
///
/// All access goes through one mutex. Records are appended to the bucket for
/// their date; only `trim` removes whole buckets.
pub struct ChangeJournal {
    /// Date bucket -> records in append order
    buckets: Mutex<BTreeMap<NaiveDate, Vec<ChangeRecord>>>,
    /// Source of record timestamps
    clock: Arc<dyn Clock>,
}

impl ChangeJournal {
    /// Create an empty journal stamping records with `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Record a change observed now
    pub fn record(
        &self,
        kind: ChangeKind,
        path: impl Into<PathBuf>,
        is_directory: bool,
        previous_path: Option<PathBuf>,
    ) -> ChangeRecord {
        let path = path.into();
        let mut buckets = self.buckets.lock();

        // Stamp under the lock so append order within a bucket is time order
        let record = ChangeRecord::new(self.clock.now(), kind, path, is_directory, previous_path);
        debug!(kind = %record.kind, path = %record.path.display(), "Recorded change");

        buckets
            .entry(record.bucket_date())
            .or_default()
            .push(record.clone());
        record
    }

    /// Insert an already stamped record into the bucket for its own date
    pub fn append(&self, record: ChangeRecord) {
        self.buckets
            .lock()
            .entry(record.bucket_date())
            .or_default()
            .push(record);
    }

    /// All records with `timestamp > watermark`, oldest first
    pub fn read_since(&self, watermark: DateTime<Local>) -> Vec<ChangeRecord> {
        let mut records: Vec<ChangeRecord> = {
            let buckets = self.buckets.lock();
            buckets
                .range(watermark.date_naive()..)
                .flat_map(|(_, records)| records.iter())
                .filter(|record| record.timestamp > watermark)
                .cloned()
                .collect()
        };

        records.sort_by_key(|record| record.timestamp);
        records
    }

    /// Drop buckets dated strictly before `today - retain_days`
    ///
    /// Returns the number of buckets removed.
    pub fn trim(&self, retain_days: u32) -> usize {
        self.apply_retention(&RetentionPolicy::new(retain_days))
    }

    /// Drop buckets expired under `policy`
    pub fn apply_retention(&self, policy: &RetentionPolicy) -> usize {
        let today = self.clock.now().date_naive();
        let cutoff = policy.cutoff(today);

        let mut buckets = self.buckets.lock();
        let before = buckets.len();

        // split_off keeps [cutoff, ..] in the returned map
        let retained = buckets.split_off(&cutoff);
        *buckets = retained;

        let removed = before - buckets.len();
        if removed > 0 {
            info!(removed, %cutoff, "Trimmed expired change buckets");
        }
        removed
    }

    /// Dates that currently have a bucket, ascending
    pub fn bucket_dates(&self) -> Vec<NaiveDate> {
        self.buckets.lock().keys().copied().collect()
    }

    /// Total number of records across all buckets
    pub fn len(&self) -> usize {
        self.buckets.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
