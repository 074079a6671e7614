//! Report scheduler state machine
//!
//! Waits for the next trigger hour in bounded slices, prints the window of
//! changes recorded since the previous report, then advances the watermark.

use crate::{Report, TriggerSchedule};
use chrono::{DateTime, Local, NaiveDateTime};
use dirwatch_core::config::{MAX_WAIT_SLICE, REPORT_COOLDOWN};
use dirwatch_core::{Clock, ShutdownListener};
use dirwatch_journal::ChangeJournal;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Scheduler loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Sleeping until the trigger time
    Waiting { next_trigger: NaiveDateTime },
    /// Generating and printing a report
    Reporting,
}

/// Periodic reporter owning the watermark
pub struct ReportScheduler {
    schedule: TriggerSchedule,
    journal: Arc<ChangeJournal>,
    clock: Arc<dyn Clock>,
    /// Everything at or before this time has been reported
    last_report_time: DateTime<Local>,
    /// Longest single sleep before re-reading the clock
    max_wait_slice: Duration,
    /// Pause after each report
    cooldown: Duration,
}

impl ReportScheduler {
    /// Create a scheduler whose watermark starts at the current time
    pub fn new(schedule: TriggerSchedule, journal: Arc<ChangeJournal>, clock: Arc<dyn Clock>) -> Self {
        let last_report_time = clock.now();
        Self {
            schedule,
            journal,
            clock,
            last_report_time,
            max_wait_slice: MAX_WAIT_SLICE,
            cooldown: REPORT_COOLDOWN,
        }
    }

    /// Current watermark
    pub fn last_report_time(&self) -> DateTime<Local> {
        self.last_report_time
    }

    /// Next state after `Reporting` (or at startup)
    fn waiting(&self) -> SchedulerState {
        SchedulerState::Waiting {
            next_trigger: self.schedule.next_trigger(self.clock.now().naive_local()),
        }
    }

    /// Build, print and account for one report
    ///
    /// The watermark moves to the generation time only after the report was
    /// written, so a failed write leaves the window for the next report.
    pub fn generate_report<W: Write>(&mut self, out: &mut W) -> io::Result<Report> {
        let generated_at = self.clock.now();

        // Records stamped after `generated_at` belong to the next window
        let changes: Vec<_> = self
            .journal
            .read_since(self.last_report_time)
            .into_iter()
            .filter(|record| record.timestamp <= generated_at)
            .collect();

        let report = Report::build(generated_at, changes);
        out.write_all(report.render().as_bytes())?;
        out.flush()?;

        self.last_report_time = generated_at;
        Ok(report)
    }

    /// Run until shutdown, writing reports to `out`
    pub async fn run<W: Write + Send>(mut self, mut out: W, mut shutdown: ShutdownListener) {
        let mut state = self.waiting();
        if let SchedulerState::Waiting { next_trigger } = state {
            info!("Report scheduler started (next report at {})", next_trigger);
        }

        loop {
            match state {
                SchedulerState::Waiting { next_trigger } => {
                    let now = self.clock.now().naive_local();
                    if now >= next_trigger {
                        state = SchedulerState::Reporting;
                        continue;
                    }

                    let wait = (next_trigger - now)
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                        .min(self.max_wait_slice);
                    if !shutdown.sleep(wait).await {
                        break;
                    }
                }

                SchedulerState::Reporting => {
                    match self.generate_report(&mut out) {
                        Ok(report) => info!(changes = report.total(), "Printed scheduled report"),
                        Err(e) => error!("Failed to write scheduled report: {}", e),
                    }

                    if !shutdown.sleep(self.cooldown).await {
                        break;
                    }

                    state = self.waiting();
                    if let SchedulerState::Waiting { next_trigger } = state {
                        debug!("Next report at {}", next_trigger);
                    }
                }
            }
        }

        info!("Report scheduler stopped");
    }
}
