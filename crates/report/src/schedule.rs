//! Daily trigger schedule

use chrono::{Days, NaiveDateTime, NaiveTime, Timelike};
use dirwatch_core::ConfigError;

/// Fixed set of daily report times, on the hour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSchedule {
    /// Sorted, de-duplicated trigger times
    times: Vec<NaiveTime>,
}

impl TriggerSchedule {
    /// Build a schedule from hours of the day (0-23)
    pub fn new(hours: &[u32]) -> Result<Self, ConfigError> {
        let mut hours = hours.to_vec();
        hours.sort_unstable();
        hours.dedup();

        let times = hours
            .into_iter()
            .map(|h| NaiveTime::from_hms_opt(h, 0, 0).ok_or(ConfigError::InvalidReportHour(h)))
            .collect::<Result<Vec<_>, _>>()?;

        if times.is_empty() {
            return Err(ConfigError::NoReportHours);
        }
        Ok(Self { times })
    }

    /// Trigger hours, ascending
    pub fn hours(&self) -> Vec<u32> {
        self.times.iter().map(|t| t.hour()).collect()
    }

    /// Earliest trigger strictly after the current hour
    ///
    /// The hour of `now` itself counts as past, so at 17:00:00 the next
    /// trigger is not 17:00 today. Falls through to the first trigger of the
    /// following day when none remain today.
    pub fn next_trigger(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();

        if let Some(time) = self.times.iter().find(|t| t.hour() > now.hour()) {
            return today.and_time(*time);
        }

        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        tomorrow.and_time(self.times[0])
    }
}
