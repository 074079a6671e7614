//! Retention policy for date buckets

use chrono::{Days, NaiveDate};
use dirwatch_core::config::RETAIN_DAYS;

/// Retention policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Number of days of buckets to keep before today (default: 7)
    pub retain_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retain_days: RETAIN_DAYS,
        }
    }
}

impl RetentionPolicy {
    pub fn new(retain_days: u32) -> Self {
        Self { retain_days }
    }

    /// Oldest bucket date that is still retained
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.retain_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// True if a bucket dated `date` should be dropped
    pub fn is_expired(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date < self.cutoff(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cutoff_is_today_minus_retain_days() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.cutoff(date(2024, 3, 10)), date(2024, 3, 3));
        assert_eq!(policy.cutoff(date(2024, 3, 2)), date(2024, 2, 24));
    }

    #[test]
    fn test_expiry_is_strictly_before_cutoff() {
        let policy = RetentionPolicy::new(7);
        let today = date(2024, 3, 10);

        assert!(policy.is_expired(date(2024, 2, 29), today));
        assert!(policy.is_expired(date(2024, 3, 2), today));
        assert!(!policy.is_expired(date(2024, 3, 3), today));
        assert!(!policy.is_expired(today, today));
    }

    #[test]
    fn test_zero_days_keeps_only_today() {
        let policy = RetentionPolicy::new(0);
        let today = date(2024, 3, 10);
        assert!(policy.is_expired(date(2024, 3, 9), today));
        assert!(!policy.is_expired(today, today));
    }
}
