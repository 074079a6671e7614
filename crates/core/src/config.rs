//! Monitoring constants and runtime configuration
//!
//! The watched root, report hours and intervals are fixed constants. They are
//! gathered into a `MonitorConfig` value that is handed to each component, so
//! tests can substitute temporary paths and short intervals.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Monitored root directory (a mounted network share)
#[cfg(not(windows))]
pub const WATCH_PATH: &str = "/mnt/central-office/system-team/03_UserLocal";

/// Monitored root directory (a mapped network drive)
#[cfg(windows)]
pub const WATCH_PATH: &str = r"M:\central-office\system-team\03_UserLocal";

/// Hours of the day (local time) at which a report is printed
pub const REPORT_HOURS: [u32; 4] = [6, 10, 14, 17];

/// Days of change history kept in memory
pub const RETAIN_DAYS: u32 = 7;

/// Interval between root existence checks and retention trims
pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(300);

/// Poll interval while the root is unreachable
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

/// Longest single sleep of the report scheduler before re-reading the clock
pub const MAX_WAIT_SLICE: Duration = Duration::from_secs(60);

/// Pause after a report so the same minute cannot trigger twice
pub const REPORT_COOLDOWN: Duration = Duration::from_secs(61);

/// Grace period between SIGTERM and SIGKILL when stopping the daemon
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// How long `start` waits before checking that the daemon survived startup
pub const START_CHECK_DELAY: Duration = Duration::from_secs(2);

/// Environment variable overriding the state directory (PID file, logs)
pub const STATE_DIR_ENV: &str = "DIRWATCH_STATE_DIR";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one report hour is required")]
    NoReportHours,

    #[error("invalid report hour {0} (must be 0-23)")]
    InvalidReportHour(u32),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("could not determine a state directory (set {STATE_DIR_ENV})")]
    NoStateDir,
}

/// Runtime configuration shared by the daemon components
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Root directory watched recursively
    pub watch_path: PathBuf,
    /// Report trigger hours (local time)
    pub report_hours: Vec<u32>,
    /// Retention window for date buckets
    pub retain_days: u32,
    /// Existence check / trim interval
    pub housekeeping_interval: Duration,
    /// Poll interval while the root is missing
    pub reconnect_interval: Duration,
    /// Directory holding the PID file and logs
    pub state_dir: PathBuf,
}

impl MonitorConfig {
    /// Build the fixed configuration, resolving the state directory
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self {
            state_dir: default_state_dir()?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_hours.is_empty() {
            return Err(ConfigError::NoReportHours);
        }
        if let Some(&hour) = self.report_hours.iter().find(|&&h| h > 23) {
            return Err(ConfigError::InvalidReportHour(hour));
        }
        if self.housekeeping_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("housekeeping_interval"));
        }
        if self.reconnect_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("reconnect_interval"));
        }
        Ok(())
    }

    /// Path of the PID sentinel file
    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join("monitor.pid")
    }

    /// Directory for daemon logs and redirected report output
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Comma-separated trigger times for display ("6:00, 10:00, ...")
    pub fn report_times_display(&self) -> String {
        self.report_hours
            .iter()
            .map(|h| format!("{}:00", h))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_path: PathBuf::from(WATCH_PATH),
            report_hours: REPORT_HOURS.to_vec(),
            retain_days: RETAIN_DAYS,
            housekeeping_interval: HOUSEKEEPING_INTERVAL,
            reconnect_interval: RECONNECT_INTERVAL,
            state_dir: PathBuf::from(".dirwatch"),
        }
    }
}

/// Resolve the state directory: `$DIRWATCH_STATE_DIR`, else `<data_local_dir>/dirwatch`
pub fn default_state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    dirs::data_local_dir()
        .map(|dir| dir.join("dirwatch"))
        .ok_or(ConfigError::NoStateDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.report_hours, vec![6, 10, 14, 17]);
        assert_eq!(config.retain_days, 7);
        assert_eq!(config.housekeeping_interval, Duration::from_secs(300));
        assert_eq!(config.reconnect_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_bad_hours() {
        let mut config = MonitorConfig::default();
        config.report_hours = vec![];
        assert_eq!(config.validate(), Err(ConfigError::NoReportHours));

        config.report_hours = vec![6, 24];
        assert_eq!(config.validate(), Err(ConfigError::InvalidReportHour(24)));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = MonitorConfig::default();
        config.reconnect_interval = Duration::ZERO;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval("reconnect_interval"))
        );
    }

    #[test]
    fn test_report_times_display() {
        let config = MonitorConfig::default();
        assert_eq!(config.report_times_display(), "6:00, 10:00, 14:00, 17:00");
    }

    #[test]
    fn test_state_paths() {
        let config = MonitorConfig {
            state_dir: PathBuf::from("/tmp/dw"),
            ..MonitorConfig::default()
        };
        assert_eq!(config.pid_file(), PathBuf::from("/tmp/dw/monitor.pid"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/dw/logs"));
    }
}
