//! Start the dirwatch monitor

use crate::locks::{read_pid_file, remove_pid_file};
use crate::process::{ProcessControl, SystemProcesses};
use anyhow::Result;
use dirwatch_core::config::START_CHECK_DELAY;
use dirwatch_core::MonitorConfig;
use std::path::Path;
use std::time::Duration;

/// Result of a background start attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The PID file already names a live monitor
    AlreadyRunning(u32),
    /// Spawned and still alive after the check delay
    Started(u32),
    /// Spawned but gone by the time of the check
    Exited(u32),
}

pub async fn run(config: MonitorConfig, foreground: bool) -> Result<()> {
    if foreground {
        crate::daemon::run(config).await
    } else {
        let processes = SystemProcesses::new(&config)?;
        match start_background(&config.pid_file(), &processes, START_CHECK_DELAY).await? {
            StartOutcome::AlreadyRunning(_) | StartOutcome::Started(_) => Ok(()),
            StartOutcome::Exited(pid) => anyhow::bail!(
                "監視プロセスの起動に失敗しました (PID: {}, ログ: {})",
                pid,
                processes.output_log().display()
            ),
        }
    }
}

/// Spawn the monitor unless one is already running
pub async fn start_background(
    pid_file: &Path,
    processes: &dyn ProcessControl,
    check_delay: Duration,
) -> Result<StartOutcome> {
    if let Some(record) = read_pid_file(pid_file) {
        if processes.is_running(record.pid) {
            println!("監視プロセスは既に実行中です (PID: {})", record.pid);
            return Ok(StartOutcome::AlreadyRunning(record.pid));
        }
        println!("古いPIDファイルを削除します。");
        remove_pid_file(pid_file)?;
    } else if pid_file.exists() {
        // Unparseable leftovers count as stale too
        println!("古いPIDファイルを削除します。");
        remove_pid_file(pid_file)?;
    }

    println!("ファイル監視プロセスを開始しています...");
    let pid = processes.start()?;
    tracing::info!(pid, "Spawned background monitor");

    // Wait a moment to verify it started
    tokio::time::sleep(check_delay).await;

    if processes.is_running(pid) {
        println!("ファイル監視プロセスを開始しました (PID: {})", pid);
        println!("停止するには dirwatch stop を実行してください。");
        Ok(StartOutcome::Started(pid))
    } else {
        Ok(StartOutcome::Exited(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeProcesses;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_start_spawns_when_no_pid_file() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("monitor.pid");
        let processes = FakeProcesses::default();

        let outcome = start_background(&pid_file, &processes, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::Started(5000));
        assert_eq!(processes.spawned.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_start_refuses_when_already_running() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("monitor.pid");
        std::fs::write(&pid_file, r#"{"pid":42,"started_at":0}"#).unwrap();

        let processes = FakeProcesses::default();
        processes.live.lock().insert(42);

        let outcome = start_background(&pid_file, &processes, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::AlreadyRunning(42));
        assert!(processes.spawned.lock().is_empty());
        assert!(pid_file.exists());
    }

    #[tokio::test]
    async fn test_start_removes_stale_pid_file() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("monitor.pid");
        std::fs::write(&pid_file, "42").unwrap();

        let processes = FakeProcesses::default();
        let outcome = start_background(&pid_file, &processes, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::Started(5000));
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn test_start_reports_early_exit() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("monitor.pid");
        let processes = FakeProcesses {
            crash_on_start: true,
            ..FakeProcesses::default()
        };

        let outcome = start_background(&pid_file, &processes, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(outcome, StartOutcome::Exited(5000));
    }
}
