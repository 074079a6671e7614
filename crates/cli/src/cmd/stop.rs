//! Stop the dirwatch monitor

use crate::locks::{read_pid_file, remove_pid_file};
use crate::process::{ProcessControl, SystemProcesses, Termination};
use anyhow::Result;
use dirwatch_core::config::STOP_GRACE;
use dirwatch_core::MonitorConfig;
use std::path::Path;
use std::time::Duration;

/// What `stop` found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No PID file
    NotRunning,
    /// PID file named a dead process; file removed
    AlreadyStopped,
    Stopped { pid: u32, termination: Termination },
}

pub async fn run(config: MonitorConfig) -> Result<()> {
    let processes = SystemProcesses::new(&config)?;
    let pid_file = config.pid_file();

    // Termination polls with blocking sleeps
    tokio::task::block_in_place(|| stop_monitor(&pid_file, &processes, STOP_GRACE))?;
    Ok(())
}

/// Terminate the monitor named by `pid_file`
pub fn stop_monitor(
    pid_file: &Path,
    processes: &dyn ProcessControl,
    grace: Duration,
) -> Result<StopOutcome> {
    if !pid_file.exists() {
        println!("監視プロセスは実行されていません。");
        return Ok(StopOutcome::NotRunning);
    }

    let record = match read_pid_file(pid_file) {
        Some(record) if processes.is_running(record.pid) => record,
        _ => {
            println!("監視プロセスは既に停止しています。");
            remove_pid_file(pid_file)?;
            return Ok(StopOutcome::AlreadyStopped);
        }
    };

    println!("監視プロセスを停止しています (PID: {})...", record.pid);
    let termination = processes.terminate(record.pid, grace)?;

    match termination {
        Termination::Graceful => println!("ファイル監視プロセスを停止しました。"),
        Termination::Forced => println!("監視プロセスを強制終了しました。"),
    }

    // The daemon removes its own file on graceful exit; a killed one cannot
    remove_pid_file(pid_file)?;

    Ok(StopOutcome::Stopped {
        pid: record.pid,
        termination,
    })
}
