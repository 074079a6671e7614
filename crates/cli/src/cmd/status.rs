//! Show monitor process status

use crate::locks::{read_pid_file, remove_pid_file};
use crate::process::{ProcessControl, ProcessMetrics, SystemProcesses};
use crate::util;
use anyhow::Result;
use chrono::Local;
use dirwatch_core::MonitorConfig;
use dirwatch_watcher::root_exists;
use owo_colors::OwoColorize;
use std::path::Path;

const HEADER_RULE: &str = "==================================================";

/// Monitor state as seen from the PID file
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorStatus {
    /// No PID file
    Stopped,
    /// Live monitor with its resource usage
    Running {
        pid: u32,
        metrics: ProcessMetrics,
        path_connected: bool,
    },
    /// Live a moment ago but its process info could not be read; file removed
    Unavailable { pid: u32 },
    /// PID file without a live process; file removed
    Stale,
}

pub async fn run(config: MonitorConfig) -> Result<()> {
    let processes = SystemProcesses::new(&config)?;
    let status = collect_status(&config.pid_file(), &config.watch_path, &processes)?;
    print_status(&status);
    Ok(())
}

/// Inspect the PID file, deleting it when it no longer names a monitor
pub fn collect_status(
    pid_file: &Path,
    watch_path: &Path,
    processes: &dyn ProcessControl,
) -> Result<MonitorStatus> {
    if !pid_file.exists() {
        return Ok(MonitorStatus::Stopped);
    }

    let pid = match read_pid_file(pid_file) {
        Some(record) if processes.is_running(record.pid) => record.pid,
        _ => {
            remove_pid_file(pid_file)?;
            return Ok(MonitorStatus::Stale);
        }
    };

    match processes.metrics(pid) {
        Some(metrics) => Ok(MonitorStatus::Running {
            pid,
            metrics,
            path_connected: root_exists(watch_path),
        }),
        None => {
            // Exited between the liveness check and the metrics read
            remove_pid_file(pid_file)?;
            Ok(MonitorStatus::Unavailable { pid })
        }
    }
}

fn print_status(status: &MonitorStatus) {
    println!("{}", HEADER_RULE);
    println!("{}", "ファイル監視システム 状態確認".bold());
    println!("{}", HEADER_RULE);

    match status {
        MonitorStatus::Stopped => {
            println!("ステータス: {}", "停止中".yellow());
            println!("PIDファイル: なし");
            return;
        }
        MonitorStatus::Stale => {
            println!("ステータス: {}", "停止中（PIDファイルのみ残存）".yellow());
        }
        MonitorStatus::Unavailable { pid } => {
            println!("ステータス: {}", "プロセス情報取得失敗".red());
            println!("PID: {}", pid);
        }
        MonitorStatus::Running {
            pid,
            metrics,
            path_connected,
        } => {
            println!("ステータス: {}", "実行中".green());
            println!("PID: {}", pid);
            match metrics.started_at {
                Some(started) => println!(
                    "開始時刻: {} (稼働時間: {})",
                    started.format("%Y-%m-%d %H:%M:%S"),
                    util::format_uptime(started, Local::now())
                ),
                None => println!("開始時刻: {}", "不明".dimmed()),
            }
            println!("CPU使用率: {:.1}%", metrics.cpu_percent);
            println!("メモリ使用量: {}", util::format_size(metrics.memory_bytes));

            if *path_connected {
                println!("監視対象パス: {}", "接続中".green());
            } else {
                println!("監視対象パス: {}", "接続切断".red());
            }
        }
    }

    println!("{}", HEADER_RULE);
}
