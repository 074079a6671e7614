//! Daemon lifecycle management
//!
//! Wires the journal, watcher, path supervisor and report scheduler together
//! and runs them until a stop signal arrives.

use crate::locks::DaemonLock;
use anyhow::{Context, Result};
use dirwatch_core::{Clock, MonitorConfig, Shutdown, SystemClock};
use dirwatch_journal::ChangeJournal;
use dirwatch_report::{ReportScheduler, TriggerSchedule};
use dirwatch_watcher::{root_exists, Availability, Housekeeper, JournalSink, PathSupervisor, Watcher};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the monitor in the current process until stopped
pub async fn run(config: MonitorConfig) -> Result<()> {
    let lock = DaemonLock::acquire(&config.pid_file())?;

    if !root_exists(&config.watch_path) {
        anyhow::bail!(
            "監視対象パスが存在しません: {}",
            config.watch_path.display()
        );
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let journal = Arc::new(ChangeJournal::new(clock.clone()));
    let availability = Availability::default();

    let sink = Arc::new(JournalSink::new(journal.clone(), availability.clone()));
    let mut watcher = Watcher::new(&config.watch_path, sink)?;
    watcher.start().context("Failed to start file watcher")?;
    let watcher = Arc::new(Mutex::new(watcher));

    println!("ファイル監視を開始しました: {}", config.watch_path.display());
    println!("レポート時刻: {}", config.report_times_display());
    println!("停止するには dirwatch stop を実行してください。");
    info!(pid = std::process::id(), "Monitor started");

    let (shutdown, listener) = Shutdown::new();
    let shutdown = Arc::new(shutdown);

    // Report scheduler
    let schedule = TriggerSchedule::new(&config.report_hours)?;
    let scheduler = ReportScheduler::new(schedule, journal.clone(), clock);
    let scheduler_task = tokio::spawn(scheduler.run(std::io::stdout(), listener.clone()));

    // Path supervisor with housekeeping
    let supervisor = PathSupervisor::new(
        config.watch_path.clone(),
        config.housekeeping_interval,
        config.reconnect_interval,
        availability,
    );
    let housekeeper = MonitorHousekeeper {
        journal,
        watcher: watcher.clone(),
        retain_days: config.retain_days,
    };
    let supervisor_task = tokio::spawn(supervisor.run(housekeeper, listener));

    // Stop on Ctrl+C or SIGTERM
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_stop_signal().await;
        info!("Stop signal received");
        println!("\n停止シグナルを受信しました。監視を終了します...");
        signal_shutdown.trigger();
    });

    let supervised = supervisor_task
        .await
        .context("Path supervisor task panicked")?;
    if let Err(e) = &supervised {
        error!("Path supervision failed: {:#}", e);
        println!("エラー: {:#}", e);
    }

    shutdown.trigger();
    if let Err(e) = scheduler_task.await {
        error!("Report scheduler task panicked: {}", e);
    }

    watcher.lock().stop();
    println!("ファイル監視を停止しました。");
    info!("Monitor stopped");

    lock.release()?;
    supervised
}

/// Periodic maintenance driven by the path supervisor
struct MonitorHousekeeper {
    journal: Arc<ChangeJournal>,
    watcher: Arc<Mutex<Watcher>>,
    retain_days: u32,
}

impl Housekeeper for MonitorHousekeeper {
    fn housekeep(&mut self) -> Result<()> {
        self.journal.trim(self.retain_days);

        let mut watcher = self.watcher.lock();
        watcher.flush_stale_renames();

        // A watch that failed to re-arm earlier gets another try
        if !watcher.is_running() {
            if let Err(e) = watcher.restart() {
                warn!("Failed to restart file watcher: {}", e);
            }
        }
        Ok(())
    }

    fn on_path_lost(&mut self) -> Result<()> {
        println!("警告: 監視対象パスへの接続が失われました");
        println!("接続復旧を待機中...");
        self.watcher.lock().stop();
        Ok(())
    }

    fn on_path_restored(&mut self) -> Result<()> {
        if let Err(e) = self.watcher.lock().restart() {
            // Retried on the next housekeeping pass
            warn!("Failed to re-arm file watcher: {}", e);
        }
        println!("接続が復旧しました。監視を継続します。");
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
