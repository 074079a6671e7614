//! OS process control for the background daemon

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use dirwatch_core::config::STATE_DIR_ENV;
use dirwatch_core::MonitorConfig;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// How a terminated process went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited after SIGTERM within the grace period
    Graceful,
    /// Had to be killed
    Forced,
}

/// Resource usage of a running process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessMetrics {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub started_at: Option<DateTime<Local>>,
}

/// Process operations used by `start`, `stop` and `status`
pub trait ProcessControl {
    /// Spawn the daemon detached from this terminal, returning its PID
    fn start(&self) -> Result<u32>;

    /// True if `pid` names a live (non-zombie) process
    fn is_running(&self, pid: u32) -> bool;

    /// Ask `pid` to exit, killing it if it is still alive after `force_after`
    fn terminate(&self, pid: u32, force_after: Duration) -> Result<Termination>;

    /// Resource usage of `pid`, if it is still alive
    fn metrics(&self, pid: u32) -> Option<ProcessMetrics>;
}

/// Real process control backed by the OS
pub struct SystemProcesses {
    /// Executable to launch (this binary)
    exe: PathBuf,
    /// Receives the daemon's stdout/stderr (the printed reports)
    output_log: PathBuf,
    /// Passed to the daemon so it uses the same PID file
    state_dir: PathBuf,
}

impl SystemProcesses {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        Ok(Self {
            exe,
            output_log: config.log_dir().join("report.log"),
            state_dir: config.state_dir.clone(),
        })
    }

    /// File the daemon's report output is appended to
    pub fn output_log(&self) -> &PathBuf {
        &self.output_log
    }
}

impl ProcessControl for SystemProcesses {
    fn start(&self) -> Result<u32> {
        if let Some(parent) = self.output_log.parent() {
            std::fs::create_dir_all(parent).context("Failed to create logs directory")?;
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_log)
            .context("Failed to open report log")?;

        let mut command = Command::new(&self.exe);
        command
            .args(["start", "--foreground", "--detached"])
            .env(STATE_DIR_ENV, &self.state_dir)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log);
        detach(&mut command);

        let child = command.spawn().context("Failed to spawn daemon process")?;
        Ok(child.id())
    }

    fn is_running(&self, pid: u32) -> bool {
        is_pid_running(pid)
    }

    fn terminate(&self, pid: u32, force_after: Duration) -> Result<Termination> {
        send_terminate(pid)?;

        let poll = Duration::from_secs(1);
        let mut waited = Duration::ZERO;
        while waited < force_after {
            std::thread::sleep(poll);
            waited += poll;
            if !is_pid_running(pid) {
                return Ok(Termination::Graceful);
            }
        }

        tracing::warn!(pid, "Daemon did not exit within {:?}; killing it", force_after);
        send_kill(pid)?;
        Ok(Termination::Forced)
    }

    fn metrics(&self, pid: u32) -> Option<ProcessMetrics> {
        let pid = Pid::from_u32(pid);
        let refresh = ProcessRefreshKind::nothing().with_cpu().with_memory();
        let mut system = System::new();

        // CPU usage is a delta between two refreshes
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh);
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh);

        let process = system.process(pid).filter(|p| is_live(p))?;
        Some(ProcessMetrics {
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
            started_at: DateTime::from_timestamp(process.start_time() as i64, 0)
                .map(|ts| ts.with_timezone(&Local)),
        })
    }
}

/// True if `pid` names a live (non-zombie) process
pub fn is_pid_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system.process(pid).is_some_and(is_live)
}

fn is_live(process: &Process) -> bool {
    !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

/// Put the daemon in its own process group so terminal signals miss it
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    send_signal(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
fn send_kill(pid: u32) -> Result<()> {
    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid as NixPid;

    let raw = i32::try_from(pid).context("PID out of range")?;
    match kill(NixPid::from_raw(raw), signal) {
        Ok(()) => Ok(()),
        // Already gone
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to send {} to PID {}", signal.as_str(), pid)),
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> Result<()> {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    if let Some(process) = system.process(pid) {
        // Platforms without SIGTERM fall back to a hard kill
        if process.kill_with(sysinfo::Signal::Term).is_none() {
            process.kill();
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_kill(pid: u32) -> Result<()> {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    if let Some(process) = system.process(pid) {
        process.kill();
    }
    Ok(())
}


#[cfg(test)]
pub(crate) mod fake {
    //! In-memory process table for command tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    pub struct FakeProcesses {
        pub live: Mutex<HashSet<u32>>,
        pub spawned: Mutex<Vec<u32>>,
        pub terminated: Mutex<Vec<u32>>,
        /// Spawned processes die immediately
        pub crash_on_start: bool,
        /// Processes ignore SIGTERM and must be killed
        pub ignore_terminate: bool,
        pub metrics: Option<ProcessMetrics>,
    }

    impl FakeProcesses {
        pub fn with_live(pid: u32) -> Self {
            let fake = Self::default();
            fake.live.lock().insert(pid);
            fake
        }
    }

    impl ProcessControl for FakeProcesses {
        fn start(&self) -> Result<u32> {
            let pid = 5000 + self.spawned.lock().len() as u32;
            self.spawned.lock().push(pid);
            if !self.crash_on_start {
                self.live.lock().insert(pid);
            }
            Ok(pid)
        }

        fn is_running(&self, pid: u32) -> bool {
            self.live.lock().contains(&pid)
        }

        fn terminate(&self, pid: u32, _force_after: Duration) -> Result<Termination> {
            self.terminated.lock().push(pid);
            self.live.lock().remove(&pid);
            if self.ignore_terminate {
                Ok(Termination::Forced)
            } else {
                Ok(Termination::Graceful)
            }
        }

        fn metrics(&self, pid: u32) -> Option<ProcessMetrics> {
            if self.is_running(pid) {
                self.metrics.clone()
            } else {
                None
            }
        }
    }
}
