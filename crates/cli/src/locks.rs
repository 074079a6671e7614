//! PID sentinel file for daemon exclusivity

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::process::is_pid_running;

/// Held by the running daemon; removes the PID file when dropped
pub struct DaemonLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// PID file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidRecord {
    pub pid: u32,
    pub started_at: u64,
}

impl DaemonLock {
    /// Acquire the daemon lock and write our PID into `pid_path`
    ///
    /// Returns error if:
    /// - Lock is already held by a running process
    /// - Permission denied
    pub fn acquire(pid_path: &Path) -> Result<Self> {
        Self::acquire_with_retry(pid_path, true)
    }

    fn acquire_with_retry(pid_path: &Path, retry: bool) -> Result<Self> {
        // Ensure state directory exists
        if let Some(parent) = pid_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create state directory")?;
        }

        // Try to open/create lock file
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(pid_path)
            .context("Failed to open PID file")?;

        // Without flock (non-unix) the recorded PID is the only guard
        if let Ok(content) = Self::read_lock_content(&mut file) {
            if content.pid != std::process::id() && is_pid_running(content.pid) && !cfg!(unix) {
                anyhow::bail!("監視プロセスは既に実行中です (PID: {})", content.pid);
            }
        }

        // Try to acquire exclusive lock (non-blocking)
        if !try_flock_exclusive(&file)? {
            // Lock held - check if stale
            if retry && Self::is_stale_lock(&mut file)? {
                tracing::warn!("Removing stale daemon PID file");
                drop(file);
                std::fs::remove_file(pid_path)?;
                return Self::acquire_with_retry(pid_path, false);
            }

            let holder = Self::read_lock_content(&mut file)
                .map(|c| c.pid.to_string())
                .unwrap_or_else(|_| "?".to_string());
            anyhow::bail!("監視プロセスは既に実行中です (PID: {})", holder);
        }

        // Write PID to lock file
        Self::write_lock_content(&mut file)?;

        Ok(Self {
            path: pid_path.to_path_buf(),
            file,
        })
    }

    /// Release the lock and remove the PID file
    pub fn release(self) -> Result<()> {
        // File lock is released when the file is dropped
        std::fs::remove_file(&self.path).context("Failed to remove PID file")?;
        Ok(())
    }

    /// Check if lock file represents a stale lock
    fn is_stale_lock(file: &mut File) -> Result<bool> {
        match Self::read_lock_content(file) {
            Ok(content) => Ok(!is_pid_running(content.pid)),
            // Unreadable content is treated as stale
            Err(_) => Ok(true),
        }
    }

    /// Write lock content (PID + timestamp)
    fn write_lock_content(file: &mut File) -> Result<()> {
        let content = PidRecord {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize PID file content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read lock content from file
    fn read_lock_content(file: &mut File) -> Result<PidRecord> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        parse_pid_file(&contents)
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        // Ensure PID file is removed on drop
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Parse PID file content: JSON record, or a bare PID
fn parse_pid_file(contents: &str) -> Result<PidRecord> {
    let trimmed = contents.trim();
    if let Ok(record) = serde_json::from_str::<PidRecord>(trimmed) {
        return Ok(record);
    }

    let pid: u32 = trimmed
        .parse()
        .with_context(|| format!("Invalid PID file content: {:?}", trimmed))?;
    Ok(PidRecord { pid, started_at: 0 })
}

/// Read the PID file without locking it; `None` if missing or unreadable
pub fn read_pid_file(path: &Path) -> Option<PidRecord> {
    let contents = std::fs::read_to_string(path).ok()?;
    parse_pid_file(&contents).ok()
}

/// Delete the PID file, ignoring a missing file
pub fn remove_pid_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context("Failed to remove PID file"),
    }
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
