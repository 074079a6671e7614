//! CLI command execution helpers
//!
//! Runs the `dirwatch` binary against an isolated state directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Isolated state directory for one test
pub struct TestState {
    dir: TempDir,
}

impl TestState {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create temp state dir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("monitor.pid")
    }

    /// Build a command bound to this state directory
    pub fn command(&self, args: &[&str]) -> DirwatchCommand {
        DirwatchCommand {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_dirwatch")),
            state_dir: self.dir.path().to_path_buf(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// CLI command builder
pub struct DirwatchCommand {
    binary_path: PathBuf,
    state_dir: PathBuf,
    args: Vec<String>,
}

impl DirwatchCommand {
    /// Execute command and capture its output
    pub fn execute(&self) -> Result<CommandResult> {
        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .env("DIRWATCH_STATE_DIR", &self.state_dir)
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }
}

/// Captured command output
#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
