//! Instance management for sunsetter processes.
//!
//! Builds on the lock file in `io::lock`: the daemon records its PID and
//! custom config directory there, and the client commands (`toggle`, `stop`,
//! `status`) use it to find and signal the running instance.

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};

use crate::common::utils::is_process_running;
use crate::io::lock::{self, LockFile};

/// Information about a running sunsetter instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub pid: u32,
    /// Custom config directory if set
    pub config_dir: Option<PathBuf>,
}

impl InstanceInfo {
    /// Information describing the current process.
    pub fn current() -> Self {
        InstanceInfo {
            pid: std::process::id(),
            config_dir: crate::config::get_custom_config_dir(),
        }
    }

    /// Parse instance info from lock file contents.
    ///
    /// Lock file format:
    /// - Line 1: PID
    /// - Line 2: Config directory (optional, empty if default)
    pub fn from_lock_contents(contents: &str) -> Result<Self> {
        let lines: Vec<&str> = contents.trim_end().lines().collect();

        if lines.is_empty() || lines[0].trim().is_empty() {
            anyhow::bail!("Lock file is empty");
        }

        if lines.len() > 2 {
            anyhow::bail!("Invalid lock file format (expected 1-2 lines)");
        }

        let pid = lines[0]
            .trim()
            .parse::<u32>()
            .context("Invalid PID format in lock file")?;

        let config_dir = lines
            .get(1)
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(PathBuf::from);

        Ok(InstanceInfo { pid, config_dir })
    }

    pub fn to_lock_contents(&self) -> String {
        match self.config_dir {
            Some(ref config_dir) => format!("{}\n{}\n", self.pid, config_dir.display()),
            None => format!("{}\n", self.pid),
        }
    }
}

/// Read the instance recorded in the lock at `lock_path`, if its process is alive.
pub fn read_instance(lock_path: &Path) -> Result<Option<InstanceInfo>> {
    let lock_content = match std::fs::read_to_string(lock_path) {
        Ok(content) => content,
        Err(_) => return Ok(None),
    };

    let info = InstanceInfo::from_lock_contents(&lock_content)?;

    if is_instance_running(info.pid) && info.pid != std::process::id() {
        Ok(Some(info))
    } else {
        Ok(None)
    }
}

/// Get information about the currently running sunsetter instance.
///
/// Also adopts the instance's config directory so client commands read the
/// same files the daemon does.
pub fn get_running_instance() -> Result<Option<InstanceInfo>> {
    let info = read_instance(&lock::get_main_lock_path())?;

    if let Some(ref info) = info
        && let Some(ref config_dir) = info.config_dir
    {
        // Already set by --config
        let _ = crate::config::set_config_dir(Some(config_dir.display().to_string()));
    }

    Ok(info)
}

pub fn is_instance_running(pid: u32) -> bool {
    is_process_running(pid)
}

fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    kill(Pid::from_raw(pid as i32), signal)
        .with_context(|| format!("Failed to send {signal} to process {pid}"))
}

/// Ask an instance to shut down (SIGTERM).
pub fn terminate_instance(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGTERM)
}

/// Ask an instance to flip its appearance (SIGUSR1).
pub fn send_toggle_signal(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGUSR1)
}

/// Take the main lock for this process.
///
/// A lock left behind by a dead process is reclaimed. A live instance is
/// reported with suggestions and turned into an error.
pub fn ensure_single_instance() -> Result<LockFile> {
    acquire_instance_lock(&lock::get_main_lock_path())
}

pub(crate) fn acquire_instance_lock(lock_path: &Path) -> Result<LockFile> {
    if let Some(mut lock) = LockFile::try_acquire(lock_path)? {
        lock.write(&InstanceInfo::current().to_lock_contents())?;
        return Ok(lock);
    }

    handle_instance_conflict(lock_path)?;

    match LockFile::try_acquire(lock_path)? {
        Some(mut lock) => {
            lock.write(&InstanceInfo::current().to_lock_contents())?;
            Ok(lock)
        }
        None => anyhow::bail!("Failed to acquire lock after conflict resolution"),
    }
}

/// Resolve a held lock. Returns `Ok` when the lock turned out to be stale.
fn handle_instance_conflict(lock_path: &Path) -> Result<()> {
    let lock_content = match std::fs::read_to_string(lock_path) {
        Ok(content) => content,
        Err(_) => return Ok(()),
    };

    let info = match InstanceInfo::from_lock_contents(&lock_content) {
        Ok(info) => info,
        Err(_) => {
            log_warning!("Lock file format invalid, removing");
            let _ = std::fs::remove_file(lock_path);
            return Ok(());
        }
    };

    if !is_instance_running(info.pid) {
        log_warning!(
            "Removing stale lock file (process {} no longer running)",
            info.pid
        );
        let _ = std::fs::remove_file(lock_path);
        return Ok(());
    }

    log_pipe!();
    log_error!("sunsetter is already running (PID: {})", info.pid);
    log_block_start!("Did you mean to:");
    log_indented!("• Flip the appearance: sunsetter toggle");
    log_indented!("• Check the schedule: sunsetter status");
    log_indented!("• Stop it: sunsetter stop");
    anyhow::bail!("another sunsetter instance is running")
}
