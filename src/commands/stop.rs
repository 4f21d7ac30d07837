//! Implementation of the stop command.
//!
//! This command cleanly terminates a running sunsetter instance by sending
//! SIGTERM and waiting for the process to go away.

use anyhow::Result;
use std::time::Duration;

use crate::common::constants::*;
use crate::io::instance;

const POLL_INTERVAL_MS: u64 = 100;

/// Handle the stop command to terminate a running sunsetter instance.
pub fn handle_stop_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let info = super::require_running_instance()?;
    log_block_start!("Stopping sunsetter instance (PID: {})...", info.pid);

    instance::terminate_instance(info.pid)?;

    if debug_enabled {
        log_pipe!();
        log_debug!("SIGTERM sent to process {}", info.pid);
    }

    if wait_for_exit(info.pid, Duration::from_millis(STOP_TIMEOUT_MS)) {
        log_pipe!();
        log_info!("Process terminated successfully");
    } else {
        log_pipe!();
        log_warning!("Process did not terminate within the expected time");
        log_indented!(
            "The termination signal was sent, but the process may still be shutting down"
        );
    }

    log_end!();
    Ok(())
}

/// Poll until `pid` is gone. Returns false on timeout.
fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let max_attempts = timeout.as_millis() as u64 / POLL_INTERVAL_MS;

    for _ in 0..max_attempts {
        if !instance::is_instance_running(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }

    !instance::is_instance_running(pid)
}
