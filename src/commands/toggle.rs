//! Implementation of the toggle command.
//!
//! Sends SIGUSR1 to the running instance, which flips the appearance without
//! touching its schedule. The next solar boundary still applies as usual.

use anyhow::Result;

use crate::io::instance;

pub fn handle_toggle_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let info = super::require_running_instance()?;
    instance::send_toggle_signal(info.pid)?;

    if debug_enabled {
        log_pipe!();
        log_debug!("SIGUSR1 sent to process {}", info.pid);
    }

    log_block_start!("Asked sunsetter (PID: {}) to flip the appearance", info.pid);
    log_indented!("The schedule is unchanged; the next sunrise or sunset applies as usual");
    log_end!();
    Ok(())
}
