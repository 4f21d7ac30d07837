//! Implementation of the geo command.
//!
//! Writes coordinates to `geo.toml` beside the active configuration. A running
//! instance watches that file and reschedules on its own; the command never
//! signals it.

use anyhow::Result;

use crate::common::utils::private_path;
use crate::config::{self, Config};
use crate::geo::Coordinate;
use crate::io::instance;

pub fn handle_geo_command(latitude: f64, longitude: f64, debug_enabled: bool) -> Result<()> {
    log_version!();

    // Adopts the running instance's config dir so both use the same geo.toml
    let running = instance::get_running_instance()?;

    let geo_path = Config::get_geo_path()?;
    config::write_geo_coordinates(&geo_path, latitude, longitude)?;

    log_block_start!(
        "Coordinates set to {}",
        Coordinate::new(latitude, longitude)
    );
    log_indented!("Saved to {}", private_path(&geo_path));

    match running {
        Some(info) => {
            log_block_start!("The running instance (PID: {}) will pick up the new location", info.pid);
            if debug_enabled {
                log_pipe!();
                log_debug!("Location tracking is polled or watched, depending on configuration");
            }
        }
        None => log_block_start!("Start sunsetter to apply the new location"),
    }

    log_end!();
    Ok(())
}
