//! Configuration validation functionality.
//!
//! Rejects values the daemon cannot work with. Every error names the field
//! and, for numbers, the accepted range.

use anyhow::Result;
use chrono_tz::Tz;

use super::{ActuatorKind, Config};
use crate::common::constants::*;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    if config.latitude.is_some() != config.longitude.is_some() {
        anyhow::bail!("latitude and longitude must be set together");
    }

    if let Some(tolerance) = config.wake_tolerance
        && !(MINIMUM_WAKE_TOLERANCE_SECS..=MAXIMUM_WAKE_TOLERANCE_SECS).contains(&tolerance)
    {
        anyhow::bail!(
            "wake_tolerance ({} seconds) must be between {} and {} seconds",
            tolerance,
            MINIMUM_WAKE_TOLERANCE_SECS,
            MAXIMUM_WAKE_TOLERANCE_SECS
        );
    }

    validate_commands(config)?;

    if let Some(ref name) = config.timezone
        && name.parse::<Tz>().is_err()
    {
        anyhow::bail!("timezone '{}' is not a known IANA time zone", name);
    }

    if let Some(ref triggers) = config.triggers {
        if triggers.is_empty() {
            log_pipe!();
            log_warning!("No triggers configured: the appearance is only set at startup");
        }

        for (i, kind) in triggers.iter().enumerate() {
            if triggers[..i].contains(kind) {
                anyhow::bail!("triggers lists '{}' more than once", kind);
            }
        }
    }

    Ok(())
}

fn validate_commands(config: &Config) -> Result<()> {
    for (field, command) in [
        ("light_command", &config.light_command),
        ("dark_command", &config.dark_command),
    ] {
        if let Some(command) = command
            && command.trim().is_empty()
        {
            anyhow::bail!("{} must not be empty", field);
        }
    }

    match (&config.light_command, &config.dark_command) {
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("light_command and dark_command must be set together")
        }
        (None, None) if config.actuator == Some(ActuatorKind::Command) => {
            anyhow::bail!("actuator = \"command\" requires light_command and dark_command")
        }
        _ => Ok(()),
    }
}
