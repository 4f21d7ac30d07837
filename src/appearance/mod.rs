//! Appearance actuators: the mechanism that actually flips the desktop between
//! light and dark.
//!
//! Every actuator implements [`AppearanceActuator`]. `apply` is synchronous and
//! reports failures classified as [`AutomationError::PermissionDenied`] or
//! [`AutomationError::Other`]; the scheduler reacts to the two differently in
//! what it shows, but neither stops scheduling.
//!
//! ## Actuators
//!
//! - **GNOME** ([`gnome`]): sets `org.gnome.desktop.interface color-scheme` via `gsettings`
//! - **Command** ([`command`]): runs a user-supplied shell command per mode
//! - **Dry run**: only logs, used by `sunsetter simulate`
//!
//! Selection follows the `actuator` config field; `auto` prefers GNOME when
//! `gsettings` is available and falls back to the configured commands.

pub mod command;
pub mod gnome;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::utils::find_in_path;
use crate::config::{ActuatorKind, Config};

pub use command::CommandActuator;
pub use gnome::GnomeActuator;

/// Binary appearance mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppearanceMode {
    Light,
    Dark,
}

impl AppearanceMode {
    /// Dark exactly when it is not daytime.
    pub fn for_daytime(is_daytime: bool) -> Self {
        if is_daytime {
            AppearanceMode::Light
        } else {
            AppearanceMode::Dark
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            AppearanceMode::Light => AppearanceMode::Dark,
            AppearanceMode::Dark => AppearanceMode::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppearanceMode::Light => "light",
            AppearanceMode::Dark => "dark",
        }
    }
}

impl fmt::Display for AppearanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified actuator failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    /// The session refused to let us change the appearance.
    PermissionDenied,
    /// Anything else, with a description for the log.
    Other(String),
}

impl fmt::Display for AutomationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomationError::PermissionDenied => write!(f, "permission to change appearance denied"),
            AutomationError::Other(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for AutomationError {}

/// Something that can switch the desktop appearance.
#[cfg_attr(test, mockall::automock)]
pub trait AppearanceActuator: Send {
    /// Apply `mode`, blocking until the change has been made or refused.
    fn apply(&mut self, mode: AppearanceMode) -> Result<(), AutomationError>;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;
}

/// Actuator that changes nothing and always succeeds.
#[derive(Debug, Default)]
pub struct DryRunActuator {
    applied: Vec<AppearanceMode>,
}

impl DryRunActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> &[AppearanceMode] {
        &self.applied
    }
}

impl AppearanceActuator for DryRunActuator {
    fn apply(&mut self, mode: AppearanceMode) -> Result<(), AutomationError> {
        self.applied.push(mode);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

/// Concrete actuator chosen after resolving `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorType {
    Gnome,
    Command,
}

/// Resolve the configured actuator into a concrete type.
pub fn detect_actuator(config: &Config) -> Result<ActuatorType> {
    let has_commands = config.light_command.is_some() && config.dark_command.is_some();

    match config.actuator.unwrap_or(ActuatorKind::Auto) {
        ActuatorKind::Auto => {
            if find_in_path("gsettings").is_some() {
                Ok(ActuatorType::Gnome)
            } else if has_commands {
                Ok(ActuatorType::Command)
            } else {
                anyhow::bail!(
                    "No appearance actuator available: gsettings is not installed and \
                     light_command/dark_command are not configured"
                )
            }
        }
        ActuatorKind::Gnome => Ok(ActuatorType::Gnome),
        ActuatorKind::Command if has_commands => Ok(ActuatorType::Command),
        ActuatorKind::Command => {
            anyhow::bail!("actuator = \"command\" requires both light_command and dark_command")
        }
    }
}

/// Build the actuator selected by the configuration.
pub fn create_actuator(config: &Config, debug_enabled: bool) -> Result<Box<dyn AppearanceActuator>> {
    let actuator: Box<dyn AppearanceActuator> = match detect_actuator(config)? {
        ActuatorType::Gnome => Box::new(GnomeActuator::new()),
        ActuatorType::Command => {
            let light = config.light_command.clone().unwrap_or_default();
            let dark = config.dark_command.clone().unwrap_or_default();
            Box::new(CommandActuator::new(light, dark))
        }
    };

    if debug_enabled {
        log_pipe!();
        log_debug!("Using {} appearance actuator", actuator.name());
    }

    Ok(actuator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_for_daytime() {
        assert_eq!(AppearanceMode::for_daytime(true), AppearanceMode::Light);
        assert_eq!(AppearanceMode::for_daytime(false), AppearanceMode::Dark);
    }

    #[test]
    fn test_opposite_is_involution() {
        for mode in [AppearanceMode::Light, AppearanceMode::Dark] {
            assert_ne!(mode.opposite(), mode);
            assert_eq!(mode.opposite().opposite(), mode);
        }
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AppearanceMode::Dark).unwrap(),
            "\"dark\""
        );
    }

    #[test]
    fn test_dry_run_records_modes() {
        let mut actuator = DryRunActuator::new();
        actuator.apply(AppearanceMode::Dark).unwrap();
        actuator.apply(AppearanceMode::Light).unwrap();
        assert_eq!(
            actuator.applied(),
            &[AppearanceMode::Dark, AppearanceMode::Light]
        );
    }

    #[test]
    fn test_explicit_command_actuator_requires_commands() {
        let config = Config {
            actuator: Some(ActuatorKind::Command),
            light_command: Some("true".to_string()),
            ..Config::default()
        };
        assert!(detect_actuator(&config).is_err());
    }

    #[test]
    fn test_explicit_gnome_actuator_is_kept() {
        let config = Config {
            actuator: Some(ActuatorKind::Gnome),
            ..Config::default()
        };
        assert_eq!(detect_actuator(&config).unwrap(), ActuatorType::Gnome);
    }

    #[test]
    fn test_command_actuator_created_from_config() {
        let config = Config {
            actuator: Some(ActuatorKind::Command),
            light_command: Some("true".to_string()),
            dark_command: Some("true".to_string()),
            ..Config::default()
        };
        let actuator = create_actuator(&config, false).unwrap();
        assert_eq!(actuator.name(), "command");
    }
}
