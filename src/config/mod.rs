//! Configuration system for sunsetter.
//!
//! Settings live in `sunsetter.toml` under `$XDG_CONFIG_HOME/sunsetter/` (or the
//! directory passed with `--config`). A default file is written on first run.
//!
//! ```toml
//! #[Appearance]
//! actuator = "auto"     # "auto", "gnome" or "command"
//! light_command = "..." # Shell command run for light mode (command actuator)
//! dark_command = "..."  # Shell command run for dark mode (command actuator)
//!
//! #[Location]
//! latitude = 37.7749    # Geographic latitude (-90 to 90)
//! longitude = -122.4194 # Geographic longitude (-180 to 180)
//! location = "auto"     # "auto" or "disabled"
//! tracking = "auto"     # "auto", "significant" or "continuous"
//! timezone = "America/Los_Angeles" # Optional IANA zone, defaults to the system zone
//!
//! #[Triggers]
//! triggers = ["location", "authorization", "clock_change", "wake", "timer", "manual"]
//! wake_tolerance = 60   # Seconds a wake-up may fire late (10-600)
//! ```
//!
//! A `geo.toml` next to the main file holding `latitude`/`longitude` takes
//! precedence over the coordinates above. It is the file `sunsetter geo` writes
//! and the one a running instance watches for location changes, so coordinates
//! can stay out of a version-controlled main config.
//!
//! All fields are optional; accessors on [`Config`] supply the defaults from
//! `common::constants`. Validation runs on every load and rejects out-of-range
//! values with a message naming the field.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;

use crate::appearance::ActuatorType;
use crate::common::constants::*;
use crate::core::trigger::TriggerKind;
use crate::geo::Coordinate;

pub use builder::{create_default_config, write_geo_coordinates};
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Coordinates stored separately from the main configuration.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct GeoConfig {
    pub(crate) latitude: Option<f64>,
    pub(crate) longitude: Option<f64>,
}

/// Appearance actuator selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// GNOME when `gsettings` is available, otherwise the configured commands.
    Auto,
    /// `gsettings set org.gnome.desktop.interface color-scheme ...`
    Gnome,
    /// `light_command` / `dark_command` run through `sh -c`.
    Command,
}

impl ActuatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActuatorKind::Auto => "auto",
            ActuatorKind::Gnome => "gnome",
            ActuatorKind::Command => "command",
        }
    }
}

/// Whether location may be used at all.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    Auto,
    /// Location use is restricted; nothing is scheduled.
    Disabled,
}

impl LocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMode::Auto => "auto",
            LocationMode::Disabled => "disabled",
        }
    }
}

/// Preferred location tracking mode.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackingPreference {
    /// Significant-change monitoring when supported, else polling.
    Auto,
    /// Same as `Auto`; kept so the intent can be spelled out.
    Significant,
    Continuous,
}

impl TrackingPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingPreference::Auto => "auto",
            TrackingPreference::Significant => "significant",
            TrackingPreference::Continuous => "continuous",
        }
    }
}

/// Settings loaded from `sunsetter.toml`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub actuator: Option<ActuatorKind>,
    pub light_command: Option<String>,
    pub dark_command: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<LocationMode>,
    pub tracking: Option<TrackingPreference>,
    /// Trigger kinds the daemon listens to; all of them when unset.
    pub triggers: Option<Vec<TriggerKind>>,
    pub wake_tolerance: Option<u64>, // seconds
    pub timezone: Option<String>,
}

impl Config {
    /// Coordinate from the main file, if both halves are set.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn location_disabled(&self) -> bool {
        self.location.unwrap_or(DEFAULT_LOCATION) == LocationMode::Disabled
    }

    pub fn tracking_preference(&self) -> TrackingPreference {
        self.tracking.unwrap_or(DEFAULT_TRACKING)
    }

    pub fn subscribed_triggers(&self) -> Vec<TriggerKind> {
        self.triggers
            .clone()
            .unwrap_or_else(|| DEFAULT_TRIGGERS.to_vec())
    }

    pub fn wake_tolerance(&self) -> Duration {
        let secs = self.wake_tolerance.unwrap_or(DEFAULT_WAKE_TOLERANCE_SECS);
        Duration::seconds(secs as i64)
    }

    /// Configured time zone, `None` for the system local zone.
    pub fn time_zone(&self) -> Result<Option<Tz>> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .with_context(|| format!("Unknown timezone '{name}'"))
            })
            .transpose()
    }

    /// Path of `geo.toml` beside the active configuration file.
    pub fn get_geo_path() -> Result<PathBuf> {
        Ok(loading::get_config_base_dir()?.join("geo.toml"))
    }

    pub fn load() -> Result<Self> {
        load()
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn log_config(&self, resolved_actuator: Option<ActuatorType>) {
        let config_path = Self::get_config_path()
            .map(|p| crate::common::utils::private_path(&p))
            .unwrap_or_else(|_| "sunsetter.toml".to_string());
        log_block_start!("Loaded configuration from {config_path}");

        let actuator = self.actuator.unwrap_or(DEFAULT_ACTUATOR);
        let actuator_display = match (actuator, resolved_actuator) {
            (ActuatorKind::Auto, Some(ActuatorType::Gnome)) => "Auto (GNOME)",
            (ActuatorKind::Auto, Some(ActuatorType::Command)) => "Auto (command)",
            (ActuatorKind::Auto, None) => "Auto",
            (ActuatorKind::Gnome, _) => "GNOME",
            (ActuatorKind::Command, _) => "Command",
        };
        log_indented!("Actuator: {actuator_display}");

        if self.location_disabled() {
            log_indented!("Location: disabled");
        } else {
            if let Ok(geo_path) = Self::get_geo_path()
                && geo_path.exists()
            {
                log_indented!("Coordinates: from geo.toml");
            } else if let Some(coordinate) = self.coordinate() {
                log_indented!("Coordinates: {coordinate}");
            } else {
                log_indented!("Coordinates: not set (use 'sunsetter geo')");
            }
            log_indented!("Tracking: {}", self.tracking_preference().as_str());
        }

        if let Some(ref timezone) = self.timezone {
            log_indented!("Timezone: {timezone}");
        }

        let triggers: Vec<&str> = self
            .subscribed_triggers()
            .iter()
            .map(|kind| kind.as_str())
            .collect();
        log_indented!("Triggers: {}", triggers.join(", "));
        log_indented!(
            "Wake tolerance: {} seconds",
            self.wake_tolerance().num_seconds()
        );
    }
}
