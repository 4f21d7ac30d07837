//! Application-wide constants.
//!
//! Scheduling intervals, configuration defaults and validation limits, and the
//! status texts shown by display sinks all live here so they stay in one place.

use crate::config::{ActuatorKind, LocationMode, TrackingPreference};
use crate::core::trigger::TriggerKind;

// # Scheduling

/// A boundary closer than this to the reference time is not armed.
pub const MINIMUM_LEAD_TIME_SECS: i64 = 60;

/// Delay of the retry wake-up armed when tomorrow's sunrise cannot be resolved.
pub const ORACLE_RETRY_DELAY_SECS: i64 = 60;

/// How late a pending wake-up may fire; also the event loop's longest wait slice.
pub const DEFAULT_WAKE_TOLERANCE_SECS: u64 = 60;
pub const MINIMUM_WAKE_TOLERANCE_SECS: u64 = 10;
pub const MAXIMUM_WAKE_TOLERANCE_SECS: u64 = 600;

// # Location

/// Movement needed before significant-change tracking reports a new coordinate.
pub const SIGNIFICANT_CHANGE_METERS: f64 = 500.0;

/// How often continuous tracking re-reads the location.
pub const LOCATION_POLL_INTERVAL_SECS: u64 = 300;

/// Quiet period after a location file event before it is re-read (editors write in steps).
pub const LOCATION_DEBOUNCE_MS: u64 = 500;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// # System monitors

/// Clock-change events this soon after resume are attributed to the resume itself.
pub const RESUME_GRACE_PERIOD_SECS: i64 = 5;

pub const MAX_MONITOR_RESTARTS: u8 = 3;
pub const MONITOR_RESTART_DELAY_MS: u64 = 2000;

/// Symlink naming the system time zone; replaced by `timedatectl set-timezone`.
pub const LOCALTIME_PATH: &str = "/etc/localtime";

/// Replacing the zone symlink is a remove plus a create; both count once.
pub const TIME_ZONE_DEBOUNCE_MS: u64 = 200;

// # Appearance

/// Conventional `EX_NOPERM` exit status; command actuators use it to report missing permission.
pub const PERMISSION_DENIED_EXIT_CODE: i32 = 77;

pub const GNOME_INTERFACE_SCHEMA: &str = "org.gnome.desktop.interface";
pub const GNOME_COLOR_SCHEME_KEY: &str = "color-scheme";

// # Status texts

pub const STATUS_AUTOMATION_PERMISSION: &str = "Automation authorization required";
pub const STATUS_APPEARANCE_ERROR: &str = "Error setting appearance";
pub const STATUS_LOCATION_PERMISSION: &str = "Location authorization required";

// # Configuration defaults

pub const DEFAULT_ACTUATOR: ActuatorKind = ActuatorKind::Auto;
pub const DEFAULT_LOCATION: LocationMode = LocationMode::Auto;
pub const DEFAULT_TRACKING: TrackingPreference = TrackingPreference::Auto;
pub const DEFAULT_TRIGGERS: [TriggerKind; 6] = TriggerKind::ALL;

// # Process

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// How long `stop` waits for the running instance to exit.
pub const STOP_TIMEOUT_MS: u64 = 3000;

#[cfg(test)]
pub mod test_constants {
    pub const SF_LATITUDE: f64 = 37.7749;
    pub const SF_LONGITUDE: f64 = -122.4194;

    pub const TROMSO_LATITUDE: f64 = 69.6492;
    pub const TROMSO_LONGITUDE: f64 = 18.9553;
}
