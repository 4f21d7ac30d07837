//! Status command: report what the running instance displays.
//!
//! The daemon mirrors its icon and status line into the display state file;
//! this command combines that file with the instance lock. A state file whose
//! PID does not match the running instance is stale and ignored.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::io::instance::{self, InstanceInfo};
use crate::state::display::{self, DisplayState, Icon};

/// What `status` prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub pid: Option<u32>,
    pub icon: Option<Icon>,
    pub status_text: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusReport {
    pub fn new(instance: Option<&InstanceInfo>, display: Option<DisplayState>) -> Self {
        let Some(info) = instance else {
            return StatusReport {
                running: false,
                pid: None,
                icon: None,
                status_text: None,
                updated_at: None,
            };
        };

        let display = display
            .filter(|state| state.pid.is_none_or(|pid| pid == info.pid))
            .unwrap_or_default();

        StatusReport {
            running: true,
            pid: Some(info.pid),
            icon: display.icon,
            status_text: display.status_text,
            updated_at: display.updated_at,
        }
    }
}

pub fn handle_status_command(json: bool) -> Result<()> {
    let instance = instance::get_running_instance()?;
    let display = match instance {
        Some(_) => display::read_display_state(&display::display_state_path())?,
        None => None,
    };

    let report = StatusReport::new(instance.as_ref(), display);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display_human_readable(&report);
    Ok(())
}

fn display_human_readable(report: &StatusReport) {
    let Some(pid) = report.pid else {
        log_error_standalone!("No sunsetter process is running");
        println!("  Start it with 'sunsetter' or 'sunsetter --debug'");
        return;
    };

    println!("       Running: yes (PID: {pid})");
    match report.icon {
        Some(icon) => println!("    Appearance: {} {}", icon.symbol(), icon.mode()),
        None => println!("    Appearance: not set yet"),
    }
    if let Some(ref text) = report.status_text {
        println!("        Status: {text}");
    }
    if let Some(updated_at) = report.updated_at {
        println!(
            "  Last updated: {}",
            updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32) -> InstanceInfo {
        InstanceInfo {
            pid,
            config_dir: None,
        }
    }

    fn state(pid: u32) -> DisplayState {
        DisplayState {
            pid: Some(pid),
            icon: Some(Icon::Night),
            status_text: Some("Sunrise: 5:47 AM".to_string()),
            updated_at: None,
        }
    }

    #[test]
    fn test_not_running_ignores_display_state() {
        let report = StatusReport::new(None, Some(state(42)));
        assert!(!report.running);
        assert_eq!(report.icon, None);
        assert_eq!(report.status_text, None);
    }

    #[test]
    fn test_running_uses_matching_display_state() {
        let report = StatusReport::new(Some(&info(42)), Some(state(42)));
        assert!(report.running);
        assert_eq!(report.pid, Some(42));
        assert_eq!(report.icon, Some(Icon::Night));
        assert_eq!(report.status_text.as_deref(), Some("Sunrise: 5:47 AM"));
    }

    #[test]
    fn test_stale_display_state_is_ignored() {
        let report = StatusReport::new(Some(&info(42)), Some(state(7)));
        assert!(report.running);
        assert_eq!(report.icon, None);
    }

    #[test]
    fn test_json_shape() {
        let report = StatusReport::new(Some(&info(42)), Some(state(42)));
        let value: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["running"], true);
        assert_eq!(value["icon"], "night");
        assert_eq!(value["status_text"], "Sunrise: 5:47 AM");
    }
}
