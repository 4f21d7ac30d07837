//! GNOME actuator using `gsettings`.
//!
//! Light maps to `color-scheme = 'default'`, dark to `'prefer-dark'`. Other
//! GTK desktops that read the same key (Budgie, Cinnamon with portals) work too.

use std::path::PathBuf;
use std::process::Command;

use super::{AppearanceActuator, AppearanceMode, AutomationError};
use crate::common::constants::{GNOME_COLOR_SCHEME_KEY, GNOME_INTERFACE_SCHEMA};

pub struct GnomeActuator {
    program: PathBuf,
}

impl GnomeActuator {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("gsettings"),
        }
    }

    /// Use a specific `gsettings` binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn color_scheme(mode: AppearanceMode) -> &'static str {
        match mode {
            AppearanceMode::Light => "default",
            AppearanceMode::Dark => "prefer-dark",
        }
    }
}

impl Default for GnomeActuator {
    fn default() -> Self {
        Self::new()
    }
}

/// Map `gsettings` failure output onto an [`AutomationError`].
pub(crate) fn classify_gsettings_failure(stderr: &str) -> AutomationError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("permission denied")
        || lowered.contains("not allowed")
        || lowered.contains("eacces")
    {
        AutomationError::PermissionDenied
    } else {
        let reason = stderr.trim();
        if reason.is_empty() {
            AutomationError::Other("gsettings failed without output".to_string())
        } else {
            AutomationError::Other(format!("gsettings: {reason}"))
        }
    }
}

impl AppearanceActuator for GnomeActuator {
    fn apply(&mut self, mode: AppearanceMode) -> Result<(), AutomationError> {
        let output = Command::new(&self.program)
            .args([
                "set",
                GNOME_INTERFACE_SCHEMA,
                GNOME_COLOR_SCHEME_KEY,
                Self::color_scheme(mode),
            ])
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => AutomationError::PermissionDenied,
                _ => AutomationError::Other(format!("failed to run gsettings: {e}")),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(classify_gsettings_failure(&String::from_utf8_lossy(
                &output.stderr,
            )))
        }
    }

    fn name(&self) -> &'static str {
        "gnome"
    }
}
