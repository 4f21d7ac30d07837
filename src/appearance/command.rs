//! Actuator running user-supplied shell commands.
//!
//! The command for the requested mode is run with `sh -c`. Exit status 77
//! (`EX_NOPERM`) or an OS permission error is reported as
//! [`AutomationError::PermissionDenied`]; any other failure as `Other`.

use std::process::Command;

use super::{AppearanceActuator, AppearanceMode, AutomationError};
use crate::common::constants::PERMISSION_DENIED_EXIT_CODE;

pub struct CommandActuator {
    light_command: String,
    dark_command: String,
}

impl CommandActuator {
    pub fn new(light_command: String, dark_command: String) -> Self {
        Self {
            light_command,
            dark_command,
        }
    }

    fn command_for(&self, mode: AppearanceMode) -> &str {
        match mode {
            AppearanceMode::Light => &self.light_command,
            AppearanceMode::Dark => &self.dark_command,
        }
    }
}

impl AppearanceActuator for CommandActuator {
    fn apply(&mut self, mode: AppearanceMode) -> Result<(), AutomationError> {
        let command = self.command_for(mode);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("SUNSETTER_MODE", mode.as_str())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => AutomationError::PermissionDenied,
                _ => AutomationError::Other(format!("failed to run {mode} command: {e}")),
            })?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(PERMISSION_DENIED_EXIT_CODE) => Err(AutomationError::PermissionDenied),
            Some(code) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    Err(AutomationError::Other(format!(
                        "{mode} command exited with status {code}"
                    )))
                } else {
                    Err(AutomationError::Other(format!(
                        "{mode} command exited with status {code}: {stderr}"
                    )))
                }
            }
            None => Err(AutomationError::Other(format!(
                "{mode} command was terminated by a signal"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
