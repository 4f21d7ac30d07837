//! Display sinks: where the scheduler publishes the icon and status line.
//!
//! Sinks are passive and fire-and-forget. Failures to write are logged and
//! otherwise ignored; the scheduler never waits on presentation.
//!
//! - [`LogDisplay`] prints updates in the usual log style.
//! - [`JsonStateDisplay`] keeps `$XDG_RUNTIME_DIR/sunsetter/display.json`
//!   current for status bars and `sunsetter status`.
//! - [`DisplayRecorder`] keeps every update in memory (simulation, tests).
//! - [`MultiDisplay`] fans out to several sinks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::appearance::AppearanceMode;
use crate::common::utils::{private_path, runtime_dir};

/// Icon shown for the last successfully applied mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    Day,
    Night,
}

impl Icon {
    pub fn for_daytime(is_daytime: bool) -> Self {
        if is_daytime { Icon::Day } else { Icon::Night }
    }

    pub fn for_mode(mode: AppearanceMode) -> Self {
        match mode {
            AppearanceMode::Light => Icon::Day,
            AppearanceMode::Dark => Icon::Night,
        }
    }

    /// Mode this icon stands for.
    pub fn mode(&self) -> AppearanceMode {
        match self {
            Icon::Day => AppearanceMode::Light,
            Icon::Night => AppearanceMode::Dark,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Icon::Day => "☀",
            Icon::Night => "☾",
        }
    }
}

/// Passive presentation target.
pub trait DisplaySink: Send {
    fn set_icon(&mut self, icon: Icon);
    fn set_status_text(&mut self, text: &str);
}

/// Snapshot of what is currently displayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub pid: Option<u32>,
    pub icon: Option<Icon>,
    pub status_text: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Logs every update.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn set_icon(&mut self, icon: Icon) {
        log_decorated!("{} Appearance: {}", icon.symbol(), icon.mode());
    }

    fn set_status_text(&mut self, text: &str) {
        log_indented!("{text}");
    }
}

/// Default location of the display state file.
pub fn display_state_path() -> PathBuf {
    runtime_dir().join("sunsetter").join("display.json")
}

/// Read the display state file, `None` if it does not exist.
pub fn read_display_state(path: &Path) -> Result<Option<DisplayState>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read {}", private_path(path)));
        }
    };

    let state = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", private_path(path)))?;
    Ok(Some(state))
}

/// Mirrors the display into a JSON file.
pub struct JsonStateDisplay {
    path: PathBuf,
    state: DisplayState,
}

impl JsonStateDisplay {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: DisplayState {
                pid: Some(std::process::id()),
                ..DisplayState::default()
            },
        }
    }

    fn persist(&mut self) {
        self.state.updated_at = Some(Utc::now());
        if let Err(e) = self.write_state() {
            log_pipe!();
            log_warning!("Failed to update display state file: {e}");
        }
    }

    fn write_state(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", private_path(parent)))?;
        }

        // Write then rename so readers never see a partial file
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", private_path(&tmp_path)))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", private_path(&self.path)))?;
        Ok(())
    }
}

/// Remove the display state file; called on shutdown.
pub fn clear_display_state(path: &Path) {
    let _ = fs::remove_file(path);
}

impl DisplaySink for JsonStateDisplay {
    fn set_icon(&mut self, icon: Icon) {
        self.state.icon = Some(icon);
        self.persist();
    }

    fn set_status_text(&mut self, text: &str) {
        self.state.status_text = Some(text.to_string());
        self.persist();
    }
}

/// One update received by a [`DisplayRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    Icon(Icon),
    StatusText(String),
}

/// Records updates; clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct DisplayRecorder {
    updates: Arc<Mutex<Vec<DisplayUpdate>>>,
}

impl DisplayRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<DisplayUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent icon, if any was set.
    pub fn icon(&self) -> Option<Icon> {
        self.updates().into_iter().rev().find_map(|u| match u {
            DisplayUpdate::Icon(icon) => Some(icon),
            DisplayUpdate::StatusText(_) => None,
        })
    }

    /// Most recent status text, if any was set.
    pub fn status_text(&self) -> Option<String> {
        self.updates().into_iter().rev().find_map(|u| match u {
            DisplayUpdate::StatusText(text) => Some(text),
            DisplayUpdate::Icon(_) => None,
        })
    }

    pub fn status_texts(&self) -> Vec<String> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                DisplayUpdate::StatusText(text) => Some(text),
                DisplayUpdate::Icon(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.updates.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, update: DisplayUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(update);
    }
}

impl DisplaySink for DisplayRecorder {
    fn set_icon(&mut self, icon: Icon) {
        self.push(DisplayUpdate::Icon(icon));
    }

    fn set_status_text(&mut self, text: &str) {
        self.push(DisplayUpdate::StatusText(text.to_string()));
    }
}

/// Forwards every update to each inner sink in order.
#[derive(Default)]
pub struct MultiDisplay {
    sinks: Vec<Box<dyn DisplaySink>>,
}

impl MultiDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl DisplaySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl DisplaySink for MultiDisplay {
    fn set_icon(&mut self, icon: Icon) {
        for sink in &mut self.sinks {
            sink.set_icon(icon);
        }
    }

    fn set_status_text(&mut self, text: &str) {
        for sink in &mut self.sinks {
            sink.set_status_text(text);
        }
    }
}
