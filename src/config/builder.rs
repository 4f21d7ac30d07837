//! Configuration file building: the default config and `geo.toml`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::geo::Coordinate;

/// Write a default config file at `path`, creating its directory.
///
/// Coordinates are left out; until `sunsetter geo` (or a manual edit) provides
/// them the location stays undetermined.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let triggers = DEFAULT_TRIGGERS
        .iter()
        .map(|kind| format!("\"{}\"", kind.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let config_content = ConfigBuilder::new()
        .add_section("Appearance")
        .add_setting(
            "actuator",
            &format!("\"{}\"", DEFAULT_ACTUATOR.as_str()),
            "Actuator to use: \"auto\", \"gnome\" or \"command\"",
        )
        .add_note("light_command = \"...\" and dark_command = \"...\" configure the command actuator")
        .add_section("Location")
        .add_setting(
            "location",
            &format!("\"{}\"", DEFAULT_LOCATION.as_str()),
            "Use the location: \"auto\" or \"disabled\"",
        )
        .add_setting(
            "tracking",
            &format!("\"{}\"", DEFAULT_TRACKING.as_str()),
            "Tracking: \"auto\", \"significant\" or \"continuous\"",
        )
        .add_note("Run 'sunsetter geo <latitude> <longitude>' to set coordinates")
        .add_section("Triggers")
        .add_note("Events that re-evaluate the appearance")
        .add_plain_setting("triggers", &format!("[{triggers}]"))
        .add_setting(
            "wake_tolerance",
            &DEFAULT_WAKE_TOLERANCE_SECS.to_string(),
            &format!(
                "Seconds a scheduled wake-up may fire late ({MINIMUM_WAKE_TOLERANCE_SECS}-{MAXIMUM_WAKE_TOLERANCE_SECS})"
            ),
        )
        .build();

    fs::write(path, config_content).context("Failed to write default config file")?;
    Ok(())
}

/// Write coordinates to `geo_path`.
///
/// The file is replaced atomically so a watching instance never reads half of it.
pub fn write_geo_coordinates(geo_path: &Path, latitude: f64, longitude: f64) -> Result<()> {
    if !Coordinate::new(latitude, longitude).is_valid() {
        anyhow::bail!(
            "Coordinates out of range: latitude must be between -90 and 90, longitude between -180 and 180 (got {latitude}, {longitude})"
        );
    }

    if let Some(parent) = geo_path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let geo_content =
        format!("#[Private geo coordinates]\nlatitude = {latitude:.6}\nlongitude = {longitude:.6}\n");

    let tmp_path = geo_path.with_extension("toml.tmp");
    fs::write(&tmp_path, geo_content)
        .with_context(|| format!("Failed to write coordinates to {}", private_path(&tmp_path)))?;
    fs::rename(&tmp_path, geo_path)
        .with_context(|| format!("Failed to replace {}", private_path(geo_path)))?;

    Ok(())
}

/// Builder for configuration files with aligned comments.
///
/// Comments of all commented settings start in the same column, computed from
/// the longest setting line.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

#[derive(Clone)]
struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

#[derive(Clone)]
enum EntryType {
    Section,
    Note,
    /// Written as-is, excluded from alignment
    Plain,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("#[{title}]"),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_note(mut self, text: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("# {text}"),
            entry_type: EntryType::Note,
        });
        self
    }

    fn add_plain_setting(mut self, key: &str, value: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("{key} = {value}"),
            entry_type: EntryType::Plain,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        let line = format!("{key} = {value}");
        self.entries.push(ConfigEntry {
            content: line.clone(),
            entry_type: EntryType::Setting {
                line,
                comment: format!("# {comment}"),
            },
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1; // one space between setting and comment

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_section = false;
                }
                EntryType::Note | EntryType::Plain => result.push(entry.content),
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        let mut content = result.join("\n");
        content.push('\n');
        content
    }
}
