//! Locating and reading `sunsetter.toml`.
//!
//! Resolves the configuration path (default XDG location or a directory set
//! with `--config`), creates a default file on first run, then parses and
//! validates it.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::utils::private_path;

// `--config` override; unset means the XDG default
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

pub const CONFIG_FILE_NAME: &str = "sunsetter.toml";

/// Pin the configuration directory for this process.
/// Can only be called once; returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("config directory was already chosen"))
}

/// The custom configuration directory, `None` when using the default one.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Directory containing sunsetter.toml and geo.toml.
pub fn get_config_base_dir() -> Result<PathBuf> {
    let config_path = get_config_path()?;
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Get the configuration file path.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("No XDG config directory available")?;
    Ok(config_dir.join("sunsetter").join(CONFIG_FILE_NAME))
}

/// Load configuration from the resolved path, creating a default file if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to write the default configuration")?;
        log_block_start!(
            "Created default configuration at {}",
            private_path(&config_path)
        );
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path. Never creates a file.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", private_path(path)))?;

    parse_config(&content)
        .with_context(|| format!("Invalid configuration in {}", private_path(path)))
}

/// Parse and validate configuration text.
pub(crate) fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}
