//! Configuration management for the tracker core.
//!
//! This module handles loading, validating, and saving configuration in TOML
//! format with platform-specific directory resolution. Everything here has a
//! working default; the config file is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Backend endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Path prefix prepended to every tracker request (e.g., "tt").
    pub base_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_path: "tt".to_string(),
        }
    }
}

/// Issue query configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default page size for issue listings.
    pub page_size: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { page_size: 25 }
    }
}

/// Viewer compilation and caching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Maximum number of compiled viewers retained, keyed by code.
    pub cache_capacity: usize,
    /// Host platform discriminator passed to every script as `target`.
    pub target: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            target: "pwa".to_string(),
        }
    }
}

/// Application configuration.
///
/// # File Location
///
/// - Linux: `~/.config/IssueView/config.toml`
/// - macOS: `~/Library/Application Support/IssueView/config.toml`
/// - Windows: `%APPDATA%\IssueView\config.toml`
///
/// # Validation
///
/// - `viewers.cache_capacity` must be at least 1
/// - `query.page_size` must be at least 1
/// - `viewers.target` must be non-empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend endpoint settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Issue query settings.
    #[serde(default)]
    pub query: QueryConfig,
    /// Viewer compilation and cache settings.
    #[serde(default)]
    pub viewers: ViewerConfig,
}

impl Config {
    /// Creates a new Config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if the config file exists on disk.
    #[must_use]
    pub fn exists() -> bool {
        Self::config_file_path()
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    /// Gets the platform-specific config directory path.
    ///
    /// - Linux: `~/.config/IssueView/`
    /// - macOS: `~/Library/Application Support/IssueView/`
    /// - Windows: `%APPDATA%\IssueView\`
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("IssueView");

        Ok(config_dir)
    }

    /// Gets the full path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Loads configuration from the config file.
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(config_path).context(format!(
            "Failed to read config file: {}",
            config_path.display()
        ))?;

        let config: Self = toml::from_str(&content).context(format!(
            "Failed to parse config file: {}",
            config_path.display()
        ))?;

        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the config file, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;
        self.save_to(&config_path)
    }

    /// Saves configuration to an explicit path.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context(format!(
                "Failed to create config directory: {}",
                parent.display()
            ))?;
        }

        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(config_path, content).context(format!(
            "Failed to write config file: {}",
            config_path.display()
        ))?;

        Ok(())
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.viewers.cache_capacity == 0 {
            anyhow::bail!("viewers.cache_capacity must be at least 1");
        }
        if self.query.page_size == 0 {
            anyhow::bail!("query.page_size must be at least 1");
        }
        if self.viewers.target.is_empty() {
            anyhow::bail!("viewers.target must be non-empty");
        }
        Ok(())
    }
}
