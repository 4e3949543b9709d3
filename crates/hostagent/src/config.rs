//! Host configuration
//!
//! TOML file at `~/.config/textcast/host.toml` (platform config dir). Every
//! section is optional; a missing file means one tab with one login shell.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broadcast::expiry_from_config;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("cursor_stop_blinking_after must not be negative, got {0}")]
    NegativeBlinkDuration(f64),

    #[error("no tabs configured")]
    NoTabs,

    #[error("tab {0:?} has no windows")]
    EmptyTab(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HostConfig {
    pub display: DisplayConfig,

    pub tabs: Vec<TabConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Seconds the broadcast cue stays on without activity; 0 means default
    pub cursor_stop_blinking_after: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cursor_stop_blinking_after: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TabConfig {
    pub title: String,
    pub windows: Vec<WindowConfig>,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            title: "main".to_string(),
            windows: vec![WindowConfig::default()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "shell".to_string(),
            command: default_shell(),
            args: Vec::new(),
            cwd: None,
        }
    }
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("textcast")
        .join("host.toml")
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

impl HostConfig {
    /// Load from a file; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().with_default_tab());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).context("Invalid TOML configuration")?;
        let config = config.with_default_tab();
        config.validate()?;
        Ok(config)
    }

    fn with_default_tab(mut self) -> Self {
        if self.tabs.is_empty() {
            self.tabs.push(TabConfig::default());
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let blink = self.display.cursor_stop_blinking_after;
        if blink < 0.0 {
            return Err(ConfigError::NegativeBlinkDuration(blink));
        }
        if self.tabs.is_empty() {
            return Err(ConfigError::NoTabs);
        }
        if let Some(tab) = self.tabs.iter().find(|t| t.windows.is_empty()) {
            return Err(ConfigError::EmptyTab(tab.title.clone()));
        }
        Ok(())
    }

    /// Broadcast session expiry derived from the blink setting
    pub fn session_expiry(&self) -> Duration {
        expiry_from_config(Some(self.display.cursor_stop_blinking_after))
    }
}
