//! Configuration file management for chatvault
//!
//! Values are read from ~/.chatvault/config.toml and can be overridden by
//! environment variables (see [`crate::env`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::env::{capture as env_capture, sources as env_sources};
use crate::error::ChatVaultError;
use crate::interceptor::CaptureConfig;

/// Configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub sources: SourcesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    CaptureConfig::DEFAULT_MAX_BODY_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copilot_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antigravity_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_poll_secs: Option<u64>,
}

const KEYS: &[&str] = &[
    "capture.enabled",
    "capture.max-body-bytes",
    "sources.copilot-dir",
    "sources.cursor-dir",
    "sources.claude-dir",
    "sources.antigravity-dir",
    "sources.cursor-poll-secs",
];

impl Config {
    /// Get the config file path (~/.chatvault/config.toml)
    pub fn get_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Could not find home directory")?;
        Ok(home_dir.join(".chatvault").join("config.toml"))
    }

    /// Load configuration from file.
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Capture settings with environment overrides applied
    pub fn capture_config(&self) -> CaptureConfig {
        let mut config = CaptureConfig {
            enabled: self.capture.enabled,
            max_body_bytes: self.capture.max_body_bytes,
        };

        if let Ok(value) = std::env::var(env_capture::ENABLED) {
            if let Ok(enabled) = value.parse::<bool>() {
                config.enabled = enabled;
            }
        }
        if let Ok(value) = std::env::var(env_capture::MAX_BODY_BYTES) {
            if let Ok(max) = value.parse::<usize>() {
                config.max_body_bytes = max;
            }
        }

        config
    }

    pub fn copilot_dir(&self) -> Option<PathBuf> {
        env_path(env_sources::COPILOT_DIR).or_else(|| self.sources.copilot_dir.clone())
    }

    pub fn cursor_dir(&self) -> Option<PathBuf> {
        env_path(env_sources::CURSOR_DIR).or_else(|| self.sources.cursor_dir.clone())
    }

    pub fn claude_dir(&self) -> Option<PathBuf> {
        env_path(env_sources::CLAUDE_DIR).or_else(|| self.sources.claude_dir.clone())
    }

    pub fn antigravity_dir(&self) -> Option<PathBuf> {
        env_path(env_sources::ANTIGRAVITY_DIR).or_else(|| self.sources.antigravity_dir.clone())
    }

    pub fn cursor_poll_interval(&self) -> Option<Duration> {
        self.sources.cursor_poll_secs.map(Duration::from_secs)
    }

    /// Get a config value by key
    pub fn get(&self, key: &str) -> Option<String> {
        let display = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        match normalize_key(key).as_str() {
            "capture.enabled" => Some(self.capture.enabled.to_string()),
            "capture.max-body-bytes" => Some(self.capture.max_body_bytes.to_string()),
            "sources.copilot-dir" => display(&self.sources.copilot_dir),
            "sources.cursor-dir" => display(&self.sources.cursor_dir),
            "sources.claude-dir" => display(&self.sources.claude_dir),
            "sources.antigravity-dir" => display(&self.sources.antigravity_dir),
            "sources.cursor-poll-secs" => self.sources.cursor_poll_secs.map(|s| s.to_string()),
            _ => None,
        }
    }

    /// Set a config value by key. Rejected values and unknown keys are
    /// [`ChatVaultError::InvalidConfig`].
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match normalize_key(key).as_str() {
            "capture.enabled" => {
                self.capture.enabled = value.parse().map_err(|_| {
                    ChatVaultError::invalid_config(format!("Expected true or false, got {value}"))
                })?;
            }
            "capture.max-body-bytes" => {
                let max: usize = value.parse().map_err(|_| {
                    ChatVaultError::invalid_config(format!("Expected a byte count, got {value}"))
                })?;
                if max == 0 {
                    return Err(ChatVaultError::invalid_config(
                        "capture.max-body-bytes must be greater than zero",
                    )
                    .into());
                }
                self.capture.max_body_bytes = max;
            }
            "sources.copilot-dir" => self.sources.copilot_dir = Some(PathBuf::from(value)),
            "sources.cursor-dir" => self.sources.cursor_dir = Some(PathBuf::from(value)),
            "sources.claude-dir" => self.sources.claude_dir = Some(PathBuf::from(value)),
            "sources.antigravity-dir" => self.sources.antigravity_dir = Some(PathBuf::from(value)),
            "sources.cursor-poll-secs" => {
                let secs: u64 = value.parse().map_err(|_| {
                    ChatVaultError::invalid_config(format!("Expected seconds, got {value}"))
                })?;
                self.sources.cursor_poll_secs = Some(secs);
            }
            _ => return Err(ChatVaultError::invalid_config(format!("Unknown config key: {key}")).into()),
        }
        Ok(())
    }

    /// Unset (reset to default) a config value by key
    pub fn unset(&mut self, key: &str) -> Result<()> {
        match normalize_key(key).as_str() {
            "capture.enabled" => self.capture.enabled = default_enabled(),
            "capture.max-body-bytes" => self.capture.max_body_bytes = default_max_body_bytes(),
            "sources.copilot-dir" => self.sources.copilot_dir = None,
            "sources.cursor-dir" => self.sources.cursor_dir = None,
            "sources.claude-dir" => self.sources.claude_dir = None,
            "sources.antigravity-dir" => self.sources.antigravity_dir = None,
            "sources.cursor-poll-secs" => self.sources.cursor_poll_secs = None,
            _ => return Err(ChatVaultError::invalid_config(format!("Unknown config key: {key}")).into()),
        }
        Ok(())
    }

    /// Get all set config values as key-value pairs
    pub fn list(&self) -> Vec<(String, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }
}

fn normalize_key(key: &str) -> String {
    key.replace('_', "-")
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
