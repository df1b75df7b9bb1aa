//! Configuration management for the dedication page
//!
//! This module handles loading and managing configuration from config files
//! and environment variables. Every section has defaults, so a partial file
//! only overrides the keys it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::channel::origin_of;
use crate::payload::FallbackText;
use crate::player::{extract_video_id, PlayerConfig};
use crate::utils::error::{DedicationError, IntoDedicationError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent-frame handshake configuration
    pub handshake: HandshakeConfig,

    /// Media player adapter configuration
    pub player: PlayerConfig,

    /// Page content configuration
    pub content: ContentConfig,

    /// Copy shown when the payload leaves a field out
    pub fallback: FallbackText,

    /// General application settings
    pub general: GeneralConfig,
}

/// Which origins may deliver the dedication payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustMode {
    /// Only the configured origin (or the referrer's, when none is configured)
    #[default]
    Pinned,

    /// The first sender is trusted and pinned from then on
    FirstSender,
}

impl std::str::FromStr for TrustMode {
    type Err = DedicationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pinned" => Ok(TrustMode::Pinned),
            "first-sender" => Ok(TrustMode::FirstSender),
            other => Err(DedicationError::Config(format!(
                "Unknown trust mode '{}', expected 'pinned' or 'first-sender'",
                other
            ))),
        }
    }
}

/// Handshake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Trust policy for inbound payloads
    pub trust: TrustMode,

    /// Origin allowed to deliver the payload under the pinned policy
    pub trusted_origin: Option<String>,

    /// Total READY_FOR_DATA sends, the immediate one included
    pub max_attempts: u32,

    /// Delay between sends in milliseconds
    pub retry_interval_ms: u64,

    /// Optional hard deadline in milliseconds after which a pending handshake times out
    pub deadline_ms: Option<u64>,

    /// Allow targeting "*" while no parent origin is known
    pub allow_wildcard_target: bool,
}

/// Page content configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// JSON payload file used instead of the parent handshake
    pub static_payload: Option<PathBuf>,

    /// Love message rotation period in milliseconds
    pub rotation_interval_ms: u64,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            trust: TrustMode::Pinned,
            trusted_origin: None,
            max_attempts: 10,
            retry_interval_ms: 700,
            deadline_ms: None,
            allow_wildcard_target: true,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            static_payload: None,
            rotation_interval_ms: 5000,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Configured level, `Info` when the name is not recognized
    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/dedication/config.toml on Linux)
    /// 3. User config file (~/.config/dedication/config.toml on Linux)
    /// 4. Environment variables (DEDICATION_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config = Self::read_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config = Self::read_file(&user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Parse and validate TOML text; no files, no environment
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).config_err("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        toml::from_str(&contents).config_err("Failed to parse config file")
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(origin) = std::env::var("DEDICATION_TRUSTED_ORIGIN") {
            self.handshake.trusted_origin = Some(origin);
        }

        if let Ok(trust) = std::env::var("DEDICATION_TRUST") {
            self.handshake.trust = trust.parse()?;
        }

        if let Ok(attempts) = std::env::var("DEDICATION_MAX_ATTEMPTS") {
            self.handshake.max_attempts = attempts.parse().map_err(|_| {
                DedicationError::Config("Invalid DEDICATION_MAX_ATTEMPTS".to_string())
            })?;
        }

        if let Ok(interval) = std::env::var("DEDICATION_RETRY_INTERVAL_MS") {
            self.handshake.retry_interval_ms = interval.parse().map_err(|_| {
                DedicationError::Config("Invalid DEDICATION_RETRY_INTERVAL_MS".to_string())
            })?;
        }

        if let Ok(media) = std::env::var("DEDICATION_DEFAULT_MEDIA") {
            self.player.default_media = media;
        }

        if let Ok(log_level) = std::env::var("DEDICATION_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.handshake.max_attempts == 0 {
            return Err(DedicationError::Config(
                "handshake.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.handshake.retry_interval_ms == 0 {
            return Err(DedicationError::Config(
                "handshake.retry_interval_ms must be non-zero".to_string(),
            ));
        }

        if let Some(origin) = &self.handshake.trusted_origin {
            match origin_of(origin) {
                Some(normalized) if &normalized == origin => {}
                _ => {
                    return Err(DedicationError::Config(format!(
                        "handshake.trusted_origin '{}' is not a scheme://host[:port] origin",
                        origin
                    )));
                }
            }
        }

        if self.player.poll_interval_ms == 0 || self.content.rotation_interval_ms == 0 {
            return Err(DedicationError::Config(
                "Timer intervals must be non-zero".to_string(),
            ));
        }

        if extract_video_id(&self.player.default_media).is_none() {
            return Err(DedicationError::Config(format!(
                "player.default_media '{}' does not contain a video id",
                self.player.default_media
            )));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(DedicationError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/dedication/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("Dedication").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/Dedication/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dedication").join("config.toml"))
    }
}
