//! Utility module for the dedication crate
//!
//! This module provides common utilities used throughout the crate:
//! - Error handling with custom error types
//! - Layered configuration
//! - Small display helpers

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, ContentConfig, GeneralConfig, HandshakeConfig, TrustMode};
pub use error::{DedicationError, Result};

/// Initialize the application configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Format a playback position for display
///
/// # Arguments
///
/// * `seconds` - Position in seconds; negative and non-finite values render as zero
///
/// # Returns
///
/// Zero-padded "MM:SS". Minutes keep counting past 59 rather than rolling
/// into hours, matching the player bar.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
