//! Error types for the dedication page core
//!
//! Only the edges of the crate are fallible: configuration and static payload
//! loading, widget construction and the browser bindings. The handshake and
//! the player adapter absorb every failure into their own state and never
//! hand one of these back to the page.

use thiserror::Error;

/// Main error type for the dedication crate
#[derive(Error, Debug)]
pub enum DedicationError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Payload could not be interpreted
    #[error("Payload error: {0}")]
    Payload(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors raised by the underlying player widget
    #[error("Player error: {0}")]
    Player(String),

    /// Bootstrap script could not be injected or started
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// Cross-window channel errors
    #[error("Channel error: {0}")]
    Channel(String),
}

impl DedicationError {
    /// Create a player error from string
    pub fn player_error<S: Into<String>>(msg: S) -> Self {
        DedicationError::Player(msg.into())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DedicationError>;

/// Extension trait for converting other errors to DedicationError
pub trait IntoDedicationError<T> {
    /// Convert this error into a DedicationError with the given context
    fn config_err(self, context: &str) -> Result<T>;
    fn payload_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoDedicationError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| DedicationError::Config(format!("{}: {}", context, e)))
    }

    fn payload_err(self, context: &str) -> Result<T> {
        self.map_err(|e| DedicationError::Payload(format!("{}: {}", context, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DedicationError::Config("Missing trusted origin".to_string());
        assert_eq!(err.to_string(), "Configuration error: Missing trusted origin");

        let err = DedicationError::player_error("YT.Player threw");
        assert_eq!(err.to_string(), "Player error: YT.Player threw");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: DedicationError = io_err.into();
        assert!(matches!(err, DedicationError::FileIO(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DedicationError = json_err.into();
        assert!(matches!(err, DedicationError::Json(_)));
    }

    #[test]
    fn test_into_dedication_error_trait() {
        let result: std::result::Result<(), &str> = Err("unexpected token");
        let converted = result.payload_err("Reading static payload");

        match converted {
            Err(DedicationError::Payload(msg)) => {
                assert_eq!(msg, "Reading static payload: unexpected token");
            }
            _ => panic!("Expected Payload error"),
        }
    }
}
