//! Error types for opl-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for opl-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// Coordinates outside the valid latitude/longitude range
    #[error("Invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lng: f64,
    },

    /// A user action referenced a domain that has no decision record
    #[error("No decision record for domain '{domain}'")]
    UnknownDomain {
        /// Normalized domain
        domain: String,
    },

    /// Allow-list could not be written to or read from its store
    #[error("Allow-list persistence failed: {0}")]
    AllowListPersist(String),

    /// Snapshot fetch failed
    #[error("Snapshot fetch failed: {0}")]
    Fetch(String),

    /// Snapshot contents could not be interpreted
    #[error("Snapshot error for '{source_name}': {message}")]
    Snapshot {
        /// Where the snapshot came from
        source_name: String,
        /// Error message
        message: String,
    },

    /// First fetch failed and there is no earlier snapshot to fall back to
    #[error("No cached data available and the initial fetch failed: {reason}")]
    ColdStart {
        /// Underlying failure
        reason: String,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a snapshot error
    pub fn snapshot(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Snapshot {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
