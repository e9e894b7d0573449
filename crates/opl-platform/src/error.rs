//! Platform-specific errors

use thiserror::Error;

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Tunnel device could not be opened
    #[error("Failed to open tunnel device: {0}")]
    DeviceOpen(String),

    /// Tunnel device opened but could not be configured
    #[error("Failed to configure tunnel device: {0}")]
    Configure(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Device already closed
    #[error("Tunnel device is closed")]
    Closed,

    /// No tunnel support on this platform
    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform result type
pub type Result<T> = std::result::Result<T, PlatformError>;
