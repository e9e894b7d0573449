//! Service errors

use opl_platform::PlatformError;
use thiserror::Error;

/// Errors surfaced by starting or controlling the tunnel service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The tunnel device could not be established
    #[error("Tunnel setup failed: {0}")]
    Setup(#[source] PlatformError),

    /// A tunnel is already running in this registry
    #[error("Tunnel service is already running")]
    AlreadyRunning,

    /// The worker thread could not be started
    #[error("Failed to spawn tunnel worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Service result type
pub type Result<T> = std::result::Result<T, ServiceError>;
