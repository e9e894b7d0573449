//! Online Picket Line Platform Abstraction Layer
//!
//! This crate provides the tunnel device the service reads frames from.
//!
//! ## Supported Platforms
//!
//! - **Linux**: TUN device (`/dev/net/tun`)
//! - **Any**: in-memory tunnel for tests and embedding

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{PlatformError, Result};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::LinuxTunProvider;

// Platform-agnostic traits
mod traits;
pub use traits::{TunnelDevice, TunnelProvider, TunnelWaker};

mod memory;
pub use memory::{MemoryPeer, MemoryTunnel};

pub use opl_core::config::TunnelConfig;

/// Provider for the current platform
pub fn default_provider() -> Result<Box<dyn TunnelProvider>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(LinuxTunProvider::new()))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Err(PlatformError::Unsupported(format!(
            "no tunnel device support on {}",
            std::env::consts::OS
        )))
    }
}
