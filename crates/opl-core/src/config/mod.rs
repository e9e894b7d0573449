//! Configuration management
//!
//! Strongly-typed configuration with TOML support. Every section and field
//! has a default, so an empty file is a valid configuration.

use crate::error::{Error, Result};
use crate::region::Coordinates;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tunnel device settings
    pub tunnel: TunnelConfig,

    /// Regional data settings
    pub data: DataConfig,

    /// Alert side-channel settings
    pub alerts: AlertConfig,

    /// Allow-list storage
    pub allowlist: AllowListConfig,

    /// Fixed location, when no live location source is available
    pub location: LocationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write to a TOML file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let tunnel = &self.tunnel;
        if tunnel.session.trim().is_empty() {
            return Err(Error::config_value("tunnel.session", "Must not be empty"));
        }
        if tunnel.prefix_len > 32 {
            return Err(Error::config_value("tunnel.prefix_len", "Must be between 0 and 32"));
        }
        if tunnel.route_prefix_len > 32 {
            return Err(Error::config_value(
                "tunnel.route_prefix_len",
                "Must be between 0 and 32",
            ));
        }
        if !(MIN_MTU..=MAX_MTU).contains(&tunnel.mtu) {
            return Err(Error::config_value(
                "tunnel.mtu",
                format!("Must be between {MIN_MTU} and {MAX_MTU}"),
            ));
        }
        if tunnel.read_timeout_ms == 0 {
            return Err(Error::config_value("tunnel.read_timeout_ms", "Must be non-zero"));
        }

        if self.data.refresh_interval_secs == 0 {
            return Err(Error::config_value("data.refresh_interval_secs", "Must be non-zero"));
        }
        if let Some(radius) = self.data.radius_m {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(Error::config_value("data.radius_m", "Must be a positive distance"));
            }
        }

        if self.alerts.queue_capacity == 0 {
            return Err(Error::config_value("alerts.queue_capacity", "Must be non-zero"));
        }

        self.location.coordinates()?;

        if !matches!(self.logging.format.as_str(), "text" | "json" | "compact") {
            return Err(Error::config_value(
                "logging.format",
                "Must be one of: text, json, compact",
            ));
        }

        Ok(())
    }
}

/// Smallest MTU accepted for the tunnel (IPv4 minimum datagram size)
pub const MIN_MTU: u16 = 576;

/// Largest MTU accepted for the tunnel
pub const MAX_MTU: u16 = 9000;

/// Tunnel device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Session name shown by the OS
    pub session: String,
    /// Local address of the tunnel endpoint
    pub address: Ipv4Addr,
    /// Prefix length of `address`
    pub prefix_len: u8,
    /// Route sent through the tunnel
    pub route: Ipv4Addr,
    /// Prefix length of `route`
    pub route_prefix_len: u8,
    /// Upstream DNS resolver handed to the OS
    pub dns_server: Ipv4Addr,
    /// Maximum frame size
    pub mtu: u16,
    /// Longest a single read may block, milliseconds
    pub read_timeout_ms: u64,
    /// Pause after an empty or interrupted read, milliseconds
    pub idle_backoff_ms: u64,
    /// Interface name; the OS picks one when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            session: "Online Picket Line".to_string(),
            address: Ipv4Addr::new(10, 0, 0, 2),
            prefix_len: 32,
            route: Ipv4Addr::UNSPECIFIED,
            route_prefix_len: 0,
            dns_server: Ipv4Addr::new(8, 8, 8, 8),
            mtu: 1500,
            read_timeout_ms: 250,
            idle_backoff_ms: 50,
            device_name: None,
        }
    }
}

impl TunnelConfig {
    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Idle backoff as a duration
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Regional data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// JSON snapshot file used as the data source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
    /// Seconds between refresh attempts
    pub refresh_interval_secs: u64,
    /// Coverage radius to request, meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_m: Option<f64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            refresh_interval_secs: 900,
            radius_m: None,
        }
    }
}

impl DataConfig {
    /// Refresh interval as a duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Alert side-channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Alerts buffered before new ones are dropped
    pub queue_capacity: usize,
    /// Ask the user on the terminal instead of only logging
    pub interactive: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            interactive: true,
        }
    }
}

/// Allow-list storage configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListConfig {
    /// Allow-list file; a per-user default is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Fixed location configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Latitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl LocationConfig {
    /// The configured point, if both coordinates are set
    pub fn coordinates(&self) -> Result<Option<Coordinates>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::config_value(
                "location",
                "latitude and longitude must be set together",
            )),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Output format: text, json or compact
    pub format: String,
    /// Log file path (None = stderr only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}
