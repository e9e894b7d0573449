//! Service lifecycle status

use std::fmt;

/// Lifecycle of the tunnel service
///
/// `Stopped → Starting → Running → Stopping → Stopped`. A failed start goes
/// straight from `Starting` back to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    /// No tunnel
    #[default]
    Stopped,
    /// Establishing the tunnel
    Starting,
    /// Forwarding frames
    Running,
    /// Stop requested, worker winding down
    Stopping,
}

impl ServiceStatus {
    /// Display label
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Starting => "Starting...",
            ServiceStatus::Running => "Running",
            ServiceStatus::Stopping => "Stopping...",
        }
    }

    /// Whether a tunnel is up or coming up
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Starting)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
