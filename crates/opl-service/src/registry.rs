//! Single-tunnel registry
//!
//! Hosts that start and stop the tunnel from several places (a CLI signal
//! handler, a tray menu) go through here so at most one tunnel is up.

use crate::alerts::AlertReceiver;
use crate::error::{Result, ServiceError};
use crate::status::ServiceStatus;
use crate::tunnel::{ServiceHandle, TunnelService};
use parking_lot::Mutex;
use tracing::debug;

/// Holds the handle of the running tunnel, if any
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    current: Mutex<Option<ServiceHandle>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `service` unless a tunnel is already running
    pub fn start(&self, service: &TunnelService) -> Result<AlertReceiver> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|h| h.status().is_running()) {
            return Err(ServiceError::AlreadyRunning);
        }
        let (handle, alerts) = service.start()?;
        *current = Some(handle);
        Ok(alerts)
    }

    /// Stop the running tunnel. Returns whether there was one.
    pub fn stop(&self) -> bool {
        let Some(handle) = self.current.lock().take() else {
            debug!("No tunnel to stop");
            return false;
        };
        handle.stop();
        true
    }

    /// Status of the registered tunnel
    pub fn status(&self) -> ServiceStatus {
        self.current
            .lock()
            .as_ref()
            .map_or(ServiceStatus::Stopped, ServiceHandle::status)
    }

    /// Whether a tunnel is up
    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    /// Handle of the registered tunnel
    pub fn handle(&self) -> Option<ServiceHandle> {
        self.current.lock().clone()
    }
}
