//! Alert side-channel
//!
//! The tunnel worker never waits on whoever shows alerts to the user. It
//! offers each alert to a bounded queue and drops it if the queue is full.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use opl_core::AlertRequest;
use std::time::Duration;
use tracing::{debug, warn};

/// Producer half, owned by the tunnel worker
#[derive(Debug, Clone)]
pub(crate) struct AlertSender {
    tx: Sender<AlertRequest>,
}

impl AlertSender {
    /// Offer an alert without blocking. Returns whether it was queued.
    pub(crate) fn offer(&self, alert: AlertRequest) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => true,
            Err(TrySendError::Full(alert)) => {
                warn!(domain = %alert.domain, "Alert queue full, dropping alert");
                false
            }
            Err(TrySendError::Disconnected(alert)) => {
                debug!(domain = %alert.domain, "No alert consumer, dropping alert");
                false
            }
        }
    }
}

/// Consumer half, handed to whatever presents alerts
#[derive(Debug, Clone)]
pub struct AlertReceiver {
    rx: Receiver<AlertRequest>,
}

impl AlertReceiver {
    /// Block until an alert arrives; `None` once the worker is gone and the
    /// queue is empty
    pub fn recv(&self) -> Option<AlertRequest> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for an alert.
    ///
    /// `Ok(None)` on timeout, `Err(())` once the worker is gone and the
    /// queue is drained.
    #[allow(clippy::result_unit_err)]
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<AlertRequest>, ()> {
        match self.rx.recv_timeout(timeout) {
            Ok(alert) => Ok(Some(alert)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    /// Take an alert if one is queued
    pub fn try_recv(&self) -> Option<AlertRequest> {
        self.rx.try_recv().ok()
    }

    /// Alerts waiting in the queue
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if no alerts are queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a bounded alert channel
pub(crate) fn alert_channel(capacity: usize) -> (AlertSender, AlertReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (AlertSender { tx }, AlertReceiver { rx })
}
