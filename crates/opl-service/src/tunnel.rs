//! Tunnel service, its worker thread and the handle that controls it

use crate::alerts::{alert_channel, AlertReceiver, AlertSender};
use crate::error::{Result, ServiceError};
use crate::foreground::{ForegroundGuard, NoopForeground};
use crate::stats::{StatsSnapshot, TunnelStats};
use crate::status::ServiceStatus;
use opl_core::packet::parse_query;
use opl_core::DecisionEngine;
use opl_platform::{TunnelConfig, TunnelDevice, TunnelProvider, TunnelWaker};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Default alert queue capacity
pub const DEFAULT_ALERT_CAPACITY: usize = 64;

/// Starts tunnel workers
///
/// Holds everything a worker needs and the status channel shared by every
/// run, so a failed start is observable as well as a successful one.
pub struct TunnelService {
    provider: Arc<dyn TunnelProvider>,
    engine: Arc<DecisionEngine>,
    config: TunnelConfig,
    alert_capacity: usize,
    foreground: Arc<dyn ForegroundGuard>,
    status_tx: Arc<watch::Sender<ServiceStatus>>,
}

impl TunnelService {
    /// Create a service
    pub fn new(
        provider: Arc<dyn TunnelProvider>,
        engine: Arc<DecisionEngine>,
        config: TunnelConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(ServiceStatus::Stopped);
        Self {
            provider,
            engine,
            config,
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            foreground: Arc::new(NoopForeground::new()),
            status_tx: Arc::new(status_tx),
        }
    }

    /// Set alert queue capacity
    pub fn with_alert_capacity(mut self, capacity: usize) -> Self {
        self.alert_capacity = capacity;
        self
    }

    /// Set the foreground guard
    pub fn with_foreground(mut self, foreground: Arc<dyn ForegroundGuard>) -> Self {
        self.foreground = foreground;
        self
    }

    /// Current status
    pub fn status(&self) -> ServiceStatus {
        *self.status_tx.borrow()
    }

    /// Get status receiver for UI updates
    pub fn status_receiver(&self) -> watch::Receiver<ServiceStatus> {
        self.status_tx.subscribe()
    }

    /// The decision engine fed by this service
    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    /// Establish the tunnel and start forwarding.
    ///
    /// On failure the status returns to `Stopped`, the foreground guard is
    /// released and the caller may retry.
    pub fn start(&self) -> Result<(ServiceHandle, AlertReceiver)> {
        if self.status().is_running() {
            return Err(ServiceError::AlreadyRunning);
        }

        info!(
            provider = self.provider.name(),
            session = %self.config.session,
            "Starting tunnel"
        );
        self.status_tx.send_replace(ServiceStatus::Starting);
        self.foreground.acquire(&self.config.session);

        let device = match self.provider.establish(&self.config) {
            Ok(device) => device,
            Err(e) => {
                error!("Failed to establish tunnel: {}", e);
                self.foreground.release();
                self.status_tx.send_replace(ServiceStatus::Stopped);
                return Err(ServiceError::Setup(e));
            }
        };

        let device_name = device.name().to_string();
        let waker = device.waker();
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(TunnelStats::default());
        let (alerts, receiver) = alert_channel(self.alert_capacity);

        let worker = Worker {
            device,
            engine: Arc::clone(&self.engine),
            alerts,
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            status_tx: Arc::clone(&self.status_tx),
            foreground: Arc::clone(&self.foreground),
            mtu: usize::from(self.config.mtu),
            idle_backoff: self.config.idle_backoff(),
        };

        self.status_tx.send_replace(ServiceStatus::Running);
        let join = thread::Builder::new()
            .name("opl-tunnel".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                error!("Failed to spawn tunnel worker: {}", e);
                self.foreground.release();
                self.status_tx.send_replace(ServiceStatus::Stopped);
                ServiceError::Spawn(e)
            })?;

        info!(device = %device_name, "Tunnel running");

        let handle = ServiceHandle {
            inner: Arc::new(HandleInner {
                device_name,
                running,
                waker,
                stats,
                status_tx: Arc::clone(&self.status_tx),
                worker: Mutex::new(Some(join)),
            }),
        };
        Ok((handle, receiver))
    }
}

impl std::fmt::Debug for TunnelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelService")
            .field("provider", &self.provider.name())
            .field("status", &self.status())
            .field("alert_capacity", &self.alert_capacity)
            .finish_non_exhaustive()
    }
}

/// Controls one running tunnel
///
/// Cheap to clone. Dropping the last clone stops the tunnel.
#[derive(Clone)]
pub struct ServiceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    device_name: String,
    running: Arc<AtomicBool>,
    waker: Arc<dyn TunnelWaker>,
    stats: Arc<TunnelStats>,
    status_tx: Arc<watch::Sender<ServiceStatus>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HandleInner {
    fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if self.running.swap(false, Ordering::SeqCst) {
            info!(device = %self.device_name, "Stopping tunnel");
            self.status_tx.send_if_modified(|status| {
                let was_running = *status == ServiceStatus::Running;
                if was_running {
                    *status = ServiceStatus::Stopping;
                }
                was_running
            });
        }
        self.waker.wake();

        if worker.join().is_err() {
            error!(device = %self.device_name, "Tunnel worker panicked");
            self.status_tx.send_replace(ServiceStatus::Stopped);
        }
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ServiceHandle {
    /// Stop the tunnel and wait for the worker to exit. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Current status
    pub fn status(&self) -> ServiceStatus {
        *self.inner.status_tx.borrow()
    }

    /// Get status receiver for UI updates
    pub fn status_receiver(&self) -> watch::Receiver<ServiceStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Whether the worker is still forwarding
    pub fn is_running(&self) -> bool {
        self.status() == ServiceStatus::Running
    }

    /// Interface name of the device
    pub fn device_name(&self) -> &str {
        &self.inner.device_name
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("device", &self.inner.device_name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// The read/forward loop; owns the device for its whole life
struct Worker {
    device: Box<dyn TunnelDevice>,
    engine: Arc<DecisionEngine>,
    alerts: AlertSender,
    running: Arc<AtomicBool>,
    stats: Arc<TunnelStats>,
    status_tx: Arc<watch::Sender<ServiceStatus>>,
    foreground: Arc<dyn ForegroundGuard>,
    mtu: usize,
    idle_backoff: Duration,
}

impl Worker {
    fn run(mut self) {
        let mut buf = vec![0u8; self.mtu];

        while self.running.load(Ordering::SeqCst) {
            match self.device.read_frame(&mut buf) {
                Ok(0) => self.idle(),
                Ok(n) => self.handle_frame(&buf[..n]),
                Err(e) if is_transient(&e) => self.idle(),
                Err(e) if !self.running.load(Ordering::SeqCst) => {
                    debug!("Read error after stop request: {}", e);
                }
                Err(e) => {
                    error!(device = %self.device.name(), "Tunnel read failed: {}", e);
                    break;
                }
            }
        }

        self.shutdown();
    }

    fn idle(&self) {
        if self.running.load(Ordering::SeqCst) {
            thread::sleep(self.idle_backoff);
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        self.stats.record_frame(frame.len());

        let domain = match parse_query(frame) {
            Ok(query) => {
                trace!(%query, "DNS query");
                Some(query.name)
            }
            Err(reason) => {
                trace!(%reason, len = frame.len(), "Frame skipped");
                None
            }
        };

        // Forwarding does not depend on what the frame is or what it matched
        if let Err(e) = self.device.write_frame(frame) {
            self.stats.record_write_error();
            warn!(len = frame.len(), "Failed to forward frame: {}", e);
        }

        let Some(domain) = domain else {
            return;
        };
        self.stats.record_dns_query();
        if let Some(alert) = self.engine.on_domain_observed(&domain) {
            self.stats.record_match();
            let delivered = self.alerts.offer(alert);
            self.stats.record_alert(delivered);
        }
    }

    fn shutdown(mut self) {
        if let Err(e) = self.device.close() {
            warn!(device = %self.device.name(), "Failed to close tunnel device: {}", e);
        }
        self.foreground.release();
        self.running.store(false, Ordering::SeqCst);
        self.status_tx.send_replace(ServiceStatus::Stopped);
        info!(
            device = %self.device.name(),
            stats = %self.stats.snapshot(),
            "Tunnel stopped"
        );
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}
