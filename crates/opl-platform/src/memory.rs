//! In-memory tunnel
//!
//! A [`TunnelProvider`] backed by channels. The paired [`MemoryPeer`]
//! plays the part of the OS: it injects frames for the device to read and
//! collects the frames the device forwards.

use crate::traits::{closed_error, TunnelDevice, TunnelProvider, TunnelWaker};
use crate::{PlatformError, Result};
use bytes::Bytes;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use opl_core::config::TunnelConfig;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct Shared {
    establishes: AtomicUsize,
    closes: AtomicUsize,
    last_config: Mutex<Option<TunnelConfig>>,
    fail_next: Mutex<Option<String>>,
}

/// Channel-backed tunnel provider
#[derive(Debug)]
pub struct MemoryTunnel {
    inbound: Receiver<Bytes>,
    outbound: Sender<Bytes>,
    shared: Arc<Shared>,
}

/// The OS side of a [`MemoryTunnel`]
#[derive(Debug)]
pub struct MemoryPeer {
    inbound: Sender<Bytes>,
    outbound: Receiver<Bytes>,
    shared: Arc<Shared>,
}

impl MemoryTunnel {
    /// Create a provider and its peer
    pub fn pair() -> (Self, MemoryPeer) {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let shared = Arc::new(Shared::default());
        (
            Self {
                inbound: in_rx,
                outbound: out_tx,
                shared: Arc::clone(&shared),
            },
            MemoryPeer {
                inbound: in_tx,
                outbound: out_rx,
                shared,
            },
        )
    }
}

impl TunnelProvider for MemoryTunnel {
    fn name(&self) -> &str {
        "memory"
    }

    fn establish(&self, config: &TunnelConfig) -> Result<Box<dyn TunnelDevice>> {
        if let Some(reason) = self.shared.fail_next.lock().take() {
            return Err(PlatformError::DeviceOpen(reason));
        }

        let n = self.shared.establishes.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.last_config.lock() = Some(config.clone());
        debug!(session = %config.session, mtu = config.mtu, "Memory tunnel established");

        let (wake_tx, wake_rx) = bounded(1);
        Ok(Box::new(MemoryDevice {
            name: format!("mem{}", n - 1),
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
            wake_rx,
            waker: Arc::new(MemoryWaker { tx: wake_tx }),
            read_timeout: config.read_timeout(),
            open: true,
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl MemoryPeer {
    /// Queue a frame for the device to read
    pub fn inject(&self, frame: impl Into<Bytes>) {
        // The provider holds the receiver, so this cannot fail while it lives
        let _ = self.inbound.send(frame.into());
    }

    /// Wait up to `timeout` for the next forwarded frame
    pub fn recv_forwarded(&self, timeout: Duration) -> Option<Bytes> {
        self.outbound.recv_timeout(timeout).ok()
    }

    /// Every frame forwarded so far and not yet received
    pub fn drain_forwarded(&self) -> Vec<Bytes> {
        self.outbound.try_iter().collect()
    }

    /// Make the next `establish` fail with `reason`
    pub fn fail_next_establish(&self, reason: impl Into<String>) {
        *self.shared.fail_next.lock() = Some(reason.into());
    }

    /// Number of devices established
    pub fn establish_count(&self) -> usize {
        self.shared.establishes.load(Ordering::SeqCst)
    }

    /// Number of devices closed
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Configuration of the most recent successful `establish`
    pub fn last_config(&self) -> Option<TunnelConfig> {
        self.shared.last_config.lock().clone()
    }
}

struct MemoryDevice {
    name: String,
    inbound: Receiver<Bytes>,
    outbound: Sender<Bytes>,
    wake_rx: Receiver<()>,
    waker: Arc<MemoryWaker>,
    read_timeout: Duration,
    open: bool,
    shared: Arc<Shared>,
}

impl TunnelDevice for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.open {
            return Err(closed_error());
        }
        select! {
            recv(self.inbound) -> frame => match frame {
                Ok(frame) => {
                    let n = frame.len().min(buf.len());
                    buf[..n].copy_from_slice(&frame[..n]);
                    Ok(n)
                }
                Err(_) => Err(io::Error::new(io::ErrorKind::BrokenPipe, "memory peer dropped")),
            },
            recv(self.wake_rx) -> _ => Err(io::ErrorKind::Interrupted.into()),
            default(self.read_timeout) => Err(io::ErrorKind::WouldBlock.into()),
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(closed_error());
        }
        self.outbound
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "memory peer dropped"))?;
        Ok(frame.len())
    }

    fn waker(&self) -> Arc<dyn TunnelWaker> {
        self.waker.clone()
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
            debug!(device = %self.name, "Memory tunnel closed");
        }
        Ok(())
    }
}

struct MemoryWaker {
    tx: Sender<()>,
}

impl TunnelWaker for MemoryWaker {
    fn wake(&self) {
        // A pending wake-up is as good as a new one
        let _ = self.tx.try_send(());
    }
}
