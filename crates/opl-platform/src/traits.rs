//! Platform-agnostic tunnel traits
//!
//! The core treats a tunnel as a duplex frame channel: every read is one
//! outbound IP frame from the device, every write hands a frame on.

use crate::Result;
use opl_core::config::TunnelConfig;
use std::io;
use std::sync::Arc;

/// Creates tunnel devices
///
/// Implemented per platform (Linux TUN, the in-memory tunnel used in tests).
pub trait TunnelProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Bring up a device with one local address and a fixed MTU.
    ///
    /// The route and DNS server in `config` are handed to the platform where
    /// it can install them. The Linux provider does not: it logs them, and
    /// routing traffic into the device is left to the host's own setup.
    fn establish(&self, config: &TunnelConfig) -> Result<Box<dyn TunnelDevice>>;
}

/// An established tunnel device
///
/// Owned by exactly one worker; other threads reach it only through its
/// [`TunnelWaker`].
pub trait TunnelDevice: Send {
    /// Interface name
    fn name(&self) -> &str;

    /// Read one frame into `buf`.
    ///
    /// Blocks for at most the configured read timeout. A timeout is reported
    /// as [`io::ErrorKind::WouldBlock`] and a wake-up as
    /// [`io::ErrorKind::Interrupted`]; both are transient.
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Hand a frame on
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<usize>;

    /// Handle that interrupts a blocked [`read_frame`](Self::read_frame)
    fn waker(&self) -> Arc<dyn TunnelWaker>;

    /// Release the device. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Interrupts a blocked read from another thread
pub trait TunnelWaker: Send + Sync {
    /// Make the current or next read return promptly
    fn wake(&self);
}

/// Error returned by reads and writes on a closed device
pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "tunnel device is closed")
}
