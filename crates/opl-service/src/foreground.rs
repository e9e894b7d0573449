//! Foreground-state seam
//!
//! Some hosts must hold a visible foreground state (an ongoing notification,
//! a tray icon) for as long as the tunnel is up. The service acquires the
//! guard before establishing the device and releases it once the device is
//! gone, including after a failed start.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Host hook for holding foreground state while the tunnel runs
pub trait ForegroundGuard: Send + Sync {
    /// Enter foreground state for `session`
    fn acquire(&self, session: &str);

    /// Leave foreground state
    fn release(&self);
}

/// Guard for hosts without a foreground concept; only logs and counts
#[derive(Debug, Default)]
pub struct NoopForeground {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl NoopForeground {
    /// Create the guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `acquire` was called
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Times `release` was called
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ForegroundGuard for NoopForeground {
    fn acquire(&self, session: &str) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        debug!(session, "Foreground acquired");
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        debug!("Foreground released");
    }
}
