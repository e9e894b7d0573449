//! Tunnel counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the tunnel worker
#[derive(Debug, Default)]
pub struct TunnelStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    dns_queries: AtomicU64,
    matches: AtomicU64,
    alerts_sent: AtomicU64,
    alerts_dropped: AtomicU64,
    write_errors: AtomicU64,
}

/// Point-in-time copy of [`TunnelStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames read
    pub frames: u64,
    /// Bytes read
    pub bytes: u64,
    /// Frames that carried a DNS question
    pub dns_queries: u64,
    /// Questions that produced an alert
    pub matches: u64,
    /// Alerts queued for the side-channel
    pub alerts_sent: u64,
    /// Alerts dropped because the queue was full or closed
    pub alerts_dropped: u64,
    /// Frames that failed to forward
    pub write_errors: u64,
}

impl TunnelStats {
    pub(crate) fn record_frame(&self, len: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dns_query(&self) {
        self.dns_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_match(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_alert(&self, delivered: bool) {
        let counter = if delivered {
            &self.alerts_sent
        } else {
            &self.alerts_dropped
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dns_queries: self.dns_queries.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            alerts_dropped: self.alerts_dropped.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames ({} bytes), {} DNS queries, {} matches, {} alerts ({} dropped), {} write errors",
            self.frames,
            self.bytes,
            self.dns_queries,
            self.matches,
            self.alerts_sent,
            self.alerts_dropped,
            self.write_errors
        )
    }
}
