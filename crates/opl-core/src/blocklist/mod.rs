//! Blocklist of hosts tied to organizations with active labor actions
//!
//! This module provides:
//! - Host normalization for load-time data and for observed names
//! - An immutable index with exact + subdomain matching
//! - A lock-free swappable handle so refreshes are atomic for readers
//!
//! Matching is strictly on label boundaries. Substring containment on the
//! raw URL is deliberately not supported: it matches `example.com.evil.org`
//! against `example.com`.

mod entry;
mod index;
mod normalize;

pub use entry::{ActionType, BlocklistEntry};
pub use index::{BlocklistIndex, BlocklistView, SharedBlocklist};
pub use normalize::{is_hostname_byte, normalize_domain, normalize_host, suffixes};
