//! # Online Picket Line Core
//!
//! Platform-independent logic for spotting traffic to organizations with
//! active labor actions.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **DNS query decoding** - hostname recovery from raw IPv4/UDP frames
//! - **Blocklist index** - exact and subdomain matching on normalized hosts
//! - **Decision engine** - per-domain alert workflow and the user allow-list
//! - **Regional data** - snapshot fetching with stale fallback
//! - **Proximity** - geofence hits and refresh decisions
//! - **Configuration** - TOML configuration for every component
//!
//! ## Example
//!
//! ```rust,no_run
//! use opl_core::{decode_query, DecisionEngine, RegionStore};
//! use opl_core::decision::{AllowList, FileAllowListStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(RegionStore::new());
//! let allowlist = AllowList::load(Arc::new(FileAllowListStore::new("allowed.txt")))?;
//! let engine = DecisionEngine::new(store, allowlist);
//!
//! # let frame: &[u8] = &[];
//! if let Some(domain) = decode_query(frame) {
//!     if let Some(alert) = engine.on_domain_observed(&domain) {
//!         println!("{} is on strike", alert.organization_name);
//!     }
//! }
//! # Ok::<(), opl_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod blocklist;
pub mod config;
pub mod decision;
pub mod error;
pub mod packet;
pub mod proximity;
pub mod region;

// Re-exports for convenience
pub use blocklist::{BlocklistEntry, BlocklistIndex, BlocklistView, SharedBlocklist};
pub use config::Config;
pub use decision::{AlertRequest, Decision, DecisionEngine, UserAction};
pub use error::{Error, Result};
pub use packet::{decode_query, parse_query, DnsQuery};
pub use proximity::{ProximityMonitor, ProximityUpdate};
pub use region::{Coordinates, RegionCache, RegionStore, RegionSync};
