//! Online Picket Line Service
//!
//! Runs the tunnel loop: every frame read from the tunnel device is written
//! back unchanged, and DNS questions found along the way are fed to the
//! [`DecisionEngine`](opl_core::DecisionEngine). Matches become
//! [`AlertRequest`](opl_core::AlertRequest)s on a bounded side-channel.
//!
//! ```no_run
//! use opl_core::decision::{AllowList, MemoryAllowListStore};
//! use opl_core::{DecisionEngine, RegionStore};
//! use opl_platform::{MemoryTunnel, TunnelConfig};
//! use opl_service::TunnelService;
//! use std::sync::Arc;
//!
//! let (provider, _peer) = MemoryTunnel::pair();
//! let allowlist = AllowList::empty(Arc::new(MemoryAllowListStore::new()));
//! let engine = Arc::new(DecisionEngine::new(Arc::new(RegionStore::new()), allowlist));
//! let service = TunnelService::new(Arc::new(provider), engine, TunnelConfig::default());
//!
//! let (handle, alerts) = service.start()?;
//! while let Some(alert) = alerts.recv() {
//!     println!("{} is on the picket line", alert.domain);
//! }
//! handle.stop();
//! # Ok::<(), opl_service::ServiceError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod alerts;
mod error;
mod foreground;
mod registry;
mod stats;
mod status;
mod tunnel;

pub use alerts::AlertReceiver;
pub use error::{Result, ServiceError};
pub use foreground::{ForegroundGuard, NoopForeground};
pub use registry::ServiceRegistry;
pub use stats::{StatsSnapshot, TunnelStats};
pub use status::ServiceStatus;
pub use tunnel::{ServiceHandle, TunnelService, DEFAULT_ALERT_CAPACITY};
