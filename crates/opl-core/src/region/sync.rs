//! Keeps the region store fresh without ever emptying it

use super::{Coordinates, FetchOutcome, FetchRequest, RegionStore, SnapshotSource};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new snapshot was published
    Updated {
        /// Version token of the new snapshot
        version: String,
    },
    /// The held snapshot is current
    NotModified,
    /// The fetch failed; the previous snapshot stays in use
    Stale {
        /// Why the fetch failed
        reason: String,
    },
}

/// Fetches region snapshots and publishes them to a [`RegionStore`]
///
/// A failed fetch never clears the store. The error only reaches the caller
/// when there is nothing to fall back to.
pub struct RegionSync {
    source: Arc<dyn SnapshotSource>,
    store: Arc<RegionStore>,
    radius_m: Option<f64>,
}

impl RegionSync {
    /// Create a sync publishing into `store`
    pub fn new(source: Arc<dyn SnapshotSource>, store: Arc<RegionStore>) -> Self {
        Self {
            source,
            store,
            radius_m: None,
        }
    }

    /// Ask the source for a specific coverage radius
    pub fn with_radius(mut self, radius_m: Option<f64>) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// The store being kept fresh
    pub fn store(&self) -> &Arc<RegionStore> {
        &self.store
    }

    /// Fetch for `location` and publish the result.
    ///
    /// # Errors
    /// [`Error::ColdStart`] when the fetch fails and no snapshot is held.
    pub fn refresh(&self, location: Coordinates) -> Result<SyncOutcome> {
        let request = FetchRequest {
            location,
            radius_m: self.radius_m,
            known_version: self.store.version(),
        };
        debug!(source = self.source.name(), %location, "Refreshing region data");

        match self.source.fetch(&request) {
            Ok(FetchOutcome::Updated(cache)) => {
                let version = cache.version.clone();
                self.store.replace(*cache);
                Ok(SyncOutcome::Updated { version })
            }
            Ok(FetchOutcome::NotModified) if !self.store.is_empty() => {
                debug!(source = self.source.name(), "Region data not modified");
                Ok(SyncOutcome::NotModified)
            }
            Ok(FetchOutcome::NotModified) => Err(Error::ColdStart {
                reason: format!("{} reported no changes but nothing is cached", self.source.name()),
            }),
            Err(e) if self.store.is_empty() => {
                warn!(source = self.source.name(), "Initial region fetch failed: {}", e);
                Err(Error::ColdStart {
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                info!(
                    source = self.source.name(),
                    version = ?self.store.version(),
                    "Region fetch failed, keeping cached data: {}",
                    e
                );
                Ok(SyncOutcome::Stale {
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for RegionSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSync")
            .field("source", &self.source.name())
            .field("radius_m", &self.radius_m)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::{BlocklistIndex, BlocklistView};
    use crate::region::RegionCache;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::SystemTime;

    /// Source replaying a scripted sequence of answers
    struct ScriptedSource {
        answers: Mutex<VecDeque<Result<FetchOutcome>>>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedSource {
        fn new(answers: Vec<Result<FetchOutcome>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl SnapshotSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
            self.requests.lock().push(request.clone());
            self.answers
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Fetch("script exhausted".into())))
        }
    }

    fn updated(version: &str) -> Result<FetchOutcome> {
        Ok(FetchOutcome::Updated(Box::new(RegionCache {
            center: Coordinates::new(40.0, -74.0).unwrap(),
            radius_m: 1000.0,
            refresh_threshold_m: 800.0,
            fetched_at: SystemTime::now(),
            version: version.to_string(),
            suggested_refresh: None,
            blocklist: Arc::new(BlocklistIndex::new()),
            geofences: Arc::from(Vec::new()),
        })))
    }

    fn here() -> Coordinates {
        Coordinates::new(40.0, -74.0).unwrap()
    }

    #[test]
    fn test_cold_start_failure_surfaces() {
        let source = Arc::new(ScriptedSource::new(vec![Err(Error::Fetch("offline".into()))]));
        let sync = RegionSync::new(source, Arc::new(RegionStore::new()));

        let err = sync.refresh(here()).unwrap_err();
        assert!(matches!(err, Error::ColdStart { .. }));
        assert!(sync.store().is_empty());
        assert!(sync.store().snapshot().is_empty());
    }

    #[test]
    fn test_failure_after_success_is_stale() {
        let source = Arc::new(ScriptedSource::new(vec![
            updated("v1"),
            Err(Error::Fetch("offline".into())),
        ]));
        let sync = RegionSync::new(source, Arc::new(RegionStore::new()));

        assert_eq!(
            sync.refresh(here()).unwrap(),
            SyncOutcome::Updated {
                version: "v1".into()
            }
        );
        assert!(matches!(sync.refresh(here()).unwrap(), SyncOutcome::Stale { .. }));
        assert_eq!(sync.store().version().as_deref(), Some("v1"));
    }

    #[test]
    fn test_sends_known_version() {
        let source = Arc::new(ScriptedSource::new(vec![
            updated("v1"),
            Ok(FetchOutcome::NotModified),
        ]));
        let sync = RegionSync::new(source.clone(), Arc::new(RegionStore::new()))
            .with_radius(Some(5000.0));

        sync.refresh(here()).unwrap();
        assert_eq!(sync.refresh(here()).unwrap(), SyncOutcome::NotModified);

        let requests = source.requests.lock();
        assert_eq!(requests[0].known_version, None);
        assert_eq!(requests[1].known_version.as_deref(), Some("v1"));
        assert_eq!(requests[1].radius_m, Some(5000.0));
    }

    #[test]
    fn test_not_modified_without_cache() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(FetchOutcome::NotModified)]));
        let sync = RegionSync::new(source, Arc::new(RegionStore::new()));
        assert!(matches!(sync.refresh(here()), Err(Error::ColdStart { .. })));
    }
}
