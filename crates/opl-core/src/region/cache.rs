//! Region snapshot and its swappable store

use super::Coordinates;
use crate::blocklist::{ActionType, BlocklistIndex, BlocklistView};
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::info;

/// What a geofence marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeofenceKind {
    /// Area of an action as a whole
    Action,
    /// A picket site
    PicketSite,
    /// A location of the employer
    EmployerLocation,
    /// Unrecognized label
    #[default]
    #[serde(other)]
    Other,
}

impl GeofenceKind {
    /// Parse from the feed's label
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "action" => Self::Action,
            "picket-site" | "picket_site" => Self::PicketSite,
            "employer-location" | "employer_location" => Self::EmployerLocation,
            _ => Self::Other,
        }
    }
}

/// Descriptive fields shown to the user, none of which affect matching
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeofenceMetadata {
    /// Union or group running the action
    pub organization: Option<String>,
    /// Free-form location text
    pub location: Option<String>,
    /// Name of the site
    pub location_name: Option<String>,
    /// Kind of site, e.g. store or warehouse
    pub location_type: Option<String>,
    /// Start date as published
    pub start_date: Option<String>,
    /// End date as published
    pub end_date: Option<String>,
    /// Description of the action
    pub description: Option<String>,
    /// Demands of the action
    pub demands: Option<String>,
    /// Link with more information
    pub more_info_url: Option<String>,
}

/// Circular area around a site tied to an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    /// Geofence id
    pub id: String,
    /// What the area marks
    pub kind: GeofenceKind,
    /// Action id
    pub action_id: String,
    /// Organization id
    pub organization_id: String,
    /// Organization display name
    pub organization_name: String,
    /// Kind of action
    pub action_type: ActionType,
    /// Center of the area
    pub center: Coordinates,
    /// Alert when closer than this
    pub notification_radius_m: f64,
    /// Display fields
    #[serde(default)]
    pub metadata: GeofenceMetadata,
}

/// Everything fetched for one region, replaced wholesale on refresh
#[derive(Debug, Clone)]
pub struct RegionCache {
    /// Center the data was fetched for
    pub center: Coordinates,
    /// Radius the data covers
    pub radius_m: f64,
    /// Refetch once the user is farther than this from `center`
    pub refresh_threshold_m: f64,
    /// Local time of the fetch
    pub fetched_at: SystemTime,
    /// Opaque version token from the source
    pub version: String,
    /// Refresh interval suggested by the source
    pub suggested_refresh: Option<Duration>,
    /// Blocklist for the region
    pub blocklist: Arc<BlocklistIndex>,
    /// Geofences for the region
    pub geofences: Arc<[Geofence]>,
}

impl RegionCache {
    /// Time since the fetch; zero if the clock went backwards
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed().unwrap_or_default()
    }
}

/// Holds the current [`RegionCache`], if any has been fetched yet
///
/// Readers load an `Arc` without locking. A refresh swaps the whole cache.
#[derive(Debug)]
pub struct RegionStore {
    current: ArcSwapOption<RegionCache>,
    empty: Arc<BlocklistIndex>,
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            empty: Arc::new(BlocklistIndex::new()),
        }
    }

    /// Create holding `cache`
    pub fn with_cache(cache: RegionCache) -> Self {
        let store = Self::new();
        store.replace(cache);
        store
    }

    /// Current cache
    pub fn load(&self) -> Option<Arc<RegionCache>> {
        self.current.load_full()
    }

    /// Publish a new cache
    pub fn replace(&self, cache: RegionCache) {
        info!(
            version = %cache.version,
            center = %cache.center,
            hosts = cache.blocklist.len(),
            geofences = cache.geofences.len(),
            "Region cache replaced"
        );
        self.current.store(Some(Arc::new(cache)));
    }

    /// Version token of the current cache
    pub fn version(&self) -> Option<String> {
        self.current.load().as_ref().map(|c| c.version.clone())
    }

    /// Whether nothing has been fetched yet
    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}

impl BlocklistView for RegionStore {
    fn snapshot(&self) -> Arc<BlocklistIndex> {
        match self.current.load().as_ref() {
            Some(cache) => Arc::clone(&cache.blocklist),
            None => Arc::clone(&self.empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::BlocklistEntry;

    fn cache(version: &str, host: &str) -> RegionCache {
        let entry = BlocklistEntry::new(host, "e", "E", ActionType::Strike, "a").unwrap();
        RegionCache {
            center: Coordinates::new(40.0, -74.0).unwrap(),
            radius_m: 100_000.0,
            refresh_threshold_m: 50_000.0,
            fetched_at: SystemTime::now(),
            version: version.to_string(),
            suggested_refresh: None,
            blocklist: Arc::new(BlocklistIndex::from_entries([entry])),
            geofences: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn test_empty_store_has_empty_blocklist() {
        let store = RegionStore::new();
        assert!(store.is_empty());
        assert!(store.version().is_none());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_replace_swaps_everything() {
        let store = RegionStore::with_cache(cache("v1", "a.com"));
        let old = store.snapshot();

        store.replace(cache("v2", "b.com"));
        assert_eq!(store.version().as_deref(), Some("v2"));
        assert!(store.snapshot().lookup("b.com").is_some());
        assert!(store.snapshot().lookup("a.com").is_none());
        assert!(old.lookup("a.com").is_some());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(GeofenceKind::from_label("picket-site"), GeofenceKind::PicketSite);
        assert_eq!(GeofenceKind::from_label("Action"), GeofenceKind::Action);
        assert_eq!(GeofenceKind::from_label("warehouse"), GeofenceKind::Other);
    }
}
