//! Region snapshot documents and where they come from
//!
//! The JSON layout is the one published by the Online Picket Line mobile
//! data endpoint:
//!
//! ```json
//! {
//!   "version": "a1b2c3",
//!   "cachedRegion": { "center": { "lat": 40.0, "lng": -74.0 },
//!                     "radiusMeters": 160934, "refreshThresholdMeters": 128747 },
//!   "suggestedRefreshInterval": 900,
//!   "geofences": { "total": 1, "all": [ ... ] },
//!   "blocklist": { "totalUrls": 1, "totalEmployers": 1, "urls": [ ... ] }
//! }
//! ```

use super::{Coordinates, Geofence, GeofenceKind, GeofenceMetadata, RegionCache};
use crate::blocklist::{ActionType, BlocklistEntry, BlocklistIndex};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Top-level snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    /// Opaque version token
    pub version: String,
    /// Region the snapshot covers
    pub cached_region: CachedRegionDoc,
    /// Suggested refresh interval in seconds
    #[serde(default)]
    pub suggested_refresh_interval: Option<u64>,
    /// Geofences in the region
    #[serde(default)]
    pub geofences: GeofenceCollectionDoc,
    /// Blocklisted URLs in the region
    #[serde(default)]
    pub blocklist: BlocklistDoc,
    /// Server-side generation time
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// Region bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRegionDoc {
    /// Center of the region
    pub center: Coordinates,
    /// Radius covered
    pub radius_meters: f64,
    /// Distance from `center` past which data is stale
    pub refresh_threshold_meters: f64,
}

/// Geofence list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceCollectionDoc {
    /// Count as reported by the source
    #[serde(default)]
    pub total: usize,
    /// Every geofence
    #[serde(default)]
    pub all: Vec<GeofenceDoc>,
}

/// One geofence as published
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceDoc {
    /// Geofence id
    pub id: String,
    /// Kind label
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Action id
    #[serde(default)]
    pub action_id: String,
    /// Employer id
    #[serde(default)]
    pub employer_id: String,
    /// Employer display name
    #[serde(default)]
    pub employer_name: String,
    /// Action type label
    #[serde(default)]
    pub action_type: String,
    /// Center of the geofence
    pub coordinates: Coordinates,
    /// Alert radius in meters
    pub notification_radius: f64,
    /// Union or group running the action
    #[serde(default)]
    pub organization: Option<String>,
    /// Free-form location text
    #[serde(default)]
    pub location: Option<String>,
    /// Site name
    #[serde(default)]
    pub location_name: Option<String>,
    /// Site kind
    #[serde(default)]
    pub location_type: Option<String>,
    /// Start date
    #[serde(default)]
    pub start_date: Option<String>,
    /// End date
    #[serde(default)]
    pub end_date: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Demands
    #[serde(default)]
    pub demands: Option<String>,
    /// More information link
    #[serde(default)]
    pub more_info_url: Option<String>,
}

/// Blocklist section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistDoc {
    /// URL count as reported
    #[serde(default)]
    pub total_urls: usize,
    /// Employer count as reported
    #[serde(default)]
    pub total_employers: usize,
    /// Every URL
    #[serde(default)]
    pub urls: Vec<BlocklistUrlDoc>,
}

/// One blocklisted URL as published
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistUrlDoc {
    /// URL or bare host
    pub url: String,
    /// Employer display name
    #[serde(default)]
    pub employer: String,
    /// Employer id
    #[serde(default)]
    pub employer_id: String,
    /// Action type label
    #[serde(default)]
    pub action_type: String,
    /// Action id
    #[serde(default)]
    pub action_id: String,
}

impl GeofenceDoc {
    fn into_geofence(self) -> Option<Geofence> {
        if self.coordinates.validate().is_err()
            || !self.notification_radius.is_finite()
            || self.notification_radius < 0.0
        {
            return None;
        }
        Some(Geofence {
            id: self.id,
            kind: GeofenceKind::from_label(&self.kind),
            action_id: self.action_id,
            organization_id: self.employer_id,
            organization_name: self.employer_name,
            action_type: ActionType::from_label(&self.action_type),
            center: self.coordinates,
            notification_radius_m: self.notification_radius,
            metadata: GeofenceMetadata {
                organization: self.organization,
                location: self.location,
                location_name: self.location_name,
                location_type: self.location_type,
                start_date: self.start_date,
                end_date: self.end_date,
                description: self.description,
                demands: self.demands,
                more_info_url: self.more_info_url,
            },
        })
    }
}

impl SnapshotDocument {
    /// Parse a JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(Error::from)
    }

    /// Turn the document into a [`RegionCache`] stamped with `fetched_at`.
    ///
    /// Geofences with out-of-range coordinates or radius and URLs without a
    /// usable host are dropped. An invalid region center fails the whole
    /// document.
    pub fn into_region(self, fetched_at: SystemTime) -> Result<RegionCache> {
        let region = self.cached_region;
        region.center.validate()?;

        let total_geofences = self.geofences.all.len();
        let geofences: Vec<Geofence> = self
            .geofences
            .all
            .into_iter()
            .filter_map(GeofenceDoc::into_geofence)
            .collect();
        if geofences.len() < total_geofences {
            warn!(
                dropped = total_geofences - geofences.len(),
                "Dropped geofences with invalid coordinates or radius"
            );
        }

        let entries = self.blocklist.urls.into_iter().filter_map(|u| {
            let entry = BlocklistEntry::new(
                &u.url,
                u.employer_id,
                u.employer,
                ActionType::from_label(&u.action_type),
                u.action_id,
            );
            if entry.is_none() {
                debug!(url = %u.url, "Skipping blocklist URL without a usable host");
            }
            entry
        });
        let blocklist = BlocklistIndex::from_entries(entries);

        Ok(RegionCache {
            center: region.center,
            radius_m: region.radius_meters,
            refresh_threshold_m: region.refresh_threshold_meters,
            fetched_at,
            version: self.version,
            suggested_refresh: self.suggested_refresh_interval.map(Duration::from_secs),
            blocklist: Arc::new(blocklist),
            geofences: geofences.into(),
        })
    }
}

/// What the sync layer asks a source for
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Where the user is
    pub location: Coordinates,
    /// Requested coverage radius, if the caller has a preference
    pub radius_m: Option<f64>,
    /// Version already held; a source may answer `NotModified`
    pub known_version: Option<String>,
}

/// Result of a fetch
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Fresh data
    Updated(Box<RegionCache>),
    /// `known_version` is still current
    NotModified,
}

/// Remote or local provider of region snapshots
pub trait SnapshotSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch the snapshot for a location
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome>;
}

/// Snapshot read from a JSON file on disk
///
/// The file covers one fixed region, so the request location is ignored.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
    name: String,
}

impl FileSnapshotSource {
    /// Create a source reading `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file
    pub fn read_document(&self) -> Result<SnapshotDocument> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Fetch(format!("{}: {}", self.name, e)))?;
        SnapshotDocument::from_json(&content).map_err(|e| Error::snapshot(&self.name, e.to_string()))
    }

    /// Read the file into a cache regardless of version
    pub fn load(&self) -> Result<RegionCache> {
        self.read_document()?.into_region(SystemTime::now())
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let document = self.read_document()?;
        if request.known_version.as_deref() == Some(document.version.as_str()) {
            debug!(source = %self.name, version = %document.version, "Snapshot not modified");
            return Ok(FetchOutcome::NotModified);
        }
        let cache = document.into_region(SystemTime::now())?;
        Ok(FetchOutcome::Updated(Box::new(cache)))
    }
}
