//! Proximity engine
//!
//! Great-circle distances between the user and geofences, and the
//! staleness check that decides when regional data must be refetched.

use crate::region::{Coordinates, Geofence, RegionStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Mean earth radius (WGS-84), meters
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance in meters
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Clamp rounding noise so asin stays defined near antipodes
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// A geofence the user is inside of
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceHit {
    /// The geofence
    pub geofence: Geofence,
    /// Distance from its center, meters
    pub distance_m: f64,
}

/// Geofences whose notification radius contains (`lat`, `lng`), nearest
/// first
pub fn check_geofences(lat: f64, lng: f64, geofences: &[Geofence]) -> Vec<GeofenceHit> {
    let here = Coordinates { lat, lng };
    let mut hits: Vec<GeofenceHit> = geofences
        .iter()
        .filter_map(|geofence| {
            let distance_m = distance_meters(here, geofence.center);
            (distance_m <= geofence.notification_radius_m).then(|| GeofenceHit {
                geofence: geofence.clone(),
                distance_m,
            })
        })
        .collect();
    hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    hits
}

/// Whether (`lat`, `lng`) is farther than `threshold_m` from `cached_center`
pub fn should_refresh(lat: f64, lng: f64, cached_center: Coordinates, threshold_m: f64) -> bool {
    distance_meters(Coordinates { lat, lng }, cached_center) > threshold_m
}

/// Outcome of one location update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityUpdate {
    /// Geofences the user is inside, nearest first
    pub hits: Vec<GeofenceHit>,
    /// Regional data should be refetched
    pub refresh_needed: bool,
}

/// Evaluates location updates against the current region snapshot
#[derive(Debug, Clone)]
pub struct ProximityMonitor {
    store: Arc<RegionStore>,
}

impl ProximityMonitor {
    /// Create a monitor reading `store`
    pub fn new(store: Arc<RegionStore>) -> Self {
        Self { store }
    }

    /// Check `position` against the cached region.
    ///
    /// With nothing cached there are no hits and a refresh is always needed.
    pub fn on_location(&self, position: Coordinates) -> ProximityUpdate {
        let Some(cache) = self.store.load() else {
            debug!(%position, "No region cached, refresh needed");
            return ProximityUpdate {
                hits: Vec::new(),
                refresh_needed: true,
            };
        };

        let hits = check_geofences(position.lat, position.lng, &cache.geofences);
        let refresh_needed = should_refresh(
            position.lat,
            position.lng,
            cache.center,
            cache.refresh_threshold_m,
        );

        for hit in &hits {
            info!(
                geofence = %hit.geofence.id,
                organization = %hit.geofence.organization_name,
                distance_m = hit.distance_m.round(),
                "Inside geofence"
            );
        }
        if refresh_needed {
            debug!(%position, center = %cache.center, "Left cached region, refresh needed");
        }

        ProximityUpdate {
            hits,
            refresh_needed,
        }
    }
}
