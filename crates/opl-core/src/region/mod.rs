//! Regional data: geofences and the blocklist for the area around the user
//!
//! A [`RegionCache`] is fetched for a center point through a
//! [`SnapshotSource`], published into a [`RegionStore`] by [`RegionSync`],
//! and read concurrently by the decision engine (as a
//! [`BlocklistView`](crate::blocklist::BlocklistView)) and the proximity
//! monitor.

mod cache;
mod geo;
mod location;
mod snapshot;
mod sync;

pub use cache::{Geofence, GeofenceKind, GeofenceMetadata, RegionCache, RegionStore};
pub use geo::Coordinates;
pub use location::{FixedLocation, LocationProvider};
pub use snapshot::{
    BlocklistDoc, BlocklistUrlDoc, CachedRegionDoc, FetchOutcome, FetchRequest,
    FileSnapshotSource, GeofenceCollectionDoc, GeofenceDoc, SnapshotDocument, SnapshotSource,
};
pub use sync::{RegionSync, SyncOutcome};
