//! Geofence command - proximity check for one position

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use opl_core::config::Config;
use opl_core::proximity::distance_meters;
use opl_core::{Coordinates, ProximityMonitor, RegionStore};
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_region, snapshot_path};

/// Geofence command arguments
#[derive(Args, Debug)]
pub struct GeofenceArgs {
    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,

    /// Snapshot file (default: data.snapshot_path)
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,
}

/// Execute geofence command
pub fn execute(args: GeofenceArgs, config: &Config) -> Result<()> {
    let position = Coordinates::new(args.lat, args.lng).context("Invalid position")?;
    let path = snapshot_path(args.snapshot, config)?;
    let region = load_region(&path)?;

    let center = region.center;
    let threshold = region.refresh_threshold_m;
    let total = region.geofences.len();
    let store = Arc::new(RegionStore::with_cache(region));
    let update = ProximityMonitor::new(store).on_location(position);

    println!(
        "{} of {} geofences contain {}",
        update.hits.len(),
        total,
        position
    );
    for hit in &update.hits {
        let fence = &hit.geofence;
        println!(
            "  {} {} ({}) {:.0} m away, radius {:.0} m",
            "●".red(),
            fence.organization_name.bold(),
            fence.metadata.location_name.as_deref().unwrap_or(&fence.id),
            hit.distance_m,
            fence.notification_radius_m
        );
        if let Some(description) = &fence.metadata.description {
            println!("      {}", description);
        }
    }

    println!();
    let from_center = distance_meters(position, center);
    if update.refresh_needed {
        println!(
            "{} {:.0} m from snapshot center {} (threshold {:.0} m): refresh needed",
            "↻".yellow(),
            from_center,
            center,
            threshold
        );
    } else {
        println!(
            "{:.0} m from snapshot center {} (threshold {:.0} m)",
            from_center, center, threshold
        );
    }
    Ok(())
}
