//! Run command - tunnel, region refresh and alert handling

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use opl_core::config::Config;
use opl_core::region::{FileSnapshotSource, FixedLocation, LocationProvider, SyncOutcome};
use opl_core::{AlertRequest, DecisionEngine, ProximityMonitor, RegionStore, RegionSync, UserAction};
use opl_service::{ServiceRegistry, TunnelService};
use std::collections::HashSet;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{allowlist_path, load_region, open_allowlist};

/// How long the main loop waits for an alert before doing housekeeping
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest gap between refreshes caused by leaving the held region
const MIN_RELOCATION_REFRESH: Duration = Duration::from_secs(30);

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Snapshot file (overrides data.snapshot_path)
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Current latitude (overrides location.latitude)
    #[arg(long, allow_negative_numbers = true, requires = "lng")]
    pub lat: Option<f64>,

    /// Current longitude (overrides location.longitude)
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    pub lng: Option<f64>,

    /// Allow-list file (overrides allowlist.path)
    #[arg(long)]
    pub allowlist: Option<PathBuf>,

    /// Tunnel interface name (overrides tunnel.device_name)
    #[arg(long)]
    pub device: Option<String>,

    /// Log alerts instead of asking what to do
    #[arg(long)]
    pub log_only: bool,

    /// Load everything, print a summary and exit without opening the tunnel
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command
pub fn execute(args: RunArgs, config: &Config) -> Result<()> {
    let config = apply_overrides(&args, config)?;
    info!(session = %config.tunnel.session, "Starting Online Picket Line");

    let location = FixedLocation::new(config.location.coordinates()?);
    let store = Arc::new(RegionStore::new());
    let sync = match &config.data.snapshot_path {
        Some(path) => {
            let source = Arc::new(FileSnapshotSource::new(path));
            let sync = RegionSync::new(source, Arc::clone(&store)).with_radius(config.data.radius_m);
            match location.current() {
                Some(position) => {
                    let outcome = sync
                        .refresh(position)
                        .context("Initial region fetch failed")?;
                    log_outcome(&outcome);
                }
                None => store.replace(load_region(path)?),
            }
            Some(sync)
        }
        None => {
            warn!("No snapshot configured; no domain will match");
            None
        }
    };

    let allowlist = open_allowlist(&allowlist_path(args.allowlist.clone(), &config)?);
    let engine = Arc::new(DecisionEngine::new(store.clone(), allowlist));
    let monitor = ProximityMonitor::new(Arc::clone(&store));

    let (hosts, geofences) = loaded_counts(&store);
    info!(
        hosts,
        geofences,
        allowed = engine.allowlist().len(),
        "Data loaded"
    );

    if args.dry_run {
        println!("Configuration validated successfully");
        println!("  Blocklist: {} hosts", hosts);
        println!("  Geofences: {}", geofences);
        println!("  Allowed:   {} domains", engine.allowlist().len());
        return Ok(());
    }

    let provider = opl_platform::default_provider().context("Cannot open a tunnel device")?;
    let service = TunnelService::new(Arc::from(provider), Arc::clone(&engine), config.tunnel.clone())
        .with_alert_capacity(config.alerts.queue_capacity);
    let registry = ServiceRegistry::new();
    let alerts = registry
        .start(&service)
        .context("Failed to start the tunnel (root or CAP_NET_ADMIN is required)")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    print_banner(&registry);

    let interactive = config.alerts.interactive && !args.log_only && io::stdin().is_terminal();
    if !interactive {
        debug!("Alerts are logged only");
    }

    let mut inside = HashSet::new();
    check_proximity(&monitor, &location, &mut inside);
    let mut last_refresh = Instant::now();

    while running.load(Ordering::SeqCst) {
        match alerts.recv_timeout(POLL_INTERVAL) {
            Ok(Some(alert)) => handle_alert(&engine, &alert, interactive),
            Ok(None) => {}
            Err(()) => {
                error!("Tunnel worker exited");
                break;
            }
        }

        if !registry.is_running() {
            error!("Tunnel stopped unexpectedly");
            break;
        }

        let interval = store
            .load()
            .and_then(|cache| cache.suggested_refresh)
            .unwrap_or_else(|| config.data.refresh_interval());
        let since = last_refresh.elapsed();
        if since >= interval.min(MIN_RELOCATION_REFRESH) {
            let timer_due = since >= interval;
            let refreshed =
                maintain_region(sync.as_ref(), &monitor, &location, &mut inside, timer_due);
            if refreshed || timer_due {
                last_refresh = Instant::now();
            }
        }
    }

    let stats = registry.handle().map(|handle| handle.stats());
    registry.stop();

    if let Some(stats) = stats {
        info!("Session ended: {}", stats);
    }
    let history = engine.history();
    if !history.is_empty() {
        println!();
        println!("Matched this session:");
        for record in history {
            println!(
                "  {} ({}): {}",
                record.domain, record.entry.organization_name, record.decision
            );
        }
    }
    Ok(())
}

fn print_banner(registry: &ServiceRegistry) {
    let device = registry
        .handle()
        .map(|handle| handle.device_name().to_string())
        .unwrap_or_default();

    println!();
    println!("{}", "Online Picket Line".green().bold());
    println!("Watching DNS lookups on {}. Press Ctrl-C to stop.", device.bold());
    println!();
}

/// Command-line values replace config values; the result is validated
fn apply_overrides(args: &RunArgs, config: &Config) -> Result<Config> {
    let mut config = config.clone();
    if let Some(path) = &args.snapshot {
        config.data.snapshot_path = Some(path.clone());
    }
    if let (Some(lat), Some(lng)) = (args.lat, args.lng) {
        config.location.latitude = Some(lat);
        config.location.longitude = Some(lng);
    }
    if let Some(path) = &args.allowlist {
        config.allowlist.path = Some(path.clone());
    }
    if let Some(device) = &args.device {
        config.tunnel.device_name = Some(device.clone());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Blocklist hosts and geofences currently held
fn loaded_counts(store: &RegionStore) -> (usize, usize) {
    store
        .load()
        .map_or((0, 0), |cache| (cache.blocklist.len(), cache.geofences.len()))
}

fn refresh(sync: &RegionSync, location: &dyn LocationProvider) {
    // Without a live position, re-request the area already held
    let Some(position) = location
        .current()
        .or_else(|| sync.store().load().map(|cache| cache.center))
    else {
        return;
    };

    match sync.refresh(position) {
        Ok(outcome) => log_outcome(&outcome),
        Err(e) => warn!("Region refresh failed: {}", e),
    }
}

/// Refresh the region when the timer is due or the position has left the
/// held region, then re-check geofences. Returns whether a refresh ran.
fn maintain_region(
    sync: Option<&RegionSync>,
    monitor: &ProximityMonitor,
    location: &dyn LocationProvider,
    inside: &mut HashSet<String>,
    timer_due: bool,
) -> bool {
    let out_of_region = check_proximity(monitor, location, inside);
    let Some(sync) = sync else {
        return false;
    };
    if !timer_due && !out_of_region {
        return false;
    }

    if out_of_region {
        info!("Position is outside the held region, refreshing");
    }
    refresh(sync, location);
    check_proximity(monitor, location, inside);
    true
}

fn log_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Updated { version } => info!(%version, "Region data updated"),
        SyncOutcome::NotModified => debug!("Region data unchanged"),
        SyncOutcome::Stale { reason } => {
            warn!(%reason, "Region refresh failed, keeping previous data")
        }
    }
}

/// Announce geofences newly entered. Returns whether the held region no
/// longer covers the current position.
fn check_proximity(
    monitor: &ProximityMonitor,
    location: &dyn LocationProvider,
    inside: &mut HashSet<String>,
) -> bool {
    let Some(position) = location.current() else {
        return false;
    };

    let update = monitor.on_location(position);
    let now_inside: HashSet<String> = update.hits.iter().map(|h| h.geofence.id.clone()).collect();
    for hit in update.hits.iter().filter(|h| !inside.contains(&h.geofence.id)) {
        println!(
            "{} You are {:.0} m from a picket line: {} ({})",
            "●".red(),
            hit.distance_m,
            hit.geofence.organization_name.bold(),
            hit.geofence.action_type
        );
    }
    *inside = now_inside;

    if update.refresh_needed {
        debug!(%position, "Region data does not cover the current position");
    }
    update.refresh_needed
}

fn handle_alert(engine: &DecisionEngine, alert: &AlertRequest, interactive: bool) {
    println!();
    println!(
        "{} {} belongs to {}, which has an active {}.",
        "⚠".yellow(),
        alert.domain.bold(),
        alert.organization_name.bold(),
        alert.action_type
    );

    if !interactive {
        info!(domain = %alert.domain, "Alert logged, no answer requested");
        return;
    }

    let action = match prompt_action() {
        Ok(action) => action,
        Err(e) => {
            warn!("Failed to read answer, keeping block: {}", e);
            UserAction::KeepBlocking
        }
    };

    match engine.resolve(&alert.domain, action) {
        Ok(decision) => println!("  {} {}", alert.domain, decision),
        Err(e) => warn!(domain = %alert.domain, "Failed to record answer: {}", e),
    }
}

fn prompt_action() -> Result<UserAction> {
    print!("  Allow [o]nce, allow [a]lways, or [k]eep blocking? [k]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(parse_choice(&input).unwrap_or(UserAction::KeepBlocking))
}

fn parse_choice(input: &str) -> Option<UserAction> {
    match input.trim().to_lowercase().as_str() {
        "o" | "once" => Some(UserAction::AllowOnce),
        "a" | "always" => Some(UserAction::AllowAlways),
        "" | "k" | "keep" | "b" | "block" => Some(UserAction::KeepBlocking),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opl_core::Coordinates;

    fn args() -> RunArgs {
        RunArgs {
            snapshot: None,
            lat: None,
            lng: None,
            allowlist: None,
            device: None,
            log_only: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("o\n"), Some(UserAction::AllowOnce));
        assert_eq!(parse_choice(" Always "), Some(UserAction::AllowAlways));
        assert_eq!(parse_choice("\n"), Some(UserAction::KeepBlocking));
        assert_eq!(parse_choice("maybe"), None);
    }

    #[test]
    fn test_apply_overrides() {
        let mut run = args();
        run.snapshot = Some(PathBuf::from("region.json"));
        run.lat = Some(40.0);
        run.lng = Some(-74.0);
        run.device = Some("opl0".to_string());

        let config = apply_overrides(&run, &Config::default()).unwrap();
        assert_eq!(config.data.snapshot_path, Some(PathBuf::from("region.json")));
        assert_eq!(config.location.coordinates().unwrap().unwrap().lng, -74.0);
        assert_eq!(config.tunnel.device_name.as_deref(), Some("opl0"));
    }

    #[test]
    fn test_apply_overrides_rejects_bad_location() {
        let mut run = args();
        run.lat = Some(91.0);
        run.lng = Some(0.0);
        assert!(apply_overrides(&run, &Config::default()).is_err());
    }

    fn region_json(version: &str, lat: f64) -> String {
        format!(
            r#"{{"version":"{version}","cachedRegion":{{"center":{{"lat":{lat},"lng":-74.0}},"radiusMeters":1000,"refreshThresholdMeters":800}}}}"#
        )
    }

    #[test]
    fn test_leaving_region_triggers_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.json");
        std::fs::write(&path, region_json("v1", 40.0)).unwrap();

        let store = Arc::new(RegionStore::new());
        let sync = RegionSync::new(Arc::new(FileSnapshotSource::new(&path)), Arc::clone(&store));
        let home = Coordinates::new(40.0, -74.0).unwrap();
        sync.refresh(home).unwrap();

        let monitor = ProximityMonitor::new(Arc::clone(&store));
        let location = FixedLocation::new(Some(home));
        let mut inside = HashSet::new();
        std::fs::write(&path, region_json("v2", 41.0)).unwrap();

        // Inside the held region with the timer not due: nothing is fetched
        assert!(!maintain_region(Some(&sync), &monitor, &location, &mut inside, false));
        assert_eq!(store.version().as_deref(), Some("v1"));

        location.set(Some(Coordinates::new(41.0, -74.0).unwrap()));
        assert!(maintain_region(Some(&sync), &monitor, &location, &mut inside, false));
        assert_eq!(store.version().as_deref(), Some("v2"));
        assert!(!monitor.on_location(Coordinates::new(41.0, -74.0).unwrap()).refresh_needed);
    }

    #[test]
    fn test_timer_refresh_without_sync_is_skipped() {
        let monitor = ProximityMonitor::new(Arc::new(RegionStore::new()));
        let location = FixedLocation::new(Some(Coordinates::new(40.0, -74.0).unwrap()));
        let mut inside = HashSet::new();
        assert!(!maintain_region(None, &monitor, &location, &mut inside, true));
    }

    #[test]
    fn test_check_proximity_without_location() {
        let monitor = ProximityMonitor::new(Arc::new(RegionStore::new()));
        let mut inside = HashSet::new();
        assert!(!check_proximity(&monitor, &FixedLocation::default(), &mut inside));
    }
}
