//! CLI commands

pub mod allow;
pub mod check;
pub mod completions;
pub mod config;
pub mod decode;
pub mod geofence;
pub mod run;

use anyhow::{Context, Result};
use clap::Subcommand;
use opl_core::config::Config;
use opl_core::decision::{AllowList, FileAllowListStore};
use opl_core::region::{FileSnapshotSource, RegionCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the tunnel and alert on matching DNS lookups (main command)
    Run(run::RunArgs),

    /// Decode a raw IPv4 frame and show the DNS question it carries
    Decode(decode::DecodeArgs),

    /// Look up domains against a regional snapshot
    Check(check::CheckArgs),

    /// Show geofences around a location
    Geofence(geofence::GeofenceArgs),

    /// Manage always-allowed domains
    Allow(allow::AllowArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Run `command` with the resolved configuration
pub fn execute(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Run(args) => run::execute(args, config),
        Command::Decode(args) => decode::execute(args),
        Command::Check(args) => check::execute(args, config),
        Command::Geofence(args) => geofence::execute(args, config),
        Command::Allow(args) => allow::execute(args, config),
        Command::Config(args) => config::execute(args, config),
        Command::Completions(args) => completions::execute(args),
    }
}

/// Snapshot path from the command line, else from `[data]`
pub(crate) fn snapshot_path(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    arg.or_else(|| config.data.snapshot_path.clone()).context(
        "No snapshot file given; pass --snapshot or set data.snapshot_path in the config",
    )
}

/// Read a snapshot file into a region cache
pub(crate) fn load_region(path: &Path) -> Result<RegionCache> {
    FileSnapshotSource::new(path)
        .load()
        .with_context(|| format!("Failed to load snapshot from {}", path.display()))
}

/// Allow-list path from the command line, else from `[allowlist]`, else the
/// per-user data directory
pub(crate) fn allowlist_path(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    resolve_allowlist_path(arg, config, config::default_allowlist_path)
}

fn resolve_allowlist_path(
    arg: Option<PathBuf>,
    config: &Config,
    fallback: impl FnOnce() -> Option<PathBuf>,
) -> Result<PathBuf> {
    arg.or_else(|| config.allowlist.path.clone())
        .or_else(fallback)
        .context(
            "Cannot determine an allow-list location; set allowlist.path in the config, \
             or pass --allowlist to run or --file to allow",
        )
}

/// Open the allow-list at `path`.
///
/// An unreadable file is reported and replaced by an empty list, which the
/// first change then overwrites.
pub(crate) fn open_allowlist(path: &Path) -> AllowList {
    let store = Arc::new(FileAllowListStore::new(path));
    match AllowList::load(store.clone()) {
        Ok(list) => list,
        Err(e) => {
            warn!(path = %path.display(), "Failed to read allow-list, starting empty: {}", e);
            AllowList::empty(store)
        }
    }
}
