//! Check command - blocklist lookups against a snapshot

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use opl_core::blocklist::normalize_host;
use opl_core::config::Config;
use std::path::PathBuf;

use super::{allowlist_path, load_region, open_allowlist, snapshot_path};

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Domains or URLs to look up
    #[arg(required = true)]
    pub domains: Vec<String>,

    /// Snapshot file (default: data.snapshot_path)
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Also report domains the allow-list covers
    #[arg(long)]
    pub with_allowlist: bool,
}

/// Execute check command
pub fn execute(args: CheckArgs, config: &Config) -> Result<()> {
    let path = snapshot_path(args.snapshot, config)?;
    let region = load_region(&path)?;
    let allowlist = if args.with_allowlist {
        Some(open_allowlist(&allowlist_path(None, config)?))
    } else {
        None
    };

    println!(
        "Snapshot {} ({} hosts, {} organizations)",
        region.version.bold(),
        region.blocklist.len(),
        region.blocklist.organizations().len()
    );
    println!();

    for domain in &args.domains {
        let Some(host) = normalize_host(domain) else {
            println!("  {} {}: not a valid domain", "?".yellow(), domain);
            continue;
        };

        match region.blocklist.lookup_normalized(&host) {
            Some(entry) => {
                let allowed = allowlist.as_ref().is_some_and(|list| list.covers(&host));
                let marker = if allowed { "✓".green() } else { "✗".red() };
                println!(
                    "  {} {} → {} ({}, matched {})",
                    marker,
                    host.bold(),
                    entry.organization_name,
                    entry.action_type,
                    entry.host
                );
                if allowed {
                    println!("      allowed by the allow-list");
                }
            }
            None => println!("  {} {}: no active action", "·".dimmed(), host),
        }
    }
    Ok(())
}
