//! Allow command - manage always-allowed domains

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use opl_core::config::Config;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use super::{allowlist_path, open_allowlist};

/// Allow command arguments
#[derive(Args, Debug)]
pub struct AllowArgs {
    #[command(subcommand)]
    pub command: AllowCommand,

    /// Allow-list file (default: allowlist.path, then the user data directory)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,
}

/// Allow subcommands
#[derive(Subcommand, Debug)]
pub enum AllowCommand {
    /// List allowed domains
    List,

    /// Always allow a domain and its subdomains
    Add {
        /// Domain or URL
        domain: String,
    },

    /// Stop allowing a domain
    Remove {
        /// Domain or URL
        domain: String,
    },

    /// Remove every domain
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Execute allow command
pub fn execute(args: AllowArgs, config: &Config) -> Result<()> {
    let path = allowlist_path(args.file, config)?;
    let list = open_allowlist(&path);

    match args.command {
        AllowCommand::List => {
            if list.is_empty() {
                println!("No allowed domains ({})", path.display());
                return Ok(());
            }
            println!("Allowed domains ({}):", path.display());
            for domain in list.domains() {
                println!("  {}", domain);
            }
        }
        AllowCommand::Add { domain } => {
            if list.insert(&domain).context("Failed to update allow-list")? {
                println!("{} Allowed {}", "✓".green(), domain.bold());
            } else {
                println!("{} is already allowed", domain);
            }
        }
        AllowCommand::Remove { domain } => {
            if list.remove(&domain).context("Failed to update allow-list")? {
                println!("{} Removed {}", "✓".green(), domain.bold());
            } else {
                bail!("{} is not on the allow-list", domain);
            }
        }
        AllowCommand::Clear { yes } => {
            if !yes && !confirm(&format!("Remove all {} allowed domains?", list.len()))? {
                println!("Cancelled");
                return Ok(());
            }
            list.clear().context("Failed to update allow-list")?;
            println!("{} Allow-list cleared", "✓".green());
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
