//! Config command - configuration management

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;
use opl_core::config::Config;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name searched for in the working directory
const LOCAL_CONFIG: &str = "picketline.toml";

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with every default spelled out
    Init {
        /// Output file path (default: user config directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate (default: the one in use)
        file: Option<PathBuf>,
    },

    /// Show config file locations
    Path,
}

/// Execute config command
pub fn execute(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.action {
        ConfigAction::Show => show_config(config),
        ConfigAction::Init { output, force } => init_config(output, force),
        ConfigAction::Validate { file } => validate_config(file, config),
        ConfigAction::Path => show_paths(),
    }
}

/// Per-user project directories
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "picketline")
}

/// Config file in the per-user config directory
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Allow-list file in the per-user data directory
pub fn default_allowlist_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("allowed.txt"))
}

/// First existing config file among the standard locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    user_config_path().filter(|path| path.exists())
}

/// Resolve the configuration: an explicit path must exist, otherwise the
/// standard locations are searched and defaults apply when none is found.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let config = Config::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn show_config(config: &Config) -> Result<()> {
    let toml_str = config.to_toml().context("Failed to serialize config")?;
    println!("{}", toml_str);
    Ok(())
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<()> {
    let output = output
        .or_else(user_config_path)
        .context("Cannot determine a config directory; pass --output")?;

    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let config = Config::default();
    let toml_str = config.to_toml().context("Failed to serialize config")?;
    let content = format!(
        "# Online Picket Line configuration\n\
         # Every value below is the built-in default\n\n\
         {}",
        toml_str
    );

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write config to {}", output.display()))?;

    info!(path = %output.display(), "Generated config file");
    println!("Configuration file generated: {}", output.display());
    Ok(())
}

fn validate_config(file: Option<PathBuf>, in_use: &Config) -> Result<()> {
    let config = match file {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => in_use.clone(),
    };

    config.validate().context("Configuration validation failed")?;

    println!("{} Configuration is valid", "✓".green());
    println!("  Tunnel:    {} (mtu {})", config.tunnel.session, config.tunnel.mtu);
    println!(
        "  Snapshot:  {}",
        config
            .data
            .snapshot_path
            .as_ref()
            .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
    );
    println!("  Refresh:   every {}s", config.data.refresh_interval_secs);
    println!("  Alerts:    queue {}", config.alerts.queue_capacity);
    if let Some(position) = config.location.coordinates()? {
        println!("  Location:  {}", position);
    }
    Ok(())
}

fn show_paths() -> Result<()> {
    println!("Configuration file search paths:");
    println!();
    println!("  1. ./{}", LOCAL_CONFIG);
    if let Some(path) = user_config_path() {
        println!("  2. {}", path.display());
    }
    if let Some(path) = find_config_file() {
        println!();
        println!("In use: {}", path.display().to_string().bold());
    }

    println!();
    println!("Allow-list file:");
    println!();
    if let Some(path) = default_allowlist_path() {
        println!("  {}", path.display());
    }
    Ok(())
}
