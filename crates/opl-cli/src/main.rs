//! Online Picket Line CLI
//!
//! Command-line front end for the DNS-observing tunnel.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Resolve configuration before logging, which reads its [logging] section
    let config = commands::config::load(args.config.as_deref())?;
    logging::init(&args, &config.logging)?;

    let result = commands::execute(args.command, &config);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}
