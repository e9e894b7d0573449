//! Logging initialization

use anyhow::{Context, Result};
use opl_core::config::LoggingConfig;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Initialize logging from CLI arguments, falling back to the config file
pub fn init(args: &Args, config: &LoggingConfig) -> Result<()> {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => config
                .level
                .parse::<Level>()
                .with_context(|| format!("Invalid log level in config: {}", config.level))?,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // RUST_LOG still wins for individual targets
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let format = args
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.format));
    let log_file = args.log_file.as_deref().or(config.file.as_deref());

    match format {
        LogFormat::Text => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(args.verbose >= 2)
                    .with_thread_names(args.verbose >= 2)
                    .with_file(args.verbose >= 3)
                    .with_line_number(args.verbose >= 3),
            );

            if let Some(path) = log_file {
                let file_layer = fmt::layer().with_ansi(false).with_writer(create(path)?);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr));

            if let Some(path) = log_file {
                let file_layer = fmt::layer().json().with_writer(create(path)?);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr));

            if let Some(path) = log_file {
                let file_layer = fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(create(path)?);
                subscriber.with(file_layer).init();
            } else {
                subscriber.init();
            }
        }
    }

    Ok(())
}

fn create(path: &Path) -> Result<std::sync::Mutex<std::fs::File>> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    Ok(std::sync::Mutex::new(file))
}
