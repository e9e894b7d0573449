//! Command-line arguments

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::commands::Command;

/// Online Picket Line - know when a site you visit is on strike
#[derive(Parser, Debug)]
#[command(name = "picketline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: search standard locations)
    #[arg(short = 'c', long, value_name = "FILE", global = true, env = "PICKETLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (default: from configuration)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// JSON lines
    Json,
    /// Compact text
    Compact,
}

impl LogFormat {
    /// Parse the `logging.format` configuration value
    pub fn from_config(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::allow::AllowCommand;

    #[test]
    fn test_verbose_count() {
        let args = Args::parse_from(["picketline", "-vv", "config", "path"]);
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);
        assert!(args.log_format.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "picketline",
            "check",
            "starbucks.com",
            "--log-format",
            "json",
            "--config",
            "/tmp/opl.toml",
        ]);
        assert_eq!(args.log_format, Some(LogFormat::Json));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/opl.toml")));
        assert!(matches!(args.command, Command::Check(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Args::try_parse_from(["picketline", "-q", "-v", "config", "path"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_coordinates() {
        let args = Args::parse_from([
            "picketline",
            "geofence",
            "--lat",
            "-33.86",
            "--lng",
            "151.2",
            "--snapshot",
            "region.json",
        ]);
        let Command::Geofence(geofence) = args.command else {
            panic!("expected geofence command");
        };
        assert_eq!(geofence.lat, -33.86);
        assert_eq!(geofence.lng, 151.2);
    }

    #[test]
    fn test_decode_requires_input() {
        assert!(Args::try_parse_from(["picketline", "decode"]).is_err());
        assert!(Args::try_parse_from(["picketline", "decode", "--domain", "a.com"]).is_ok());
    }

    #[test]
    fn test_allow_subcommands() {
        let args = Args::parse_from(["picketline", "allow", "add", "starbucks.com"]);
        let Command::Allow(allow) = args.command else {
            panic!("expected allow command");
        };
        assert!(matches!(allow.command, AllowCommand::Add { ref domain } if domain == "starbucks.com"));
    }

    #[test]
    fn test_log_format_from_config() {
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from_config("text"), LogFormat::Text);
    }
}
