//! Decode command - show what the tunnel sees in a frame

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use colored::Colorize;
use opl_core::packet::{parse_query, DnsQueryBuilder};

/// Decode command arguments
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["frame", "domain"])))]
pub struct DecodeArgs {
    /// Frame as hex; whitespace and colons are ignored
    pub frame: Option<String>,

    /// Build a query frame for this domain instead
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Print the frame bytes as hex
    #[arg(long)]
    pub dump: bool,
}

/// Execute decode command
pub fn execute(args: DecodeArgs) -> Result<()> {
    let frame = match (&args.frame, &args.domain) {
        (Some(hex_frame), _) => parse_hex(hex_frame)?,
        (None, Some(domain)) => DnsQueryBuilder::new(domain.as_str())
            .build()
            .with_context(|| format!("Cannot build a query for '{domain}'"))?,
        (None, None) => anyhow::bail!("Nothing to decode"),
    };

    if args.dump || args.domain.is_some() {
        println!("{} ({} bytes)", hex::encode(&frame), frame.len());
    }

    match parse_query(&frame) {
        Ok(query) => {
            println!("{} {}", "✓".green(), query.name.bold());
            println!("  from {}:{}", query.src_addr, query.src_port);
            println!("  to   {}:53", query.dst_addr);
            println!("  id   {:#06x}", query.transaction_id);
        }
        Err(reason) => {
            println!("{} no DNS question: {}", "✗".red(), reason);
        }
    }
    Ok(())
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    hex::decode(cleaned).context("Frame is not valid hex")
}
