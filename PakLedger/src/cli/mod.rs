//! `PakLedger` CLI - catalog, ordering and ledger commands for pakfile sets

pub mod commands;
pub mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use commands::Commands;
use tracing::Level;

use crate::config::CatalogConfig;

#[derive(Parser)]
#[command(name = "pakledger", version)]
#[command(about = "PakLedger: catalog, order and checksum patched pakfile sets", long_about = None)]
struct Cli {
    /// Configuration file (default: ./pakledger.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors and hide progress bars
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Run the `PakLedger` CLI
pub fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging; stdout is kept for command output
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose, cli.quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = CatalogConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let status = cli.command.execute(&config, cli.quiet)?;

    Ok(status.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, false), Level::WARN);
        assert_eq!(log_level(2, false), Level::DEBUG);
        assert_eq!(log_level(9, false), Level::TRACE);
        assert_eq!(log_level(0, true), Level::ERROR);
    }
}
