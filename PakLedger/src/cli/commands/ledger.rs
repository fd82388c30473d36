//! CLI commands for checksum ledgers

use anyhow::Context;

use super::CommandStatus;
use crate::catalog::StoreCatalog;
use crate::cli::progress::{LOOKING_GLASS, print_problem, print_step};
use crate::config::{CatalogConfig, StoreId};
use crate::ledger::VerifyStatus;

/// Print a store's ledger in `sha256sum` format.
pub fn show(config: &CatalogConfig, store: StoreId, latest: bool) -> anyhow::Result<CommandStatus> {
    let catalog = StoreCatalog::from_config(config, store);
    let ledger = catalog
        .open_ledger()
        .with_context(|| format!("Failed to read {}", catalog.ledger_path().display()))?;

    if latest {
        for (name, digest) in ledger.latest() {
            println!("{digest}  {name}");
        }
    } else {
        for entry in ledger.entries() {
            println!("{}", entry.to_line());
        }
    }
    Ok(CommandStatus::Clean)
}

/// Re-hash every recorded file and report what no longer matches.
pub fn verify(
    config: &CatalogConfig,
    store: StoreId,
    json: bool,
    quiet: bool,
) -> anyhow::Result<CommandStatus> {
    let catalog = StoreCatalog::from_config(config, store);
    let ledger = catalog
        .open_ledger()
        .with_context(|| format!("Failed to read {}", catalog.ledger_path().display()))?;

    if !json && !quiet {
        print_step(
            1,
            1,
            LOOKING_GLASS,
            &format!("Verifying {} entries for {store}...", ledger.latest().len()),
        );
    }
    let report = ledger.verify(catalog.canonical_dir(), catalog.hasher());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (name, status) in report.problems() {
            match status {
                VerifyStatus::Ok => {}
                VerifyStatus::Mismatch { expected, actual } => {
                    print_problem("mismatch", &format!("{name}: ledger {expected}, file {actual}"));
                }
                VerifyStatus::Missing => print_problem("missing", name),
                VerifyStatus::Unreadable { message } => {
                    print_problem("unreadable", &format!("{name}: {message}"));
                }
            }
        }
        if report.is_clean() {
            println!("All {} entries match", report.results.len());
        }
    }

    Ok(CommandStatus::from_problems(!report.is_clean()))
}
