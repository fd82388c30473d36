//! Command execution implementations

use super::definitions::LedgerCommands;
use super::{CommandStatus, Commands};
use super::{audit, duplicates, ledger, manifest, order, reconcile};
use crate::catalog::ReconcileOptions;
use crate::config::CatalogConfig;

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying operation fails.
    pub fn execute(&self, config: &CatalogConfig, quiet: bool) -> anyhow::Result<CommandStatus> {
        match self {
            Commands::Reconcile {
                batch,
                store,
                update_checksums,
                dry_run,
                json,
            } => reconcile::execute(
                config,
                batch,
                *store,
                ReconcileOptions {
                    update_checksums: *update_checksums,
                    dry_run: *dry_run,
                },
                *json,
                quiet,
            ),
            Commands::Duplicates {
                dirs,
                no_follow_links,
                all_files,
                json,
            } => duplicates::execute(config, dirs, !*no_follow_links, *all_files, *json, quiet),
            Commands::Order {
                dirs,
                skip_audio,
                check,
                json,
            } => match check.as_deref() {
                Some([first, second]) => order::check(first, second),
                _ => order::execute(config, dirs, *skip_audio, *json),
            },
            Commands::Ledger { command } => command.execute(config, quiet),
            Commands::Audit { store, json } => audit::execute(config, *store, *json),
            Commands::Manifest { batch, dry_run } => manifest::execute(config, batch, *dry_run),
        }
    }
}

impl LedgerCommands {
    /// Execute the selected ledger command.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be read.
    pub fn execute(&self, config: &CatalogConfig, quiet: bool) -> anyhow::Result<CommandStatus> {
        match self {
            LedgerCommands::Show { store, latest } => ledger::show(config, *store, *latest),
            LedgerCommands::Verify { store, json } => ledger::verify(config, *store, *json, quiet),
        }
    }
}
