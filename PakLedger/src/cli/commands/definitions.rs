//! Subcommand enum definitions for CLI

use clap::Subcommand;

use crate::config::StoreId;

/// Checksum ledger commands
#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Print ledger entries
    Show {
        /// Storefront whose ledger to read
        #[arg(short, long, value_enum)]
        store: StoreId,

        /// Only the latest entry for each name
        #[arg(long)]
        latest: bool,
    },

    /// Re-hash the latest entry for each name through the canonical tree
    Verify {
        /// Storefront whose ledger to verify
        #[arg(short, long, value_enum)]
        store: StoreId,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
}
