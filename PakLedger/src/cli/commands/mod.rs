use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::StoreId;

pub mod audit;
pub mod definitions;
pub mod duplicates;
pub mod execute;
pub mod ledger;
pub mod manifest;
pub mod order;
pub mod reconcile;

use definitions::LedgerCommands;

/// Exit status for entry-level problems (malformed, conflicting, missing).
pub const EXIT_PROBLEMS: u8 = 3;

/// How a command finished, when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Clean,
    /// Finished, but some entries need the operator.
    Problems,
}

impl CommandStatus {
    pub fn from_problems(has_problems: bool) -> Self {
        if has_problems { Self::Problems } else { Self::Clean }
    }
}

impl From<CommandStatus> for ExitCode {
    fn from(status: CommandStatus) -> Self {
        match status {
            CommandStatus::Clean => ExitCode::SUCCESS,
            CommandStatus::Problems => ExitCode::from(EXIT_PROBLEMS),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Link a patch batch into a store's canonical directory
    Reconcile {
        /// Patch-batch directory, or its name under the configured batch dir
        batch: PathBuf,

        /// Storefront to reconcile into
        #[arg(short, long, value_enum)]
        store: StoreId,

        /// Hash newly linked files and append them to the store ledger
        #[arg(long)]
        update_checksums: bool,

        /// Plan and hash, but change nothing on disk
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find pakfiles with identical content
    Duplicates {
        /// Directories to scan
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Count every symlink separately instead of resolving it
        #[arg(long)]
        no_follow_links: bool,

        /// Scan every file, not just .pak
        #[arg(long)]
        all_files: bool,

        /// Print the groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print pakfile names in processing order
    Order {
        /// Directories to scan (reads names from stdin when omitted)
        dirs: Vec<PathBuf>,

        /// Leave out audio-only chunks
        #[arg(long)]
        skip_audio: bool,

        /// Check that A is processed before B
        #[arg(long, num_args = 2, value_names = ["A", "B"], conflicts_with_all = ["dirs", "skip_audio"])]
        check: Option<Vec<String>>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Checksum ledger commands
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },

    /// Report stale links, foreign files and unrecorded links
    Audit {
        /// Storefront to audit
        #[arg(short, long, value_enum)]
        store: StoreId,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a patch batch's manifest from the .pak files it holds
    Manifest {
        /// Patch-batch directory, or its name under the configured batch dir
        batch: PathBuf,

        /// Print the manifest instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
}
