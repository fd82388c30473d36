//! # PakLedger
//!
//! Catalog tooling for large, repeatedly patched Unreal Engine pakfile sets.
//!
//! ## What it does
//!
//! - **Identity** - parse `pakchunk<N>[tag]-<Platform>[_<rev>_P].pak` names
//!   into typed identities
//! - **Ordering** - a patch-aware total order (numeric chunks, base before
//!   patches, patches by revision)
//! - **Catalog** - per-storefront canonical directories of symlinks into
//!   patch-batch directories, reconciled idempotently
//! - **Ledger** - an append-only `sha256sum`-style checksum log per storefront
//! - **Duplicates** - group archives by content across directory trees
//!
//! ## Quick Start
//!
//! ### Ordering pakfiles
//!
//! ```
//! use pakledger::identity::{PakIdentity, sort_identities};
//!
//! let mut ids = vec![
//!     PakIdentity::parse("pakchunk10-WindowsNoEditor.pak")?,
//!     PakIdentity::parse("pakchunk9-WindowsNoEditor_1_P.pak")?,
//!     PakIdentity::parse("pakchunk9-WindowsNoEditor.pak")?,
//! ];
//! sort_identities(&mut ids);
//! assert_eq!(ids[0].raw_name(), "pakchunk9-WindowsNoEditor.pak");
//! # Ok::<(), pakledger::Error>(())
//! ```
//!
//! ### Reconciling a patch batch
//!
//! ```no_run
//! use pakledger::prelude::*;
//!
//! let config = CatalogConfig::load(None)?;
//! let catalog = StoreCatalog::from_config(&config, StoreId::Steam);
//! let batch = PatchBatch::open(config.batch_path("2022-03-24-launch".as_ref()), &config.manifest_name)?;
//!
//! let options = ReconcileOptions { update_checksums: true, dry_run: false };
//! let report = catalog.reconcile(&batch, options)?;
//! println!("{} created, {} conflicts", report.counts.created, report.counts.conflicting);
//! # Ok::<(), pakledger::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `pakledger` command-line binary

pub mod batch;
pub mod catalog;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hash;
pub mod identity;
pub mod ledger;
pub mod progress;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::identity::{
        PakIdentity, PakKind, PlanOptions, ProcessingPlan, StoreHint, compare, precedes,
        sort_identities,
    };

    pub use crate::batch::{PatchBatch, ReleaseId};
    pub use crate::catalog::{
        EntryOutcome, ReconcileOptions, ReconcileReport, StoreCatalog,
    };
    pub use crate::config::{CatalogConfig, StoreId};
    pub use crate::hash::{ContentDigest, ContentHasher, DigestAlgorithm};
    pub use crate::ledger::{ChecksumLedger, LedgerEntry};

    pub use crate::duplicates::{DuplicateGroup, DuplicateOptions, find_duplicates};
    pub use crate::progress::{Phase, Progress, ProgressCallback};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
