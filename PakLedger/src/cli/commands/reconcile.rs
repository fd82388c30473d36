//! CLI command for reconciling a patch batch

use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use super::CommandStatus;
use crate::batch::PatchBatch;
use crate::catalog::{EntryOutcome, ReconcileOptions, ReconcileReport, StoreCatalog};
use crate::cli::progress::{LINK, LOOKING_GLASS, phase_bar, print_done, print_problem, print_step, update_bar};
use crate::config::{CatalogConfig, StoreId};
use crate::error::Error;
use crate::progress::Progress;

pub fn execute(
    config: &CatalogConfig,
    batch: &Path,
    store: StoreId,
    options: ReconcileOptions,
    json: bool,
    quiet: bool,
) -> anyhow::Result<CommandStatus> {
    let started = Instant::now();
    let batch_dir = config.batch_path(batch);
    let batch = PatchBatch::open(&batch_dir, &config.manifest_name)
        .with_context(|| format!("Failed to open patch batch {}", batch_dir.display()))?;
    let catalog = StoreCatalog::from_config(config, store);

    let chatty = !json && !quiet;
    if chatty {
        print_step(
            1,
            2,
            LOOKING_GLASS,
            &format!("Reading {} for {store}...", batch.manifest_path().display()),
        );
    }

    let pb = phase_bar(!chatty);
    let report = catalog
        .reconcile_with_progress(&batch, options, &|p: &Progress| update_bar(&pb, p))
        .with_context(|| format!("Failed to reconcile {} into {store}", batch.name()))?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if chatty {
            print_step(2, 2, LINK, &summary_line(&report));
        }
        print_entries(&report);
        if chatty {
            print_done(started.elapsed());
        }
    }

    Ok(CommandStatus::from_problems(report.has_problems()))
}

fn summary_line(report: &ReconcileReport) -> String {
    let counts = report.counts;
    let verb = if report.dry_run { "would create" } else { "created" };
    format!(
        "{verb} {}, current {}, conflicts {}, malformed {}, missing {}, ledger +{}",
        counts.created,
        counts.already_current,
        counts.conflicting,
        counts.malformed,
        counts.missing,
        report.ledger_appended
    )
}

fn print_entries(report: &ReconcileReport) {
    for entry in &report.entries {
        match &entry.outcome {
            EntryOutcome::Created { target, digest } => match digest {
                Some(digest) => println!("  + {} -> {} ({digest})", entry.raw_name, target.display()),
                None => println!("  + {} -> {}", entry.raw_name, target.display()),
            },
            EntryOutcome::AlreadyCurrent => {}
            EntryOutcome::Conflict { existing, expected } => print_problem(
                "conflict",
                &format!(
                    "{} points to {}, batch has {}",
                    entry.raw_name,
                    existing.display(),
                    expected.display()
                ),
            ),
            EntryOutcome::Malformed { reason } => {
                print_problem("malformed", &format!("{}: {reason}", entry.raw_name));
            }
            EntryOutcome::Missing { expected } => {
                print_problem("missing", &format!("{} not found at {}", entry.raw_name, expected.display()));
            }
        }
    }
    for ambiguity in &report.ambiguities {
        print_problem("ambiguous", &Error::from(ambiguity.clone()).to_string());
    }
}
