//! Reconciling a patch batch into a store catalog
//!
//! A run has four steps:
//!
//! 1. Plan: parse every manifest name and look at its canonical path.
//! 2. Hash: digest every file that will get a new link (parallel, read-only).
//! 3. Link: create the links one by one with create-or-fail semantics.
//! 4. Record: append digests for links that were actually created.
//!
//! Nothing is mutated before step 3, so a hashing failure leaves the catalog
//! untouched. If linking fails part-way, the links that did get created are
//! still recorded before the error is returned. Links that exist but have no
//! ledger line (an earlier run failed to append, or ran without checksums)
//! are hashed and recorded alongside the new ones.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::report::{EntryOutcome, ReconcileReport};
use super::{LinkState, StoreCatalog, link_state};
use crate::batch::PatchBatch;
use crate::error::{Error, Result};
use crate::hash::ContentDigest;
use crate::identity::{PakIdentity, find_ambiguities};
use crate::ledger::LedgerEntry;
use crate::progress::{Phase, Progress, ProgressCallback, no_progress};
use crate::utils::path::{absolute, relative_path_from, symlink_file};
use crate::utils::run_in_pool;

/// Options for [`StoreCatalog::reconcile`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Hash newly linked files and append them to the store ledger.
    pub update_checksums: bool,
    /// Plan and hash, but create no links and append nothing.
    pub dry_run: bool,
}

/// A manifest entry that will get a new link, or an existing link the
/// ledger has no line for.
struct PendingLink {
    /// Index into the report's entries.
    slot: usize,
    /// False when the link is already in place and only needs recording.
    create: bool,
    raw_name: String,
    source: PathBuf,
    link: PathBuf,
    target: PathBuf,
    digest: Option<ContentDigest>,
}

impl StoreCatalog {
    /// Reconcile a patch batch into this store.
    ///
    /// Per-entry problems (malformed names, conflicts, missing files) land in
    /// the report. IO failures on the manifest, ledger or canonical directory
    /// abort the run.
    pub fn reconcile(&self, batch: &PatchBatch, options: ReconcileOptions) -> Result<ReconcileReport> {
        self.reconcile_with_progress(batch, options, &no_progress)
    }

    /// Reconcile with a progress callback.
    pub fn reconcile_with_progress(
        &self,
        batch: &PatchBatch,
        options: ReconcileOptions,
        progress: ProgressCallback,
    ) -> Result<ReconcileReport> {
        let names = batch.raw_names()?;
        // Open the ledger before anything else so an unreadable one fails early
        let mut ledger = if options.update_checksums {
            Some(self.open_ledger()?)
        } else {
            None
        };

        info!(
            "Reconciling {} ({} entries) into {} catalog{}",
            batch.name(),
            names.len(),
            self.store(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let canonical_base = if options.dry_run {
            absolute(self.canonical_dir()).map_err(|e| Error::io_at(self.canonical_dir(), e))?
        } else {
            std::fs::create_dir_all(self.canonical_dir())
                .map_err(|e| Error::io_at(self.canonical_dir(), e))?;
            std::fs::canonicalize(self.canonical_dir())
                .map_err(|e| Error::io_at(self.canonical_dir(), e))?
        };
        let batch_base = std::fs::canonicalize(batch.dir()).map_err(|e| Error::io_at(batch.dir(), e))?;

        let mut report = ReconcileReport::new(batch.name(), self.store(), options.dry_run);
        let mut identities: Vec<PakIdentity> = Vec::new();
        let mut pending: Vec<PendingLink> = Vec::new();
        // first report slot of each name
        let mut seen: HashMap<String, usize> = HashMap::new();

        // 1. Plan
        for (idx, raw_name) in names.iter().enumerate() {
            progress(&Progress::with_file(Phase::Planning, idx + 1, names.len(), raw_name.as_str()));

            if raw_name.contains(['/', '\\']) {
                report.push(
                    raw_name,
                    EntryOutcome::Malformed {
                        reason: "manifest entries must be bare file names".to_string(),
                    },
                );
                continue;
            }
            let identity = match PakIdentity::parse(raw_name) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("{e}");
                    let reason = match e {
                        Error::MalformedName { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.push(raw_name, EntryOutcome::Malformed { reason });
                    continue;
                }
            };

            if let Some(&first) = seen.get(raw_name) {
                debug!("{raw_name} listed twice in manifest");
                // The first listing does any linking; repeats share its fate
                let outcome = match &report.entries[first].outcome {
                    EntryOutcome::Created { .. } => EntryOutcome::AlreadyCurrent,
                    other => other.clone(),
                };
                report.push(raw_name, outcome);
                continue;
            }
            seen.insert(raw_name.clone(), report.entries.len());
            identities.push(identity);

            let source = batch_base.join(raw_name);
            if !source.is_file() {
                warn!("{raw_name} is listed but not present in {}", batch.name());
                report.push(raw_name, EntryOutcome::Missing { expected: source });
                continue;
            }

            let link = self.link_path(raw_name);
            match link_state(&link, &source)? {
                LinkState::Current => {
                    debug!("{raw_name} already current");
                    if ledger.as_ref().is_some_and(|l| l.latest_for(raw_name).is_none()) {
                        debug!("{raw_name} is linked but has no ledger line");
                        pending.push(PendingLink {
                            slot: report.entries.len(),
                            create: false,
                            raw_name: raw_name.clone(),
                            target: relative_path_from(&canonical_base, &source),
                            source,
                            link,
                            digest: None,
                        });
                    }
                    report.push(raw_name, EntryOutcome::AlreadyCurrent);
                }
                LinkState::Elsewhere(existing) => {
                    warn!(
                        "Conflict: {} points to {}, not {}",
                        link.display(),
                        existing.display(),
                        source.display()
                    );
                    report.push(
                        raw_name,
                        EntryOutcome::Conflict {
                            existing,
                            expected: source,
                        },
                    );
                }
                LinkState::Absent => {
                    let target = relative_path_from(&canonical_base, &source);
                    pending.push(PendingLink {
                        slot: report.entries.len(),
                        create: true,
                        raw_name: raw_name.clone(),
                        source,
                        link,
                        target: target.clone(),
                        digest: None,
                    });
                    report.push(raw_name, EntryOutcome::Created { target, digest: None });
                }
            }
        }

        // Ambiguities against everything the catalog already holds
        let mut known = identities;
        known.extend(
            self.linked_names()?
                .iter()
                .filter_map(|name| PakIdentity::parse(name).ok()),
        );
        report.ambiguities = find_ambiguities(&known);
        for ambiguity in &report.ambiguities {
            warn!("{ambiguity}");
        }

        // 2. Hash
        if options.update_checksums && !pending.is_empty() {
            self.hash_pending(&mut pending, progress)?;
        }

        // 3. Link
        let mut link_failure = None;
        let mut linked: Vec<&PendingLink> = Vec::new();
        if options.dry_run {
            linked.extend(pending.iter());
        } else {
            let (to_create, existing): (Vec<&PendingLink>, Vec<&PendingLink>) =
                pending.iter().partition(|item| item.create);
            linked.extend(existing);
            let total = to_create.len();
            for (idx, item) in to_create.into_iter().enumerate() {
                progress(&Progress::with_file(Phase::Linking, idx + 1, total, item.raw_name.as_str()));
                match symlink_file(&item.target, &item.link) {
                    Ok(()) => {
                        debug!("Linked {} -> {}", item.link.display(), item.target.display());
                        linked.push(item);
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        // Appeared since planning: decide logically, never overwrite
                        match link_state(&item.link, &item.source) {
                            Ok(LinkState::Elsewhere(existing)) => report.replace(
                                item.slot,
                                EntryOutcome::Conflict {
                                    existing,
                                    expected: item.source.clone(),
                                },
                            ),
                            Ok(_) => {
                                report.replace(item.slot, EntryOutcome::AlreadyCurrent);
                                if ledger.as_ref().is_some_and(|l| l.latest_for(&item.raw_name).is_none()) {
                                    linked.push(item);
                                }
                            }
                            Err(e) => {
                                link_failure = Some(e);
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        link_failure = Some(Error::io_at(&item.link, e));
                        break;
                    }
                }
            }
        }

        for item in &linked {
            if let EntryOutcome::Created { digest, .. } = &mut report.entries[item.slot].outcome {
                digest.clone_from(&item.digest);
            }
        }

        // 4. Record
        if let Some(ledger) = ledger.as_mut() {
            let new_entries: Vec<LedgerEntry> = linked
                .iter()
                .filter_map(|item| {
                    item.digest
                        .clone()
                        .map(|digest| LedgerEntry::new(item.raw_name.as_str(), digest))
                })
                .collect();
            progress(&Progress::new(Phase::Recording, new_entries.len(), new_entries.len()));
            if !options.dry_run {
                ledger.append(&new_entries)?;
            }
            report.ledger_appended = new_entries.len();
        }

        if let Some(e) = link_failure {
            return Err(e);
        }

        let counts = report.counts;
        progress(&Progress::new(Phase::Complete, names.len(), names.len()));
        info!(
            "{}: {} created, {} current, {} conflicts, {} malformed, {} missing",
            batch.name(),
            counts.created,
            counts.already_current,
            counts.conflicting,
            counts.malformed,
            counts.missing
        );
        Ok(report)
    }

    fn hash_pending(&self, pending: &mut [PendingLink], progress: ProgressCallback) -> Result<()> {
        let processed = AtomicUsize::new(0);
        let total = pending.len();
        let hasher = *self.hasher();

        run_in_pool(self.workers, || {
            pending.par_iter_mut().try_for_each(|item| {
                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&Progress::with_file(Phase::Hashing, current, total, item.raw_name.as_str()));
                item.digest = Some(hasher.hash_file(&item.source)?);
                Ok(())
            })
        })
    }
}
