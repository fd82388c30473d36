//! Reconciliation results

use std::path::PathBuf;

use serde::Serialize;

use crate::config::StoreId;
use crate::error::Error;
use crate::hash::ContentDigest;
use crate::identity::Ambiguity;

/// What happened to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// A new canonical link was created (or would be, in a dry run).
    Created {
        target: PathBuf,
        digest: Option<ContentDigest>,
    },
    /// The canonical link already points at this batch.
    AlreadyCurrent,
    /// The canonical link points elsewhere and was left alone.
    Conflict { existing: PathBuf, expected: PathBuf },
    /// The name does not parse.
    Malformed { reason: String },
    /// The manifest lists a file the batch directory does not contain.
    Missing { expected: PathBuf },
}

/// One manifest line and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub raw_name: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

impl EntryReport {
    /// The per-entry error this outcome represents, if any.
    pub fn error(&self) -> Option<Error> {
        match &self.outcome {
            EntryOutcome::Malformed { reason } => Some(Error::MalformedName {
                name: self.raw_name.clone(),
                reason: reason.clone(),
            }),
            EntryOutcome::Conflict { existing, expected } => Some(Error::Conflict {
                name: self.raw_name.clone(),
                existing: existing.clone(),
                expected: expected.clone(),
            }),
            _ => None,
        }
    }
}

/// Per-outcome totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileCounts {
    pub created: usize,
    pub already_current: usize,
    pub conflicting: usize,
    pub malformed: usize,
    pub missing: usize,
}

impl ReconcileCounts {
    /// Entries that need an operator before extraction goes ahead.
    pub fn problems(&self) -> usize {
        self.conflicting + self.malformed + self.missing
    }
}

/// Result of reconciling one patch batch against one store.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub batch: String,
    pub store: StoreId,
    pub dry_run: bool,
    pub entries: Vec<EntryReport>,
    pub counts: ReconcileCounts,
    pub ambiguities: Vec<Ambiguity>,
    /// Lines appended to the ledger (or that would be, in a dry run).
    pub ledger_appended: usize,
}

impl ReconcileReport {
    pub(crate) fn new(batch: &str, store: StoreId, dry_run: bool) -> Self {
        Self {
            batch: batch.to_string(),
            store,
            dry_run,
            entries: Vec::new(),
            counts: ReconcileCounts::default(),
            ambiguities: Vec::new(),
            ledger_appended: 0,
        }
    }

    fn counter(&mut self, outcome: &EntryOutcome) -> &mut usize {
        match outcome {
            EntryOutcome::Created { .. } => &mut self.counts.created,
            EntryOutcome::AlreadyCurrent => &mut self.counts.already_current,
            EntryOutcome::Conflict { .. } => &mut self.counts.conflicting,
            EntryOutcome::Malformed { .. } => &mut self.counts.malformed,
            EntryOutcome::Missing { .. } => &mut self.counts.missing,
        }
    }

    pub(crate) fn push(&mut self, raw_name: &str, outcome: EntryOutcome) {
        *self.counter(&outcome) += 1;
        self.entries.push(EntryReport {
            raw_name: raw_name.to_string(),
            outcome,
        });
    }

    /// Swap the outcome of an entry already in the report.
    pub(crate) fn replace(&mut self, slot: usize, outcome: EntryOutcome) {
        let previous = std::mem::replace(&mut self.entries[slot].outcome, outcome.clone());
        *self.counter(&previous) -= 1;
        *self.counter(&outcome) += 1;
    }

    pub fn has_problems(&self) -> bool {
        self.counts.problems() > 0
    }

    /// Entries with the given outcome kind.
    pub fn created(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Created { .. }))
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Conflict { .. }))
    }

    /// Per-entry errors: malformed names, conflicts and ambiguous pairs.
    pub fn errors(&self) -> Vec<Error> {
        self.entries
            .iter()
            .filter_map(EntryReport::error)
            .chain(self.ambiguities.iter().cloned().map(Error::from))
            .collect()
    }
}
