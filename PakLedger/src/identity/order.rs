//! Patch-aware processing order for pakfiles
//!
//! Pakfiles have to be handed to the unpacker so that a base archive comes
//! before any patch to it, and earlier patches come before later ones. The
//! order compares, in turn:
//!
//! 1. chunk number, numerically
//! 2. base before patched
//! 3. patch revision, numerically
//! 4. suffix tag, bytewise
//!
//! The raw name never takes part, so two spellings of the same triple compare
//! equal and are reported as an [`Ambiguity`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use super::PakIdentity;
use crate::error::{Error, Result};

/// Total order over identities.
pub fn compare(a: &PakIdentity, b: &PakIdentity) -> Ordering {
    a.chunk_number()
        .cmp(&b.chunk_number())
        .then_with(|| match (a.patch_revision(), b.patch_revision()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        })
        .then_with(|| a.suffix_tag().cmp(b.suffix_tag()))
}

/// Whether `a` has to be processed strictly before `b`.
pub fn precedes(a: &PakIdentity, b: &PakIdentity) -> bool {
    compare(a, b) == Ordering::Less
}

/// Sort identities into processing order. Stable, so equal identities keep
/// their input order.
pub fn sort_identities(identities: &mut [PakIdentity]) {
    identities.sort_by(compare);
}

/// Two distinct names that occupy the same position in the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub first: String,
    pub second: String,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' and '{}' sort identically; run the duplicate detector",
            self.first, self.second
        )
    }
}

impl From<Ambiguity> for Error {
    fn from(a: Ambiguity) -> Self {
        Error::AmbiguousOrder {
            first: a.first,
            second: a.second,
        }
    }
}

/// Find pairs of distinct raw names that compare equal.
///
/// Input does not need to be sorted. Each equal run of `n` names yields
/// `n - 1` adjacent pairs.
pub fn find_ambiguities(identities: &[PakIdentity]) -> Vec<Ambiguity> {
    let mut sorted: Vec<&PakIdentity> = identities.iter().collect();
    sorted.sort_by(|a, b| compare(a, b).then_with(|| a.raw_name().cmp(b.raw_name())));
    sorted.dedup_by(|a, b| a.raw_name() == b.raw_name());

    sorted
        .windows(2)
        .filter(|pair| compare(pair[0], pair[1]) == Ordering::Equal)
        .map(|pair| Ambiguity {
            first: pair[0].raw_name().to_string(),
            second: pair[1].raw_name().to_string(),
        })
        .collect()
}

/// Options for building a [`ProcessingPlan`].
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Chunk numbers to leave out (audio-only chunks, typically).
    pub skip_chunks: BTreeSet<u32>,
}

impl PlanOptions {
    pub fn skip_audio(chunks: impl IntoIterator<Item = u32>) -> Self {
        Self {
            skip_chunks: chunks.into_iter().collect(),
        }
    }
}

/// Disk space needed to unpack a plan: every archive, plus room for the
/// largest one while it is being extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpaceEstimate {
    pub total_bytes: u64,
    pub largest_bytes: u64,
}

impl SpaceEstimate {
    pub fn required_bytes(&self) -> u64 {
        self.total_bytes.saturating_add(self.largest_bytes)
    }
}

/// An ordered list of pakfiles ready for a downstream unpacker.
#[derive(Debug, Default, Serialize)]
pub struct ProcessingPlan {
    /// Identities in processing order.
    pub ordered: Vec<PakIdentity>,
    /// Identities left out because of [`PlanOptions::skip_chunks`].
    pub skipped: Vec<PakIdentity>,
    /// Names that failed to parse, with the reason.
    pub malformed: Vec<(String, String)>,
    /// Equal-ordered pairs.
    pub ambiguities: Vec<Ambiguity>,
}

impl ProcessingPlan {
    /// Parse and order a set of names. Malformed names are collected rather
    /// than aborting the plan.
    pub fn build<I, S>(names: I, options: &PlanOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = Self::default();

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            match PakIdentity::parse(name) {
                Ok(id) if options.skip_chunks.contains(&id.chunk_number()) => plan.skipped.push(id),
                Ok(id) => plan.ordered.push(id),
                Err(Error::MalformedName { name, reason }) => plan.malformed.push((name, reason)),
                Err(e) => plan.malformed.push((name.to_string(), e.to_string())),
            }
        }

        sort_identities(&mut plan.ordered);
        sort_identities(&mut plan.skipped);
        plan.ambiguities = find_ambiguities(&plan.ordered);
        for ambiguity in &plan.ambiguities {
            warn!("{ambiguity}");
        }

        plan
    }

    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty() && self.ambiguities.is_empty()
    }

    /// Stat every planned archive, treating each raw name as a path relative
    /// to `base`.
    pub fn space_estimate(&self, base: &Path) -> Result<SpaceEstimate> {
        let mut estimate = SpaceEstimate::default();
        for id in &self.ordered {
            let path = base.join(id.raw_name());
            let size = std::fs::metadata(&path)
                .map_err(|e| Error::io_at(&path, e))?
                .len();
            estimate.total_bytes += size;
            estimate.largest_bytes = estimate.largest_bytes.max(size);
        }
        Ok(estimate)
    }
}
