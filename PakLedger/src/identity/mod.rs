//! Pakfile identity parsing
//!
//! Turns a raw archive filename such as `pakchunk12-WindowsNoEditor_3_P.pak`
//! into a [`PakIdentity`]. The grammar is
//!
//! ```text
//! [<dir-prefix>/]pakchunk<chunk>[<tag>]-<platform>[_<revision>_P].pak
//! ```
//!
//! Anything ending in `.pak` that does not fit is rejected with
//! [`Error::MalformedName`]. There is deliberately no lexical fallback: a
//! plain string sort puts `pakchunk10` before `pakchunk9`.

pub mod order;

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

pub use order::{
    Ambiguity, PlanOptions, ProcessingPlan, SpaceEstimate, compare, find_ambiguities, precedes,
    sort_identities,
};

lazy_static! {
    static ref PAK_NAME: Regex = Regex::new(
        r"^(?P<prefix>.*[/\\])?pakchunk(?P<chunk>[0-9]+)(?P<tag>[A-Za-z]*)-(?P<platform>[A-Za-z0-9]+)(?:_(?P<revision>[0-9]+)_P)?\.(?i:pak)$"
    )
    .expect("valid pak name pattern");
}

/// Storefront a name was found under, if its directory prefix says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHint {
    #[default]
    Unspecified,
    Steam,
    Epic,
}

impl StoreHint {
    fn from_prefix(prefix: &str) -> Self {
        prefix
            .split(['/', '\\'])
            .rev()
            .find_map(|component| {
                if component.eq_ignore_ascii_case("steam") {
                    Some(StoreHint::Steam)
                } else if component.eq_ignore_ascii_case("epic") {
                    Some(StoreHint::Epic)
                } else {
                    None
                }
            })
            .unwrap_or_default()
    }
}

/// Base archive or patch to a base archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PakKind {
    Base { chunk: u32 },
    Patched { chunk: u32, revision: u32 },
}

/// Structured identity of a pakfile name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PakIdentity {
    store_hint: StoreHint,
    kind: PakKind,
    suffix_tag: String,
    platform: String,
    raw_name: String,
}

impl PakIdentity {
    /// Parse a raw pakfile name.
    ///
    /// # Errors
    /// Returns [`Error::MalformedName`] if the name does not match the grammar.
    pub fn parse(raw_name: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedName {
            name: raw_name.to_string(),
            reason: reason.to_string(),
        };

        let Some(caps) = PAK_NAME.captures(raw_name) else {
            let file_name = raw_name.rsplit(['/', '\\']).next().unwrap_or(raw_name);
            let lower = file_name.to_ascii_lowercase();
            let reason = if !lower.ends_with(".pak") {
                "unrecognised extension (expected .pak)"
            } else if !lower.starts_with("pakchunk") {
                "missing pakchunk<N> prefix"
            } else {
                "does not match pakchunk<N>[tag]-<Platform>[_<rev>_P].pak"
            };
            return Err(malformed(reason));
        };

        let chunk: u32 = caps["chunk"]
            .parse()
            .map_err(|_| malformed("chunk number out of range"))?;
        let kind = match caps.name("revision") {
            Some(rev) => PakKind::Patched {
                chunk,
                revision: rev
                    .as_str()
                    .parse()
                    .map_err(|_| malformed("patch revision out of range"))?,
            },
            None => PakKind::Base { chunk },
        };

        Ok(Self {
            store_hint: caps
                .name("prefix")
                .map(|p| StoreHint::from_prefix(p.as_str()))
                .unwrap_or_default(),
            kind,
            suffix_tag: caps["tag"].to_string(),
            platform: caps["platform"].to_string(),
            raw_name: raw_name.to_string(),
        })
    }

    pub fn store_hint(&self) -> StoreHint {
        self.store_hint
    }

    pub fn kind(&self) -> PakKind {
        self.kind
    }

    /// Base archive grouping this name belongs to.
    pub fn chunk_number(&self) -> u32 {
        match self.kind {
            PakKind::Base { chunk } | PakKind::Patched { chunk, .. } => chunk,
        }
    }

    /// Patch revision, or `None` for a base archive.
    pub fn patch_revision(&self) -> Option<u32> {
        match self.kind {
            PakKind::Base { .. } => None,
            PakKind::Patched { revision, .. } => Some(revision),
        }
    }

    pub fn is_patch(&self) -> bool {
        matches!(self.kind, PakKind::Patched { .. })
    }

    /// Marker between the chunk number and the platform (e.g. `optional`).
    pub fn suffix_tag(&self) -> &str {
        &self.suffix_tag
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    /// File name part of the raw name, without any directory prefix.
    pub fn file_name(&self) -> &str {
        self.raw_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.raw_name)
    }
}

impl FromStr for PakIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PakIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_name)
    }
}

/// Parse a raw pakfile name. Shorthand for [`PakIdentity::parse`].
pub fn parse(raw_name: &str) -> Result<PakIdentity> {
    PakIdentity::parse(raw_name)
}
