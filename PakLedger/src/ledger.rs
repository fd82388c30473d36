//! Append-only checksum ledger
//!
//! One ledger per storefront, stored in `sha256sum` format:
//!
//! ```text
//! <hex digest>  <pak name>
//! ```
//!
//! The ledger is a log, not a map. Lines are never rewritten or reordered and
//! a name may appear more than once; readers that want the current state take
//! the last occurrence ([`ChecksumLedger::latest`]).

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hash::{ContentDigest, ContentHasher, DigestAlgorithm};

/// One `(name, digest)` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub raw_name: String,
    pub digest: ContentDigest,
}

impl LedgerEntry {
    pub fn new(raw_name: impl Into<String>, digest: ContentDigest) -> Self {
        Self {
            raw_name: raw_name.into(),
            digest,
        }
    }

    /// The line as written to disk, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}  {}\n", self.digest, self.raw_name)
    }
}

/// A storefront's checksum ledger.
#[derive(Debug)]
pub struct ChecksumLedger {
    path: PathBuf,
    algorithm: DigestAlgorithm,
    entries: Vec<LedgerEntry>,
}

impl ChecksumLedger {
    /// Load a ledger. A missing file is an empty ledger.
    pub fn open(path: impl Into<PathBuf>, algorithm: DigestAlgorithm) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::io_at(&path, e)),
        };
        let entries = parse_entries(&path, &content, algorithm)?;
        debug!("Loaded {} ledger entries from {}", entries.len(), path.display());
        Ok(Self {
            path,
            algorithm,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Every entry in file order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current digest per name: last occurrence wins.
    pub fn latest(&self) -> BTreeMap<&str, &ContentDigest> {
        self.entries
            .iter()
            .map(|e| (e.raw_name.as_str(), &e.digest))
            .collect()
    }

    pub fn latest_for(&self, raw_name: &str) -> Option<&ContentDigest> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.raw_name == raw_name)
            .map(|e| &e.digest)
    }

    /// Append entries at the end of the ledger.
    ///
    /// All lines go out in one write under an exclusive lock file, followed by
    /// an fsync. Existing bytes are never touched, so the ledger before the
    /// call is always a prefix of the ledger after it.
    pub fn append(&mut self, new_entries: &[LedgerEntry]) -> Result<()> {
        if new_entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }

        let _lock = LedgerLock::acquire(&self.path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)
            .map_err(|e| Error::io_at(&self.path, e))?;

        let mut buffer = String::new();
        if !ends_with_newline(&mut file).map_err(|e| Error::io_at(&self.path, e))? {
            warn!(
                "{} does not end with a newline; starting a fresh line",
                self.path.display()
            );
            buffer.push('\n');
        }
        for entry in new_entries {
            buffer.push_str(&entry.to_line());
        }

        file.write_all(buffer.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io_at(&self.path, e))?;

        debug!("Appended {} entries to {}", new_entries.len(), self.path.display());
        self.entries.extend_from_slice(new_entries);
        Ok(())
    }

    /// Re-hash the latest entry for every name through `canonical_dir`.
    pub fn verify(&self, canonical_dir: &Path, hasher: &ContentHasher) -> VerifyReport {
        let latest: Vec<(&str, &ContentDigest)> = self.latest().into_iter().collect();

        let mut results: Vec<(String, VerifyStatus)> = latest
            .par_iter()
            .map(|(name, expected)| {
                let path = canonical_dir.join(name);
                let status = if !path.exists() {
                    VerifyStatus::Missing
                } else {
                    match hasher.hash_file(&path) {
                        Ok(actual) if &actual == *expected => VerifyStatus::Ok,
                        Ok(actual) => VerifyStatus::Mismatch {
                            expected: (*expected).clone(),
                            actual,
                        },
                        Err(e) => VerifyStatus::Unreadable {
                            message: e.to_string(),
                        },
                    }
                };
                ((*name).to_string(), status)
            })
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));

        VerifyReport { results }
    }
}

/// Outcome of checking one ledger name against the file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerifyStatus {
    Ok,
    Mismatch {
        expected: ContentDigest,
        actual: ContentDigest,
    },
    Missing,
    Unreadable {
        message: String,
    },
}

/// Result of [`ChecksumLedger::verify`].
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub results: Vec<(String, VerifyStatus)>,
}

impl VerifyReport {
    pub fn problems(&self) -> impl Iterator<Item = &(String, VerifyStatus)> {
        self.results.iter().filter(|(_, s)| *s != VerifyStatus::Ok)
    }

    pub fn is_clean(&self) -> bool {
        self.problems().next().is_none()
    }
}

fn parse_entries(path: &Path, content: &str, algorithm: DigestAlgorithm) -> Result<Vec<LedgerEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let parse_err = |reason: &str| Error::LedgerParse {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: reason.to_string(),
        };

        let (hex, rest) = line
            .split_once(' ')
            .ok_or_else(|| parse_err("expected '<digest>  <name>'"))?;
        let digest = ContentDigest::from_hex(hex, algorithm)
            .ok_or_else(|| parse_err(&format!("not a {} digest", algorithm.as_str())))?;
        // sha256sum writes a second space in text mode and '*' in binary mode
        let name = rest
            .strip_prefix(' ')
            .or_else(|| rest.strip_prefix('*'))
            .unwrap_or(rest);
        if name.is_empty() {
            return Err(parse_err("missing file name"));
        }
        entries.push(LedgerEntry::new(name, digest));
    }
    Ok(entries)
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Exclusive lock held while appending, released on drop.
struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    fn acquire(ledger: &Path) -> Result<Self> {
        let mut name = ledger.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::LedgerLocked { path }),
            Err(e) => Err(Error::io_at(&path, e)),
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
