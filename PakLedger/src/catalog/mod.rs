//! Canonical per-store catalog
//!
//! Each storefront gets a flat directory of symlinks, one per pak name,
//! pointing into the patch-batch directory that supplied the file. Links are
//! created once and never re-pointed or deleted here: a link that points
//! somewhere unexpected is a conflict for the operator, and a link whose
//! target vanished is reported by [`StoreCatalog::audit`].

mod reconcile;
mod report;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::config::{CatalogConfig, StoreId};
use crate::error::{Error, Result};
use crate::hash::{ContentDigest, ContentHasher, DigestAlgorithm};
use crate::identity::PakIdentity;
use crate::ledger::ChecksumLedger;
use crate::utils::path::{absolute, resolve_link_target};

pub use reconcile::ReconcileOptions;
pub use report::{EntryOutcome, EntryReport, ReconcileCounts, ReconcileReport};

/// One archive as it appears in a store's canonical directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub identity: PakIdentity,
    /// The symlink.
    pub canonical_path: PathBuf,
    /// The patch-batch file the link resolves to.
    pub target_path: PathBuf,
    /// Latest ledger digest, if the ledger has one.
    pub content_hash: Option<ContentDigest>,
}

/// State of the canonical path for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkState {
    Absent,
    /// Points at the expected file.
    Current,
    /// Something else is there; carries where it leads.
    Elsewhere(PathBuf),
}

/// Inspect the canonical path `link` against the expected batch file.
pub(crate) fn link_state(link: &Path, expected: &Path) -> Result<LinkState> {
    let meta = match std::fs::symlink_metadata(link) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LinkState::Absent),
        Err(e) => return Err(Error::io_at(link, e)),
    };
    if !meta.file_type().is_symlink() {
        return Ok(LinkState::Elsewhere(link.to_path_buf()));
    }

    let dest = std::fs::read_link(link).map_err(|e| Error::io_at(link, e))?;
    let resolved = resolve_link_target(link, &dest);
    let resolved = absolute(&resolved).map_err(|e| Error::io_at(&resolved, e))?;

    let same_file = match (std::fs::canonicalize(link), std::fs::canonicalize(expected)) {
        (Ok(a), Ok(b)) => a == b,
        // dangling link: fall back to comparing where it claims to point
        _ => absolute(expected).is_ok_and(|abs| abs == resolved),
    };

    Ok(if same_file {
        LinkState::Current
    } else {
        LinkState::Elsewhere(resolved)
    })
}

/// A canonical link whose target no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleLink {
    pub raw_name: String,
    pub canonical_path: PathBuf,
    pub target_path: PathBuf,
}

/// Result of [`StoreCatalog::audit`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub linked: usize,
    pub stale: Vec<StaleLink>,
    /// Non-symlink files and unparseable names in the canonical directory.
    pub foreign: Vec<PathBuf>,
    /// Links with no ledger entry.
    pub unrecorded: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.foreign.is_empty()
    }
}

/// One store's canonical directory and ledger.
#[derive(Debug, Clone)]
pub struct StoreCatalog {
    store: StoreId,
    canonical_dir: PathBuf,
    ledger_path: PathBuf,
    hasher: ContentHasher,
    workers: usize,
}

impl StoreCatalog {
    pub fn new(
        store: StoreId,
        canonical_dir: impl Into<PathBuf>,
        ledger_path: impl Into<PathBuf>,
        algorithm: DigestAlgorithm,
    ) -> Self {
        Self {
            store,
            canonical_dir: canonical_dir.into(),
            ledger_path: ledger_path.into(),
            hasher: ContentHasher::new(algorithm),
            workers: 0,
        }
    }

    pub fn from_config(config: &CatalogConfig, store: StoreId) -> Self {
        Self::new(
            store,
            config.canonical_store_dir(store),
            config.ledger_path(store),
            config.digest,
        )
        .with_workers(config.workers)
    }

    /// Number of hashing threads; 0 uses rayon's default.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn store(&self) -> StoreId {
        self.store
    }

    pub fn canonical_dir(&self) -> &Path {
        &self.canonical_dir
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn open_ledger(&self) -> Result<ChecksumLedger> {
        ChecksumLedger::open(&self.ledger_path, self.hasher.algorithm())
    }

    /// Canonical path for a pak name.
    pub fn link_path(&self, raw_name: &str) -> PathBuf {
        self.canonical_dir.join(raw_name)
    }

    /// Names of everything in the canonical directory, sorted.
    pub(crate) fn linked_names(&self) -> Result<Vec<String>> {
        let read_dir = match std::fs::read_dir(&self.canonical_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_at(&self.canonical_dir, e)),
        };
        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::io_at(&self.canonical_dir, e))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    /// Every parseable symlink in the canonical directory, with its latest
    /// ledger digest.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let ledger = self.open_ledger()?;
        let latest = ledger.latest();
        let mut entries = Vec::new();

        for name in self.linked_names()? {
            let canonical_path = self.link_path(&name);
            let Ok(identity) = PakIdentity::parse(&name) else {
                continue;
            };
            let Ok(dest) = std::fs::read_link(&canonical_path) else {
                continue;
            };
            entries.push(CatalogEntry {
                target_path: resolve_link_target(&canonical_path, &dest),
                content_hash: latest.get(name.as_str()).map(|d| (*d).clone()),
                identity,
                canonical_path,
            });
        }

        entries.sort_by(|a, b| crate::identity::compare(&a.identity, &b.identity));
        Ok(entries)
    }

    /// Report dangling links, foreign files and links missing from the
    /// ledger. Nothing is removed.
    pub fn audit(&self) -> Result<AuditReport> {
        let ledger = self.open_ledger()?;
        let latest = ledger.latest();
        let mut report = AuditReport::default();

        for name in self.linked_names()? {
            let path = self.link_path(&name);
            let meta = std::fs::symlink_metadata(&path).map_err(|e| Error::io_at(&path, e))?;
            if !meta.file_type().is_symlink() || PakIdentity::parse(&name).is_err() {
                warn!("Foreign entry in canonical directory: {}", path.display());
                report.foreign.push(path);
                continue;
            }

            let dest = std::fs::read_link(&path).map_err(|e| Error::io_at(&path, e))?;
            if path.exists() {
                report.linked += 1;
                if !latest.contains_key(name.as_str()) {
                    report.unrecorded.push(name);
                }
            } else {
                warn!("Stale link: {} -> {}", path.display(), dest.display());
                report.stale.push(StaleLink {
                    raw_name: name,
                    target_path: resolve_link_target(&path, &dest),
                    canonical_path: path,
                });
            }
        }

        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::utils::path::symlink_file;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_link_state() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pak");
        let b = dir.path().join("b.pak");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let link = dir.path().join("link.pak");

        assert_eq!(link_state(&link, &a).unwrap(), LinkState::Absent);
        symlink_file(Path::new("a.pak"), &link).unwrap();
        assert_eq!(link_state(&link, &a).unwrap(), LinkState::Current);
        assert!(matches!(link_state(&link, &b).unwrap(), LinkState::Elsewhere(_)));

        // a plain file in the way is never "current"
        assert!(matches!(link_state(&a, &a).unwrap(), LinkState::Elsewhere(_)));
    }

    #[test]
    fn test_dangling_link_matches_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.pak");
        let link = dir.path().join("link.pak");
        symlink_file(&gone, &link).unwrap();
        assert_eq!(link_state(&link, &gone).unwrap(), LinkState::Current);
    }

    #[test]
    fn test_dangling_link_under_relative_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("links")).unwrap();
        symlink_file(Path::new("../batch/gone.pak"), &root.join("links").join("gone.pak")).unwrap();

        // Address the same tree relative to the working directory
        let cwd = std::fs::canonicalize(std::env::current_dir().unwrap()).unwrap();
        let relative_root = crate::utils::path::relative_path_from(&cwd, &root);
        assert!(relative_root.is_relative());

        let link = relative_root.join("links").join("gone.pak");
        let expected = relative_root.join("batch").join("gone.pak");
        assert_eq!(link_state(&link, &expected).unwrap(), LinkState::Current);

        let other = relative_root.join("batch").join("other.pak");
        match link_state(&link, &other).unwrap() {
            LinkState::Elsewhere(path) => assert!(path.is_absolute()),
            state => panic!("expected Elsewhere, got {state:?}"),
        }
    }

    #[test]
    fn test_audit_reports_stale_and_foreign() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join("canonical").join("steam");
        std::fs::create_dir_all(&canonical).unwrap();
        let real = dir.path().join("pakchunk0-WindowsNoEditor.pak");
        std::fs::write(&real, b"x").unwrap();

        symlink_file(&real, &canonical.join("pakchunk0-WindowsNoEditor.pak")).unwrap();
        symlink_file(
            &dir.path().join("nowhere.pak"),
            &canonical.join("pakchunk1-WindowsNoEditor.pak"),
        )
        .unwrap();
        std::fs::write(canonical.join("notes.txt"), b"hi").unwrap();

        let catalog = StoreCatalog::new(
            StoreId::Steam,
            &canonical,
            dir.path().join("steam.sha256"),
            DigestAlgorithm::Sha256,
        );
        let report = catalog.audit().unwrap();
        assert_eq!(report.linked, 1);
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].raw_name, "pakchunk1-WindowsNoEditor.pak");
        assert_eq!(report.foreign, vec![canonical.join("notes.txt")]);
        assert_eq!(report.unrecorded, vec!["pakchunk0-WindowsNoEditor.pak"]);
        assert!(!report.is_clean());

        // nothing was removed
        assert!(std::fs::symlink_metadata(canonical.join("pakchunk1-WindowsNoEditor.pak")).is_ok());

        let entries = catalog.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target_path, real);
        assert_eq!(entries[0].content_hash, None);
    }
}
