//! Duplicate pakfile detection
//!
//! Scans directory trees, groups files by content digest and reports every
//! group with more than one member. Files are bucketed by size first, so only
//! same-size candidates are ever hashed. Nothing is moved or deleted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::hash::{ContentDigest, ContentHasher, DigestAlgorithm};
use crate::progress::{Phase, Progress, ProgressCallback, no_progress};
use crate::utils::run_in_pool;

/// Options for [`find_duplicates`].
#[derive(Debug, Clone)]
pub struct DuplicateOptions {
    /// Resolve symlinks to the physical file, so a file reached through
    /// several links counts once. When false every link is its own entry.
    pub follow_links: bool,
    /// Only consider files with this extension (case-insensitive).
    /// `None` scans every file.
    pub extension: Option<String>,
    pub algorithm: DigestAlgorithm,
    /// Hashing threads; 0 uses rayon's default.
    pub workers: usize,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            follow_links: true,
            extension: Some("pak".to_string()),
            algorithm: DigestAlgorithm::default(),
            workers: 0,
        }
    }
}

impl DuplicateOptions {
    fn wants(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted)),
        }
    }
}

/// Files sharing one content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub digest: ContentDigest,
    /// Size of each file in bytes.
    pub size: u64,
    pub paths: BTreeSet<PathBuf>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Bytes that would be freed by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.size
            .saturating_mul(self.paths.len().saturating_sub(1) as u64)
    }
}

/// Duplicate groups, largest first.
///
/// Every file is hashed and every group sorted before the first item is
/// yielded, so this is an owned iterator over finished results rather than a
/// lazy walk.
#[derive(Debug)]
pub struct DuplicateGroups {
    inner: std::vec::IntoIter<DuplicateGroup>,
}

impl Iterator for DuplicateGroups {
    type Item = DuplicateGroup;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DuplicateGroups {}

/// Group the files under `dirs` by content.
pub fn find_duplicates<P: AsRef<Path>>(dirs: &[P], options: &DuplicateOptions) -> Result<DuplicateGroups> {
    find_duplicates_with_progress(dirs, options, &no_progress)
}

/// [`find_duplicates`] with a progress callback.
pub fn find_duplicates_with_progress<P: AsRef<Path>>(
    dirs: &[P],
    options: &DuplicateOptions,
    progress: ProgressCallback,
) -> Result<DuplicateGroups> {
    let files = collect_files(dirs, options, progress)?;
    let total_files = files.len();

    let mut by_size: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    for (path, size) in files {
        by_size.entry(size).or_default().push(path);
    }
    let candidates: Vec<(PathBuf, u64)> = by_size
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .flat_map(|(size, paths)| paths.into_iter().map(move |p| (p, size)))
        .collect();
    debug!("{} of {} files share a size with another", candidates.len(), total_files);

    let hashed = hash_candidates(&candidates, options, progress)?;

    let mut by_digest: HashMap<(ContentDigest, u64), BTreeSet<PathBuf>> = HashMap::new();
    for (path, size, digest) in hashed {
        by_digest.entry((digest, size)).or_default().insert(path);
    }

    let mut groups: Vec<DuplicateGroup> = by_digest
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|((digest, size), paths)| DuplicateGroup { digest, size, paths })
        .collect();
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.digest.cmp(&b.digest)));

    progress(&Progress::new(Phase::Complete, total_files, total_files));
    info!(
        "Scanned {} files: {} duplicate groups",
        total_files,
        groups.len()
    );

    Ok(DuplicateGroups {
        inner: groups.into_iter(),
    })
}

/// Walk every directory and collect `(path, size)` for candidate files.
fn collect_files<P: AsRef<Path>>(
    dirs: &[P],
    options: &DuplicateOptions,
    progress: ProgressCallback,
) -> Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    // Physical files already taken, when resolving links
    let mut physical: BTreeSet<PathBuf> = BTreeSet::new();

    for (idx, dir) in dirs.iter().enumerate() {
        let dir = dir.as_ref();
        progress(&Progress::with_file(
            Phase::Scanning,
            idx + 1,
            dirs.len(),
            dir.to_string_lossy(),
        ));

        for entry in WalkDir::new(dir).follow_links(options.follow_links) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_dir() || !options.wants(path) {
                continue;
            }

            // Follows links; dangling ones are skipped
            let meta = match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    continue;
                }
            };

            if options.follow_links {
                let real = std::fs::canonicalize(path).map_err(|e| Error::io_at(path, e))?;
                if physical.insert(real.clone()) {
                    files.push((real, meta.len()));
                }
            } else {
                files.push((path.to_path_buf(), meta.len()));
            }
        }
    }

    Ok(files)
}

fn hash_candidates(
    candidates: &[(PathBuf, u64)],
    options: &DuplicateOptions,
    progress: ProgressCallback,
) -> Result<Vec<(PathBuf, u64, ContentDigest)>> {
    let hasher = ContentHasher::new(options.algorithm);
    let processed = AtomicUsize::new(0);
    let total = candidates.len();

    run_in_pool(options.workers, || {
        candidates
            .par_iter()
            .map(|(path, size)| {
                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&Progress::with_file(
                    Phase::Hashing,
                    current,
                    total,
                    path.to_string_lossy(),
                ));
                let digest = hasher.hash_file(path)?;
                Ok((path.clone(), *size, digest))
            })
            .collect()
    })
}
