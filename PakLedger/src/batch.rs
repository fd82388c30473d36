//! Patch-batch directories
//!
//! A patch batch is a directory of pakfiles released together, named with a
//! release stamp and a free-text note (`2022-06-23-dlc2`, `20220324_launch`)
//! and holding a manifest that lists the pak names it introduces, one per
//! line. Batches are curated by hand; this module only reads them, apart from
//! [`PatchBatch::write_manifest`] for bootstrapping a new one.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::identity::{PakIdentity, compare};

lazy_static! {
    static ref RELEASE_NAME: Regex =
        Regex::new(r"^(?P<stamp>[0-9]{4}-?[0-9]{2}-?[0-9]{2})(?:[-_ .]+(?P<note>.*))?$")
            .expect("valid release name pattern");
}

/// Release identifier decoded from a batch directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseId {
    /// Release date, when the name starts with one.
    pub stamp: Option<NaiveDate>,
    /// Everything after the stamp.
    pub note: String,
}

impl ReleaseId {
    pub fn parse(dir_name: &str) -> Self {
        let parsed = RELEASE_NAME.captures(dir_name).and_then(|caps| {
            let stamp = &caps["stamp"];
            let date = NaiveDate::parse_from_str(stamp, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(stamp, "%Y%m%d"))
                .ok()?;
            Some(Self {
                stamp: Some(date),
                note: caps
                    .name("note")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            })
        });

        parsed.unwrap_or_else(|| {
            warn!("Patch batch '{dir_name}' has no release stamp");
            Self {
                stamp: None,
                note: dir_name.to_string(),
            }
        })
    }
}

/// A patch-batch directory and its manifest.
#[derive(Debug, Clone)]
pub struct PatchBatch {
    dir: PathBuf,
    name: String,
    release: ReleaseId,
    manifest: PathBuf,
}

impl PatchBatch {
    /// Open a batch directory. The manifest is not read until asked for.
    pub fn open(dir: impl Into<PathBuf>, manifest_name: &str) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::InvalidBatch {
                path: dir,
                reason: "not a directory".to_string(),
            });
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidBatch {
                path: dir.clone(),
                reason: "batch directory has no name".to_string(),
            })?;
        let release = ReleaseId::parse(&name);
        let manifest = dir.join(manifest_name);

        Ok(Self {
            dir,
            name,
            release,
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn release(&self) -> &ReleaseId {
        &self.release
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    /// Names listed in the manifest, in manifest order. Blank lines and
    /// `#` comments are skipped; names are not validated here.
    pub fn raw_names(&self) -> Result<Vec<String>> {
        let content =
            std::fs::read_to_string(&self.manifest).map_err(|e| Error::io_at(&self.manifest, e))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }

    /// `.pak` files physically present in the batch directory, in processing
    /// order. Names that do not parse sort last, alphabetically.
    pub fn discover_archives(&self) -> Result<Vec<String>> {
        let mut parsed = Vec::new();
        let mut unparsed = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            let is_pak = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pak"));
            if !is_pak || !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match PakIdentity::parse(&name) {
                Ok(id) => parsed.push(id),
                Err(e) => {
                    warn!("{e}");
                    unparsed.push(name);
                }
            }
        }

        parsed.sort_by(|a, b| compare(a, b).then_with(|| a.raw_name().cmp(b.raw_name())));
        unparsed.sort();
        Ok(parsed
            .into_iter()
            .map(|id| id.raw_name().to_string())
            .chain(unparsed)
            .collect())
    }

    /// Write a new manifest. Refuses to replace an existing one.
    pub fn write_manifest(&self, names: &[String]) -> Result<()> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.manifest)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::InvalidBatch {
                    path: self.dir.clone(),
                    reason: format!("{} already exists", self.manifest.display()),
                });
            }
            Err(e) => return Err(Error::io_at(&self.manifest, e)),
        };

        let mut content = names.join("\n");
        content.push('\n');
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io_at(&self.manifest, e))
    }
}

/// Find all .pak files under a directory, recursively, in path order.
pub fn find_pak_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut pak_files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pak"))
        {
            pak_files.push(path.to_path_buf());
        }
    }
    pak_files.sort();
    Ok(pak_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_release_id_forms() {
        let dashed = ReleaseId::parse("2022-06-23-dlc2");
        assert_eq!(dashed.stamp, NaiveDate::from_ymd_opt(2022, 6, 23));
        assert_eq!(dashed.note, "dlc2");

        let compact = ReleaseId::parse("20220324_launch day");
        assert_eq!(compact.stamp, NaiveDate::from_ymd_opt(2022, 3, 24));
        assert_eq!(compact.note, "launch day");

        let bare = ReleaseId::parse("2022-03-24");
        assert_eq!(bare.note, "");

        let invalid_date = ReleaseId::parse("2022-13-40-oops");
        assert_eq!(invalid_date.stamp, None);
        assert_eq!(invalid_date.note, "2022-13-40-oops");
    }

    #[test]
    fn test_release_id_json_uses_iso_date() {
        let json = serde_json::to_value(ReleaseId::parse("2022-06-23-dlc2")).unwrap();
        assert_eq!(json["stamp"], "2022-06-23");
        assert_eq!(json["note"], "dlc2");

        let json = serde_json::to_value(ReleaseId::parse("hotfix")).unwrap();
        assert!(json["stamp"].is_null());
    }

    #[test]
    fn test_manifest_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let batch_dir = dir.path().join("2022-03-24-launch");
        std::fs::create_dir(&batch_dir).unwrap();
        std::fs::write(
            batch_dir.join("manifest.txt"),
            "# launch\npakchunk0-WindowsNoEditor.pak\n\n  pakchunk1-WindowsNoEditor.pak  \n",
        )
        .unwrap();

        let batch = PatchBatch::open(&batch_dir, "manifest.txt").unwrap();
        assert_eq!(
            batch.raw_names().unwrap(),
            vec!["pakchunk0-WindowsNoEditor.pak", "pakchunk1-WindowsNoEditor.pak"]
        );
        assert_eq!(batch.release().note, "launch");
    }

    #[test]
    fn test_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let batch = PatchBatch::open(dir.path(), "manifest.txt").unwrap();
        assert!(matches!(batch.raw_names(), Err(Error::IoAt { .. })));
    }

    #[test]
    fn test_open_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();
        assert!(matches!(
            PatchBatch::open(&file, "manifest.txt"),
            Err(Error::InvalidBatch { .. })
        ));
    }

    #[test]
    fn test_discover_and_write_manifest() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "pakchunk10-WindowsNoEditor.pak",
            "pakchunk9-WindowsNoEditor_1_P.pak",
            "pakchunk9-WindowsNoEditor.pak",
            "weird.pak",
            "readme.txt",
        ] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let batch = PatchBatch::open(dir.path(), "manifest.txt").unwrap();
        let names = batch.discover_archives().unwrap();
        assert_eq!(
            names,
            vec![
                "pakchunk9-WindowsNoEditor.pak",
                "pakchunk9-WindowsNoEditor_1_P.pak",
                "pakchunk10-WindowsNoEditor.pak",
                "weird.pak",
            ]
        );

        batch.write_manifest(&names).unwrap();
        assert_eq!(batch.raw_names().unwrap(), names);
        assert!(matches!(
            batch.write_manifest(&names),
            Err(Error::InvalidBatch { .. })
        ));
    }

    #[test]
    fn test_find_pak_files_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let steam = dir.path().join("Steam");
        std::fs::create_dir_all(&steam).unwrap();
        std::fs::write(steam.join("pakchunk1-WindowsNoEditor.PAK"), b"").unwrap();
        std::fs::write(dir.path().join("pakchunk0-WindowsNoEditor.pak"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let found = find_pak_files(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                steam.join("pakchunk1-WindowsNoEditor.PAK"),
                dir.path().join("pakchunk0-WindowsNoEditor.pak"),
            ]
        );
    }
}
