#![cfg(unix)]

use pakledger::prelude::*;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        Self { _dir: dir, root }
    }

    /// Create a patch batch holding `files` and listing `manifest`.
    fn batch(&self, name: &str, files: &[(&str, &str)], manifest: &[&str]) -> PatchBatch {
        let dir = self.root.join("patches").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            std::fs::write(dir.join(file), content).unwrap();
        }
        let mut listing = manifest.join("\n");
        listing.push('\n');
        std::fs::write(dir.join("manifest.txt"), listing).unwrap();
        PatchBatch::open(&dir, "manifest.txt").unwrap()
    }

    fn catalog(&self) -> StoreCatalog {
        StoreCatalog::new(
            StoreId::Steam,
            self.root.join("canonical").join("steam"),
            self.root.join("ledgers").join("steam.sha256"),
            DigestAlgorithm::Sha256,
        )
    }

    fn ledger_text(&self) -> String {
        std::fs::read_to_string(self.root.join("ledgers").join("steam.sha256")).unwrap_or_default()
    }
}

fn with_checksums() -> ReconcileOptions {
    ReconcileOptions {
        update_checksums: true,
        dry_run: false,
    }
}

fn pak(n: u32) -> String {
    format!("pakchunk{n}-WindowsNoEditor.pak")
}

#[test]
fn test_reconcile_is_idempotent() {
    let fx = Fixture::new();
    let batch = fx.batch(
        "2022-03-24-launch",
        &[(pak(0).as_str(), "zero"), (pak(1).as_str(), "one")],
        &[pak(0).as_str(), pak(1).as_str()],
    );
    let catalog = fx.catalog();

    let first = catalog.reconcile(&batch, with_checksums()).unwrap();
    assert_eq!(first.counts.created, 2);
    assert_eq!(first.ledger_appended, 2);
    assert!(!first.has_problems());
    let ledger_after_first = fx.ledger_text();

    let second = catalog.reconcile(&batch, with_checksums()).unwrap();
    assert_eq!(second.counts.created, 0);
    assert_eq!(second.counts.conflicting, 0);
    assert_eq!(second.counts.already_current, 2);
    assert_eq!(second.ledger_appended, 0);
    assert_eq!(fx.ledger_text(), ledger_after_first);

    // Links are relative and resolve to the batch copy
    let link = catalog.link_path(pak(0).as_str());
    assert!(std::fs::read_link(&link).unwrap().is_relative());
    assert_eq!(std::fs::read_to_string(&link).unwrap(), "zero");
}

#[test]
fn test_ledger_before_run_is_prefix_after() {
    let fx = Fixture::new();
    let catalog = fx.catalog();
    let launch = fx.batch("2022-03-24-launch", &[(pak(0).as_str(), "zero")], &[pak(0).as_str()]);
    let dlc = fx.batch(
        "2022-06-23-dlc",
        &[(pak(5).as_str(), "five"), ("pakchunk0-WindowsNoEditor_1_P.pak", "patch")],
        &[pak(5).as_str(), "pakchunk0-WindowsNoEditor_1_P.pak"],
    );

    catalog.reconcile(&launch, with_checksums()).unwrap();
    let before = fx.ledger_text();
    catalog.reconcile(&dlc, with_checksums()).unwrap();
    let after = fx.ledger_text();

    assert!(after.starts_with(&before));
    assert_eq!(after.lines().count(), 3);

    let ledger = catalog.open_ledger().unwrap();
    let hasher = ContentHasher::new(DigestAlgorithm::Sha256);
    assert_eq!(
        ledger.latest_for(pak(5).as_str()),
        Some(&hasher.hash_bytes(b"five"))
    );
    assert!(ledger.verify(catalog.canonical_dir(), &hasher).is_clean());
}

#[test]
fn test_conflict_leaves_existing_link_untouched() {
    let fx = Fixture::new();
    let catalog = fx.catalog();
    let steam = fx.batch("2022-03-24-steam", &[(pak(0).as_str(), "steam payload")], &[pak(0).as_str()]);
    let epic = fx.batch("2022-03-24-epic", &[(pak(0).as_str(), "epic payload")], &[pak(0).as_str()]);

    catalog.reconcile(&steam, with_checksums()).unwrap();
    let link = catalog.link_path(pak(0).as_str());
    let before = std::fs::read_link(&link).unwrap();
    let ledger_before = fx.ledger_text();

    let report = catalog.reconcile(&epic, with_checksums()).unwrap();
    assert_eq!(report.counts.conflicting, 1);
    assert_eq!(report.counts.created, 0);
    assert!(report.has_problems());

    let errors = report.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], Error::Conflict { name, .. } if *name == pak(0)));

    assert_eq!(std::fs::read_link(&link).unwrap(), before);
    assert_eq!(std::fs::read_to_string(&link).unwrap(), "steam payload");
    assert_eq!(fx.ledger_text(), ledger_before);
}

#[test]
fn test_malformed_line_does_not_abort_run() {
    let fx = Fixture::new();
    let names: Vec<String> = (0..9).map(pak).collect();
    let mut files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), n.as_str())).collect();
    files.push(("Shared.pak", "not a chunk"));
    let mut manifest: Vec<&str> = names.iter().map(String::as_str).collect();
    manifest.insert(4, "Shared.pak");

    let batch = fx.batch("2022-03-24-launch", &files, &manifest);
    let report = fx.catalog().reconcile(&batch, with_checksums()).unwrap();

    assert_eq!(report.counts.created, 9);
    assert_eq!(report.counts.malformed, 1);
    assert_eq!(report.entries.len(), 10);
    assert_eq!(report.ledger_appended, 9);
    assert!(matches!(
        &report.entries[4].outcome,
        EntryOutcome::Malformed { .. }
    ));
}

#[test]
fn test_missing_file_is_reported() {
    let fx = Fixture::new();
    let batch = fx.batch("2022-03-24-launch", &[(pak(0).as_str(), "zero")], &[pak(0).as_str(), pak(1).as_str()]);
    let report = fx.catalog().reconcile(&batch, with_checksums()).unwrap();

    assert_eq!(report.counts.created, 1);
    assert_eq!(report.counts.missing, 1);
    assert!(!fx.catalog().link_path(pak(1).as_str()).exists());
    assert_eq!(fx.ledger_text().lines().count(), 1);
}

#[test]
fn test_dry_run_changes_nothing() {
    let fx = Fixture::new();
    let batch = fx.batch(
        "2022-03-24-launch",
        &[(pak(0).as_str(), "zero"), (pak(1).as_str(), "one")],
        &[pak(0).as_str(), pak(1).as_str()],
    );
    let catalog = fx.catalog();

    let report = catalog
        .reconcile(
            &batch,
            ReconcileOptions {
                update_checksums: true,
                dry_run: true,
            },
        )
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.counts.created, 2);
    assert_eq!(report.ledger_appended, 2);
    // Digests are still computed
    assert!(report.created().all(|e| matches!(
        &e.outcome,
        EntryOutcome::Created { digest: Some(_), .. }
    )));

    assert!(!catalog.canonical_dir().exists());
    assert!(!fx.root.join("ledgers").exists());
}

#[test]
fn test_reconcile_without_checksums_leaves_ledger_alone() {
    let fx = Fixture::new();
    let batch = fx.batch("2022-03-24-launch", &[(pak(0).as_str(), "zero")], &[pak(0).as_str()]);
    let report = fx.catalog().reconcile(&batch, ReconcileOptions::default()).unwrap();

    assert_eq!(report.counts.created, 1);
    assert_eq!(report.ledger_appended, 0);
    assert!(!fx.root.join("ledgers").exists());

    let audit = fx.catalog().audit().unwrap();
    assert!(audit.is_clean());
    assert_eq!(audit.unrecorded, vec![pak(0)]);

    // A later run with checksums records the existing link
    let recorded = fx.catalog().reconcile(&batch, with_checksums()).unwrap();
    assert_eq!(recorded.counts.already_current, 1);
    assert_eq!(recorded.ledger_appended, 1);
    assert!(fx.catalog().audit().unwrap().unrecorded.is_empty());
}

#[test]
fn test_rerun_records_links_after_failed_append() {
    let fx = Fixture::new();
    let batch = fx.batch(
        "2022-03-24-launch",
        &[(pak(0).as_str(), "zero"), (pak(1).as_str(), "one")],
        &[pak(0).as_str(), pak(1).as_str()],
    );
    let catalog = fx.catalog();

    // A stale lock from a crashed run blocks the append
    let lock = fx.root.join("ledgers").join("steam.sha256.lock");
    std::fs::create_dir_all(lock.parent().unwrap()).unwrap();
    std::fs::write(&lock, "").unwrap();

    let failed = catalog.reconcile(&batch, with_checksums());
    assert!(matches!(failed, Err(Error::LedgerLocked { .. })));
    assert!(catalog.link_path(pak(0).as_str()).exists());
    assert_eq!(fx.ledger_text(), "");

    std::fs::remove_file(&lock).unwrap();
    let rerun = catalog.reconcile(&batch, with_checksums()).unwrap();
    assert_eq!(rerun.counts.created, 0);
    assert_eq!(rerun.counts.already_current, 2);
    assert_eq!(rerun.ledger_appended, 2);

    let hasher = ContentHasher::new(DigestAlgorithm::Sha256);
    let ledger = catalog.open_ledger().unwrap();
    assert_eq!(ledger.latest_for(pak(0).as_str()), Some(&hasher.hash_bytes(b"zero")));
    assert_eq!(ledger.latest_for(pak(1).as_str()), Some(&hasher.hash_bytes(b"one")));

    // Back in step
    let settled = catalog.reconcile(&batch, with_checksums()).unwrap();
    assert_eq!(settled.ledger_appended, 0);
    assert_eq!(fx.ledger_text().lines().count(), 2);
}

#[test]
fn test_repeated_manifest_name_keeps_its_outcome() {
    let fx = Fixture::new();
    let catalog = fx.catalog();
    let first = fx.batch("2022-03-24-a", &[(pak(0).as_str(), "a")], &[pak(0).as_str()]);
    catalog.reconcile(&first, with_checksums()).unwrap();

    let second = fx.batch(
        "2022-04-01-b",
        &[(pak(0).as_str(), "b"), (pak(1).as_str(), "one")],
        &[pak(0).as_str(), pak(1).as_str(), pak(0).as_str(), pak(1).as_str(), pak(2).as_str(), pak(2).as_str()],
    );
    let report = catalog.reconcile(&second, with_checksums()).unwrap();

    let outcomes: Vec<&EntryOutcome> = report.entries.iter().map(|e| &e.outcome).collect();
    assert!(matches!(outcomes[0], EntryOutcome::Conflict { .. }));
    assert!(matches!(outcomes[1], EntryOutcome::Created { .. }));
    assert_eq!(outcomes[2], outcomes[0]);
    assert_eq!(outcomes[3], &EntryOutcome::AlreadyCurrent);
    assert!(matches!(outcomes[4], EntryOutcome::Missing { .. }));
    assert_eq!(outcomes[5], outcomes[4]);

    assert_eq!(report.counts.conflicting, 2);
    assert_eq!(report.counts.created, 1);
    assert_eq!(report.counts.missing, 2);
    assert_eq!(report.ledger_appended, 1);
    assert_eq!(std::fs::read_to_string(catalog.link_path(pak(0).as_str())).unwrap(), "a");
}

#[test]
fn test_duplicates_across_batches() {
    let fx = Fixture::new();
    fx.batch("a", &[(pak(0).as_str(), "same"), (pak(1).as_str(), "same")], &[]);
    fx.batch("b", &[(pak(0).as_str(), "same"), (pak(1).as_str(), "diff")], &[]);

    let groups: Vec<DuplicateGroup> = find_duplicates(
        &[fx.root.join("patches").join("a"), fx.root.join("patches").join("b")],
        &DuplicateOptions::default(),
    )
    .unwrap()
    .collect();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths.len(), 3);
    assert!(!groups[0].paths.contains(&fx.root.join("patches/b").join(pak(1))));
}

#[test]
fn test_catalog_links_count_once() {
    let fx = Fixture::new();
    let batch = fx.batch("2022-03-24-launch", &[(pak(0).as_str(), "zero"), (pak(1).as_str(), "one")], &[pak(0).as_str(), pak(1).as_str()]);
    let catalog = fx.catalog();
    catalog.reconcile(&batch, ReconcileOptions::default()).unwrap();

    // Canonical links and their targets are one file each
    let dirs = [fx.root.join("patches"), fx.root.join("canonical")];
    assert_eq!(find_duplicates(&dirs, &DuplicateOptions::default()).unwrap().count(), 0);

    let separate = DuplicateOptions {
        follow_links: false,
        ..DuplicateOptions::default()
    };
    assert_eq!(find_duplicates(&dirs, &separate).unwrap().count(), 2);
}

#[test]
fn test_processing_plan_orders_patches() {
    let plan = ProcessingPlan::build(
        [
            "pakchunk10-WindowsNoEditor.pak",
            "pakchunk2-WindowsNoEditor_3_P.pak",
            "pakchunk2-WindowsNoEditor.pak",
            "pakchunk2-WindowsNoEditor_1_P.pak",
            "pakchunk3-WindowsNoEditor.pak",
            "manifest.txt",
        ],
        &PlanOptions::skip_audio([3]),
    );

    let ordered: Vec<&str> = plan.ordered.iter().map(PakIdentity::raw_name).collect();
    assert_eq!(
        ordered,
        vec![
            "pakchunk2-WindowsNoEditor.pak",
            "pakchunk2-WindowsNoEditor_1_P.pak",
            "pakchunk2-WindowsNoEditor_3_P.pak",
            "pakchunk10-WindowsNoEditor.pak",
        ]
    );
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.malformed.len(), 1);
}

#[test]
fn test_config_drives_catalog_paths() {
    let fx = Fixture::new();
    let config_path = fx.root.join("pakledger.toml");
    std::fs::write(&config_path, "canonical_dir = \"links\"\nledger_dir = \"sums\"\ndigest = \"md5\"\n").unwrap();

    let config = CatalogConfig::from_file(&config_path).unwrap();
    let catalog = StoreCatalog::from_config(&config, StoreId::Epic);
    assert_eq!(catalog.canonical_dir(), fx.root.join("links").join("epic").as_path());
    assert_eq!(catalog.ledger_path(), Path::new(&fx.root.join("sums").join("epic.md5")));
    assert_eq!(catalog.hasher().algorithm(), DigestAlgorithm::Md5);
}
