//! CLI command for bootstrapping a batch manifest

use std::path::Path;

use anyhow::Context;

use super::CommandStatus;
use crate::batch::PatchBatch;
use crate::cli::progress::{DISK, print_step};
use crate::config::CatalogConfig;

pub fn execute(config: &CatalogConfig, batch: &Path, dry_run: bool) -> anyhow::Result<CommandStatus> {
    let batch_dir = config.batch_path(batch);
    let batch = PatchBatch::open(&batch_dir, &config.manifest_name)
        .with_context(|| format!("Failed to open patch batch {}", batch_dir.display()))?;
    let names = batch.discover_archives()?;

    if dry_run {
        for name in &names {
            println!("{name}");
        }
        return Ok(CommandStatus::Clean);
    }

    batch
        .write_manifest(&names)
        .with_context(|| format!("Failed to write {}", batch.manifest_path().display()))?;
    print_step(
        1,
        1,
        DISK,
        &format!("Wrote {} names to {}", names.len(), batch.manifest_path().display()),
    );
    Ok(CommandStatus::Clean)
}
