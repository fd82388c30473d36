//! CLI command for duplicate detection

use std::path::PathBuf;

use anyhow::Context;
use indicatif::HumanBytes;

use super::CommandStatus;
use crate::cli::progress::{phase_bar, update_bar};
use crate::config::CatalogConfig;
use crate::duplicates::{DuplicateGroup, DuplicateOptions, find_duplicates_with_progress};
use crate::progress::Progress;

pub fn execute(
    config: &CatalogConfig,
    dirs: &[PathBuf],
    follow_links: bool,
    all_files: bool,
    json: bool,
    quiet: bool,
) -> anyhow::Result<CommandStatus> {
    let options = DuplicateOptions {
        follow_links,
        extension: (!all_files).then(|| "pak".to_string()),
        algorithm: config.digest,
        workers: config.workers,
    };

    let pb = phase_bar(json || quiet);
    let groups: Vec<DuplicateGroup> = find_duplicates_with_progress(dirs, &options, &|p: &Progress| update_bar(&pb, p))
        .context("Failed to scan for duplicates")?
        .collect();
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(CommandStatus::Clean);
    }

    if groups.is_empty() {
        println!("No duplicates found");
        return Ok(CommandStatus::Clean);
    }

    let wasted: u64 = groups.iter().map(DuplicateGroup::wasted_bytes).sum();
    for group in &groups {
        println!(
            "{} ({} copies, {} each)",
            group.digest,
            group.len(),
            HumanBytes(group.size)
        );
        for path in &group.paths {
            println!("  {}", path.display());
        }
    }
    println!();
    println!("{} duplicate groups, {} reclaimable", groups.len(), HumanBytes(wasted));

    // Duplicates are a report, not a failure
    Ok(CommandStatus::Clean)
}
