//! CLI commands for processing order

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::Context;
use indicatif::HumanBytes;
use serde::Serialize;

use super::CommandStatus;
use crate::batch::find_pak_files;
use crate::config::CatalogConfig;
use crate::identity::{PakIdentity, PlanOptions, ProcessingPlan, SpaceEstimate, compare};
use crate::utils::normalize_path;

#[derive(Serialize)]
struct PlanOutput<'a> {
    #[serde(flatten)]
    plan: &'a ProcessingPlan,
    space: Option<SpaceEstimate>,
}

/// Print names in processing order, one per line.
pub fn execute(
    config: &CatalogConfig,
    dirs: &[PathBuf],
    skip_audio: bool,
    json: bool,
) -> anyhow::Result<CommandStatus> {
    let names = if dirs.is_empty() {
        read_stdin_names()?
    } else {
        scan_names(dirs)?
    };

    let options = if skip_audio {
        PlanOptions::skip_audio(config.audio_only_chunks.iter().copied())
    } else {
        PlanOptions::default()
    };
    let plan = ProcessingPlan::build(&names, &options);

    // Names from a scan are full paths, so sizes can be read directly
    let space = if dirs.is_empty() {
        None
    } else {
        Some(plan.space_estimate(Path::new("")).context("Failed to read pakfile sizes")?)
    };

    if json {
        let output = PlanOutput { plan: &plan, space };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for id in &plan.ordered {
            println!("{}", id.raw_name());
        }
        for id in &plan.skipped {
            eprintln!("skipped (audio): {}", id.raw_name());
        }
        for (name, reason) in &plan.malformed {
            eprintln!("malformed: {name}: {reason}");
        }
        for ambiguity in &plan.ambiguities {
            eprintln!("ambiguous: {ambiguity}");
        }
        if let Some(space) = space {
            eprintln!(
                "{} pakfiles, {} total, {} needed to unpack",
                plan.ordered.len(),
                HumanBytes(space.total_bytes),
                HumanBytes(space.required_bytes())
            );
        }
    }

    Ok(CommandStatus::from_problems(!plan.malformed.is_empty()))
}

/// Report whether `first` is processed before `second`.
pub fn check(first: &str, second: &str) -> anyhow::Result<CommandStatus> {
    let a = PakIdentity::parse(first)?;
    let b = PakIdentity::parse(second)?;

    match compare(&a, &b) {
        std::cmp::Ordering::Less => {
            println!("{first} precedes {second}");
            Ok(CommandStatus::Clean)
        }
        std::cmp::Ordering::Greater => {
            println!("{second} precedes {first}");
            Ok(CommandStatus::Problems)
        }
        std::cmp::Ordering::Equal => {
            println!("{first} and {second} sort identically");
            Ok(CommandStatus::Problems)
        }
    }
}

fn read_stdin_names() -> anyhow::Result<Vec<String>> {
    std::io::stdin()
        .lock()
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read names from stdin")
}

fn scan_names(dirs: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for dir in dirs {
        let paks = find_pak_files(dir).with_context(|| format!("Failed to scan {}", dir.display()))?;
        names.extend(paks.iter().map(normalize_path));
    }
    Ok(names)
}
