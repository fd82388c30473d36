//! CLI command for auditing a store catalog

use anyhow::Context;

use super::CommandStatus;
use crate::catalog::StoreCatalog;
use crate::cli::progress::print_problem;
use crate::config::{CatalogConfig, StoreId};

pub fn execute(config: &CatalogConfig, store: StoreId, json: bool) -> anyhow::Result<CommandStatus> {
    let catalog = StoreCatalog::from_config(config, store);
    let report = catalog
        .audit()
        .with_context(|| format!("Failed to audit {}", catalog.canonical_dir().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{store}: {} linked", report.linked);
        for stale in &report.stale {
            print_problem(
                "stale",
                &format!("{} -> {}", stale.raw_name, stale.target_path.display()),
            );
        }
        for path in &report.foreign {
            print_problem("foreign", &path.display().to_string());
        }
        for name in &report.unrecorded {
            print_problem("unrecorded", name);
        }
    }

    Ok(CommandStatus::from_problems(!report.is_clean()))
}
