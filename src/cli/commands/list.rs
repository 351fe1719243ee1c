//! skillctl list - List registered packages

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{OutputFormat, emit_json};
use crate::core::package::Origin;
use crate::error::Result;
use crate::storage::RegistryEntry;
use crate::utils::format::{format_timestamp, short_revision, truncate_string};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only external packages
    #[arg(long, conflicts_with = "local")]
    pub external: bool,

    /// Only local packages
    #[arg(long)]
    pub local: bool,
}

impl ListArgs {
    const fn origin(&self) -> Option<Origin> {
        if self.external {
            Some(Origin::External)
        } else if self.local {
            Some(Origin::Local)
        } else {
            None
        }
    }
}

#[derive(Serialize)]
struct ListOutput<'a> {
    count: usize,
    packages: Vec<&'a RegistryEntry>,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    run_partition(ctx, args.origin())
}

/// List entries, optionally restricted to one origin.
pub fn run_partition(ctx: &AppContext, origin: Option<Origin>) -> Result<()> {
    let index = ctx.store.load()?;
    let entries: Vec<&RegistryEntry> = index
        .entries()
        .filter(|entry| origin.is_none_or(|o| entry.origin() == o))
        .collect();
    debug!(count = entries.len(), ?origin, "listing packages");

    match ctx.output_format {
        OutputFormat::Json => emit_json(&ListOutput {
            count: entries.len(),
            packages: entries,
        }),
        OutputFormat::Plain => {
            for entry in &entries {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.id,
                    entry.origin(),
                    entry.tier,
                    entry.category,
                    entry.path.display()
                );
            }
            Ok(())
        }
        OutputFormat::Human => {
            display_human(&entries, origin);
            Ok(())
        }
    }
}

fn display_human(entries: &[&RegistryEntry], origin: Option<Origin>) {
    if entries.is_empty() {
        match origin {
            Some(Origin::External) => {
                println!("No external packages");
                println!();
                println!("Register one with: skillctl add-external <id> <source>");
            }
            _ => {
                println!("No packages registered");
                println!();
                println!("Register local skills with: skillctl scan");
            }
        }
        return;
    }

    println!(
        "{:32} {:8} {:4} {:16} {:12} {:20}",
        "ID", "ORIGIN", "TIER", "CATEGORY", "REVISION", "SYNCED"
    );
    println!("{}", "─".repeat(96));
    for entry in entries {
        let origin = match entry.origin() {
            Origin::Local => "local".green(),
            Origin::External => "external".cyan(),
        };
        let (revision, synced) = if entry.is_local() {
            ("-".to_string(), "-".to_string())
        } else {
            (
                short_revision(entry.provenance.upstream_revision()),
                format_timestamp(entry.provenance.synced_at()),
            )
        };
        println!(
            "{:32} {:8} {:4} {:16} {:12} {:20}",
            truncate_string(&entry.id, 32),
            origin,
            entry.tier,
            truncate_string(&entry.category, 16),
            revision,
            synced
        );
    }
    println!();
    println!("{} package(s)", entries.len());
}
