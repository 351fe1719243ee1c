//! skillctl add-external - Register a package mirrored from upstream

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{OutputFormat, emit_json, ok_mark};
use crate::core::package::{DEFAULT_CATEGORY, DEFAULT_TIER};
use crate::core::validation::{Violation, is_valid_id};
use crate::error::{CtlError, Result};
use crate::storage::RegistryEntry;

#[derive(Args, Debug)]
pub struct AddExternalArgs {
    /// Package id
    pub id: String,

    /// Upstream source: a directory, file:// path or http(s):// URL of a SKILL.md
    pub source: String,

    /// Tier until the first sync reads the upstream manifest
    #[arg(long, default_value_t = DEFAULT_TIER)]
    pub tier: u8,

    /// Category until the first sync reads the upstream manifest
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    pub category: String,

    /// Replace an existing external entry
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize)]
struct Added<'a> {
    id: &'a str,
    source: &'a str,
    cache_path: String,
    replaced: bool,
}

pub fn run(ctx: &AppContext, args: &AddExternalArgs) -> Result<()> {
    if !is_valid_id(&args.id) {
        return Err(CtlError::ValidationFailed {
            id: args.id.clone(),
            violations: vec![Violation::InvalidName {
                id: args.id.clone(),
            }],
        });
    }
    let source = absolutize(&args.source)?;
    let cache_path = ctx.store.cache_path(&args.id);

    let existing = ctx.store.load()?.get(&args.id).cloned();
    let replaced = match existing {
        Some(entry) if entry.is_local() || !args.force => {
            return Err(CtlError::AlreadyExists {
                id: args.id.clone(),
                path: entry.path,
            });
        }
        Some(_) => true,
        None => false,
    };

    let entry = RegistryEntry::external_stub(
        &args.id,
        source.clone(),
        cache_path.clone(),
        args.tier,
        &args.category,
    )?;
    ctx.store.register_external(entry)?;

    let added = Added {
        id: &args.id,
        source: &source,
        cache_path: cache_path.display().to_string(),
        replaced,
    };
    match ctx.output_format {
        OutputFormat::Json => emit_json(&added),
        OutputFormat::Plain => {
            println!("{}\t{}", added.id, added.source);
            Ok(())
        }
        OutputFormat::Human => {
            println!(
                "{} Registered external package {} from {} (run `skillctl sync` to fetch it)",
                ok_mark(),
                args.id,
                source
            );
            Ok(())
        }
    }
}

/// Plain relative paths are stored absolute so sync works from any directory.
fn absolutize(source: &str) -> Result<String> {
    if source.contains("://") {
        return Ok(source.to_string());
    }
    let path = std::path::Path::new(source);
    if path.is_absolute() {
        return Ok(source.to_string());
    }
    Ok(std::env::current_dir()?.join(path).display().to_string())
}
