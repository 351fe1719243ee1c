//! skillctl remove - Remove a package from the registry

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{OutputFormat, emit_json, ok_mark};
use crate::core::package::Origin;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Package id
    pub id: String,
}

#[derive(Serialize)]
struct Removed {
    id: String,
    origin: Origin,
    cache_removed: bool,
}

pub fn run(ctx: &AppContext, args: &RemoveArgs) -> Result<()> {
    let (entry, cache_removed) = ctx.store.remove(&args.id)?;
    let removed = Removed {
        origin: entry.origin(),
        id: entry.id,
        cache_removed,
    };
    match ctx.output_format {
        OutputFormat::Json => emit_json(&removed),
        OutputFormat::Plain => {
            println!("{}", removed.id);
            Ok(())
        }
        OutputFormat::Human => {
            let note = match (removed.origin, removed.cache_removed) {
                (_, true) => " and its cached copy",
                (Origin::External, false) => "",
                (Origin::Local, false) => " (files left in place)",
            };
            println!("{} Removed {} package {}{note}", ok_mark(), removed.origin, removed.id);
            Ok(())
        }
    }
}
