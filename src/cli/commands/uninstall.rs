//! skillctl uninstall - Remove an installed package

use clap::Args;

use crate::app::AppContext;
use crate::cli::commands::TargetArgs;
use crate::cli::output::{OutputFormat, emit_json, ok_mark};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Package id
    pub id: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

pub fn run(ctx: &AppContext, args: &UninstallArgs) -> Result<()> {
    let kind = args.target.kind();
    let removed = ctx.installer().uninstall(&args.id, kind)?;
    match ctx.output_format {
        OutputFormat::Json => emit_json(&serde_json::json!({
            "id": args.id,
            "target": kind,
            "path": removed,
        })),
        OutputFormat::Plain => {
            println!("{}\t{}", args.id, removed.display());
            Ok(())
        }
        OutputFormat::Human => {
            println!("{} Uninstalled {} from {}", ok_mark(), args.id, removed.display());
            Ok(())
        }
    }
}
