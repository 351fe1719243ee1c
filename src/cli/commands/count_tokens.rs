//! skillctl count-tokens - Estimated token counts for a package

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, ok_mark, warn_mark};
use crate::core::package::MANIFEST_FILE;
use crate::core::tokens::{TokenCounts, estimate_tokens, measure_package};
use crate::error::{CtlError, Result};
use crate::utils::fs::read_optional;

#[derive(Args, Debug)]
pub struct CountTokensArgs {
    /// Package directory or single file
    pub path: PathBuf,
}

#[derive(Serialize)]
struct TokenReport {
    path: PathBuf,
    #[serde(flatten)]
    counts: TokenCounts,
    manifest_ceiling: usize,
    total_ceiling: usize,
    within_budget: bool,
}

/// Counting never fails on budget; over-budget packages are only flagged.
pub fn run(ctx: &AppContext, args: &CountTokensArgs) -> Result<()> {
    let counts = if args.path.is_dir() {
        let manifest = read_optional(args.path.join(MANIFEST_FILE))?.unwrap_or_default();
        measure_package(&args.path, &manifest)?
    } else if args.path.is_file() {
        let text = std::fs::read_to_string(&args.path)?;
        let tokens = estimate_tokens(&text);
        TokenCounts {
            manifest_tokens: tokens,
            total_tokens: tokens,
        }
    } else {
        return Err(CtlError::not_found(format!("{} does not exist", args.path.display())));
    };

    let budget = ctx.config.budget;
    let report = TokenReport {
        path: args.path.clone(),
        counts,
        manifest_ceiling: budget.manifest_tokens,
        total_ceiling: budget.total_tokens,
        within_budget: counts.manifest_tokens <= budget.manifest_tokens
            && counts.total_tokens <= budget.total_tokens,
    };

    match ctx.output_format {
        OutputFormat::Json => emit_json(&report),
        OutputFormat::Plain => {
            println!("{}\t{}", counts.manifest_tokens, counts.total_tokens);
            Ok(())
        }
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout
                .section("Tokens")
                .kv(
                    "manifest",
                    &format!("{} / {}", counts.manifest_tokens, budget.manifest_tokens),
                )
                .kv(
                    "total",
                    &format!("{} / {}", counts.total_tokens, budget.total_tokens),
                );
            let verdict = if report.within_budget {
                format!("{} within budget", ok_mark())
            } else {
                format!("{} over budget", warn_mark())
            };
            layout.blank().push_line(verdict);
            emit_human(layout);
            Ok(())
        }
    }
}
