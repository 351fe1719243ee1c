//! skillctl validate - Check a package directory

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::commands::Completion;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, fail_mark, ok_mark, warn_mark};
use crate::core::package::{Package, Provenance};
use crate::core::tokens::TokenCounts;
use crate::core::validation::{Validator, Violation, has_fatal};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Package directory
    pub path: PathBuf,

    /// Skip the duplicate-id check against the registry
    #[arg(long)]
    pub standalone: bool,
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    id: &'a str,
    path: &'a std::path::Path,
    valid: bool,
    token_counts: TokenCounts,
    violations: Vec<ViolationOutput<'a>>,
}

#[derive(Serialize)]
struct ViolationOutput<'a> {
    fatal: bool,
    message: String,
    #[serde(flatten)]
    violation: &'a Violation,
}

pub fn run(ctx: &AppContext, args: &ValidateArgs) -> Result<Completion> {
    let package = Package::load(&args.path, Provenance::local())?;
    let validator = Validator::from_config(&ctx.config.budget);
    let violations = if args.standalone {
        validator.validate(&package, &())
    } else {
        let index = ctx.store.load()?;
        validator.validate(&package, &index)
    };
    let valid = !has_fatal(&violations);

    match ctx.output_format {
        OutputFormat::Json => emit_json(&ValidationOutput {
            id: &package.id,
            path: &package.path,
            valid,
            token_counts: package.token_counts,
            violations: violations
                .iter()
                .map(|violation| ViolationOutput {
                    fatal: violation.is_fatal(),
                    message: violation.to_string(),
                    violation,
                })
                .collect(),
        })?,
        OutputFormat::Plain => {
            for violation in &violations {
                let severity = if violation.is_fatal() { "error" } else { "warning" };
                println!("{}\t{severity}\t{violation}", violation.code());
            }
        }
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout.title(&format!("Validate {}", package.id));
            layout
                .kv("path", &package.path.display().to_string())
                .kv(
                    "manifest tokens",
                    &package.token_counts.manifest_tokens.to_string(),
                )
                .kv("total tokens", &package.token_counts.total_tokens.to_string())
                .blank();
            for violation in &violations {
                let mark = if violation.is_fatal() { fail_mark() } else { warn_mark() };
                layout.push_line(format!("{mark} [{}] {violation}", violation.code()));
            }
            if valid {
                layout.push_line(format!("{} {} is valid", ok_mark(), package.id));
            } else {
                layout.push_line(format!("{} {} failed validation", fail_mark(), package.id));
            }
            emit_human(layout);
        }
    }

    Ok(if valid {
        Completion::Success
    } else {
        Completion::Failed
    })
}
