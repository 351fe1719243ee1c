//! skillctl dedup - Near-duplicate code candidates

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json};
use crate::core::similarity::{SimilarityMatch, SimilarityScanner};
use crate::error::{CtlError, Result};
use crate::utils::fs::package_files;

#[derive(Args, Debug)]
pub struct DedupArgs {
    /// Files or directories to compare
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Minimum score (0.0 - 1.0); defaults to [dedup] threshold
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Maximum number of pairs to show
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

#[derive(Serialize)]
struct DedupOutput<'a> {
    threshold: f32,
    files: usize,
    total: usize,
    matches: &'a [SimilarityMatch],
}

pub fn run(ctx: &AppContext, args: &DedupArgs) -> Result<()> {
    let mut files = Vec::new();
    for path in &args.paths {
        if path.is_dir() {
            files.extend(package_files(path)?.into_iter().map(|rel| path.join(rel)));
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(CtlError::not_found(format!("{} does not exist", path.display())));
        }
    }
    debug!(files = files.len(), "scanning for similar code");

    let scanner = SimilarityScanner::new()
        .with_threshold(args.threshold.unwrap_or(ctx.config.dedup.threshold));
    let matches = scanner.scan(&files)?;
    let shown = &matches[..matches.len().min(args.limit)];

    match ctx.output_format {
        OutputFormat::Json => emit_json(&DedupOutput {
            threshold: scanner.threshold(),
            files: files.len(),
            total: matches.len(),
            matches: shown,
        }),
        OutputFormat::Plain => {
            for found in shown {
                println!(
                    "{:.2}\t{:?}\t{}\t{}",
                    found.score, found.recommendation, found.a, found.b
                );
            }
            Ok(())
        }
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout.title(&format!(
                "{} candidate pair(s) at threshold {:.2}",
                matches.len(),
                scanner.threshold()
            ));
            for found in shown {
                layout.push_line(format!(
                    "{:.2}  {:?}  {} <-> {}",
                    found.score, found.recommendation, found.a, found.b
                ));
                if !found.common_signatures.is_empty() {
                    layout.push_line(format!("      shared: {}", found.common_signatures.join(", ")));
                }
            }
            if matches.len() > shown.len() {
                layout
                    .blank()
                    .push_line(format!("({} more; raise --limit to see them)", matches.len() - shown.len()));
            }
            emit_human(layout);
            Ok(())
        }
    }
}
