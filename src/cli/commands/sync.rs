//! skillctl sync - Refresh external packages from upstream

use clap::Args;

use crate::app::AppContext;
use crate::cli::commands::Completion;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, fail_mark, ok_mark, warn_mark};
use crate::error::Result;
use crate::sync::{SyncEngine, SyncOutcome, SyncReport};
use crate::utils::format::short_revision;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Override [sync] concurrency for this run
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Rejected and failed fetches are reported, not raised. Cache write
/// failures are reported too, and make the command exit non-zero once the
/// report is printed.
pub fn run(ctx: &AppContext, args: &SyncArgs) -> Result<Completion> {
    let engine = match args.concurrency {
        Some(concurrency) => {
            let mut config = ctx.config.clone();
            config.sync.concurrency = concurrency;
            SyncEngine::with_default_fetcher(ctx.store.clone(), &config, ctx.cancel.clone())?
        }
        None => ctx.sync_engine()?,
    };
    let report = engine.sync()?;

    match ctx.output_format {
        OutputFormat::Json => emit_json(&report)?,
        OutputFormat::Plain => {
            for result in &report.results {
                println!("{}\t{}", result.id, status_label(&result.outcome));
            }
        }
        OutputFormat::Human => emit_human(human_report(&report)),
    }
    Ok(if report.storage_failed() == 0 {
        Completion::Success
    } else {
        Completion::Failed
    })
}

const fn status_label(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::UpToDate { .. } => "up_to_date",
        SyncOutcome::Updated { .. } => "updated",
        SyncOutcome::Rejected { .. } => "rejected",
        SyncOutcome::FetchFailed { .. } => "fetch_failed",
        SyncOutcome::StorageFailed { .. } => "storage_failed",
        SyncOutcome::Cancelled => "cancelled",
    }
}

fn human_report(report: &SyncReport) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title("Sync");
    for result in &report.results {
        let id = &result.id;
        let line = match &result.outcome {
            SyncOutcome::UpToDate { revision } => {
                format!("  {id} up to date ({})", short_revision(Some(revision)))
            }
            SyncOutcome::Updated { from, to } => format!(
                "{} {id} {} -> {}",
                ok_mark(),
                short_revision(from.as_deref()),
                short_revision(Some(to))
            ),
            SyncOutcome::Rejected { reason, violations } => {
                let codes: Vec<&str> = violations
                    .iter()
                    .filter(|v| v.is_fatal())
                    .map(|v| v.code())
                    .collect();
                if codes.is_empty() {
                    format!("{} {id} rejected: {reason}", warn_mark())
                } else {
                    format!("{} {id} rejected: {reason} ({})", warn_mark(), codes.join(", "))
                }
            }
            SyncOutcome::FetchFailed { attempts, error } => {
                format!("{} {id} fetch failed after {attempts} attempt(s): {error}", fail_mark())
            }
            SyncOutcome::StorageFailed { error } => {
                format!("{} {id} cache write failed: {error}", fail_mark())
            }
            SyncOutcome::Cancelled => format!("{} {id} cancelled", warn_mark()),
        };
        layout.push_line(line);
    }
    layout
        .blank()
        .kv("updated", &report.updated().to_string())
        .kv("up to date", &report.up_to_date().to_string())
        .kv("rejected", &report.rejected().to_string())
        .kv("failed", &report.failed().to_string())
        .kv("storage failed", &report.storage_failed().to_string())
        .kv("local skipped", &report.skipped_local.to_string());
    layout
}
