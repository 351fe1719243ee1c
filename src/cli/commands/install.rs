//! skillctl install - Install packages into a skills directory

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::commands::{Completion, TargetArgs};
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, fail_mark, ok_mark, warn_mark};
use crate::error::{CtlError, Result};
use crate::install::{BulkInstallReport, InstallOptions, InstallOutcome, TargetKind};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Package id
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub id: Option<String>,

    /// Install every registered package that passes the filters
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Replace an existing install
    #[arg(long)]
    pub force: bool,

    /// Skip packages above this tier
    #[arg(long)]
    pub tier: Option<u8>,

    /// Only packages in this category
    #[arg(long)]
    pub category: Option<String>,
}

impl InstallArgs {
    fn options(&self) -> InstallOptions {
        InstallOptions {
            force: self.force,
            tier_ceiling: self.tier,
            category: self.category.clone(),
        }
    }
}

#[derive(Serialize)]
struct BulkOutput<'a> {
    target: TargetKind,
    order: &'a [String],
    installed: usize,
    skipped: usize,
    cancelled: bool,
    outcomes: &'a [InstallOutcome],
    failed: Vec<FailureOutput<'a>>,
}

#[derive(Serialize)]
struct FailureOutput<'a> {
    id: &'a str,
    code: &'static str,
    message: String,
}

pub fn run(ctx: &AppContext, args: &InstallArgs) -> Result<Completion> {
    let installer = ctx.installer();
    let kind = args.target.kind();
    let options = args.options();

    if args.all {
        let report = installer.install_all(kind, &options)?;
        render_bulk(ctx, kind, &report)?;
        return Ok(if report.is_success() {
            Completion::Success
        } else {
            Completion::Failed
        });
    }

    let id = args
        .id
        .as_deref()
        .ok_or_else(|| CtlError::Config("a package id or --all is required".to_string()))?;
    let outcome = installer.install(id, kind, &options)?;
    match ctx.output_format {
        OutputFormat::Json => emit_json(&outcome)?,
        OutputFormat::Plain => println!("{}\t{}", outcome.id(), outcome_label(&outcome)),
        OutputFormat::Human => println!("{}", outcome_line(&outcome)),
    }
    Ok(Completion::Success)
}

fn render_bulk(ctx: &AppContext, kind: TargetKind, report: &BulkInstallReport) -> Result<()> {
    match ctx.output_format {
        OutputFormat::Json => emit_json(&BulkOutput {
            target: kind,
            order: &report.order,
            installed: report.installed(),
            skipped: report.skipped(),
            cancelled: report.cancelled,
            outcomes: &report.outcomes,
            failed: report
                .failed
                .iter()
                .map(|(id, err)| FailureOutput {
                    id,
                    code: err.code(),
                    message: err.to_string(),
                })
                .collect(),
        }),
        OutputFormat::Plain => {
            for outcome in &report.outcomes {
                println!("{}\t{}", outcome.id(), outcome_label(outcome));
            }
            for (id, err) in &report.failed {
                println!("{id}\tfailed\t{}", err.code());
            }
            Ok(())
        }
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout.title(&format!("Install into {kind} target"));
            for outcome in &report.outcomes {
                layout.push_line(outcome_line(outcome));
            }
            for (id, err) in &report.failed {
                layout.push_line(format!("{} {id}: {err}", fail_mark()));
            }
            if report.cancelled {
                layout.push_line(format!("{} cancelled before finishing", warn_mark()));
            }
            layout
                .blank()
                .kv("installed", &report.installed().to_string())
                .kv("skipped", &report.skipped().to_string())
                .kv("failed", &report.failed.len().to_string());
            emit_human(layout);
            Ok(())
        }
    }
}

const fn outcome_label(outcome: &InstallOutcome) -> &'static str {
    match outcome {
        InstallOutcome::Installed { replaced: true, .. } => "replaced",
        InstallOutcome::Installed { .. } => "installed",
        InstallOutcome::Skipped { .. } => "skipped",
    }
}

fn outcome_line(outcome: &InstallOutcome) -> String {
    match outcome {
        InstallOutcome::Installed {
            id,
            path,
            files,
            replaced,
        } => {
            let verb = if *replaced { "Replaced" } else { "Installed" };
            format!("{} {verb} {id} ({files} files) at {}", ok_mark(), path.display())
        }
        InstallOutcome::Skipped { id, reason } => {
            format!("{} Skipped {id}: {reason}", warn_mark())
        }
    }
}
