//! skillctl scan - Discover local packages and register them

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, fail_mark, ok_mark, warn_mark};
use crate::core::package::{MANIFEST_FILE, Package, Provenance};
use crate::core::validation::{Validator, Violation};
use crate::error::Result;
use crate::utils::fs::{hash_dir, is_hidden};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directories to scan (defaults to [catalog] local_paths)
    pub paths: Vec<PathBuf>,

    /// Report what would change without writing the registry
    #[arg(long)]
    pub dry_run: bool,

    /// Drop local entries whose directory no longer exists
    #[arg(long)]
    pub prune: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ScanStatus {
    Registered,
    Unchanged,
    Skipped { reason: String },
    Invalid { reason: String },
}

#[derive(Debug, Clone, Serialize)]
struct ScanResult {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    status: ScanStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Violation>,
}

#[derive(Debug, Default, Serialize)]
struct ScanReport {
    registered: usize,
    unchanged: usize,
    skipped: usize,
    invalid: usize,
    pruned: Vec<String>,
    dry_run: bool,
    results: Vec<ScanResult>,
}

pub fn run(ctx: &AppContext, args: &ScanArgs) -> Result<()> {
    let roots = if args.paths.is_empty() {
        ctx.config.local_paths()
    } else {
        args.paths.clone()
    };

    let mut dirs = Vec::new();
    for root in &roots {
        if !root.exists() {
            warn!(path = %root.display(), "scan path does not exist");
            continue;
        }
        dirs.extend(discover(root));
    }
    dirs.sort();
    dirs.dedup();
    debug!(count = dirs.len(), "discovered package directories");

    let index = ctx.store.load()?;
    let validator = Validator::from_config(&ctx.config.budget);
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut report = ScanReport {
        dry_run: args.dry_run,
        ..ScanReport::default()
    };

    for dir in dirs {
        let package = match Package::load(&dir, Provenance::local()) {
            Ok(package) => package,
            Err(err) => {
                report.push(ScanResult {
                    path: dir,
                    id: None,
                    status: ScanStatus::Invalid {
                        reason: err.to_string(),
                    },
                    warnings: Vec::new(),
                });
                continue;
            }
        };

        if let Some(first) = seen.get(&package.id) {
            let reason = format!("id also used by {}", first.display());
            report.push(skipped(&package, reason, Vec::new()));
            continue;
        }
        seen.insert(package.id.clone(), package.path.clone());

        let violations = validator.validate(&package, &index);
        if let Some(Violation::DuplicateId { existing_path, .. }) = violations
            .iter()
            .find(|v| matches!(v, Violation::DuplicateId { .. }))
        {
            let reason = format!("already registered at {}", existing_path.display());
            report.push(skipped(&package, reason, Vec::new()));
            continue;
        }

        let status = if args.dry_run {
            match index.get(&package.id) {
                Some(existing) if !existing.is_local() => ScanStatus::Skipped {
                    reason: "registered as an external package".to_string(),
                },
                Some(_) => ScanStatus::Unchanged,
                None => ScanStatus::Registered,
            }
        } else {
            let hash = hash_dir(&package.path)?;
            match ctx.store.register_local(&package, hash) {
                Ok(true) => ScanStatus::Registered,
                Ok(false) => ScanStatus::Unchanged,
                Err(err) => ScanStatus::Skipped {
                    reason: err.to_string(),
                },
            }
        };
        report.push(ScanResult {
            path: package.path.clone(),
            id: Some(package.id.clone()),
            status,
            warnings: violations,
        });
    }

    if args.prune {
        report.pruned = prune_missing(ctx, args.dry_run)?;
    }

    info!(
        registered = report.registered,
        unchanged = report.unchanged,
        skipped = report.skipped,
        invalid = report.invalid,
        "scan complete"
    );

    match ctx.output_format {
        OutputFormat::Json => emit_json(&report),
        OutputFormat::Plain => {
            for result in &report.results {
                println!(
                    "{}\t{}\t{}",
                    result.id.as_deref().unwrap_or("-"),
                    status_label(&result.status),
                    result.path.display()
                );
            }
            Ok(())
        }
        OutputFormat::Human => {
            emit_human(human_report(&report));
            Ok(())
        }
    }
}

impl ScanReport {
    fn push(&mut self, result: ScanResult) {
        match result.status {
            ScanStatus::Registered => self.registered += 1,
            ScanStatus::Unchanged => self.unchanged += 1,
            ScanStatus::Skipped { .. } => self.skipped += 1,
            ScanStatus::Invalid { .. } => self.invalid += 1,
        }
        self.results.push(result);
    }
}

fn skipped(package: &Package, reason: String, warnings: Vec<Violation>) -> ScanResult {
    ScanResult {
        path: package.path.clone(),
        id: Some(package.id.clone()),
        status: ScanStatus::Skipped { reason },
        warnings,
    }
}

/// Directories under `root` (or `root` itself) that hold a manifest.
fn discover(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map_or(true, |rel| !is_hidden(rel))
        })
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect()
}

fn prune_missing(ctx: &AppContext, dry_run: bool) -> Result<Vec<String>> {
    let missing: Vec<String> = ctx
        .store
        .load()?
        .local()
        .filter(|entry| !entry.path.join(MANIFEST_FILE).is_file())
        .map(|entry| entry.id.clone())
        .collect();
    if dry_run || missing.is_empty() {
        return Ok(missing);
    }
    ctx.store.update(|index| {
        for id in &missing {
            index.remove(id);
        }
        Ok(())
    })?;
    info!(count = missing.len(), "pruned local entries with missing directories");
    Ok(missing)
}

fn status_label(status: &ScanStatus) -> &'static str {
    match status {
        ScanStatus::Registered => "registered",
        ScanStatus::Unchanged => "unchanged",
        ScanStatus::Skipped { .. } => "skipped",
        ScanStatus::Invalid { .. } => "invalid",
    }
}

fn human_report(report: &ScanReport) -> HumanLayout {
    let mut layout = HumanLayout::new();
    let title = if report.dry_run { "Scan (dry run)" } else { "Scan" };
    layout.title(title);
    for result in &report.results {
        let label = result
            .id
            .clone()
            .unwrap_or_else(|| result.path.display().to_string());
        let line = match &result.status {
            ScanStatus::Registered => format!("{} {label} registered", ok_mark()),
            ScanStatus::Unchanged => format!("  {label} unchanged"),
            ScanStatus::Skipped { reason } => format!("{} {label} skipped: {reason}", warn_mark()),
            ScanStatus::Invalid { reason } => format!("{} {reason}", fail_mark()),
        };
        layout.push_line(line);
        for warning in &result.warnings {
            layout.push_line(format!("    [{}] {warning}", warning.code()));
        }
    }
    for id in &report.pruned {
        layout.push_line(format!("{} {id} pruned (directory missing)", warn_mark()));
    }
    layout
        .blank()
        .kv("registered", &report.registered.to_string())
        .kv("unchanged", &report.unchanged.to_string())
        .kv("skipped", &report.skipped.to_string())
        .kv("invalid", &report.invalid.to_string());
    layout
}
