//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod add_external;
pub mod count_tokens;
pub mod dedup;
pub mod graph;
pub mod install;
pub mod list;
pub mod remove;
pub mod scan;
pub mod sync;
pub mod uninstall;
pub mod validate;

use crate::app::AppContext;
use crate::core::package::Origin;
use crate::error::Result;

/// How a command that ran to completion wants the process to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    /// The command printed its own report of what failed.
    Failed,
}

impl From<()> for Completion {
    fn from((): ()) -> Self {
        Self::Success
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover local packages and register them
    Scan(scan::ScanArgs),

    /// Register a package mirrored from an upstream source
    AddExternal(add_external::AddExternalArgs),

    /// Remove a package from the registry
    Remove(remove::RemoveArgs),

    /// List registered packages
    List(list::ListArgs),

    /// List external packages
    ListExternal,

    /// List local packages
    ListLocal,

    /// Check a package directory against naming and budget rules
    Validate(validate::ValidateArgs),

    /// Show estimated token counts for a package
    CountTokens(count_tokens::CountTokensArgs),

    /// Show the dependency order of a package or of the catalog
    Graph(graph::GraphArgs),

    /// Install packages into the user or project skills directory
    Install(install::InstallArgs),

    /// Remove an installed package
    Uninstall(uninstall::UninstallArgs),

    /// Refresh external packages from their upstream sources
    Sync(sync::SyncArgs),

    /// Find near-duplicate code across files
    Dedup(dedup::DedupArgs),
}

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<Completion> {
    match command {
        Commands::Scan(args) => scan::run(ctx, args).map(Completion::from),
        Commands::AddExternal(args) => add_external::run(ctx, args).map(Completion::from),
        Commands::Remove(args) => remove::run(ctx, args).map(Completion::from),
        Commands::List(args) => list::run(ctx, args).map(Completion::from),
        Commands::ListExternal => list::run_partition(ctx, Some(Origin::External)).map(Completion::from),
        Commands::ListLocal => list::run_partition(ctx, Some(Origin::Local)).map(Completion::from),
        Commands::Validate(args) => validate::run(ctx, args),
        Commands::CountTokens(args) => count_tokens::run(ctx, args).map(Completion::from),
        Commands::Graph(args) => graph::run(ctx, args).map(Completion::from),
        Commands::Install(args) => install::run(ctx, args),
        Commands::Uninstall(args) => uninstall::run(ctx, args).map(Completion::from),
        Commands::Sync(args) => sync::run(ctx, args),
        Commands::Dedup(args) => dedup::run(ctx, args).map(Completion::from),
    }
}

/// Shared `--user` / `--project` selection.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct TargetArgs {
    /// Use the user-wide skills directory (default)
    #[arg(long, conflicts_with = "project")]
    pub user: bool,

    /// Use the project skills directory
    #[arg(long)]
    pub project: bool,
}

impl TargetArgs {
    #[must_use]
    pub const fn kind(&self) -> crate::install::TargetKind {
        if self.project {
            crate::install::TargetKind::Project
        } else {
            crate::install::TargetKind::User
        }
    }
}
