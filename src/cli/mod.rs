//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

pub mod commands;
pub mod output;

pub use commands::Commands;
pub use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "skillctl", version, about = "Validate, order, install and sync agent skill packages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Registry directory
    #[arg(long, global = true, env = "SKILLCTL_ROOT")]
    pub root: Option<PathBuf>,

    /// Config file (replaces the global and registry config files)
    #[arg(long, global = true, env = "SKILLCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON output for scripts and agents
    #[arg(long, global = true)]
    pub robot: bool,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// More logging (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// `--robot` wins over `--format`.
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        if self.robot {
            OutputFormat::Json
        } else {
            self.format.unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn robot_overrides_format() {
        let cli = Cli::parse_from(["skillctl", "--format", "plain", "--robot", "list"]);
        assert_eq!(cli.output_format(), OutputFormat::Json);
        let cli = Cli::parse_from(["skillctl", "list", "--format", "plain"]);
        assert_eq!(cli.output_format(), OutputFormat::Plain);
    }
}
