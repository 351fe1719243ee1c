//! skillctl - catalog tooling for agent skill packages.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use skillctl::Result;
use skillctl::app::AppContext;
use skillctl::cli::Cli;
use skillctl::cli::commands::{self, Completion};
use skillctl::cli::output::robot_error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(Completion::Success) => ExitCode::SUCCESS,
        Ok(Completion::Failed) => ExitCode::FAILURE,
        Err(e) => {
            if cli.output_format() == skillctl::cli::OutputFormat::Json {
                // Robot mode: JSON error output to stdout
                println!("{}", serde_json::to_string(&robot_error(&e)).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<Completion> {
    let ctx = AppContext::from_cli(cli)?;
    commands::run(&ctx, &cli.command)
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,skillctl=info",
        1 => "info,skillctl=debug",
        2 => "debug,skillctl=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
