//! `tracecheck` command-line entry point.

mod cli;
mod commands;
mod types;

pub(crate) use cli::{Cli, Commands};
pub(crate) use types::OutputFormat;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::check::CheckArgs;

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            model,
            addresses,
            proposals,
            int_min,
            int_max,
            max_length,
            invariants,
            threads,
            timeout,
            max_steps,
            strategy,
            overflow,
            delegation,
            fixed_balance,
            symmetry,
            prune_revisits,
            config,
            format,
        } => {
            let code = commands::check::run_check_command(CheckArgs {
                model,
                addresses,
                proposals,
                int_min,
                int_max,
                max_length,
                invariants,
                threads,
                timeout,
                max_steps,
                strategy,
                overflow,
                delegation,
                fixed_balance,
                symmetry,
                prune_revisits,
                config,
                format,
            })?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::List { model, format } => {
            commands::list::run_list_command(&model, &format)?;
        }
    }

    Ok(())
}
