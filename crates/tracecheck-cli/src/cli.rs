//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Bounded model checker for the auction and ballot contract models.\n\n\
    Every trace up to --max-length snapshots is enumerated over a finite domain\n\
    and each selected invariant is checked on every snapshot.\n\n\
    Examples:\n  \
    tracecheck list --model ballot\n  \
    tracecheck check --model auction --max-length 5\n  \
    tracecheck check --model ballot --invariant delegateVoteOrder --format json\n\n\
    Exit status: 0 when every invariant holds, 1 on a violation, 2 when a budget\n\
    ran out before the search finished.";

#[derive(Parser)]
#[command(name = "tracecheck")]
#[command(about = "Bounded trace checking for contract state machines")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Enumerate bounded traces and check invariants
    Check {
        /// Model to check: auction | ballot
        #[arg(long)]
        model: Option<String>,

        /// Number of addresses in the domain
        #[arg(long)]
        addresses: Option<i64>,

        /// Number of proposals in the domain
        #[arg(long)]
        proposals: Option<i64>,

        /// Smallest integer value
        #[arg(long, allow_hyphen_values = true)]
        int_min: Option<i64>,

        /// Largest integer value
        #[arg(long, allow_hyphen_values = true)]
        int_max: Option<i64>,

        /// Maximum number of snapshots per trace
        #[arg(long)]
        max_length: Option<i64>,

        /// Invariant to check (repeatable; default: the whole catalog)
        #[arg(long = "invariant")]
        invariants: Vec<String>,

        /// Worker threads (1 = sequential, 0 = all cores)
        #[arg(long)]
        threads: Option<usize>,

        /// Wall-clock budget in seconds for the whole run (0 disables)
        #[arg(long)]
        timeout: Option<u64>,

        /// Step budget per invariant (0 disables)
        #[arg(long)]
        max_steps: Option<u64>,

        /// Search strategy: iterative-deepening | depth-first
        #[arg(long)]
        strategy: Option<String>,

        /// Integer overflow policy: reject | saturate | wrap
        #[arg(long)]
        overflow: Option<String>,

        /// Ballot delegation guard: as-modeled | strict
        #[arg(long)]
        delegation: Option<String>,

        /// Start every auction account at this balance
        #[arg(long)]
        fixed_balance: Option<i64>,

        /// Identify snapshots equal up to relabelling of addresses and proposals
        #[arg(long)]
        symmetry: bool,

        /// Skip snapshots already reached at a shorter or equal length
        #[arg(long)]
        prune_revisits: bool,

        /// JSON run file; flags given on the command line override its fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List a model's invariant catalog
    List {
        /// Model whose catalog to list: auction | ballot
        #[arg(long, default_value = "auction")]
        model: String,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,
    },
}
