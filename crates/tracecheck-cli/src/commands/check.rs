// Command handler for: Check
//
// Builds a run configuration from an optional run file plus flags, runs the
// checker and renders the report as text or JSON.

use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;

use miette::IntoDiagnostic;
use serde_json::Value;
use tracing::debug;

use tracecheck_engine::config::{run, ModelChoice, ModelReport, RunConfig};
use tracecheck_engine::explorer::SearchStrategy;
use tracecheck_engine::result::CheckReport;
use tracecheck_ir::ballot::DelegationGuard;
use tracecheck_ir::domain::OverflowPolicy;

use super::helpers::{load_run_config, parse_flag, parse_output_format};
use crate::OutputFormat;

pub(crate) struct CheckArgs {
    pub model: Option<String>,
    pub addresses: Option<i64>,
    pub proposals: Option<i64>,
    pub int_min: Option<i64>,
    pub int_max: Option<i64>,
    pub max_length: Option<i64>,
    pub invariants: Vec<String>,
    pub threads: Option<usize>,
    pub timeout: Option<u64>,
    pub max_steps: Option<u64>,
    pub strategy: Option<String>,
    pub overflow: Option<String>,
    pub delegation: Option<String>,
    pub fixed_balance: Option<i64>,
    pub symmetry: bool,
    pub prune_revisits: bool,
    pub config: Option<PathBuf>,
    pub format: String,
}

/// Layer command-line flags over the run file (or the defaults).
pub(crate) fn build_run_config(args: &CheckArgs) -> miette::Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => load_run_config(path)?,
        None => RunConfig::default(),
    };
    if let Some(model) = parse_flag::<ModelChoice>(args.model.as_deref())? {
        config.model = model;
    }
    if let Some(n) = args.addresses {
        config.domain.address_count = n;
    }
    if let Some(n) = args.proposals {
        config.domain.proposal_count = n;
    }
    if let Some(n) = args.int_min {
        config.domain.int_min = n;
    }
    if let Some(n) = args.int_max {
        config.domain.int_max = n;
    }
    if let Some(n) = args.max_length {
        config.domain.max_trace_length = n;
    }
    if !args.invariants.is_empty() {
        config.invariants = args.invariants.clone();
    }
    if let Some(n) = args.threads {
        config.parallelism = n;
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }
    if let Some(steps) = args.max_steps {
        config.max_steps = steps;
    }
    if let Some(strategy) = parse_flag::<SearchStrategy>(args.strategy.as_deref())? {
        config.strategy = strategy;
    }
    if let Some(policy) = parse_flag::<OverflowPolicy>(args.overflow.as_deref())? {
        config.overflow = policy;
    }
    if let Some(guard) = parse_flag::<DelegationGuard>(args.delegation.as_deref())? {
        config.delegation_guard = guard;
    }
    if args.fixed_balance.is_some() {
        config.fixed_balance = args.fixed_balance;
    }
    config.symmetry |= args.symmetry;
    config.prune_revisits |= args.prune_revisits;
    Ok(config)
}

pub(crate) fn run_check_command(args: CheckArgs) -> miette::Result<i32> {
    let format = parse_output_format(&args.format)?;
    let config = build_run_config(&args)?;
    debug!(
        model = config.model.name(),
        parallelism = config.parallelism,
        "run configuration resolved"
    );
    let report = run(&config).into_diagnostic()?;

    match format {
        OutputFormat::Text => print!("{}", render_report_text(&report)),
        OutputFormat::Json => {
            let json = report_json(&report)?;
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
    }
    std::io::stdout().flush().into_diagnostic()?;
    Ok(report.exit_code())
}

pub(crate) fn report_json(report: &ModelReport) -> miette::Result<Value> {
    let mut json = serde_json::to_value(report).into_diagnostic()?;
    if let Value::Object(map) = &mut json {
        map.insert("overall_verdict".into(), report.overall_verdict().into());
        map.insert("exit_code".into(), report.exit_code().into());
    }
    Ok(json)
}

pub(crate) fn render_report_text(report: &ModelReport) -> String {
    match report {
        ModelReport::Auction(r) => render_text(r),
        ModelReport::Ballot(r) => render_text(r),
    }
}

fn render_text<S: Display>(report: &CheckReport<S>) -> String {
    let mut out = format!(
        "Scope: {} (max length {}, {})\n",
        report.scope,
        report.scope.max_trace_length,
        report.scope.strategy.name()
    );
    for verdict in &report.verdicts {
        out.push_str(&format!(
            "\n{} [{}]: {}\n",
            verdict.name, verdict.shape, verdict.result
        ));
        out.push_str(&format!(
            "  {} snapshots, {} rounds, {} ms\n",
            verdict.stats.snapshots, verdict.stats.rounds, verdict.elapsed_ms
        ));
    }
    out.push_str(&format!(
        "\nOverall: {}\n",
        report.overall_verdict().to_uppercase()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CheckArgs {
        CheckArgs {
            model: None,
            addresses: None,
            proposals: None,
            int_min: None,
            int_max: None,
            max_length: None,
            invariants: Vec::new(),
            threads: None,
            timeout: None,
            max_steps: None,
            strategy: None,
            overflow: None,
            delegation: None,
            fixed_balance: None,
            symmetry: false,
            prune_revisits: false,
            config: None,
            format: "text".into(),
        }
    }

    #[test]
    fn no_flags_means_default_config() {
        assert_eq!(build_run_config(&args()).unwrap(), RunConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let config = build_run_config(&CheckArgs {
            model: Some("ballot".into()),
            int_min: Some(-1),
            max_length: Some(5),
            invariants: vec!["noDoubleRole".into()],
            strategy: Some("depth-first".into()),
            delegation: Some("strict".into()),
            symmetry: true,
            ..args()
        })
        .unwrap();
        assert_eq!(config.model, ModelChoice::Ballot);
        assert_eq!(config.domain.int_min, -1);
        assert_eq!(config.domain.max_trace_length, 5);
        assert_eq!(config.invariants, ["noDoubleRole"]);
        assert_eq!(config.strategy, SearchStrategy::DepthFirst);
        assert_eq!(config.delegation_guard, DelegationGuard::Strict);
        assert!(config.symmetry);
    }

    #[test]
    fn unknown_option_values_are_errors() {
        let err = build_run_config(&CheckArgs {
            overflow: Some("clamp".into()),
            ..args()
        });
        assert!(err.is_err());
    }

    #[test]
    fn json_report_carries_overall_verdict() {
        let config = RunConfig {
            invariants: vec!["noNewMoney".into()],
            ..RunConfig::default()
        };
        let report = run(&config).unwrap();
        let json = report_json(&report).unwrap();
        assert_eq!(json["overall_verdict"], "holds");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["verdicts"][0]["name"], "noNewMoney");
        assert_eq!(json["verdicts"][0]["result"]["verdict"], "holds");
        assert!(render_report_text(&report).contains("noNewMoney [state]: HOLDS"));
    }
}
