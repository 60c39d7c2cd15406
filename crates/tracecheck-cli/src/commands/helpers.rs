// Shared helper functions used across CLI command handlers.
//
// These parse CLI string arguments into typed values and load run files.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use miette::{IntoDiagnostic, WrapErr};

use tracecheck_engine::config::RunConfig;

use crate::OutputFormat;

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

/// Parse an optional flag with the value type's own `FromStr`.
pub(crate) fn parse_flag<T>(raw: Option<&str>) -> miette::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map(|value| value.parse::<T>().into_diagnostic())
        .transpose()
}

pub(crate) fn load_run_config(path: &Path) -> miette::Result<RunConfig> {
    let source = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot read run file {}", path.display()))?;
    RunConfig::from_json(&source)
        .into_diagnostic()
        .wrap_err_with(|| format!("Invalid run file {}", path.display()))
}
