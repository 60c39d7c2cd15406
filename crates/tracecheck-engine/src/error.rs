use thiserror::Error;
use tracecheck_ir::domain::ConfigurationError;
use tracecheck_ir::properties::UnknownInvariant;

use crate::replay::ReplayError;

/// Failures that prevent a check from producing verdicts.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    UnknownInvariant(#[from] UnknownInvariant),
    #[error("counterexample for '{invariant}' failed replay: {source}")]
    Replay {
        invariant: String,
        #[source]
        source: ReplayError,
    },
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
    #[error("invalid run file: {0}")]
    RunFile(#[from] serde_json::Error),
}
