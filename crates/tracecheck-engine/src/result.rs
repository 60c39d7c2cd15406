use serde::Serialize;
use std::fmt;

use tracecheck_ir::properties::InvariantShape;
use tracecheck_ir::trace::{format_entries, Trace, TraceEntry};

use crate::explorer::{ExploreStats, SearchStrategy};

/// The bound a verdict was established under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub model: &'static str,
    pub domain: String,
    pub max_trace_length: usize,
    pub strategy: SearchStrategy,
    pub symmetry: bool,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.domain)?;
        if self.symmetry {
            write!(f, ", up to symmetry")?;
        }
        Ok(())
    }
}

/// A reproducing trace for a violated invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counterexample<S> {
    pub invariant: String,
    pub trace: Vec<TraceEntry<S>>,
    /// Second trace of a cross-trace violation.
    pub alternate: Option<Vec<TraceEntry<S>>>,
}

impl<S: Clone> Counterexample<S> {
    pub fn single(invariant: &str, trace: &Trace<S>) -> Self {
        Self {
            invariant: invariant.to_string(),
            trace: trace.entries(),
            alternate: None,
        }
    }

    pub fn pair(invariant: &str, first: &Trace<S>, second: &Trace<S>) -> Self {
        Self {
            invariant: invariant.to_string(),
            trace: first.entries(),
            alternate: Some(second.entries()),
        }
    }
}

impl<S> Counterexample<S> {
    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }
}

impl<S: fmt::Display> fmt::Display for Counterexample<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "counterexample for {} ({} snapshots):", self.invariant, self.trace.len())?;
        write!(f, "{}", format_entries(&self.trace))?;
        if let Some(alternate) = &self.alternate {
            writeln!(f, "alternate ordering:")?;
            write!(f, "{}", format_entries(alternate))?;
        }
        Ok(())
    }
}

/// Result of checking one invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum VerificationResult<S> {
    /// No trace within the bound violates the invariant.
    Holds { scope: Scope },
    Violated { counterexample: Counterexample<S> },
    /// A budget or cancellation ended the search first.
    Inconclusive { reason: String },
}

impl<S> VerificationResult<S> {
    /// Stable verdict label, independent of scope and trace contents.
    pub fn verdict_class(&self) -> &'static str {
        match self {
            VerificationResult::Holds { .. } => "holds",
            VerificationResult::Violated { .. } => "violated",
            VerificationResult::Inconclusive { .. } => "inconclusive",
        }
    }

    pub fn counterexample(&self) -> Option<&Counterexample<S>> {
        match self {
            VerificationResult::Violated { counterexample } => Some(counterexample),
            _ => None,
        }
    }
}

impl<S: fmt::Display> fmt::Display for VerificationResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Holds { scope } => write!(f, "HOLDS ({scope})"),
            VerificationResult::Violated { counterexample } => {
                write!(f, "COUNTEREXAMPLE\n{counterexample}")
            }
            VerificationResult::Inconclusive { reason } => write!(f, "INCONCLUSIVE ({reason})"),
        }
    }
}

/// Verdict for a single named invariant.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyVerdict<S> {
    pub name: String,
    pub shape: InvariantShape,
    pub result: VerificationResult<S>,
    pub stats: ExploreStats,
    pub elapsed_ms: u64,
}

/// Verdicts for every requested invariant of one model, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport<S> {
    pub scope: Scope,
    pub verdicts: Vec<PropertyVerdict<S>>,
}

impl<S> CheckReport<S> {
    pub fn all_hold(&self) -> bool {
        self.verdicts
            .iter()
            .all(|v| matches!(v.result, VerificationResult::Holds { .. }))
    }

    pub fn any_violated(&self) -> bool {
        self.verdicts
            .iter()
            .any(|v| matches!(v.result, VerificationResult::Violated { .. }))
    }

    pub fn overall_verdict(&self) -> &'static str {
        if self.any_violated() {
            "violated"
        } else if self.all_hold() {
            "holds"
        } else {
            "inconclusive"
        }
    }

    /// Process exit status: 0 all hold, 1 any violation, 2 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.overall_verdict() {
            "holds" => 0,
            "violated" => 1,
            _ => 2,
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyVerdict<S>> {
        self.verdicts.iter().find(|v| v.name == name)
    }
}
