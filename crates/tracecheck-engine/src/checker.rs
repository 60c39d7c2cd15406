//! Invariant checking on top of the explorer.
//!
//! Each invariant gets its own exploration. The visitor evaluates the
//! invariant on the newest snapshot of every visited prefix, which covers
//! every snapshot of every trace exactly once.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use tracecheck_ir::properties::{Invariant, InvariantKind};
use tracecheck_ir::system::TransitionSystem;
use tracecheck_ir::trace::Trace;

use crate::control::{deadline_from_timeout_secs, SearchControl};
use crate::error::CheckError;
use crate::explorer::{ExploreOptions, ExploreStatus, Explorer, Flow, SearchStrategy, TraceVisitor};
use crate::replay::{extend_with, validate};
use crate::result::{CheckReport, Counterexample, PropertyVerdict, Scope, VerificationResult};

pub fn scope_of<M: TransitionSystem>(model: &M, options: &ExploreOptions) -> Scope {
    Scope {
        model: model.name(),
        domain: model.domain().describe(),
        max_trace_length: model.domain().max_trace_length(),
        strategy: options.strategy,
        symmetry: options.symmetry,
    }
}

enum Violation<S> {
    Single,
    Pair(Trace<S>, Trace<S>),
}

struct CheckVisitor<'a, M: TransitionSystem> {
    model: &'a M,
    invariant: &'a Invariant<M::State>,
    strategy: SearchStrategy,
    best: Mutex<Option<Counterexample<M::State>>>,
    /// Length of `best`, or `usize::MAX` while none is known.
    best_len: AtomicUsize,
}

impl<'a, M: TransitionSystem> CheckVisitor<'a, M> {
    fn new(model: &'a M, invariant: &'a Invariant<M::State>, strategy: SearchStrategy) -> Self {
        Self {
            model,
            invariant,
            strategy,
            best: Mutex::new(None),
            best_len: AtomicUsize::new(usize::MAX),
        }
    }

    fn violation(&self, trace: &Trace<M::State>) -> Option<Violation<M::State>> {
        match &self.invariant.kind {
            InvariantKind::State(holds) => (!holds(trace.last())).then_some(Violation::Single),
            InvariantKind::Baseline(holds) => {
                (!holds(trace.first(), trace.last())).then_some(Violation::Single)
            }
            InvariantKind::Step(holds) => {
                let previous = trace.previous()?;
                (!holds(previous, trace.last())).then_some(Violation::Single)
            }
            InvariantKind::CrossTrace { reorderings, agree } => {
                reorderings(trace.last()).into_iter().find_map(|reordering| {
                    let first = extend_with(self.model, trace, &reordering.first)?;
                    let second = extend_with(self.model, trace, &reordering.second)?;
                    if agree(first.last(), second.last()) {
                        None
                    } else {
                        Some(Violation::Pair(first, second))
                    }
                })
            }
        }
    }

    /// Keep the shortest counterexample seen so far.
    fn record(&self, trace: &Trace<M::State>, violation: Violation<M::State>) {
        let mut best = self.best.lock();
        let len = trace.len();
        if self.best_len.load(Ordering::Acquire) <= len {
            return;
        }
        let name = &self.invariant.name;
        *best = Some(match violation {
            Violation::Single => Counterexample::single(name, trace),
            Violation::Pair(first, second) => Counterexample::pair(name, &first, &second),
        });
        self.best_len.store(len, Ordering::Release);
    }

    fn into_counterexample(self) -> Option<Counterexample<M::State>> {
        self.best.into_inner()
    }
}

impl<M: TransitionSystem> TraceVisitor<M::State> for CheckVisitor<'_, M> {
    fn visit(&self, trace: &Trace<M::State>) -> Flow {
        // Nothing at or beyond the best length can improve on it.
        if trace.len() >= self.best_len.load(Ordering::Acquire) {
            return Flow::Prune;
        }
        match self.violation(trace) {
            None => Flow::Continue,
            Some(violation) => {
                self.record(trace, violation);
                match self.strategy {
                    SearchStrategy::IterativeDeepening => Flow::Stop,
                    SearchStrategy::DepthFirst => Flow::Prune,
                }
            }
        }
    }
}

/// Check one invariant against a fresh control built from `options`.
pub fn check_invariant<M: TransitionSystem>(
    model: &M,
    invariant: &Invariant<M::State>,
    options: &ExploreOptions,
) -> Result<PropertyVerdict<M::State>, CheckError> {
    check_with_control(model, invariant, options, &options.control())
}

fn check_with_control<M: TransitionSystem>(
    model: &M,
    invariant: &Invariant<M::State>,
    options: &ExploreOptions,
    control: &SearchControl,
) -> Result<PropertyVerdict<M::State>, CheckError> {
    let started = Instant::now();
    let explorer = Explorer::new(model, options.clone());
    let visitor = CheckVisitor::new(model, invariant, options.strategy);
    let outcome = explorer.run_with(&visitor, control)?;

    let result = match visitor.into_counterexample() {
        Some(counterexample) => {
            let replayed = validate(model, &counterexample.trace).and_then(|()| {
                counterexample
                    .alternate
                    .as_deref()
                    .map_or(Ok(()), |alternate| validate(model, alternate))
            });
            replayed.map_err(|source| CheckError::Replay {
                invariant: invariant.name.clone(),
                source,
            })?;
            VerificationResult::Violated { counterexample }
        }
        None => match outcome.status {
            ExploreStatus::Halted(halt) if halt.is_budget() => VerificationResult::Inconclusive {
                reason: halt.to_string(),
            },
            _ => VerificationResult::Holds {
                scope: scope_of(model, options),
            },
        },
    };

    let verdict = PropertyVerdict {
        name: invariant.name.clone(),
        shape: invariant.shape(),
        result,
        stats: outcome.stats,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    debug!(
        invariant = %verdict.name,
        verdict = verdict.result.verdict_class(),
        snapshots = verdict.stats.snapshots,
        "invariant checked"
    );
    Ok(verdict)
}

/// Check every invariant in order. The wall-clock budget covers the whole
/// run; the step budget applies to each invariant separately.
pub fn check_invariants<M: TransitionSystem>(
    model: &M,
    invariants: &[Invariant<M::State>],
    options: &ExploreOptions,
) -> Result<CheckReport<M::State>, CheckError> {
    let scope = scope_of(model, options);
    info!(
        model = model.name(),
        invariants = invariants.len(),
        strategy = options.strategy.name(),
        "checking {scope}"
    );
    let deadline = deadline_from_timeout_secs(options.timeout_secs);
    let mut verdicts = Vec::with_capacity(invariants.len());
    for invariant in invariants {
        let control = SearchControl::new(options.max_steps, deadline, options.cancel.clone());
        verdicts.push(check_with_control(model, invariant, options, &control)?);
    }
    let report = CheckReport { scope, verdicts };
    info!(
        model = model.name(),
        verdict = report.overall_verdict(),
        "check finished"
    );
    Ok(report)
}
