//! Deterministic re-execution of recorded steps.

use thiserror::Error;

use tracecheck_ir::system::{Step, TransitionSystem};
use tracecheck_ir::trace::{Trace, TraceEntry};

/// A recorded trace does not match what the model computes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("trace is empty")]
    Empty,
    #[error("step 0: expected initial rule '{expected}', found '{found}'")]
    WrongInitialRule {
        expected: &'static str,
        found: String,
    },
    #[error("step 0: {rule}({binding}) does not produce the recorded initial snapshot")]
    UnknownInitialState { rule: String, binding: String },
    #[error("step {index}: unknown rule '{rule}'")]
    UnknownRule { index: usize, rule: String },
    #[error("step {index}: binding ({binding}) does not fit the parameters of {rule}")]
    BindingMismatch {
        index: usize,
        rule: String,
        binding: String,
    },
    #[error("step {index}: {rule}({binding}) is not admissible")]
    NotAdmissible {
        index: usize,
        rule: String,
        binding: String,
    },
    #[error("step {index}: snapshot differs from the one produced by {rule}({binding})")]
    SnapshotMismatch {
        index: usize,
        rule: String,
        binding: String,
    },
}

fn apply_step<M: TransitionSystem>(
    model: &M,
    index: usize,
    state: &M::State,
    step: &Step,
) -> Result<M::State, ReplayError> {
    let id = model
        .rule_id(step.rule)
        .ok_or_else(|| ReplayError::UnknownRule {
            index,
            rule: step.rule.to_string(),
        })?;
    let rule = &model.rules()[id];
    if !step.binding.matches(rule.params) {
        return Err(ReplayError::BindingMismatch {
            index,
            rule: step.rule.to_string(),
            binding: step.binding.to_string(),
        });
    }
    model
        .apply(id, state, &step.binding)
        .ok_or_else(|| ReplayError::NotAdmissible {
            index,
            rule: step.rule.to_string(),
            binding: step.binding.to_string(),
        })
}

/// Apply `steps` in order from `initial`, returning every resulting snapshot.
/// Step indices in errors count `initial` as 0.
pub fn replay<M: TransitionSystem>(
    model: &M,
    initial: &M::State,
    steps: &[Step],
) -> Result<Vec<M::State>, ReplayError> {
    let mut out: Vec<M::State> = Vec::with_capacity(steps.len());
    for (offset, step) in steps.iter().enumerate() {
        let current = out.last().unwrap_or(initial);
        let next = apply_step(model, offset + 1, current, step)?;
        out.push(next);
    }
    Ok(out)
}

/// Check that `entries` is a trace the model can produce: the first entry is
/// an initial state chosen by the initial rule, and every later snapshot is
/// exactly what its recorded step computes.
pub fn validate<M: TransitionSystem>(
    model: &M,
    entries: &[TraceEntry<M::State>],
) -> Result<(), ReplayError> {
    let (first, rest) = entries.split_first().ok_or(ReplayError::Empty)?;
    if first.rule != model.initial_rule() {
        return Err(ReplayError::WrongInitialRule {
            expected: model.initial_rule(),
            found: first.rule.to_string(),
        });
    }
    let known = model
        .initial_states()
        .any(|(binding, state)| binding == first.binding && state == first.state);
    if !known {
        return Err(ReplayError::UnknownInitialState {
            rule: first.rule.to_string(),
            binding: first.binding.to_string(),
        });
    }

    let mut current = &first.state;
    for entry in rest {
        let step = entry.step();
        let next = apply_step(model, entry.index, current, &step)?;
        if next != entry.state {
            return Err(ReplayError::SnapshotMismatch {
                index: entry.index,
                rule: step.rule.to_string(),
                binding: step.binding.to_string(),
            });
        }
        current = &entry.state;
    }
    Ok(())
}

/// Extend `trace` by `steps`, or `None` if any step is inadmissible or the
/// result would exceed the length bound.
pub fn extend_with<M: TransitionSystem>(
    model: &M,
    trace: &Trace<M::State>,
    steps: &[Step],
) -> Option<Trace<M::State>> {
    if trace.len() + steps.len() > model.domain().max_trace_length() {
        return None;
    }
    let mut out = trace.clone();
    for step in steps {
        let id = model.rule_id(step.rule)?;
        let next = model.apply(id, out.last(), &step.binding)?;
        out = out.extend(step.clone(), next);
    }
    Some(out)
}
