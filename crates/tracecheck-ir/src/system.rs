use serde::Serialize;
use std::fmt;
use std::hash::Hash;

use crate::domain::{Binding, Domain, Param, Permutation};

/// Index of a rule within a [`TransitionSystem::rules`] table.
pub type RuleId = usize;

/// Initial snapshots with the binding that chose each, generated on demand.
pub type InitialStates<'a, S> = Box<dyn Iterator<Item = (Binding, S)> + Send + 'a>;

/// A named guarded action and the parameters it quantifies over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub name: &'static str,
    pub params: &'static [Param],
}

/// One recorded rule application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Step {
    pub rule: &'static str,
    pub binding: Binding,
}

impl Step {
    pub fn new(rule: &'static str, binding: Binding) -> Self {
        Self { rule, binding }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.rule, self.binding)
    }
}

/// A finite, guarded, nondeterministic state machine.
///
/// Rules are pure: `apply` builds a fresh snapshot from the current one and
/// returns `None` when the guard fails (including bounded-arithmetic
/// rejection). Candidate bindings are enumerated up front from the domain.
pub trait TransitionSystem: Send + Sync {
    type State: Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync;

    fn name(&self) -> &'static str;

    fn domain(&self) -> &Domain;

    /// Name of the initial-state rule, recorded as the first step of a trace.
    fn initial_rule(&self) -> &'static str;

    /// Every valid starting snapshot together with the binding that chose it.
    /// The set can be large, so it is produced lazily.
    fn initial_states(&self) -> InitialStates<'_, Self::State>;

    fn rules(&self) -> &[Rule];

    /// Candidate bindings for `rule`, drawn from the finite domain.
    fn bindings(&self, rule: RuleId) -> &[Binding];

    fn apply(&self, rule: RuleId, state: &Self::State, binding: &Binding) -> Option<Self::State>;

    /// Relabel every address and proposal in `state`.
    fn permute(&self, state: &Self::State, perm: &Permutation) -> Self::State;

    fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rules().iter().position(|r| r.name == name)
    }

    /// All admissible `(step, next)` pairs: the union over every rule of
    /// every binding whose guard holds against `state`.
    fn successors(&self, state: &Self::State) -> Vec<(Step, Self::State)> {
        let mut out = Vec::new();
        for (id, rule) in self.rules().iter().enumerate() {
            for binding in self.bindings(id) {
                if let Some(next) = self.apply(id, state, binding) {
                    out.push((Step::new(rule.name, binding.clone()), next));
                }
            }
        }
        out
    }
}

/// Precomputed candidate bindings for a static rule table.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: &'static [Rule],
    bindings: Vec<Vec<Binding>>,
}

impl RuleTable {
    pub fn new(rules: &'static [Rule], domain: &Domain) -> Self {
        let bindings = rules.iter().map(|r| domain.bindings(r.params)).collect();
        Self { rules, bindings }
    }

    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    pub fn bindings(&self, rule: RuleId) -> &[Binding] {
        self.bindings.get(rule).map(Vec::as_slice).unwrap_or(&[])
    }
}
