use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::system::Step;

pub type StatePredicate<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;
/// Predicate over `(earlier, later)` snapshots of one trace.
pub type PairPredicate<S> = Arc<dyn Fn(&S, &S) -> bool + Send + Sync>;
pub type ReorderingSource<S> = Arc<dyn Fn(&S) -> Vec<Reordering> + Send + Sync>;

/// Two step sequences expected to lead from the same snapshot to agreeing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reordering {
    pub first: Vec<Step>,
    pub second: Vec<Step>,
}

impl Reordering {
    pub fn longest(&self) -> usize {
        self.first.len().max(self.second.len())
    }
}

/// How an invariant is evaluated against generated traces.
pub enum InvariantKind<S> {
    /// Must hold at every snapshot.
    State(StatePredicate<S>),
    /// Must hold for `(first snapshot, every snapshot)` of a trace.
    Baseline(PairPredicate<S>),
    /// Must hold for every consecutive `(previous, next)` pair.
    Step(PairPredicate<S>),
    /// At every snapshot, both orderings of each reordering that are
    /// admissible must end in snapshots that `agree`.
    CrossTrace {
        reorderings: ReorderingSource<S>,
        agree: PairPredicate<S>,
    },
}

impl<S> Clone for InvariantKind<S> {
    fn clone(&self) -> Self {
        match self {
            InvariantKind::State(f) => InvariantKind::State(Arc::clone(f)),
            InvariantKind::Baseline(f) => InvariantKind::Baseline(Arc::clone(f)),
            InvariantKind::Step(f) => InvariantKind::Step(Arc::clone(f)),
            InvariantKind::CrossTrace { reorderings, agree } => InvariantKind::CrossTrace {
                reorderings: Arc::clone(reorderings),
                agree: Arc::clone(agree),
            },
        }
    }
}

/// Shape tag for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantShape {
    State,
    Baseline,
    Step,
    CrossTrace,
}

impl fmt::Display for InvariantShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvariantShape::State => "state",
            InvariantShape::Baseline => "baseline",
            InvariantShape::Step => "step",
            InvariantShape::CrossTrace => "cross-trace",
        };
        f.write_str(name)
    }
}

/// A named assertion over every reachable snapshot or trace within the bound.
pub struct Invariant<S> {
    pub name: String,
    pub description: String,
    pub kind: InvariantKind<S>,
}

impl<S> Clone for Invariant<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl<S> fmt::Debug for Invariant<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invariant")
            .field("name", &self.name)
            .field("shape", &self.shape())
            .finish()
    }
}

impl<S> Invariant<S> {
    pub fn state(
        name: &str,
        description: &str,
        check: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_kind(name, description, InvariantKind::State(Arc::new(check)))
    }

    pub fn baseline(
        name: &str,
        description: &str,
        check: impl Fn(&S, &S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_kind(name, description, InvariantKind::Baseline(Arc::new(check)))
    }

    pub fn step(
        name: &str,
        description: &str,
        check: impl Fn(&S, &S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_kind(name, description, InvariantKind::Step(Arc::new(check)))
    }

    pub fn cross_trace(
        name: &str,
        description: &str,
        reorderings: impl Fn(&S) -> Vec<Reordering> + Send + Sync + 'static,
        agree: impl Fn(&S, &S) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_kind(
            name,
            description,
            InvariantKind::CrossTrace {
                reorderings: Arc::new(reorderings),
                agree: Arc::new(agree),
            },
        )
    }

    fn with_kind(name: &str, description: &str, kind: InvariantKind<S>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
        }
    }

    pub fn shape(&self) -> InvariantShape {
        match self.kind {
            InvariantKind::State(_) => InvariantShape::State,
            InvariantKind::Baseline(_) => InvariantShape::Baseline,
            InvariantKind::Step(_) => InvariantShape::Step,
            InvariantKind::CrossTrace { .. } => InvariantShape::CrossTrace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown invariant '{name}' for model {model} (available: {available})")]
pub struct UnknownInvariant {
    pub name: String,
    pub model: &'static str,
    pub available: String,
}

/// Named invariants of one model, in declaration order.
pub struct InvariantCatalog<S> {
    model: &'static str,
    entries: IndexMap<String, Invariant<S>>,
}

impl<S> InvariantCatalog<S> {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            entries: IndexMap::new(),
        }
    }

    pub fn with(mut self, invariant: Invariant<S>) -> Self {
        self.entries.insert(invariant.name.clone(), invariant);
        self
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn get(&self, name: &str) -> Option<&Invariant<S>> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Invariant<S>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The named invariants, or the whole catalog when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<Invariant<S>>, UnknownInvariant> {
        if names.is_empty() {
            return Ok(self.iter().cloned().collect());
        }
        names
            .iter()
            .map(|name| {
                self.get(name).cloned().ok_or_else(|| UnknownInvariant {
                    name: name.clone(),
                    model: self.model,
                    available: self.names().join(", "),
                })
            })
            .collect()
    }
}
