//! Bounded trace generation.
//!
//! The explorer walks every trace of a [`TransitionSystem`] up to the
//! domain's `max_trace_length`, using an explicit stack of persistent
//! [`Trace`] values. Each newly visited prefix is handed to a
//! [`TraceVisitor`], which may prune the branch or stop the whole search.
//!
//! Under [`SearchStrategy::IterativeDeepening`] the search runs one round per
//! length cap `1..=max`; round `k` only visits traces of length exactly `k`,
//! so every prefix is visited once and visits arrive in non-decreasing
//! length order. A visitor's `Prune` therefore only affects the current
//! round. [`SearchStrategy::DepthFirst`] runs a single round that visits
//! prefixes of every length in depth-first order.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use tracecheck_ir::domain::{ConfigurationError, Permutation};
use tracecheck_ir::system::{Step, TransitionSystem};
use tracecheck_ir::trace::Trace;

use crate::control::{deadline_from_timeout_secs, Halt, SearchControl};
use crate::error::CheckError;

/// Seeds handed to each worker when a round is split for parallel search.
const SEEDS_PER_THREAD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    #[default]
    IterativeDeepening,
    DepthFirst,
}

impl SearchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            SearchStrategy::IterativeDeepening => "iterative-deepening",
            SearchStrategy::DepthFirst => "depth-first",
        }
    }
}

impl FromStr for SearchStrategy {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "iterative-deepening" | "id" => Ok(SearchStrategy::IterativeDeepening),
            "depth-first" | "dfs" => Ok(SearchStrategy::DepthFirst),
            other => Err(ConfigurationError::UnknownOption {
                kind: "search strategy",
                value: other.to_string(),
                expected: "iterative-deepening, depth-first",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub strategy: SearchStrategy,
    /// Worker threads: 1 runs on the calling thread, 0 uses every core.
    pub parallelism: usize,
    /// Wall-clock budget in seconds (0 disables).
    pub timeout_secs: u64,
    /// Search step budget (0 disables).
    pub max_steps: u64,
    /// Skip snapshots already expanded from the same initial snapshot at a
    /// shorter or equal length.
    pub prune_revisits: bool,
    /// Identify snapshots that differ only by a relabelling of addresses and
    /// proposals. Implies `prune_revisits`.
    pub symmetry: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::default(),
            parallelism: 1,
            timeout_secs: 0,
            max_steps: 0,
            prune_revisits: false,
            symmetry: false,
            cancel: None,
        }
    }
}

impl ExploreOptions {
    pub fn prunes_revisits(&self) -> bool {
        self.prune_revisits || self.symmetry
    }

    pub fn control(&self) -> SearchControl {
        SearchControl::new(
            self.max_steps,
            deadline_from_timeout_secs(self.timeout_secs),
            self.cancel.clone(),
        )
    }
}

/// What the explorer should do after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Do not extend this trace.
    Prune,
    /// End the whole search.
    Stop,
}

/// Why a trace cannot be extended further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEnd {
    LengthBound,
    /// No action is admissible at the last snapshot.
    Stuck,
}

/// Receives traces from the explorer. Called concurrently when the search
/// runs in parallel.
pub trait TraceVisitor<S>: Sync {
    fn visit(&self, trace: &Trace<S>) -> Flow;

    fn completed(&self, _trace: &Trace<S>, _end: TraceEnd) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExploreStats {
    pub snapshots: u64,
    pub completed: u64,
    pub stuck: u64,
    pub rounds: usize,
    pub revisits_pruned: u64,
    pub deepest: usize,
}

#[derive(Debug, Default)]
struct Counters {
    snapshots: AtomicU64,
    completed: AtomicU64,
    stuck: AtomicU64,
    revisits_pruned: AtomicU64,
    deepest: AtomicUsize,
}

impl Counters {
    fn stats(&self, rounds: usize) -> ExploreStats {
        ExploreStats {
            snapshots: self.snapshots.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            stuck: self.stuck.load(Ordering::Relaxed),
            rounds,
            revisits_pruned: self.revisits_pruned.load(Ordering::Relaxed),
            deepest: self.deepest.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreStatus {
    /// Every trace within the bound was generated.
    Exhausted,
    /// A visitor stopped the search.
    Stopped,
    /// A budget or cancellation ended the search.
    Halted(Halt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExploreOutcome {
    pub status: ExploreStatus,
    pub stats: ExploreStats,
}

type VisitedTable<S> = DashMap<(S, S), usize>;

type Roots<'a, S> = Box<dyn Iterator<Item = Trace<S>> + Send + 'a>;

pub struct Explorer<'m, M: TransitionSystem> {
    model: &'m M,
    options: ExploreOptions,
    permutations: Vec<Permutation>,
}

impl<'m, M: TransitionSystem> Explorer<'m, M> {
    pub fn new(model: &'m M, options: ExploreOptions) -> Self {
        let permutations = if options.symmetry {
            model.domain().permutations()
        } else {
            Vec::new()
        };
        Self {
            model,
            options,
            permutations,
        }
    }

    pub fn run<V: TraceVisitor<M::State>>(
        &self,
        visitor: &V,
    ) -> Result<ExploreOutcome, CheckError> {
        self.run_with(visitor, &self.options.control())
    }

    pub fn run_with<V: TraceVisitor<M::State>>(
        &self,
        visitor: &V,
        control: &SearchControl,
    ) -> Result<ExploreOutcome, CheckError> {
        let pool = match self.options.parallelism {
            1 => None,
            threads => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| CheckError::ThreadPool(e.to_string()))?;
                debug!(threads = pool.current_num_threads(), "explorer thread pool ready");
                Some(pool)
            }
        };

        let max = self.model.domain().max_trace_length();
        let rounds: Vec<(usize, usize)> = match self.options.strategy {
            SearchStrategy::IterativeDeepening => (1..=max).map(|cap| (cap, cap)).collect(),
            SearchStrategy::DepthFirst => vec![(max, 1)],
        };

        let counters = Counters::default();
        let mut rounds_run = 0;
        for (cap, visit_from) in rounds {
            rounds_run += 1;
            let visited = self.options.prunes_revisits().then(DashMap::new);
            let round = Round {
                model: self.model,
                visitor,
                control,
                counters: &counters,
                visited: visited.as_ref(),
                permutations: &self.permutations,
                cap,
                visit_from,
                max,
            };
            debug!(cap, model = self.model.name(), "exploration round");
            let roots = self.initial_traces(control, &counters);
            match &pool {
                None => round.sequential(roots),
                Some(pool) => round.parallel(pool, roots),
            }
            // No trace reached this cap, so no longer one exists.
            if control.is_stopped() || counters.deepest.load(Ordering::Relaxed) < cap {
                break;
            }
        }

        let status = match control.halted() {
            None => ExploreStatus::Exhausted,
            Some(Halt::Stopped) => ExploreStatus::Stopped,
            Some(halt) => {
                warn!(
                    model = self.model.name(),
                    steps = control.steps(),
                    "exploration halted: {halt}"
                );
                ExploreStatus::Halted(halt)
            }
        };
        Ok(ExploreOutcome {
            status,
            stats: counters.stats(rounds_run),
        })
    }

    /// Root traces, generated one at a time and only until the search stops.
    fn initial_traces<'a>(
        &'a self,
        control: &'a SearchControl,
        counters: &'a Counters,
    ) -> Roots<'a, M::State> {
        let rule = self.model.initial_rule();
        Box::new(
            self.model
                .initial_states()
                .take_while(move |_| !control.is_stopped())
                .map(move |(binding, state)| {
                    counters.snapshots.fetch_add(1, Ordering::Relaxed);
                    Trace::start(Step::new(rule, binding), state)
                }),
        )
    }

    /// Lazily yield every completed trace in depth-first order, on the
    /// calling thread and without budgets.
    pub fn traces(&self) -> Traces<'m, M> {
        let rule = self.model.initial_rule();
        let roots = self
            .model
            .initial_states()
            .map(move |(binding, state)| Trace::start(Step::new(rule, binding), state));
        Traces {
            model: self.model,
            max: self.model.domain().max_trace_length(),
            roots: Box::new(roots),
            stack: Vec::new(),
        }
    }
}

/// One depth-capped pass over the search tree.
struct Round<'a, M: TransitionSystem, V> {
    model: &'a M,
    visitor: &'a V,
    control: &'a SearchControl,
    counters: &'a Counters,
    visited: Option<&'a VisitedTable<M::State>>,
    permutations: &'a [Permutation],
    cap: usize,
    visit_from: usize,
    max: usize,
}

impl<M, V> Round<'_, M, V>
where
    M: TransitionSystem,
    V: TraceVisitor<M::State>,
{
    fn sequential(&self, roots: Roots<'_, M::State>) {
        let mut stack = Vec::new();
        for root in roots {
            stack.push(root);
            if !self.drain(&mut stack) {
                return;
            }
        }
    }

    /// Expand breadth-first until every worker can get several seeds, then
    /// search each seed depth-first on the pool. Roots beyond the seeds are
    /// bridged onto the pool as they are generated.
    fn parallel(&self, pool: &ThreadPool, mut roots: Roots<'_, M::State>) {
        let want = pool.current_num_threads().max(1) * SEEDS_PER_THREAD;
        let mut frontier: VecDeque<_> = roots.by_ref().take(want).collect();
        let mut children = Vec::new();
        while frontier.len() < want {
            let Some(trace) = frontier.pop_front() else {
                return;
            };
            if !self.step(trace, &mut children) {
                return;
            }
            frontier.extend(children.drain(..).rev());
        }
        let seeds: Vec<_> = frontier.into();
        pool.install(|| {
            seeds.into_par_iter().for_each(|seed| {
                self.drain(&mut vec![seed]);
            });
            roots.par_bridge().for_each(|root| {
                self.drain(&mut vec![root]);
            });
        });
    }

    /// Search `stack` to exhaustion. False once the search must end.
    fn drain(&self, stack: &mut Vec<Trace<M::State>>) -> bool {
        while let Some(trace) = stack.pop() {
            if !self.step(trace, stack) {
                return false;
            }
        }
        true
    }

    /// Visit `trace` and push its extensions so the first successor is
    /// popped first. Returns `false` once the search must end.
    fn step(&self, trace: Trace<M::State>, out: &mut Vec<Trace<M::State>>) -> bool {
        if !self.control.tick() {
            return false;
        }
        let len = trace.len();
        self.counters.deepest.fetch_max(len, Ordering::Relaxed);

        if len >= self.visit_from {
            match self.visitor.visit(&trace) {
                Flow::Continue => {}
                Flow::Prune => return true,
                Flow::Stop => {
                    self.control.request_stop();
                    return false;
                }
            }
        }

        if len >= self.cap {
            if self.cap == self.max {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.visitor.completed(&trace, TraceEnd::LengthBound);
            }
            return true;
        }

        if !self.admit(&trace) {
            self.counters
                .revisits_pruned
                .fetch_add(1, Ordering::Relaxed);
            return true;
        }

        let successors = self.model.successors(trace.last());
        if successors.is_empty() {
            // Reported in the round that visited the trace's last snapshot.
            if len + 1 >= self.visit_from {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.counters.stuck.fetch_add(1, Ordering::Relaxed);
                self.visitor.completed(&trace, TraceEnd::Stuck);
            }
            return true;
        }

        self.counters
            .snapshots
            .fetch_add(successors.len() as u64, Ordering::Relaxed);
        let base = out.len();
        out.extend(
            successors
                .into_iter()
                .map(|(step, state)| trace.extend(step, state)),
        );
        out[base..].reverse();
        true
    }

    /// Record the trace's `(initial, current)` pair. False when the pair was
    /// already expanded at a length no greater than this one.
    fn admit(&self, trace: &Trace<M::State>) -> bool {
        let Some(visited) = self.visited else {
            return true;
        };
        let len = trace.len();
        match visited.entry(self.key(trace.first(), trace.last())) {
            Entry::Occupied(mut seen) => {
                if *seen.get() <= len {
                    false
                } else {
                    seen.insert(len);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(len);
                true
            }
        }
    }

    /// Least image of the pair under every permutation (identity when
    /// symmetry is off).
    fn key(&self, root: &M::State, state: &M::State) -> (M::State, M::State) {
        let identity = (root.clone(), state.clone());
        self.permutations
            .iter()
            .skip(1)
            .map(|perm| (self.model.permute(root, perm), self.model.permute(state, perm)))
            .fold(identity, |best, image| if image < best { image } else { best })
    }
}

/// Iterator over completed traces. See [`Explorer::traces`].
pub struct Traces<'m, M: TransitionSystem> {
    model: &'m M,
    max: usize,
    roots: Roots<'m, M::State>,
    stack: Vec<Trace<M::State>>,
}

impl<M: TransitionSystem> Iterator for Traces<'_, M> {
    type Item = (Trace<M::State>, TraceEnd);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let trace = match self.stack.pop() {
                Some(trace) => trace,
                None => self.roots.next()?,
            };
            if trace.len() >= self.max {
                return Some((trace, TraceEnd::LengthBound));
            }
            let successors = self.model.successors(trace.last());
            if successors.is_empty() {
                return Some((trace, TraceEnd::Stuck));
            }
            let base = self.stack.len();
            self.stack.extend(
                successors
                    .into_iter()
                    .map(|(step, state)| trace.extend(step, state)),
            );
            self.stack[base..].reverse();
        }
    }
}
