//! Append-only execution traces with structurally shared prefixes.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::domain::Binding;
use crate::system::Step;

struct Node<S> {
    parent: Option<Arc<Node<S>>>,
    root: Arc<S>,
    step: Step,
    state: Arc<S>,
    len: usize,
}

/// An ordered sequence of snapshots linked by recorded steps.
///
/// The first step is the initial-state rule. Extending a trace allocates one
/// node pointing at its parent; the parent is never mutated, so any number of
/// search branches can hold the same prefix.
pub struct Trace<S> {
    head: Arc<Node<S>>,
}

impl<S> Clone for Trace<S> {
    fn clone(&self) -> Self {
        Self {
            head: Arc::clone(&self.head),
        }
    }
}

#[allow(clippy::len_without_is_empty)]
impl<S> Trace<S> {
    pub fn start(initial: Step, state: S) -> Self {
        let state = Arc::new(state);
        Self {
            head: Arc::new(Node {
                parent: None,
                root: Arc::clone(&state),
                step: initial,
                state,
                len: 1,
            }),
        }
    }

    pub fn extend(&self, step: Step, state: S) -> Self {
        Self {
            head: Arc::new(Node {
                parent: Some(Arc::clone(&self.head)),
                root: Arc::clone(&self.head.root),
                step,
                state: Arc::new(state),
                len: self.head.len + 1,
            }),
        }
    }

    /// Number of snapshots, initial included. Never zero.
    pub fn len(&self) -> usize {
        self.head.len
    }

    /// Step index of the last snapshot.
    pub fn last_index(&self) -> usize {
        self.head.len - 1
    }

    pub fn first(&self) -> &S {
        &self.head.root
    }

    pub fn last(&self) -> &S {
        &self.head.state
    }

    /// The step that produced the last snapshot.
    pub fn last_step(&self) -> &Step {
        &self.head.step
    }

    pub fn parent(&self) -> Option<Trace<S>> {
        self.head.parent.as_ref().map(|head| Trace {
            head: Arc::clone(head),
        })
    }

    /// Snapshot before the last one, if any.
    pub fn previous(&self) -> Option<&S> {
        self.head.parent.as_deref().map(|node| node.state.as_ref())
    }

    /// True when `other` is a prefix of (or equal to) `self`, by identity.
    pub fn extends(&self, other: &Trace<S>) -> bool {
        let mut cursor = Some(&self.head);
        while let Some(node) = cursor {
            if node.len < other.head.len {
                return false;
            }
            if Arc::ptr_eq(node, &other.head) {
                return true;
            }
            cursor = node.parent.as_ref();
        }
        false
    }

    fn nodes(&self) -> Vec<&Node<S>> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = Some(self.head.as_ref());
        while let Some(node) = cursor {
            out.push(node);
            cursor = node.parent.as_deref();
        }
        out.reverse();
        out
    }

    pub fn steps(&self) -> Vec<Step> {
        self.nodes().into_iter().map(|n| n.step.clone()).collect()
    }

    pub fn snapshots(&self) -> Vec<Arc<S>> {
        self.nodes()
            .into_iter()
            .map(|n| Arc::clone(&n.state))
            .collect()
    }
}

impl<S: Clone> Trace<S> {
    /// Materialize as `(index, rule, binding, snapshot)` entries.
    pub fn entries(&self) -> Vec<TraceEntry<S>> {
        self.nodes()
            .into_iter()
            .enumerate()
            .map(|(index, n)| TraceEntry {
                index,
                rule: n.step.rule,
                binding: n.step.binding.clone(),
                state: n.state.as_ref().clone(),
            })
            .collect()
    }
}

impl<S: fmt::Debug> fmt::Debug for Trace<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes().into_iter().map(|n| (&n.step, &n.state)))
            .finish()
    }
}

impl<S: fmt::Display> fmt::Display for Trace<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, node) in self.nodes().into_iter().enumerate() {
            writeln!(f, "  [{index}] {}", node.step)?;
            writeln!(f, "      {}", node.state)?;
        }
        Ok(())
    }
}

/// One reported trace element, sufficient for deterministic replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry<S> {
    pub index: usize,
    pub rule: &'static str,
    pub binding: Binding,
    pub state: S,
}

impl<S> TraceEntry<S> {
    pub fn step(&self) -> Step {
        Step::new(self.rule, self.binding.clone())
    }
}

/// Render entries the way [`Trace`] displays itself.
pub fn format_entries<S: fmt::Display>(entries: &[TraceEntry<S>]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "  [{}] {}({})\n      {}\n",
            entry.index, entry.rule, entry.binding, entry.state
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Binding, Value};

    fn step(name: &'static str, v: i64) -> Step {
        Step::new(name, Binding::new().with("v", Value::Int(v)))
    }

    #[test]
    fn extend_shares_the_parent_prefix() {
        let root = Trace::start(step("init", 0), 10u32);
        let a = root.extend(step("inc", 1), 11);
        let b = root.extend(step("inc", 2), 12);

        assert_eq!(root.len(), 1);
        assert_eq!(a.len(), 2);
        assert_eq!(*a.first(), 10);
        assert_eq!(*b.last(), 12);
        assert_eq!(a.previous(), Some(&10));
        assert!(a.extends(&root));
        assert!(b.extends(&root));
        assert!(!a.extends(&b));
    }

    #[test]
    fn entries_are_in_trace_order() {
        let t = Trace::start(step("init", 0), 'a')
            .extend(step("next", 1), 'b')
            .extend(step("next", 2), 'c');
        let entries = t.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].rule, "init");
        assert_eq!(entries[2].index, 2);
        assert_eq!(entries[2].state, 'c');
        assert_eq!(entries[1].binding.int("v"), Some(1));
        assert_eq!(t.last_index(), 2);
        assert_eq!(t.steps()[2], step("next", 2));
    }

    #[test]
    fn parent_drops_the_last_snapshot() {
        let t = Trace::start(step("init", 0), 1).extend(step("next", 1), 2);
        let p = t.parent().unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(*p.last(), 1);
        assert!(p.parent().is_none());
    }
}
