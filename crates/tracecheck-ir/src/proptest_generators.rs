//! Proptest strategies for small domains and random admissible walks.

use proptest::prelude::*;
use proptest::sample::Index;

use crate::domain::DomainConfig;
use crate::system::{Step, TransitionSystem};
use crate::trace::Trace;

/// Domains small enough to enumerate exhaustively in a test.
///
/// Generated configurations have 1–3 addresses, 0–2 proposals, a range that
/// always contains 0 and 1, and traces of 1–5 snapshots.
pub fn arb_domain_config() -> impl Strategy<Value = DomainConfig> {
    (1..=3i64, 0..=2i64, -2..=0i64, 1..=4i64, 1..=5i64).prop_map(
        |(address_count, proposal_count, int_min, int_max, max_trace_length)| DomainConfig {
            address_count,
            proposal_count,
            int_min,
            int_max,
            max_trace_length,
        },
    )
}

/// Choices for [`walk`]: one index for the initial state, then one per step.
pub fn arb_choices(max_len: usize) -> impl Strategy<Value = Vec<Index>> {
    proptest::collection::vec(any::<Index>(), 1..=max_len.max(1))
}

/// Follow `choices` through the model, picking among admissible successors
/// at every snapshot. Stops early when the walk gets stuck or reaches the
/// length bound. Returns `None` only when the model has no initial state.
pub fn walk<M: TransitionSystem>(model: &M, choices: &[Index]) -> Option<Trace<M::State>> {
    let (first, rest) = choices.split_first()?;
    let count = model.initial_states().count();
    if count == 0 {
        return None;
    }
    let (binding, state) = model.initial_states().nth(first.index(count))?;
    let mut trace = Trace::start(Step::new(model.initial_rule(), binding), state);
    for choice in rest {
        if trace.len() >= model.domain().max_trace_length() {
            break;
        }
        let mut next = model.successors(trace.last());
        if next.is_empty() {
            break;
        }
        let (step, state) = next.swap_remove(choice.index(next.len()));
        trace = trace.extend(step, state);
    }
    Some(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::{auction_invariants, Auction, AuctionOptions};
    use crate::ballot::{ballot_invariants, Ballot, BallotOptions, DelegationGuard};
    use crate::properties::{InvariantCatalog, InvariantKind};

    fn holds_along<S>(catalog: &InvariantCatalog<S>, trace: &Trace<S>) -> Result<(), String> {
        let snapshots = trace.snapshots();
        for invariant in catalog.iter() {
            let ok = match &invariant.kind {
                InvariantKind::State(p) => snapshots.iter().all(|s| p(s.as_ref())),
                InvariantKind::Baseline(p) => snapshots
                    .iter()
                    .all(|s| p(snapshots[0].as_ref(), s.as_ref())),
                InvariantKind::Step(p) => snapshots
                    .windows(2)
                    .all(|w| p(w[0].as_ref(), w[1].as_ref())),
                InvariantKind::CrossTrace { .. } => true,
            };
            if !ok {
                return Err(invariant.name.clone());
            }
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn auction_walks_preserve_the_catalog(
            config in arb_domain_config(),
            choices in arb_choices(6),
        ) {
            let model = Auction::new(config.build().unwrap(), AuctionOptions::default()).unwrap();
            let trace = walk(&model, &choices).unwrap();
            prop_assert!(trace.len() <= model.domain().max_trace_length());
            prop_assert_eq!(holds_along(&auction_invariants(), &trace), Ok(()));
        }

        #[test]
        fn ballot_walks_preserve_the_catalog(
            config in arb_domain_config(),
            choices in arb_choices(6),
            strict in any::<bool>(),
        ) {
            let guard = if strict { DelegationGuard::Strict } else { DelegationGuard::AsModeled };
            let options = BallotOptions { delegation_guard: guard };
            let model = Ballot::new(config.build().unwrap(), options).unwrap();
            let trace = walk(&model, &choices).unwrap();
            prop_assert_eq!(holds_along(&ballot_invariants(), &trace), Ok(()));
        }

        #[test]
        fn walks_only_take_admissible_steps(
            config in arb_domain_config(),
            choices in arb_choices(6),
        ) {
            let model = Auction::new(config.build().unwrap(), AuctionOptions::default()).unwrap();
            let trace = walk(&model, &choices).unwrap();
            let snapshots = trace.snapshots();
            for (i, step) in trace.steps().iter().enumerate().skip(1) {
                let id = model.rule_id(step.rule).unwrap();
                let next = model.apply(id, &snapshots[i - 1], &step.binding);
                prop_assert_eq!(next.as_ref(), Some(snapshots[i].as_ref()));
            }
        }
    }
}
