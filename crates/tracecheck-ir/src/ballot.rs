//! Delegating ballot contract model.
//!
//! The chairperson enfranchises voters. A voter either votes for a proposal
//! or delegates to another address, in which case its weight follows the
//! delegation chain to the final delegate.

use im::{OrdMap, OrdSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{
    Address, Binding, ConfigurationError, Domain, Param, Permutation, Proposal, Value,
};
use crate::properties::{Invariant, InvariantCatalog, Reordering};
use crate::system::{InitialStates, Rule, RuleId, RuleTable, Step, TransitionSystem};

pub const GIVE_RIGHT_TO_VOTE: RuleId = 0;
pub const DELEGATE: RuleId = 1;
pub const VOTE: RuleId = 2;

const INITIAL_WEIGHT: i64 = 1;

static RULES: [Rule; 3] = [
    Rule {
        name: "giveRightToVote",
        params: &[Param::address("sender"), Param::address("voter")],
    },
    Rule {
        name: "delegate",
        params: &[Param::address("sender"), Param::address("to")],
    },
    Rule {
        name: "vote",
        params: &[Param::address("sender"), Param::proposal("proposal")],
    },
];

/// One immutable ballot snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BallotState {
    pub chairperson: Address,
    pub voted: OrdSet<Address>,
    pub vote: OrdMap<Address, Proposal>,
    pub delegate: OrdMap<Address, Address>,
    pub weight: OrdMap<Address, i64>,
    /// Has an entry for every proposal.
    pub count: OrdMap<Proposal, i64>,
}

impl BallotState {
    pub fn weight_of(&self, a: Address) -> i64 {
        self.weight.get(&a).copied().unwrap_or(0)
    }

    pub fn count_of(&self, p: Proposal) -> i64 {
        self.count.get(&p).copied().unwrap_or(0)
    }

    /// `from` followed by every address reached through `delegate`, or
    /// `None` when the chain loops.
    pub fn delegation_chain(&self, from: Address) -> Option<Vec<Address>> {
        let mut chain = vec![from];
        let mut cursor = from;
        while let Some(&next) = self.delegate.get(&cursor) {
            if chain.contains(&next) {
                return None;
            }
            chain.push(next);
            cursor = next;
        }
        Some(chain)
    }

    pub fn final_delegate(&self, from: Address) -> Option<Address> {
        self.delegation_chain(from)?.last().copied()
    }

    pub fn has_delegation_cycle(&self) -> bool {
        self.delegate
            .keys()
            .any(|a| self.delegation_chain(*a).is_none())
    }

    pub fn total_count(&self) -> i128 {
        self.count.values().map(|v| i128::from(*v)).sum()
    }

    pub fn total_weight(&self) -> i128 {
        self.weight.values().map(|v| i128::from(*v)).sum()
    }
}

fn write_map<K: fmt::Display, V: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    entries: impl Iterator<Item = (K, V)>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in entries.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k}:{v}")?;
    }
    write!(f, "}}")
}

impl fmt::Display for BallotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chairperson={} voted={{", self.chairperson)?;
        for (i, a) in self.voted.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, "}} vote=")?;
        write_map(f, self.vote.iter())?;
        write!(f, " delegate=")?;
        write_map(f, self.delegate.iter())?;
        write!(f, " weight=")?;
        write_map(f, self.weight.iter())?;
        write!(f, " count=")?;
        write_map(f, self.count.iter())
    }
}

/// Which guard the `delegate` rule enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelegationGuard {
    /// Only the chain being formed is checked for the sender.
    #[default]
    AsModeled,
    /// Additionally the final delegate must be enfranchised and the sender
    /// must carry positive weight.
    Strict,
}

impl DelegationGuard {
    pub fn name(&self) -> &'static str {
        match self {
            DelegationGuard::AsModeled => "as-modeled",
            DelegationGuard::Strict => "strict",
        }
    }
}

impl FromStr for DelegationGuard {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "as-modeled" => Ok(DelegationGuard::AsModeled),
            "strict" => Ok(DelegationGuard::Strict),
            other => Err(ConfigurationError::UnknownOption {
                kind: "delegation guard",
                value: other.to_string(),
                expected: "as-modeled, strict",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BallotOptions {
    pub delegation_guard: DelegationGuard,
}

/// The ballot rule set over a configured domain.
#[derive(Debug, Clone)]
pub struct Ballot {
    domain: Domain,
    options: BallotOptions,
    table: RuleTable,
}

impl Ballot {
    pub fn new(domain: Domain, options: BallotOptions) -> Result<Self, ConfigurationError> {
        if domain.addresses().is_empty() {
            return Err(ConfigurationError::DomainTooSmall {
                model: "ballot",
                what: "addresses",
                needed: 1,
                got: 0,
            });
        }
        domain.require_constant("ballot initial count", 0)?;
        domain.require_constant("ballot voting weight", INITIAL_WEIGHT)?;
        let table = RuleTable::new(&RULES, &domain);
        Ok(Self {
            domain,
            options,
            table,
        })
    }

    pub fn fresh_ballot(&self, chairperson: Address) -> BallotState {
        BallotState {
            chairperson,
            voted: OrdSet::new(),
            vote: OrdMap::new(),
            delegate: OrdMap::new(),
            weight: OrdMap::new(),
            count: self.domain.proposals().iter().map(|p| (*p, 0)).collect(),
        }
    }

    pub fn give_right_to_vote(
        &self,
        b: &BallotState,
        sender: Address,
        voter: Address,
    ) -> Option<BallotState> {
        if sender != b.chairperson || b.voted.contains(&voter) || b.weight.contains_key(&voter) {
            return None;
        }
        let mut next = b.clone();
        next.weight.insert(voter, INITIAL_WEIGHT);
        Some(next)
    }

    pub fn delegate(&self, b: &BallotState, sender: Address, to: Address) -> Option<BallotState> {
        if b.voted.contains(&sender) {
            return None;
        }
        let chain = b.delegation_chain(to)?;
        if chain.contains(&sender) {
            return None;
        }
        let target = *chain.last()?;
        let carried = b.weight_of(sender);
        if self.options.delegation_guard == DelegationGuard::Strict
            && (carried <= 0 || !b.weight.contains_key(&target))
        {
            return None;
        }

        let mut next = b.clone();
        match b.vote.get(&target) {
            Some(&proposal) => {
                let total = self.domain.add(b.count_of(proposal), carried).ok()?;
                next.count.insert(proposal, total);
            }
            None => {
                let total = self.domain.add(b.weight_of(target), carried).ok()?;
                next.weight.insert(target, total);
            }
        }
        next.delegate.insert(sender, target);
        next.voted.insert(sender);
        Some(next)
    }

    pub fn vote(
        &self,
        b: &BallotState,
        sender: Address,
        proposal: Proposal,
    ) -> Option<BallotState> {
        let weight = b.weight_of(sender);
        if b.voted.contains(&sender) || weight <= 0 {
            return None;
        }
        let total = self.domain.add(b.count_of(proposal), weight).ok()?;
        let mut next = b.clone();
        next.voted.insert(sender);
        next.vote.insert(sender, proposal);
        next.count.insert(proposal, total);
        Some(next)
    }
}

impl TransitionSystem for Ballot {
    type State = BallotState;

    fn name(&self) -> &'static str {
        "ballot"
    }

    fn domain(&self) -> &Domain {
        &self.domain
    }

    fn initial_rule(&self) -> &'static str {
        "freshBallot"
    }

    fn initial_states(&self) -> InitialStates<'_, BallotState> {
        Box::new(self.domain.addresses().iter().map(move |&chair| {
            (
                Binding::new().with("chairperson", Value::Address(chair)),
                self.fresh_ballot(chair),
            )
        }))
    }

    fn rules(&self) -> &[Rule] {
        self.table.rules()
    }

    fn bindings(&self, rule: RuleId) -> &[Binding] {
        self.table.bindings(rule)
    }

    fn apply(&self, rule: RuleId, state: &BallotState, binding: &Binding) -> Option<BallotState> {
        let sender = binding.address("sender")?;
        match rule {
            GIVE_RIGHT_TO_VOTE => self.give_right_to_vote(state, sender, binding.address("voter")?),
            DELEGATE => self.delegate(state, sender, binding.address("to")?),
            VOTE => self.vote(state, sender, binding.proposal("proposal")?),
            _ => None,
        }
    }

    fn permute(&self, state: &BallotState, perm: &Permutation) -> BallotState {
        BallotState {
            chairperson: perm.address(state.chairperson),
            voted: state.voted.iter().map(|a| perm.address(*a)).collect(),
            vote: state
                .vote
                .iter()
                .map(|(a, p)| (perm.address(*a), perm.proposal(*p)))
                .collect(),
            delegate: state
                .delegate
                .iter()
                .map(|(a, b)| (perm.address(*a), perm.address(*b)))
                .collect(),
            weight: state
                .weight
                .iter()
                .map(|(a, w)| (perm.address(*a), *w))
                .collect(),
            count: state
                .count
                .iter()
                .map(|(p, c)| (perm.proposal(*p), *c))
                .collect(),
        }
    }
}

pub fn delegate_step(sender: Address, to: Address) -> Step {
    Step::new(
        "delegate",
        Binding::new()
            .with("sender", Value::Address(sender))
            .with("to", Value::Address(to)),
    )
}

pub fn vote_step(sender: Address, proposal: Proposal) -> Step {
    Step::new(
        "vote",
        Binding::new()
            .with("sender", Value::Address(sender))
            .with("proposal", Value::Proposal(proposal)),
    )
}

/// Delegation by the enfranchised chairperson to an enfranchised `a1`,
/// against `a1` voting, in both orders. Proposals come from the snapshot's
/// `count` keys, which cover the whole domain.
fn delegate_vote_orderings(s: &BallotState) -> Vec<Reordering> {
    let a0 = s.chairperson;
    if !s.weight.contains_key(&a0) || s.voted.contains(&a0) {
        return Vec::new();
    }
    let mut out = Vec::new();
    for &a1 in s.weight.keys() {
        if a1 == a0 || s.voted.contains(&a1) {
            continue;
        }
        for &p in s.count.keys() {
            out.push(Reordering {
                first: vec![delegate_step(a0, a1), vote_step(a1, p)],
                second: vec![vote_step(a1, p), delegate_step(a0, a1)],
            });
        }
    }
    out
}

/// Safety properties of the ballot, in reporting order.
pub fn ballot_invariants() -> InvariantCatalog<BallotState> {
    InvariantCatalog::new("ballot")
        .with(Invariant::state(
            "weightConservation",
            "total votes counted never exceed total weight",
            |s: &BallotState| s.total_count() <= s.total_weight(),
        ))
        .with(Invariant::state(
            "noDoubleRole",
            "no address both votes and delegates",
            |s: &BallotState| s.vote.keys().all(|a| !s.delegate.contains_key(a)),
        ))
        .with(Invariant::state(
            "noLoopingDelegation",
            "no address is reachable from itself through delegate",
            |s: &BallotState| !s.has_delegation_cycle(),
        ))
        .with(Invariant::state(
            "votersAreMarked",
            "every address that voted or delegated is in voted",
            |s: &BallotState| {
                s.vote
                    .keys()
                    .chain(s.delegate.keys())
                    .all(|a| s.voted.contains(a))
            },
        ))
        .with(Invariant::cross_trace(
            "delegateVoteOrder",
            "delegate-then-vote and vote-then-delegate produce the same count",
            delegate_vote_orderings,
            |x: &BallotState, y: &BallotState| x.count == y.count,
        ))
}
