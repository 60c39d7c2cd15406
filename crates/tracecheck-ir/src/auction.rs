//! Open auction contract model.
//!
//! Bidders escrow their bid; an outbid bidder's funds move to
//! `pending_returns` until withdrawn. After the deadline the auction can be
//! ended once, paying the highest bid to the beneficiary.

use im::OrdMap;
use serde::Serialize;
use std::fmt;

use crate::domain::{Address, Binding, ConfigurationError, Domain, Param, Permutation, Value};
use crate::properties::{Invariant, InvariantCatalog};
use crate::system::{InitialStates, Rule, RuleId, RuleTable, TransitionSystem};

pub const TICK: RuleId = 0;
pub const BID: RuleId = 1;
pub const WITHDRAW: RuleId = 2;
pub const AUCTION_END: RuleId = 3;

static RULES: [Rule; 4] = [
    Rule {
        name: "tick",
        params: &[],
    },
    Rule {
        name: "bid",
        params: &[Param::address("sender"), Param::int("value")],
    },
    Rule {
        name: "withdraw",
        params: &[Param::address("sender")],
    },
    Rule {
        name: "auctionEnd",
        params: &[],
    },
];

/// One immutable auction snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AuctionState {
    pub beneficiary: Address,
    /// Deadline step index: bids are accepted strictly before it.
    pub auction_end: usize,
    pub highest_bidder: Option<Address>,
    pub highest_bid: Option<i64>,
    /// Zero entries are never stored.
    pub pending_returns: OrdMap<Address, i64>,
    pub now: usize,
    pub ended: bool,
    /// Has an entry for every address.
    pub account: OrdMap<Address, i64>,
}

impl AuctionState {
    pub fn pending(&self, a: Address) -> i64 {
        self.pending_returns.get(&a).copied().unwrap_or(0)
    }

    pub fn balance(&self, a: Address) -> i64 {
        self.account.get(&a).copied().unwrap_or(0)
    }

    pub fn total_funds(&self) -> i128 {
        self.account.values().map(|v| i128::from(*v)).sum()
    }

    fn with_pending(mut self, a: Address, amount: i64) -> Self {
        if amount == 0 {
            self.pending_returns.remove(&a);
        } else {
            self.pending_returns.insert(a, amount);
        }
        self
    }
}

impl fmt::Display for AuctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "beneficiary={} end={} now={} ended={} highest=",
            self.beneficiary, self.auction_end, self.now, self.ended
        )?;
        match (self.highest_bidder, self.highest_bid) {
            (Some(bidder), Some(bid)) => write!(f, "{bidder}:{bid}")?,
            _ => write!(f, "-")?,
        }
        write!(f, " account=")?;
        write_amounts(f, &self.account)?;
        write!(f, " pending=")?;
        write_amounts(f, &self.pending_returns)
    }
}

fn write_amounts(f: &mut fmt::Formatter<'_>, map: &OrdMap<Address, i64>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (a, v)) in map.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{a}:{v}")?;
    }
    write!(f, "}}")
}

/// Odometer over balance assignments, the last address turning fastest.
#[derive(Debug, Clone)]
pub struct Accounts {
    addresses: Vec<Address>,
    choices: Vec<i64>,
    /// `None` once every assignment has been produced.
    digits: Option<Vec<usize>>,
}

impl Accounts {
    fn new(addresses: Vec<Address>, choices: Vec<i64>) -> Self {
        let digits = (!choices.is_empty()).then(|| vec![0; addresses.len()]);
        Self {
            addresses,
            choices,
            digits,
        }
    }
}

impl Iterator for Accounts {
    type Item = OrdMap<Address, i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let digits = self.digits.as_mut()?;
        let account = self
            .addresses
            .iter()
            .zip(digits.iter())
            .map(|(&a, &d)| (a, self.choices[d]))
            .collect();
        let mut exhausted = true;
        for d in digits.iter_mut().rev() {
            *d += 1;
            if *d < self.choices.len() {
                exhausted = false;
                break;
            }
            *d = 0;
        }
        if exhausted {
            self.digits = None;
        }
        Some(account)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuctionOptions {
    /// Start every account at this balance instead of every in-range choice.
    pub fixed_balance: Option<i64>,
}

/// The auction rule set over a configured domain.
#[derive(Debug, Clone)]
pub struct Auction {
    domain: Domain,
    options: AuctionOptions,
    table: RuleTable,
}

impl Auction {
    pub fn new(domain: Domain, options: AuctionOptions) -> Result<Self, ConfigurationError> {
        if domain.addresses().is_empty() {
            return Err(ConfigurationError::DomainTooSmall {
                model: "auction",
                what: "addresses",
                needed: 1,
                got: 0,
            });
        }
        domain.require_constant("auction default balance", 0)?;
        if let Some(balance) = options.fixed_balance {
            domain.require_constant("auction fixed balance", balance)?;
            if balance < 0 {
                return Err(ConfigurationError::ConstantOutOfRange {
                    context: "auction fixed balance (must be non-negative)",
                    value: balance,
                    min: 0,
                    max: domain.int_max(),
                });
            }
        }
        let table = RuleTable::new(&RULES, &domain);
        Ok(Self {
            domain,
            options,
            table,
        })
    }

    fn balance_choices(&self) -> Vec<i64> {
        match self.options.fixed_balance {
            Some(balance) => vec![balance],
            None => self.domain.nonnegative_values().collect(),
        }
    }

    /// Every total assignment of a balance choice to each address.
    pub fn accounts(&self) -> Accounts {
        Accounts::new(self.domain.addresses().to_vec(), self.balance_choices())
    }

    /// `newAuction(beneficiary)` with a chosen deadline and balances.
    pub fn new_auction(
        &self,
        beneficiary: Address,
        auction_end: usize,
        account: OrdMap<Address, i64>,
    ) -> AuctionState {
        AuctionState {
            beneficiary,
            auction_end,
            highest_bidder: None,
            highest_bid: None,
            pending_returns: OrdMap::new(),
            now: 0,
            ended: false,
            account,
        }
    }

    pub fn tick(&self, a: &AuctionState) -> Option<AuctionState> {
        if a.now + 1 >= self.domain.max_trace_length() {
            return None;
        }
        let mut next = a.clone();
        next.now += 1;
        Some(next)
    }

    pub fn bid(&self, a: &AuctionState, sender: Address, value: i64) -> Option<AuctionState> {
        if a.balance(sender) < value || a.now >= a.auction_end {
            return None;
        }
        if value <= a.highest_bid.unwrap_or(0) {
            return None;
        }
        let mut next = a.clone();
        if let (Some(prev_bidder), Some(prev_bid)) = (a.highest_bidder, a.highest_bid) {
            let credited = self.domain.add(next.pending(prev_bidder), prev_bid).ok()?;
            next = next.with_pending(prev_bidder, credited);
        }
        let debited = self.domain.sub(next.balance(sender), value).ok()?;
        next.account.insert(sender, debited);
        next.highest_bidder = Some(sender);
        next.highest_bid = Some(value);
        Some(next)
    }

    pub fn withdraw(&self, a: &AuctionState, sender: Address) -> Option<AuctionState> {
        let amount = a.pending(sender);
        if amount <= 0 {
            return None;
        }
        let credited = self.domain.add(a.balance(sender), amount).ok()?;
        let mut next = a.clone().with_pending(sender, 0);
        next.account.insert(sender, credited);
        Some(next)
    }

    pub fn auction_end(&self, a: &AuctionState) -> Option<AuctionState> {
        if a.now < a.auction_end || a.ended {
            return None;
        }
        let bid = a.highest_bid?;
        let credited = self.domain.add(a.balance(a.beneficiary), bid).ok()?;
        let mut next = a.clone();
        next.ended = true;
        next.account.insert(a.beneficiary, credited);
        Some(next)
    }
}

impl TransitionSystem for Auction {
    type State = AuctionState;

    fn name(&self) -> &'static str {
        "auction"
    }

    fn domain(&self) -> &Domain {
        &self.domain
    }

    fn initial_rule(&self) -> &'static str {
        "newAuction"
    }

    fn initial_states(&self) -> InitialStates<'_, AuctionState> {
        let addresses = self.domain.addresses();
        Box::new(addresses.iter().flat_map(move |&beneficiary| {
            self.domain.steps().flat_map(move |auction_end| {
                self.accounts().map(move |account| {
                    let binding = Binding::new()
                        .with("beneficiary", Value::Address(beneficiary))
                        .with("auctionEnd", Value::Int(auction_end as i64));
                    (binding, self.new_auction(beneficiary, auction_end, account))
                })
            })
        }))
    }

    fn rules(&self) -> &[Rule] {
        self.table.rules()
    }

    fn bindings(&self, rule: RuleId) -> &[Binding] {
        self.table.bindings(rule)
    }

    fn apply(&self, rule: RuleId, state: &AuctionState, binding: &Binding) -> Option<AuctionState> {
        match rule {
            TICK => self.tick(state),
            BID => self.bid(state, binding.address("sender")?, binding.int("value")?),
            WITHDRAW => self.withdraw(state, binding.address("sender")?),
            AUCTION_END => self.auction_end(state),
            _ => None,
        }
    }

    fn permute(&self, state: &AuctionState, perm: &Permutation) -> AuctionState {
        let relabel = |m: &OrdMap<Address, i64>| -> OrdMap<Address, i64> {
            m.iter().map(|(a, v)| (perm.address(*a), *v)).collect()
        };
        AuctionState {
            beneficiary: perm.address(state.beneficiary),
            auction_end: state.auction_end,
            highest_bidder: state.highest_bidder.map(|a| perm.address(a)),
            highest_bid: state.highest_bid,
            pending_returns: relabel(&state.pending_returns),
            now: state.now,
            ended: state.ended,
            account: relabel(&state.account),
        }
    }
}

/// Safety properties of the auction, in reporting order.
pub fn auction_invariants() -> InvariantCatalog<AuctionState> {
    InvariantCatalog::new("auction")
        .with(Invariant::baseline(
            "noNewMoney",
            "total account funds never exceed the initial total",
            |initial: &AuctionState, s: &AuctionState| s.total_funds() <= initial.total_funds(),
        ))
        .with(Invariant::baseline(
            "beneficiarySettlement",
            "once ended, the beneficiary gains exactly the winning bid, unless it won",
            |initial: &AuctionState, s: &AuctionState| {
                if !s.ended {
                    return true;
                }
                let b = s.beneficiary;
                let held = i128::from(s.balance(b)) + i128::from(s.pending(b));
                let start = i128::from(initial.balance(b));
                if s.highest_bidder == Some(b) {
                    held == start
                } else {
                    held == start + i128::from(s.highest_bid.unwrap_or(0))
                }
            },
        ))
        .with(Invariant::state(
            "accountsNonNegative",
            "every account balance is >= 0",
            |s: &AuctionState| s.account.values().all(|v| *v >= 0),
        ))
        .with(Invariant::state(
            "bidConsistency",
            "highest_bid is set exactly when highest_bidder is set",
            |s: &AuctionState| s.highest_bid.is_some() == s.highest_bidder.is_some(),
        ))
        .with(Invariant::state(
            "pendingNonNegative",
            "every pending return is >= 0",
            |s: &AuctionState| s.pending_returns.values().all(|v| *v >= 0),
        ))
        .with(Invariant::step(
            "endedIsFinal",
            "ended never reverts to false",
            |prev: &AuctionState, next: &AuctionState| !prev.ended || next.ended,
        ))
        .with(Invariant::state(
            "endedImpliesBid",
            "an ended auction has a highest bid",
            |s: &AuctionState| !s.ended || s.highest_bid.is_some(),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainConfig;

    const A: Address = Address(0);
    const B: Address = Address(1);

    fn auction(int_max: i64, len: i64) -> Auction {
        let domain = DomainConfig {
            address_count: 2,
            proposal_count: 0,
            int_min: 0,
            int_max,
            max_trace_length: len,
        }
        .build()
        .unwrap();
        Auction::new(domain, AuctionOptions::default()).unwrap()
    }

    fn fresh(m: &Auction, end: usize, balance: i64) -> AuctionState {
        m.new_auction(A, end, [(A, balance), (B, balance)].into_iter().collect())
    }

    #[test]
    fn double_bid_then_withdraw_scenario() {
        let m = auction(10, 5);
        let s0 = fresh(&m, 3, 10);

        let s1 = m.bid(&s0, A, 3).unwrap();
        assert_eq!(s1.balance(A), 7);
        assert_eq!(s1.highest_bidder, Some(A));
        assert_eq!(s1.highest_bid, Some(3));

        let s2 = m.bid(&s1, B, 5).unwrap();
        assert_eq!(s2.balance(B), 5);
        assert_eq!(s2.highest_bidder, Some(B));
        assert_eq!(s2.highest_bid, Some(5));
        assert_eq!(s2.pending(A), 3);

        let s3 = m.withdraw(&s2, A).unwrap();
        assert_eq!(s3.balance(A), 10);
        assert_eq!(s3.pending(A), 0);
        assert!(s3.pending_returns.is_empty());
    }

    #[test]
    fn bid_guards() {
        let m = auction(10, 5);
        let s0 = fresh(&m, 2, 4);
        assert!(m.bid(&s0, A, 0).is_none(), "zero never beats no bid");
        assert!(m.bid(&s0, A, 5).is_none(), "insufficient funds");
        let s1 = m.bid(&s0, A, 2).unwrap();
        assert!(m.bid(&s1, B, 2).is_none(), "must strictly exceed");

        let late = AuctionState { now: 2, ..s0 };
        assert!(m.bid(&late, A, 1).is_none(), "deadline passed");
    }

    #[test]
    fn outbid_credit_sums_pending_returns() {
        let m = auction(10, 5);
        let s0 = fresh(&m, 4, 10);
        let s = m.bid(&s0, A, 1).unwrap();
        let s = m.bid(&s, B, 2).unwrap();
        let s = m.bid(&s, A, 3).unwrap();
        let s = m.bid(&s, B, 4).unwrap();
        assert_eq!(s.pending(A), 1 + 3);
        assert_eq!(s.pending(B), 2);
    }

    #[test]
    fn auction_end_requires_a_bid_and_the_deadline() {
        let m = auction(10, 5);
        let s0 = fresh(&m, 1, 10);
        assert!(m.auction_end(&s0).is_none(), "deadline not reached");

        let ticked = m.tick(&s0).unwrap();
        assert!(m.auction_end(&ticked).is_none(), "no bid was ever placed");

        let with_bid = m.tick(&m.bid(&s0, B, 4).unwrap()).unwrap();
        let ended = m.auction_end(&with_bid).unwrap();
        assert!(ended.ended);
        assert_eq!(ended.balance(A), 14);
        assert!(m.auction_end(&ended).is_none(), "ends only once");
    }

    #[test]
    fn tick_stops_at_the_last_step_index() {
        let m = auction(3, 2);
        let s0 = fresh(&m, 1, 0);
        let s1 = m.tick(&s0).unwrap();
        assert_eq!(s1.now, 1);
        assert!(m.tick(&s1).is_none());
    }

    #[test]
    fn withdraw_credit_overflow_is_rejected_by_default() {
        let m = auction(5, 5);
        let s = AuctionState {
            pending_returns: [(A, 3)].into_iter().collect(),
            ..fresh(&m, 2, 4)
        };
        assert!(m.withdraw(&s, A).is_none());
    }

    #[test]
    fn initial_states_cover_beneficiary_deadline_and_balances() {
        let m = auction(2, 3);
        // 2 beneficiaries * 3 deadlines * 3^2 balance assignments
        assert_eq!(m.initial_states().count(), 2 * 3 * 9);

        let domain = m.domain().clone();
        let fixed = Auction::new(
            domain,
            AuctionOptions {
                fixed_balance: Some(2),
            },
        )
        .unwrap();
        let states: Vec<_> = fixed.initial_states().collect();
        assert_eq!(states.len(), 2 * 3);
        assert!(states.iter().all(|(_, s)| s.balance(A) == 2 && s.balance(B) == 2));
    }

    #[test]
    fn accounts_enumerate_in_odometer_order() {
        let m = auction(1, 3);
        let accounts: Vec<Vec<i64>> = m
            .accounts()
            .map(|acc| acc.values().copied().collect())
            .collect();
        assert_eq!(accounts, [[0, 0], [0, 1], [1, 0], [1, 1]]);
    }

    #[test]
    fn initial_states_are_produced_on_demand() {
        let domain = DomainConfig {
            address_count: 8,
            proposal_count: 0,
            int_min: 0,
            int_max: 9,
            max_trace_length: 4,
        }
        .build()
        .unwrap();
        // 8 * 4 * 10^8 snapshots in total; only the first few are built.
        let m = Auction::new(domain, AuctionOptions::default()).unwrap();
        let first: Vec<_> = m.initial_states().take(3).map(|(_, s)| s).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].balance(Address(7)), 2);
        assert!(first.iter().all(|s| s.beneficiary == A && s.auction_end == 0));
    }

    #[test]
    fn fixed_balance_outside_range_is_a_configuration_error() {
        let domain = auction(3, 3).domain().clone();
        let err = Auction::new(
            domain,
            AuctionOptions {
                fixed_balance: Some(9),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConstantOutOfRange { value: 9, .. }));
    }

    #[test]
    fn permute_relabels_every_address_field() {
        let m = auction(10, 5);
        let s = m.bid(&m.bid(&fresh(&m, 3, 10), A, 1).unwrap(), B, 2).unwrap();
        let swap = m
            .domain()
            .permutations()
            .into_iter()
            .find(|p| p.address(A) == B)
            .unwrap();
        let t = m.permute(&s, &swap);
        assert_eq!(t.beneficiary, B);
        assert_eq!(t.highest_bidder, Some(A));
        assert_eq!(t.pending(B), 1);
        assert_eq!(t.balance(A), 8);
        assert_eq!(m.permute(&t, &swap), s);
    }
}
