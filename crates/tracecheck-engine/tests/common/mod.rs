#![allow(dead_code)]

use tracecheck_engine::explorer::{ExploreOptions, SearchStrategy};
use tracecheck_engine::result::CheckReport;
use tracecheck_ir::auction::{Auction, AuctionOptions};
use tracecheck_ir::ballot::{Ballot, BallotOptions, DelegationGuard};
use tracecheck_ir::domain::{Domain, DomainConfig, OverflowPolicy};

pub fn domain(addresses: i64, proposals: i64, int_max: i64, max_len: i64) -> Domain {
    DomainConfig {
        address_count: addresses,
        proposal_count: proposals,
        int_min: 0,
        int_max,
        max_trace_length: max_len,
    }
    .build()
    .unwrap_or_else(|e| panic!("invalid test domain: {e}"))
}

pub fn auction(int_max: i64, max_len: i64, fixed_balance: Option<i64>) -> Auction {
    auction_with(domain(2, 0, int_max, max_len), fixed_balance)
}

pub fn auction_with(domain: Domain, fixed_balance: Option<i64>) -> Auction {
    Auction::new(domain, AuctionOptions { fixed_balance })
        .unwrap_or_else(|e| panic!("invalid auction: {e}"))
}

pub fn ballot(addresses: i64, max_len: i64, guard: DelegationGuard) -> Ballot {
    ballot_with(domain(addresses, 2, 3, max_len), guard)
}

pub fn ballot_with(domain: Domain, guard: DelegationGuard) -> Ballot {
    Ballot::new(
        domain,
        BallotOptions {
            delegation_guard: guard,
        },
    )
    .unwrap_or_else(|e| panic!("invalid ballot: {e}"))
}

pub fn saturating(domain: Domain) -> Domain {
    domain.with_overflow_policy(OverflowPolicy::Saturate)
}

pub fn wrapping(domain: Domain) -> Domain {
    domain.with_overflow_policy(OverflowPolicy::Wrap)
}

pub fn depth_first() -> ExploreOptions {
    ExploreOptions {
        strategy: SearchStrategy::DepthFirst,
        ..ExploreOptions::default()
    }
}

pub fn parallel(threads: usize) -> ExploreOptions {
    ExploreOptions {
        parallelism: threads,
        ..ExploreOptions::default()
    }
}

/// `(name, verdict_class)` for every verdict, in report order.
pub fn verdict_classes<S>(report: &CheckReport<S>) -> Vec<(String, &'static str)> {
    report
        .verdicts
        .iter()
        .map(|v| (v.name.clone(), v.result.verdict_class()))
        .collect()
}
