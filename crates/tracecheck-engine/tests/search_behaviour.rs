mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::*;
use tracecheck_engine::checker::{check_invariant, check_invariants};
use tracecheck_engine::explorer::ExploreOptions;
use tracecheck_engine::result::VerificationResult;
use tracecheck_ir::auction::{auction_invariants, AuctionState};
use tracecheck_ir::ballot::{ballot_invariants, DelegationGuard};
use tracecheck_ir::properties::Invariant;

fn never_ended() -> Invariant<AuctionState> {
    Invariant::state("neverEnded", "the auction never ends", |s: &AuctionState| !s.ended)
}

fn pending_stays_small() -> Invariant<AuctionState> {
    Invariant::state("pendingBelowTwo", "pending returns stay below 2", |s: &AuctionState| {
        s.pending_returns.values().all(|v| *v < 2)
    })
}

#[test]
fn depth_first_finds_the_same_minimal_length_as_deepening() {
    let model = auction(3, 5, Some(3));
    for invariant in [never_ended(), pending_stays_small()] {
        let id = check_invariant(&model, &invariant, &ExploreOptions::default()).unwrap();
        let dfs = check_invariant(&model, &invariant, &depth_first()).unwrap();
        let id_len = id.result.counterexample().unwrap().len();
        let dfs_len = dfs.result.counterexample().unwrap().len();
        assert_eq!(id_len, dfs_len, "{}", invariant.name);
    }
}

#[test]
fn parallel_and_sequential_agree() {
    let model = auction(2, 4, None);
    let mut invariants = auction_invariants().select(&[]).unwrap();
    invariants.push(never_ended());
    let seq = check_invariants(&model, &invariants, &ExploreOptions::default()).unwrap();
    let par = check_invariants(&model, &invariants, &parallel(4)).unwrap();
    assert_eq!(verdict_classes(&seq), verdict_classes(&par));

    let ended = par.get("neverEnded").unwrap();
    assert_eq!(ended.result.counterexample().unwrap().len(), 4);
}

#[test]
fn parallel_ballot_search_agrees() {
    let model = ballot(2, 5, DelegationGuard::AsModeled);
    let invariants = ballot_invariants().select(&[]).unwrap();
    let seq = check_invariants(&model, &invariants, &ExploreOptions::default()).unwrap();
    let par = check_invariants(&model, &invariants, &parallel(0)).unwrap();
    assert_eq!(verdict_classes(&seq), verdict_classes(&par));
    assert!(par.all_hold());
}

#[test]
fn step_budget_yields_inconclusive_not_holds() {
    let model = auction(2, 4, None);
    let options = ExploreOptions {
        max_steps: 10,
        ..ExploreOptions::default()
    };
    let invariants = auction_invariants().select(&[]).unwrap();
    let report = check_invariants(&model, &invariants, &options).unwrap();
    assert!(!report.all_hold());
    assert_eq!(report.overall_verdict(), "inconclusive");
    assert_eq!(report.exit_code(), 2);
    match &report.verdicts[0].result {
        VerificationResult::Inconclusive { reason } => assert!(reason.contains("step budget")),
        other => panic!("expected inconclusive, got {}", other.verdict_class()),
    }
}

#[test]
fn violation_found_before_the_budget_runs_out_is_reported() {
    let model = auction(2, 4, None);
    let options = ExploreOptions {
        max_steps: 20,
        ..depth_first()
    };
    let not_first = Invariant::state(
        "beneficiaryNotA0",
        "A0 is never the beneficiary",
        |s: &AuctionState| s.beneficiary.0 != 0,
    );
    let verdict = check_invariant(&model, &not_first, &options).unwrap();
    let cx = verdict.result.counterexample().expect("violated at the first snapshot");
    assert_eq!(cx.len(), 1);
}

#[test]
fn cancellation_is_inconclusive() {
    let model = auction(2, 4, None);
    let options = ExploreOptions {
        cancel: Some(Arc::new(AtomicBool::new(true))),
        ..ExploreOptions::default()
    };
    let verdict = check_invariant(&model, &never_ended(), &options).unwrap();
    match verdict.result {
        VerificationResult::Inconclusive { reason } => assert_eq!(reason, "search cancelled"),
        other => panic!("expected inconclusive, got {}", other.verdict_class()),
    }
}

#[test]
fn symmetry_and_revisit_pruning_preserve_verdicts() {
    let model = ballot(3, 4, DelegationGuard::AsModeled);
    let invariants = ballot_invariants().select(&[]).unwrap();
    let plain = check_invariants(&model, &invariants, &ExploreOptions::default()).unwrap();
    for options in [
        ExploreOptions {
            prune_revisits: true,
            ..ExploreOptions::default()
        },
        ExploreOptions {
            symmetry: true,
            ..ExploreOptions::default()
        },
    ] {
        let reduced = check_invariants(&model, &invariants, &options).unwrap();
        assert_eq!(verdict_classes(&plain), verdict_classes(&reduced));
        let before: u64 = plain.verdicts.iter().map(|v| v.stats.snapshots).sum();
        let after: u64 = reduced.verdicts.iter().map(|v| v.stats.snapshots).sum();
        assert!(after < before);
    }

    let auction_model = auction(2, 4, None);
    let mut auction_checks = auction_invariants().select(&[]).unwrap();
    auction_checks.push(never_ended());
    let plain =
        check_invariants(&auction_model, &auction_checks, &ExploreOptions::default()).unwrap();
    let reduced = check_invariants(
        &auction_model,
        &auction_checks,
        &ExploreOptions {
            symmetry: true,
            ..ExploreOptions::default()
        },
    )
    .unwrap();
    assert_eq!(verdict_classes(&plain), verdict_classes(&reduced));
    assert_eq!(
        plain.get("neverEnded").unwrap().result.counterexample().unwrap().len(),
        reduced.get("neverEnded").unwrap().result.counterexample().unwrap().len()
    );
}

#[test]
fn step_budget_bounds_root_generation() {
    // 10^8 initial balance vectors per beneficiary and end time.
    let model = auction_with(domain(8, 0, 9, 4), None);
    for options in [
        ExploreOptions {
            max_steps: 1,
            ..ExploreOptions::default()
        },
        ExploreOptions {
            max_steps: 1,
            ..parallel(2)
        },
    ] {
        let verdict = check_invariant(&model, &never_ended(), &options).unwrap();
        assert_eq!(verdict.result.verdict_class(), "inconclusive");
        assert!(verdict.stats.snapshots <= 64, "{} roots built", verdict.stats.snapshots);
    }
}
