#![no_main]
use libfuzzer_sys::fuzz_target;

use tracecheck_engine::replay::{replay, validate};
use tracecheck_ir::auction::{Auction, AuctionOptions};
use tracecheck_ir::ballot::{Ballot, BallotOptions};
use tracecheck_ir::domain::DomainConfig;
use tracecheck_ir::system::{Step, TransitionSystem};
use tracecheck_ir::trace::Trace;

// Bytes pick an initial snapshot, then (rule, binding) pairs. Replay must
// never panic, and whatever it accepts must validate as a trace.
fn exercise<M: TransitionSystem>(model: &M, data: &[u8]) {
    let Some((&pick, rest)) = data.split_first() else {
        return;
    };
    let count = model.initial_states().count();
    if count == 0 {
        return;
    }
    let Some((binding, state)) = model.initial_states().nth(pick as usize % count) else {
        return;
    };
    let start = Trace::start(Step::new(model.initial_rule(), binding), state);

    let steps: Vec<Step> = rest
        .chunks_exact(2)
        .filter_map(|pair| {
            let rule = pair[0] as usize % model.rules().len();
            let candidates = model.bindings(rule);
            let binding = candidates.get(pair[1] as usize % candidates.len().max(1))?;
            Some(Step::new(model.rules()[rule].name, binding.clone()))
        })
        .collect();

    if let Ok(states) = replay(model, start.last(), &steps) {
        let trace = steps
            .into_iter()
            .zip(states)
            .fold(start, |trace, (step, next)| trace.extend(step, next));
        assert_eq!(validate(model, &trace.entries()), Ok(()));
    }
}

fuzz_target!(|data: &[u8]| {
    let domain = DomainConfig {
        address_count: 2,
        proposal_count: 2,
        int_min: 0,
        int_max: 2,
        max_trace_length: 8,
    }
    .build();
    let Ok(domain) = domain else {
        return;
    };
    match data.first().map(|b| b & 1) {
        Some(0) => {
            if let Ok(model) = Auction::new(domain, AuctionOptions::default()) {
                exercise(&model, &data[1..]);
            }
        }
        Some(_) => {
            if let Ok(model) = Ballot::new(domain, BallotOptions::default()) {
                exercise(&model, &data[1..]);
            }
        }
        None => {}
    }
});
