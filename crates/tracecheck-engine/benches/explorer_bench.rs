use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tracecheck_engine::checker::check_invariants;
use tracecheck_engine::explorer::ExploreOptions;
use tracecheck_ir::auction::{auction_invariants, Auction, AuctionOptions};
use tracecheck_ir::ballot::{ballot_invariants, Ballot, BallotOptions};
use tracecheck_ir::domain::DomainConfig;

fn domain(addresses: i64, proposals: i64, max_len: i64) -> DomainConfig {
    DomainConfig {
        address_count: addresses,
        proposal_count: proposals,
        int_min: 0,
        int_max: 3,
        max_trace_length: max_len,
    }
}

fn bench_auction_catalog(c: &mut Criterion) {
    let model = Auction::new(domain(2, 0, 4).build().unwrap(), AuctionOptions::default()).unwrap();
    let invariants = auction_invariants().select(&[]).unwrap();
    c.bench_function("explorer_auction_catalog_len4", |b| {
        b.iter(|| {
            check_invariants(black_box(&model), &invariants, &ExploreOptions::default()).unwrap()
        })
    });
}

fn bench_ballot_catalog(c: &mut Criterion) {
    let model = Ballot::new(domain(3, 2, 4).build().unwrap(), BallotOptions::default()).unwrap();
    let invariants = ballot_invariants().select(&[]).unwrap();
    let mut group = c.benchmark_group("explorer_ballot_catalog_len4");
    group.sample_size(20);
    for (label, options) in [
        ("sequential", ExploreOptions::default()),
        (
            "parallel",
            ExploreOptions {
                parallelism: 0,
                ..ExploreOptions::default()
            },
        ),
        (
            "symmetry",
            ExploreOptions {
                symmetry: true,
                ..ExploreOptions::default()
            },
        ),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| check_invariants(black_box(&model), &invariants, &options).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_auction_catalog, bench_ballot_catalog);
criterion_main!(benches);
