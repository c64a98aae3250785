//! Criterion benchmarks for one elicitation pass

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use parley_engine::elicitation::PreferenceOracle;
use parley_engine::error::Result;
use parley_engine::index::{Outcome, OutcomeIndex};
use parley_engine::ranking::Ranking;
use parley_engine::test_domain::{build_test_domain, partial_test_ranking, test_utility};
use parley_engine::{Bid, EngineConfig, NegotiationEngine};

struct FixtureOracle;

impl PreferenceOracle for FixtureOracle {
    fn elicit_rank(&mut self, _index: &OutcomeIndex, outcome: &Outcome, ranking: &Ranking) -> Result<usize> {
        let u = test_utility(outcome);
        Ok(ranking.iter().filter(|o| test_utility(o) < u).count())
    }
}

fn build_engine() -> NegotiationEngine {
    let domain = build_test_domain();
    let index = OutcomeIndex::new(&domain).unwrap();
    let bids: Vec<Bid> = partial_test_ranking(&index, 4).iter().map(|o| index.decode(o)).collect();
    NegotiationEngine::new(&domain, &bids, EngineConfig::default()).unwrap()
}

fn benchmark_free_pass(c: &mut Criterion) {
    c.bench_function("elicitation_pass_free", |b| {
        b.iter_batched(
            build_engine,
            |mut engine| black_box(engine.run_elicitation_pass(&mut FixtureOracle, 0.8, 0.0).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn benchmark_priced_pass(c: &mut Criterion) {
    c.bench_function("elicitation_pass_priced", |b| {
        b.iter_batched(
            build_engine,
            |mut engine| black_box(engine.run_elicitation_pass(&mut FixtureOracle, 0.8, 0.05).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, benchmark_free_pass, benchmark_priced_pass);
criterion_main!(benches);
