//! Criterion benchmarks for opponent model estimation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parley_engine::index::OutcomeIndex;
use parley_engine::opponent::FrequencyModel;
use parley_engine::test_domain::{build_test_domain, full_test_ranking};

fn benchmark_observe(c: &mut Criterion) {
    let index = OutcomeIndex::new(&build_test_domain()).unwrap();
    let outcomes = full_test_ranking(&index);
    c.bench_function("observe_18_offers", |b| {
        b.iter(|| {
            let mut model = FrequencyModel::new(&index);
            for outcome in &outcomes {
                model.observe(black_box(outcome)).unwrap();
            }
            black_box(model.observations())
        })
    });
}

fn benchmark_estimate_many(c: &mut Criterion) {
    let index = OutcomeIndex::new(&build_test_domain()).unwrap();
    let outcomes = full_test_ranking(&index);
    let mut model = FrequencyModel::new(&index);
    for outcome in outcomes.iter().rev().take(6) {
        model.observe(outcome).unwrap();
    }
    c.bench_function("estimate_full_space", |b| {
        b.iter(|| black_box(model.estimate_many(black_box(&outcomes)).unwrap()))
    });
    c.bench_function("issue_weights", |b| b.iter(|| black_box(model.issue_weights())));
}

criterion_group!(benches, benchmark_observe, benchmark_estimate_many);
criterion_main!(benches);
