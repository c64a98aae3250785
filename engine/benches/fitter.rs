//! Criterion benchmarks for the LP utility fitter

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parley_engine::fitter::UtilityFitter;
use parley_engine::index::OutcomeIndex;
use parley_engine::ranking::Ranking;
use parley_engine::simplex::{Comparison, Direction, LinearProgram};
use parley_engine::test_domain::{build_test_domain, partial_test_ranking};

fn benchmark_fit_by_ranking_size(c: &mut Criterion) {
    let index = OutcomeIndex::new(&build_test_domain()).unwrap();
    let mut group = c.benchmark_group("fit_ranking");
    for stride in [1usize, 2, 4] {
        let ranking = Ranking::new(partial_test_ranking(&index, stride)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(ranking.len()), &ranking, |b, ranking| {
            b.iter(|| {
                let mut fitter = UtilityFitter::new();
                fitter.fit(black_box(&index), black_box(ranking)).unwrap();
                black_box(fitter.current().map(|m| m.epsilon()));
            })
        });
    }
    group.finish();
}

fn benchmark_simplex_dense(c: &mut Criterion) {
    c.bench_function("simplex_dense_20x20", |b| {
        b.iter(|| {
            let mut lp = LinearProgram::new(Direction::Maximize);
            let vars: Vec<_> = (0..20).map(|i| lp.add_var(1.0 + i as f64 * 0.1, Some(10.0))).collect();
            for row in 0..20 {
                let terms: Vec<_> = vars
                    .iter()
                    .enumerate()
                    .map(|(col, &v)| (v, 1.0 + ((row * 7 + col * 3) % 5) as f64))
                    .collect();
                lp.add_constraint(&terms, Comparison::Le, 50.0 + row as f64);
            }
            black_box(lp.solve().unwrap().objective())
        })
    });
}

criterion_group!(benches, benchmark_fit_by_ranking_size, benchmark_simplex_dense);
criterion_main!(benches);
