//! Benchmarks for the fitting stages
//!
//! Run with: cargo bench -p qgst-fit

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use qgst_core::{GateSet, GateSetBasis};
use qgst_fit::{
    ConstrainedLeastSquares, FitConfig, GatesetTomographyFitter, LinearInversionSolver,
    LinearInversionConfig, MleProblem,
};

/// Benchmark one evaluation of the constrained least-squares problem
fn bench_problem_evaluation(c: &mut Criterion) {
    let basis = GateSetBasis::standard().unwrap();
    let ideal = GateSet::ideal(&basis);
    let table = ideal.predict_table(basis.catalog()).unwrap();
    let problem = MleProblem::new(&basis, &table).unwrap();
    let params = problem.encode(&ideal).unwrap();

    let mut group = c.benchmark_group("mle_problem");
    group.bench_function("evaluate", |b| {
        b.iter(|| problem.evaluate(black_box(&params)));
    });
    group.bench_function("objective", |b| {
        b.iter(|| problem.objective(black_box(&ideal)));
    });
    group.bench_function("decode", |b| {
        b.iter(|| problem.decode(black_box(&params)));
    });
    group.finish();
}

/// Benchmark the closed-form stage
fn bench_linear_inversion(c: &mut Criterion) {
    let basis = GateSetBasis::standard().unwrap();
    let table = GateSet::ideal(&basis).predict_table(basis.catalog()).unwrap();
    let solver = LinearInversionSolver::new(&basis, LinearInversionConfig::default());

    c.bench_function("linear_inversion", |b| {
        b.iter(|| solver.solve(black_box(&table)).unwrap());
    });
}

/// Benchmark a full noiseless fit
fn bench_full_fit(c: &mut Criterion) {
    let basis = GateSetBasis::standard().unwrap();
    let table = GateSet::ideal(&basis).predict_table(basis.catalog()).unwrap();
    let fitter = GatesetTomographyFitter::new(basis, table, FitConfig::default()).unwrap();

    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    group.bench_function("noiseless_standard", |b| {
        b.iter(|| fitter.fit().unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_problem_evaluation,
    bench_linear_inversion,
    bench_full_fit
);
criterion_main!(benches);
