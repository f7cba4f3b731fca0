use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hs_inference::generic_ml::{GenericMlConfig, SecondStage, combine, repeated_combine};
use hs_inference::learners::{KnnLearner, LinearLearner};
use hs_inference::simulate::{SimulationConfig, simulate_rct};
use hs_inference::wls::CovarianceType;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

fn sim_config(n: usize) -> SimulationConfig {
    SimulationConfig { n, n_features: 5, ate: 1.0, het: 1.0, noise: 1.0, propensity: 0.5 }
}

fn bench_single_split_n_scaling(c: &mut Criterion) {
    let learner = LinearLearner::ols();
    let mut group = c.benchmark_group("generic_ml/single_split/linear");
    for n in [1_000usize, 10_000, 50_000] {
        let data = simulate_rct(&sim_config(n), 123).unwrap();
        for stage in [SecondStage::Blp, SecondStage::Gates] {
            let cfg = GenericMlConfig { second_stage: stage, groups: 5, ..Default::default() };
            group.bench_with_input(BenchmarkId::new(stage.to_string(), n), &data, |b, data| {
                b.iter(|| {
                    let mut rng = StdRng::seed_from_u64(7);
                    let res = combine(&learner, black_box(data), &cfg, &mut rng).unwrap();
                    black_box(res);
                });
            });
        }
    }
    group.finish();
}

fn bench_repeated_splits(c: &mut Criterion) {
    let data = simulate_rct(&sim_config(2_000), 42).unwrap();
    let learner = KnnLearner { k: 15 };
    let mut group = c.benchmark_group("generic_ml/repeated/knn_n=2000");
    group.sample_size(10);
    for n_splits in [1usize, 10, 50] {
        let cfg = GenericMlConfig { n_splits, covariance: CovarianceType::Hc1, ..Default::default() };
        group.bench_with_input(BenchmarkId::from_parameter(n_splits), &cfg, |b, cfg| {
            b.iter(|| {
                let res = repeated_combine(&learner, black_box(&data), cfg).unwrap();
                black_box(res.n_splits_ok);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_split_n_scaling, bench_repeated_splits);
criterion_main!(benches);
