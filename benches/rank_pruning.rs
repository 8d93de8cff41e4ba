use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::prelude::*;
use pcg_rand::Pcg32;
use rand::{Rng, SeedableRng};

use rank_pruning::classifier::KNN;
use rank_pruning::latent::compute_confident_joint;
use rank_pruning::pruning::{get_noise_mask, PruneOptions};
use rank_pruning::rp::{Estimation, FitConfig, RankPruning};

/// Random inputs, random labels and random (normalized) probabilities.
fn generate_data(n: usize, d: usize, n_labels: usize, seed: u64)
        -> (Array2<f64>, Array1<usize>, Array2<f64>) {
    let mut rng = Pcg32::seed_from_u64(seed);

    let inputs = Array2::from_shape_fn((n, d), |_| rng.gen::<f64>());
    let labels = Array1::from_shape_fn(n, |i| i % n_labels);
    let psx = Array2::from_shape_fn((n, n_labels), |_| rng.gen::<f64>());
    let psx = &psx / &psx.sum_axis(Axis(1)).insert_axis(Axis(1));

    (inputs, labels, psx)
}

fn bench_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimation");
    for &n in &[1000_usize, 10000] {
        let (_, labels, psx) = generate_data(n, 2, 4, 0);

        group.bench_with_input(BenchmarkId::new("confident_joint", n), &n, |b, _| {
            b.iter(|| compute_confident_joint(black_box(&labels.view()),
                                              black_box(&psx.view()), 4, None))
        });
        group.bench_with_input(BenchmarkId::new("noise_mask", n), &n, |b, _| {
            b.iter(|| get_noise_mask(black_box(&labels.view()), black_box(&psx.view()),
                                     None, None, &PruneOptions::default()))
        });
    }
    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let (inputs, labels, _) = generate_data(500, 2, 2, 1);
    let config = FitConfig::default();

    c.bench_function("fit_knn", |b| {
        b.iter(|| {
            let mut rp = RankPruning::new_seeded(KNN::new(5), 0);
            let _ = black_box(rp.fit(&inputs.view(), &labels.view(), Estimation::default(),
                                     &config));
        })
    });
}

criterion_group!(benches, bench_estimation, bench_fit);
criterion_main!(benches);
