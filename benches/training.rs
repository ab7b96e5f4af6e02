use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use wellcast::training::{ModelFamily, ModelSpec};

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = Array1::from_iter((0..n_rows).map(|i| {
        let row = x.row(i);
        row.sum() + rng.gen::<f64>() * 0.1
    }));
    (x, y)
}

fn bench_baseline_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("baseline_fit");
    group.sample_size(10);

    for n_rows in [500, 2_000] {
        let (x, y) = create_regression_data(n_rows, 10);

        for family in [
            ModelFamily::RandomForest,
            ModelFamily::GradientBoosting,
            ModelFamily::Ridge,
        ] {
            group.bench_with_input(
                BenchmarkId::new(family.name(), n_rows),
                &(&x, &y),
                |b, (x, y)| {
                    b.iter(|| {
                        ModelSpec::baseline(family)
                            .fit(black_box(x), black_box(y), 42)
                            .unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (x, y) = create_regression_data(2_000, 10);
    let model = ModelSpec::baseline(ModelFamily::RandomForest)
        .fit(&x, &y, 42)
        .unwrap();
    let (x_query, _) = create_regression_data(100, 10);

    group.bench_function("random_forest_100_rows", |b| {
        b.iter(|| model.predict(black_box(&x_query)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_baseline_fit, bench_prediction);
criterion_main!(benches);
