use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use kp_anonymity::dataset::Dataset;
use kp_anonymity::metrics::AttributeBounds;
use kp_anonymity::types::{Group, SensitiveTable};
use kp_anonymity::{run, Algorithm, AnonymityParams};

const RECORDS: usize = 120;
const SERIES_LEN: usize = 12;

fn synthetic_dataset() -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let mut records = Group::new();
    let mut sensitive = SensitiveTable::new();
    for i in 0..RECORDS {
        // Four base shapes plus noise.
        let shape = i % 4;
        let series: Vec<f64> = (0..SERIES_LEN)
            .map(|j| {
                let t = j as f64 / SERIES_LEN as f64;
                let base = match shape {
                    0 => 100.0 * t,
                    1 => 100.0 * (1.0 - t),
                    2 => 100.0 * (2.0 * t - 1.0).abs(),
                    _ => 50.0,
                };
                base + rng.gen_range(-5.0..5.0)
            })
            .collect();
        records.insert(format!("r{i}"), series);
        sensitive.insert(format!("r{i}"), rng.gen_range(0..20));
    }
    let min = vec![-5.0; SERIES_LEN];
    let max = vec![105.0; SERIES_LEN];
    Dataset {
        columns: (0..SERIES_LEN).map(|j| format!("w{j}")).collect(),
        records,
        sensitive,
        bounds: AttributeBounds { min, max },
    }
}

fn bench_strategies(c: &mut Criterion) {
    let dataset = synthetic_dataset();
    let params = AnonymityParams {
        k: 8,
        p: 4,
        paa: 4,
        l: 2,
        epsilon: 1,
        max_level: 5,
    };

    c.bench_function("naive_120x12", |b| {
        b.iter(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(99);
            let result = run(Algorithm::Naive, &dataset, &params, &mut rng).unwrap();
            black_box(result.surviving_records())
        })
    });

    c.bench_function("kapra_120x12", |b| {
        b.iter(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(99);
            let result = run(Algorithm::Kapra, &dataset, &params, &mut rng).unwrap();
            black_box(result.surviving_records())
        })
    });
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
