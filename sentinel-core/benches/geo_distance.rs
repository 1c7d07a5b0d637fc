use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use sentinel_core::{Coordinate, distance_km};

fn grid(n: usize) -> Vec<Coordinate> {
    (0..n)
        .filter_map(|i| {
            let lat = -80.0 + (i as f64 * 7.3) % 160.0;
            let lon = -170.0 + (i as f64 * 13.7) % 340.0;
            Coordinate::new(lat, lon).ok()
        })
        .collect()
}

fn geo_distance_benchmark(c: &mut Criterion) {
    let points = grid(1_000);
    let origin = Coordinate::new(28.7041, 77.1025).expect("valid origin");

    c.bench_function("distance_km_1000", |b| {
        b.iter(|| {
            let total: f64 = points
                .iter()
                .map(|p| distance_km(black_box(origin), black_box(*p)))
                .sum();
            black_box(total)
        });
    });
}

criterion_group!(benches, geo_distance_benchmark);
criterion_main!(benches);
