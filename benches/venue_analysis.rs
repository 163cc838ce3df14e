use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hifitime::Epoch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use aquiflow::{AnalysisParams, FitMethod, FlowAnalysis, Measurement, Venue, Well};

/// 20 km × 20 km synthetic well field with a regional gradient.
fn make_wells(n: usize) -> Vec<Well> {
    let mut rng = StdRng::seed_from_u64(0xDEADBEEF);
    let date = Epoch::from_gregorian_utc_at_midnight(2015, 5, 1);
    (0..n)
        .map(|k| {
            let x = rng.random_range(0.0..20_000.0);
            let y = rng.random_range(0.0..20_000.0);
            let head = 300.0 - 1e-3 * x + 5e-4 * y + rng.random_range(-0.2..0.2);
            Well::new(
                format!("{k}"),
                (x, y),
                "QBAA".parse().unwrap(),
                vec![Measurement::new(date, head)],
            )
        })
        .collect()
}

fn bench_by_venue(c: &mut Criterion) {
    let analysis = FlowAnalysis::new(make_wells(10_000));
    let venue = Venue::neighborhood("Bench", (10_000.0, 10_000.0), 7000.0).unwrap();

    for method in [FitMethod::Ols, FitMethod::Tukey] {
        let params = AnalysisParams::builder()
            .aquifers(["QBAA".parse().unwrap()])
            .method(method)
            .build()
            .unwrap();
        c.bench_function(&format!("by_venue/{method}/10k_wells"), |b| {
            b.iter(|| black_box(analysis.by_venue(&venue, &params).unwrap()))
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_by_venue
}
criterion_main!(benches);
