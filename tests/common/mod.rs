#![allow(dead_code)]

use aquiflow::wells::AquiferCode;
use aquiflow::{AnalysisParams, FitMethod, Measurement, Well};
use hifitime::Epoch;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub fn code(s: &str) -> AquiferCode {
    s.parse().unwrap()
}

pub fn survey_date() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2012, 6, 15)
}

/// Wells scattered uniformly over `[0, size]²`, heads sampled from `field` plus Gaussian noise.
pub fn scattered_wells(
    rng: &mut StdRng,
    n: usize,
    size: f64,
    noise_sd: f64,
    field: impl Fn(f64, f64) -> f64,
) -> Vec<Well> {
    let noise = Normal::new(0.0, noise_sd.max(f64::MIN_POSITIVE)).unwrap();
    (0..n)
        .map(|k| {
            let x = rng.random_range(0.0..size);
            let y = rng.random_range(0.0..size);
            let eps = if noise_sd > 0.0 { noise.sample(rng) } else { 0.0 };
            Well::new(
                format!("{k:06}"),
                (x, y),
                code("QBAA"),
                vec![Measurement::new(survey_date(), field(x, y) + eps)],
            )
        })
        .collect()
}

pub fn params(method: FitMethod, radius: f64, spacing: f64, required: usize) -> AnalysisParams {
    AnalysisParams::builder()
        .aquifers([code("QBAA")])
        .method(method)
        .radius(radius)
        .spacing(spacing)
        .required(required)
        .build()
        .unwrap()
}

/// Smallest signed difference between two angles [rad].
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    (a - b + std::f64::consts::PI).rem_euclid(two_pi) - std::f64::consts::PI
}
