//! # Conic discharge-potential fit
//!
//! Near a target location the discharge potential is approximated by the quadratic
//!
//! ```text
//! Φ(u, v) = a + b·u + c·v + d·u² + e·u·v + f·v²
//! ```
//!
//! in **target-centred** coordinates `(u, v) = (x_well − x_target, y_well − y_target)`.
//! With this recentring `(b, c)` is the potential gradient *at the target*, independently of
//! the curvature terms.
//!
//! ## Numerical treatment
//! -----------------
//! * Coordinates are divided by a length scale `s` (the largest neighbor distance) before
//!   the design matrix `[1, u, v, u², uv, v²]` is built, so all columns are `O(1)`.
//! * The weighted problem is solved by SVD; a condition number above the configured ceiling
//!   is reported as [`AquiflowError::SingularFit`] (colinear or clustered wells).
//! * Coefficients and covariance are mapped back to metres with
//!   `D = diag(1, 1/s, 1/s, 1/s², 1/s², 1/s²)`: `β = D·β'`, `Cov = D·Cov'·D`.
//!
//! ## Methods
//! -----------------
//! See [`FitMethod`]. Ordinary and inverse-distance fits use the residual variance
//! `RSS / (n − 6)` to scale `(XᵀWX)⁻¹`; robust fits use Huber's H1 covariance.
//!
//! ## See also
//! * [`crate::flow`] – flow vector and propagated variance from `(b, c)`.

pub(crate) mod least_squares;
pub(crate) mod robust;

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector, Matrix2, Matrix6, Point2, Vector2, Vector6};
use serde::{Deserialize, Serialize};

use crate::aquiflow_errors::AquiflowError;
use crate::constants::{
    CONIC_PARAMETERS, DEFAULT_MAX_CONDITION_NUMBER, DEFAULT_ROBUST_MAX_ITERATIONS,
    DEFAULT_ROBUST_TOLERANCE, HUBER_T, INVERSE_DISTANCE_FLOOR, TUKEY_C,
};
use least_squares::solve_weighted;
use robust::{fit_irls, RobustNorm};

/// Weighting scheme of the conic fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FitMethod {
    /// Ordinary least squares, unit weights.
    Ols,
    /// Weights `radius / max(d, 0.01·radius)`.
    InverseDistance,
    /// Tukey biweight M-estimator (`c = 4.685`).
    #[default]
    Tukey,
    /// Huber M-estimator (`t = 1.345`).
    Huber,
}

impl FromStr for FitMethod {
    type Err = AquiflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OLS" => Ok(FitMethod::Ols),
            "IDW" | "INVERSE_DISTANCE" => Ok(FitMethod::InverseDistance),
            "TUKEY" => Ok(FitMethod::Tukey),
            "HUBER" => Ok(FitMethod::Huber),
            _ => Err(AquiflowError::UnknownFitMethod(s.to_string())),
        }
    }
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FitMethod::Ols => "OLS",
            FitMethod::InverseDistance => "IDW",
            FitMethod::Tukey => "TUKEY",
            FitMethod::Huber => "HUBER",
        };
        f.write_str(s)
    }
}

/// One observation in target-centred coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicSample {
    pub u: f64,
    pub v: f64,
    pub head: f64,
}

impl ConicSample {
    pub fn new(u: f64, v: f64, head: f64) -> Self {
        ConicSample { u, v, head }
    }

    pub fn relative_to(target: &Point2<f64>, location: &Point2<f64>, head: f64) -> Self {
        ConicSample {
            u: location.x - target.x,
            v: location.y - target.y,
            head,
        }
    }

    pub fn distance(&self) -> f64 {
        self.u.hypot(self.v)
    }
}

/// Coefficients and statistics of one local conic fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// `[a, b, c, d, e, f]`
    pub coefficients: Vector6<f64>,
    /// Residual sum of squares (weighted for inverse-distance fits, unweighted otherwise).
    pub rss: f64,
    /// `n − 6`
    pub dof: usize,
    /// Covariance of `[a, b, c, d, e, f]`.
    pub covariance: Matrix6<f64>,
    /// Condition number of the final (scaled, weighted) design matrix.
    pub condition_number: f64,
    /// Number of weighted solves; 1 for non-robust methods.
    pub iterations: usize,
    /// Residual scale [m]: `√(RSS / (n − 6))` for least squares, the final MAD scale for
    /// robust fits.
    pub residual_scale: f64,
}

impl FitResult {
    pub fn a(&self) -> f64 {
        self.coefficients[0]
    }
    pub fn b(&self) -> f64 {
        self.coefficients[1]
    }
    pub fn c(&self) -> f64 {
        self.coefficients[2]
    }
    pub fn d(&self) -> f64 {
        self.coefficients[3]
    }
    pub fn e(&self) -> f64 {
        self.coefficients[4]
    }
    pub fn f(&self) -> f64 {
        self.coefficients[5]
    }

    /// Potential gradient `(b, c)` at the target.
    pub fn gradient(&self) -> Vector2<f64> {
        Vector2::new(self.b(), self.c())
    }

    /// `Cov(b, c)`.
    pub fn gradient_covariance(&self) -> Matrix2<f64> {
        self.covariance.fixed_view::<2, 2>(1, 1).into_owned()
    }

    /// Evaluate the fitted potential at target-centred `(u, v)`.
    pub fn potential(&self, u: f64, v: f64) -> f64 {
        let k = &self.coefficients;
        k[0] + k[1] * u + k[2] * v + k[3] * u * u + k[4] * u * v + k[5] * v * v
    }
}

/// Local conic fitter configured with a weighting scheme and numerical thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConicFitter {
    pub method: FitMethod,
    /// Search radius [m], the reference length of inverse-distance weights.
    pub radius: f64,
    pub max_condition_number: f64,
    pub robust_max_iterations: usize,
    pub robust_tolerance: f64,
}

impl ConicFitter {
    pub fn new(method: FitMethod, radius: f64) -> Self {
        ConicFitter {
            method,
            radius,
            max_condition_number: DEFAULT_MAX_CONDITION_NUMBER,
            robust_max_iterations: DEFAULT_ROBUST_MAX_ITERATIONS,
            robust_tolerance: DEFAULT_ROBUST_TOLERANCE,
        }
    }

    /// Fit the conic model to `samples`.
    ///
    /// Arguments
    /// -----------------
    /// * `samples`: target-centred observations, at least seven.
    ///
    /// Return
    /// ----------
    /// * The [`FitResult`] with un-scaled coefficients and covariance.
    /// * [`AquiflowError::InsufficientNeighbors`] with fewer than seven samples.
    /// * [`AquiflowError::SingularFit`] for rank-deficient / ill-conditioned designs or
    ///   non-finite results.
    pub fn fit(&self, samples: &[ConicSample]) -> Result<FitResult, AquiflowError> {
        let n = samples.len();
        if n <= CONIC_PARAMETERS {
            return Err(AquiflowError::InsufficientNeighbors {
                found: n,
                required: CONIC_PARAMETERS + 1,
            });
        }
        let dof = n - CONIC_PARAMETERS;

        let scale = samples
            .iter()
            .map(ConicSample::distance)
            .fold(0.0_f64, f64::max);
        let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };

        let design = design_matrix(samples, scale);
        let z = DVector::from_iterator(n, samples.iter().map(|s| s.head));

        let (beta, covariance, rss, condition_number, iterations, residual_scale) = match self.method {
            FitMethod::Ols | FitMethod::InverseDistance => {
                let w = match self.method {
                    FitMethod::InverseDistance => {
                        let floor = INVERSE_DISTANCE_FLOOR * self.radius;
                        DVector::from_iterator(
                            n,
                            samples.iter().map(|s| self.radius / s.distance().max(floor)),
                        )
                    }
                    _ => DVector::from_element(n, 1.0),
                };
                let sol = solve_weighted(&design, &z, &w, self.max_condition_number)?;
                let sigma2 = sol.weighted_rss / dof as f64;
                let cov = &sol.normal_inverse * sigma2;
                (sol.beta, cov, sol.weighted_rss, sol.condition_number, 1, sigma2.sqrt())
            }
            FitMethod::Tukey | FitMethod::Huber => {
                let norm = match self.method {
                    FitMethod::Tukey => RobustNorm::Tukey { c: TUKEY_C },
                    _ => RobustNorm::Huber { t: HUBER_T },
                };
                let sol = fit_irls(
                    &design,
                    &z,
                    norm,
                    self.robust_max_iterations,
                    self.robust_tolerance,
                    self.max_condition_number,
                )?;
                let rss = sol.residuals.norm_squared();
                (sol.beta, sol.covariance, rss, sol.condition_number, sol.iterations, sol.scale)
            }
        };

        let unscale = Vector6::new(
            1.0,
            1.0 / scale,
            1.0 / scale,
            1.0 / (scale * scale),
            1.0 / (scale * scale),
            1.0 / (scale * scale),
        );
        let coefficients = Vector6::from_iterator(beta.iter().copied()).component_mul(&unscale);
        let d = Matrix6::from_diagonal(&unscale);
        let covariance = d * Matrix6::from_iterator(covariance.iter().copied()) * d;

        if coefficients.iter().chain(covariance.iter()).any(|x| !x.is_finite()) {
            return Err(AquiflowError::SingularFit { condition_number });
        }

        Ok(FitResult {
            coefficients,
            rss,
            dof,
            covariance,
            condition_number,
            iterations,
            residual_scale,
        })
    }
}

/// Rows `[1, u, v, u², uv, v²]` with `(u, v)` divided by `scale`.
fn design_matrix(samples: &[ConicSample], scale: f64) -> DMatrix<f64> {
    DMatrix::from_fn(samples.len(), CONIC_PARAMETERS, |i, j| {
        let u = samples[i].u / scale;
        let v = samples[i].v / scale;
        match j {
            0 => 1.0,
            1 => u,
            2 => v,
            3 => u * u,
            4 => u * v,
            _ => v * v,
        }
    })
}

#[cfg(test)]
mod conic_test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn scattered(rng: &mut StdRng, n: usize, field: impl Fn(f64, f64) -> f64) -> Vec<ConicSample> {
        (0..n)
            .map(|_| {
                let u = rng.random_range(-3000.0..3000.0);
                let v = rng.random_range(-3000.0..3000.0);
                ConicSample::new(u, v, field(u, v))
            })
            .collect()
    }

    #[test]
    fn test_fit_method_from_str() {
        assert_eq!("ols".parse::<FitMethod>().unwrap(), FitMethod::Ols);
        assert_eq!("IDW".parse::<FitMethod>().unwrap(), FitMethod::InverseDistance);
        assert_eq!(" Tukey ".parse::<FitMethod>().unwrap(), FitMethod::Tukey);
        assert_eq!("HUBER".parse::<FitMethod>().unwrap(), FitMethod::Huber);
        assert_eq!(
            "kriging".parse::<FitMethod>(),
            Err(AquiflowError::UnknownFitMethod("kriging".into()))
        );
        assert_eq!(FitMethod::default(), FitMethod::Tukey);
        assert_eq!(FitMethod::InverseDistance.to_string(), "IDW");
    }

    #[test]
    fn test_exact_quadratic_recovery() {
        let mut rng = StdRng::seed_from_u64(1);
        let truth = [280.0, -1e-3, 2e-3, 3e-8, -1e-8, 2e-8];
        let samples = scattered(&mut rng, 30, |u, v| {
            truth[0] + truth[1] * u + truth[2] * v + truth[3] * u * u + truth[4] * u * v + truth[5] * v * v
        });

        for method in [FitMethod::Ols, FitMethod::InverseDistance, FitMethod::Tukey, FitMethod::Huber] {
            let fit = ConicFitter::new(method, 3000.0).fit(&samples).unwrap();
            for (k, t) in fit.coefficients.iter().zip(truth.iter()) {
                assert_relative_eq!(*k, *t, epsilon = 1e-9, max_relative = 1e-6);
            }
            assert_eq!(fit.dof, 24);
            assert_relative_eq!(fit.potential(100.0, -50.0), {
                let (u, v) = (100.0, -50.0);
                truth[0] + truth[1] * u + truth[2] * v + truth[3] * u * u + truth[4] * u * v + truth[5] * v * v
            }, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_ols_covariance_scales_with_noise() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let samples: Vec<ConicSample> = scattered(&mut rng, 60, |u, v| 250.0 + 1e-3 * u - 2e-3 * v)
            .into_iter()
            .map(|s| ConicSample::new(s.u, s.v, s.head + noise.sample(&mut rng)))
            .collect();

        let fit = ConicFitter::new(FitMethod::Ols, 3000.0).fit(&samples).unwrap();
        assert_relative_eq!(fit.rss / fit.dof as f64, 0.25, max_relative = 0.5);
        let cov = fit.gradient_covariance();
        assert!(cov[(0, 0)] > 0.0 && cov[(1, 1)] > 0.0);
        assert_relative_eq!(cov[(0, 1)], cov[(1, 0)], max_relative = 1e-9);
        assert_eq!(fit.iterations, 1);
    }

    #[test]
    fn test_residual_scale_ignores_outlier_in_robust_fits() {
        let mut rng = StdRng::seed_from_u64(17);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let mut samples: Vec<ConicSample> = scattered(&mut rng, 80, |u, v| 250.0 + 1e-3 * u - 2e-3 * v)
            .into_iter()
            .map(|s| ConicSample::new(s.u, s.v, s.head + noise.sample(&mut rng)))
            .collect();
        samples.push(ConicSample::new(500.0, 500.0, 300.0));

        let ols = ConicFitter::new(FitMethod::Ols, 3000.0).fit(&samples).unwrap();
        assert!(ols.residual_scale > 2.0, "ols scale {}", ols.residual_scale);
        for method in [FitMethod::Tukey, FitMethod::Huber] {
            let fit = ConicFitter::new(method, 3000.0).fit(&samples).unwrap();
            assert!(
                fit.residual_scale > 0.3 && fit.residual_scale < 0.8,
                "{method}: scale {}",
                fit.residual_scale
            );
        }

        let exact = scattered(&mut rng, 30, |u, v| 250.0 + 1e-3 * u - 2e-3 * v);
        for method in [FitMethod::Ols, FitMethod::Tukey] {
            let fit = ConicFitter::new(method, 3000.0).fit(&exact).unwrap();
            assert!(fit.residual_scale < 1e-6, "{method}: scale {}", fit.residual_scale);
        }
    }

    #[test]
    fn test_colinear_wells_are_singular() {
        let samples: Vec<ConicSample> = (0..30)
            .map(|k| {
                let u = -1500.0 + 100.0 * k as f64;
                ConicSample::new(u, 2.0 * u, 300.0 - 1e-3 * u)
            })
            .collect();
        for method in [FitMethod::Ols, FitMethod::InverseDistance, FitMethod::Tukey, FitMethod::Huber] {
            let err = ConicFitter::new(method, 3000.0).fit(&samples).unwrap_err();
            assert!(matches!(err, AquiflowError::SingularFit { .. }), "{method}: {err:?}");
        }
    }

    #[test]
    fn test_too_few_samples() {
        let samples = vec![ConicSample::new(1.0, 2.0, 3.0); 6];
        assert_eq!(
            ConicFitter::new(FitMethod::Ols, 10.0).fit(&samples),
            Err(AquiflowError::InsufficientNeighbors {
                found: 6,
                required: 7
            })
        );
    }

    #[test]
    fn test_inverse_distance_handles_well_at_target() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut samples = scattered(&mut rng, 20, |u, v| 100.0 + 2e-3 * u + 1e-3 * v);
        samples.push(ConicSample::new(0.0, 0.0, 100.0));
        let fit = ConicFitter::new(FitMethod::InverseDistance, 3000.0)
            .fit(&samples)
            .unwrap();
        assert_relative_eq!(fit.b(), 2e-3, epsilon = 1e-10);
        assert_relative_eq!(fit.c(), 1e-3, epsilon = 1e-10);
    }
}
