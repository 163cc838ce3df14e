//! # Robust M-estimation by iteratively reweighted least squares
//!
//! Water-level databases contain gross errors (wrong datum, mistyped depth, well completed
//! in another unit). The robust fitting methods down-weight such observations with an
//! M-estimator:
//!
//! | Norm   | weight `w(u)`                    | `ψ(u)`               | `ψ'(u)`                          |
//! |--------|----------------------------------|----------------------|----------------------------------|
//! | Tukey  | `(1 − (u/c)²)²` if `|u| < c`     | `u·w(u)`             | `(1 − (u/c)²)(1 − 5(u/c)²)`      |
//! | Huber  | `1` if `|u| ≤ t`, else `t/|u|`   | `clamp(u, −t, t)`    | `1` if `|u| ≤ t`, else `0`       |
//!
//! with `u = r / s` and `s` the MAD scale `median|r| / 0.6745`, re-estimated at each
//! iteration.
//!
//! ## Algorithm
//! 1. Start from the ordinary least-squares solution.
//! 2. Re-estimate the scale, recompute the weights, solve the weighted problem.
//! 3. Stop when the relative coefficient change drops below the tolerance or the iteration
//!    cap is reached.
//!
//! When the MAD of the OLS residuals is numerically zero the data are fitted exactly and the
//! OLS solution is returned unchanged.
//!
//! ## Covariance
//! Huber's H1 sandwich-free estimator:
//!
//! ```text
//! m   = mean ψ'(uᵢ)
//! k   = 1 + (p/n) · var(ψ'(uᵢ)) / m²
//! Cov = k² · Σψ(uᵢ)² / (n − p) · s² / m² · (XᵀX)⁻¹
//! ```

use nalgebra::{DMatrix, DVector};

use super::least_squares::{solve_weighted, WeightedSolution};
use crate::aquiflow_errors::AquiflowError;
use crate::constants::MAD_NORMAL_CONSISTENCY;

/// Relative size (w.r.t. the largest head) below which the residual scale counts as zero.
const ZERO_SCALE_RTOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RobustNorm {
    Tukey { c: f64 },
    Huber { t: f64 },
}

impl RobustNorm {
    pub fn weight(&self, u: f64) -> f64 {
        match *self {
            RobustNorm::Tukey { c } => {
                let q = u / c;
                if q.abs() < 1.0 {
                    let one_minus = 1.0 - q * q;
                    one_minus * one_minus
                } else {
                    0.0
                }
            }
            RobustNorm::Huber { t } => {
                if u.abs() <= t {
                    1.0
                } else {
                    t / u.abs()
                }
            }
        }
    }

    pub fn psi(&self, u: f64) -> f64 {
        match *self {
            RobustNorm::Tukey { .. } => u * self.weight(u),
            RobustNorm::Huber { t } => u.clamp(-t, t),
        }
    }

    pub fn psi_prime(&self, u: f64) -> f64 {
        match *self {
            RobustNorm::Tukey { c } => {
                let q2 = (u / c).powi(2);
                if q2 < 1.0 {
                    (1.0 - q2) * (1.0 - 5.0 * q2)
                } else {
                    0.0
                }
            }
            RobustNorm::Huber { t } => {
                if u.abs() <= t {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Outcome of an IRLS run, in the coordinates of the design matrix.
#[derive(Debug, Clone)]
pub(crate) struct RobustSolution {
    pub beta: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub residuals: DVector<f64>,
    /// Final MAD scale of the residuals.
    pub scale: f64,
    pub condition_number: f64,
    pub iterations: usize,
}

/// Median of `|r|` divided by the normal consistency constant.
pub(crate) fn mad_scale(residuals: &DVector<f64>) -> f64 {
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    let n = abs.len();
    if n == 0 {
        return 0.0;
    }
    abs.sort_unstable_by(f64::total_cmp);
    let median = if n % 2 == 1 {
        abs[n / 2]
    } else {
        0.5 * (abs[n / 2 - 1] + abs[n / 2])
    };
    median / MAD_NORMAL_CONSISTENCY
}

/// Run IRLS with `norm` on `design · β ≈ z`.
///
/// Arguments
/// -----------------
/// * `design`: `n × p` design matrix (already scaled).
/// * `z`: observed heads.
/// * `norm`: the M-estimator.
/// * `max_iterations`: cap on reweighting iterations (≥ 1).
/// * `tolerance`: relative coefficient change that stops the iteration.
/// * `max_condition`: ceiling on the weighted design condition number.
///
/// Return
/// ----------
/// * The robust coefficients and their H1 covariance, or [`AquiflowError::SingularFit`]
///   when a weighted design degenerates or the H1 correction is undefined.
pub(crate) fn fit_irls(
    design: &DMatrix<f64>,
    z: &DVector<f64>,
    norm: RobustNorm,
    max_iterations: usize,
    tolerance: f64,
    max_condition: f64,
) -> Result<RobustSolution, AquiflowError> {
    let (n, p) = design.shape();
    let ones = DVector::from_element(n, 1.0);
    let ols = solve_weighted(design, z, &ones, max_condition)?;

    let zero_scale = ZERO_SCALE_RTOL * z.amax().max(1.0);
    let mut scale = mad_scale(&ols.residuals);
    if scale <= zero_scale {
        let dof = (n - p) as f64;
        return Ok(RobustSolution {
            covariance: &ols.normal_inverse * (ols.weighted_rss / dof),
            beta: ols.beta,
            residuals: ols.residuals,
            scale,
            condition_number: ols.condition_number,
            iterations: 1,
        });
    }

    let mut current: WeightedSolution = ols.clone();
    let mut iterations = 0;
    while iterations < max_iterations {
        iterations += 1;
        let weights = current.residuals.map(|r| norm.weight(r / scale));
        let next = solve_weighted(design, z, &weights, max_condition)?;

        let change = (&next.beta - &current.beta).norm() / current.beta.norm().max(f64::MIN_POSITIVE);
        current = next;
        scale = mad_scale(&current.residuals);

        if change < tolerance || scale <= zero_scale {
            break;
        }
    }

    let covariance = if scale <= zero_scale {
        // The majority of the observations is matched exactly.
        DMatrix::zeros(p, p)
    } else {
        h1_covariance(&current.residuals, scale, norm, &ols.normal_inverse, p).ok_or(
            AquiflowError::SingularFit {
                condition_number: current.condition_number,
            },
        )?
    };

    Ok(RobustSolution {
        beta: current.beta,
        covariance,
        residuals: current.residuals,
        scale,
        condition_number: current.condition_number,
        iterations,
    })
}

fn h1_covariance(
    residuals: &DVector<f64>,
    scale: f64,
    norm: RobustNorm,
    xtx_inverse: &DMatrix<f64>,
    p: usize,
) -> Option<DMatrix<f64>> {
    let n = residuals.len();
    let u = residuals.map(|r| r / scale);
    let psi = u.map(|ui| norm.psi(ui));
    let dpsi = u.map(|ui| norm.psi_prime(ui));

    let m = dpsi.mean();
    if !(m > 0.0) {
        return None;
    }
    let var_dpsi = dpsi.iter().map(|d| (d - m).powi(2)).sum::<f64>() / n as f64;
    let k = 1.0 + (p as f64 / n as f64) * var_dpsi / (m * m);
    let factor = k * k * psi.norm_squared() / (n - p) as f64 * scale * scale / (m * m);

    let cov = xtx_inverse * factor;
    cov.iter().all(|x| x.is_finite()).then_some(cov)
}

#[cfg(test)]
mod robust_test {
    use super::*;
    use crate::constants::{HUBER_T, TUKEY_C};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn line_design(x: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(x.len(), 2, |i, j| if j == 0 { 1.0 } else { x[i] })
    }

    #[test]
    fn test_norm_shapes() {
        let tukey = RobustNorm::Tukey { c: TUKEY_C };
        assert_relative_eq!(tukey.weight(0.0), 1.0);
        assert_relative_eq!(tukey.weight(TUKEY_C), 0.0);
        assert_relative_eq!(tukey.psi(10.0), 0.0);
        assert_relative_eq!(tukey.psi_prime(0.0), 1.0);

        let huber = RobustNorm::Huber { t: HUBER_T };
        assert_relative_eq!(huber.weight(1.0), 1.0);
        assert_relative_eq!(huber.weight(2.0 * HUBER_T), 0.5);
        assert_relative_eq!(huber.psi(-10.0), -HUBER_T);
        assert_relative_eq!(huber.psi_prime(10.0), 0.0);
    }

    #[test]
    fn test_mad_scale() {
        let r = DVector::from_vec(vec![-3.0, 1.0, 2.0, -1.0, 0.5]);
        assert_relative_eq!(mad_scale(&r), 1.0 / MAD_NORMAL_CONSISTENCY);
    }

    #[test]
    fn test_exact_data_returns_ols() {
        let x: Vec<f64> = (0..20).map(f64::from).collect();
        let design = line_design(&x);
        let z = DVector::from_iterator(20, x.iter().map(|xi| 1.0 - 0.5 * xi));
        let sol = fit_irls(&design, &z, RobustNorm::Tukey { c: TUKEY_C }, 50, 1e-8, 1e10).unwrap();
        assert_eq!(sol.iterations, 1);
        assert_relative_eq!(sol.beta[1], -0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_outlier_is_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let mut z = DVector::from_iterator(40, x.iter().map(|xi| 3.0 + 2.0 * xi + noise.sample(&mut rng)));
        z[39] += 40.0;
        let design = line_design(&x);

        let ones = DVector::from_element(40, 1.0);
        let ols = solve_weighted(&design, &z, &ones, 1e10).unwrap();
        assert!((ols.beta[1] - 2.0).abs() > 0.2);

        for norm in [RobustNorm::Tukey { c: TUKEY_C }, RobustNorm::Huber { t: HUBER_T }] {
            let sol = fit_irls(&design, &z, norm, 50, 1e-8, 1e10).unwrap();
            assert!((sol.beta[1] - 2.0).abs() < 0.05, "{norm:?}: slope {}", sol.beta[1]);
            assert!(sol.covariance[(1, 1)] > 0.0);
            assert!(sol.iterations >= 2);
        }
    }
}
