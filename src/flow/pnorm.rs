//! # Projected normal distribution
//!
//! If the flow vector `X ~ N(μ, Σ)` in the plane, its direction `θ = atan2(X₂, X₁)` follows
//! the general projected normal distribution. With `r = (cos θ, sin θ)`:
//!
//! ```text
//! A = rᵀ Σ⁻¹ r      B = rᵀ Σ⁻¹ μ      C = μᵀ Σ⁻¹ μ
//! E = B / √A        D = 2π √det Σ
//!
//! f(θ) = [ exp(−C/2) + E · Φ(E) · √(2π) · exp((E² − C)/2) ] / (A · D)
//! ```
//!
//! By Cauchy–Schwarz `E² ≤ C`, so the exponentials never overflow. Interval probabilities
//! are computed by adaptive Simpson quadrature of `f` over panels placed around the mean
//! direction.

use nalgebra::{Matrix2, Vector2};
use statrs::function::erf::erfc;

use crate::constants::DPI;

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedNormal {
    mu: Vector2<f64>,
    sigma_inv: Matrix2<f64>,
    norm: f64,
    c: f64,
}

impl ProjectedNormal {
    /// Distribution of the direction of `N(mu, sigma)`.
    ///
    /// Return
    /// ----------
    /// * `None` when `sigma` is not symmetric positive definite.
    pub fn new(mu: Vector2<f64>, sigma: Matrix2<f64>) -> Option<Self> {
        let det = sigma.determinant();
        if !(sigma[(0, 0)] > 0.0 && det > 0.0) || !det.is_finite() || mu.iter().any(|m| !m.is_finite()) {
            return None;
        }
        let sigma_inv = sigma.try_inverse()?;
        let c = (mu.transpose() * sigma_inv * mu)[0];
        Some(ProjectedNormal {
            mu,
            sigma_inv,
            norm: DPI * det.sqrt(),
            c,
        })
    }

    /// Density at direction `theta` [rad].
    pub fn pdf(&self, theta: f64) -> f64 {
        let r = Vector2::new(theta.cos(), theta.sin());
        let a = (r.transpose() * self.sigma_inv * r)[0];
        let b = (r.transpose() * self.sigma_inv * self.mu)[0];
        let e = b / a.sqrt();
        let tail = (0.5 * (e * e - self.c)).min(0.0).exp();
        ((-0.5 * self.c).exp() + e * normal_cdf(e) * DPI.sqrt() * tail) / (a * self.norm)
    }

    /// Probability that the direction lies in `[lb, ub]` [rad].
    ///
    /// The interval is cut into panels around the mean direction, spaced by the angular
    /// spread, so that a concentrated density is seen by the first Simpson estimates.
    /// Each panel is refined until the combined absolute / relative tolerance is met, the
    /// depth limit is hit, or the evaluation budget is spent.
    pub fn probability(&self, lb: f64, ub: f64) -> f64 {
        if ub <= lb {
            return 0.0;
        }
        if ub - lb >= DPI {
            return 1.0;
        }
        let f = |t: f64| self.pdf(t);
        let mut quad = Simpson {
            f: &f,
            evaluations: 0,
        };
        let width = ub - lb;
        let breaks = self.breakpoints(lb, ub);
        let total: f64 = breaks
            .windows(2)
            .map(|w| {
                let tol = QUAD_ABS_TOL * (w[1] - w[0]) / width;
                quad.panel(w[0], w[1], tol)
            })
            .sum();
        total.clamp(0.0, 1.0)
    }

    /// Sorted panel edges of `[lb, ub]`: a uniform split plus nodes at
    /// `mean direction ± k · spread` that fall inside it.
    fn breakpoints(&self, lb: f64, ub: f64) -> Vec<f64> {
        let mut breaks: Vec<f64> = (0..=UNIFORM_PANELS)
            .map(|k| lb + (ub - lb) * k as f64 / UNIFORM_PANELS as f64)
            .collect();

        if self.c > 0.0 {
            let mean = self.mu.y.atan2(self.mu.x);
            let center = lb + (mean - lb).rem_euclid(DPI);
            // spread of the direction around the mean
            let spread = self.c.sqrt().recip().min(std::f64::consts::PI);
            for anchor in [center, center - DPI] {
                breaks.extend(
                    PEAK_OFFSETS
                        .iter()
                        .map(|k| anchor + k * spread)
                        .filter(|t| *t > lb && *t < ub),
                );
            }
        }
        breaks.sort_by(f64::total_cmp);
        breaks.dedup_by(|a, b| (*a - *b).abs() <= f64::EPSILON * (1.0 + b.abs()));
        breaks
    }
}

/// Absolute tolerance of [`ProjectedNormal::probability`].
const QUAD_ABS_TOL: f64 = 1.49e-8;
/// Relative tolerance of [`ProjectedNormal::probability`].
const QUAD_REL_TOL: f64 = 1.49e-8;
const QUAD_MAX_DEPTH: usize = 30;
const QUAD_MAX_EVALUATIONS: usize = 20_000;
const UNIFORM_PANELS: usize = 8;
const PEAK_OFFSETS: [f64; 11] = [-16.0, -8.0, -4.0, -2.0, -1.0, 0.0, 1.0, 2.0, 4.0, 8.0, 16.0];

/// Adaptive Simpson integrator with a shared evaluation budget.
struct Simpson<'a, F: Fn(f64) -> f64> {
    f: &'a F,
    evaluations: usize,
}

impl<F: Fn(f64) -> f64> Simpson<'_, F> {
    fn eval(&mut self, t: f64) -> f64 {
        self.evaluations += 1;
        (self.f)(t)
    }

    fn panel(&mut self, a: f64, b: f64, tol: f64) -> f64 {
        let (fa, fm, fb) = (self.eval(a), self.eval(0.5 * (a + b)), self.eval(b));
        let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);
        self.refine(a, b, [fa, fm, fb], whole, tol, QUAD_MAX_DEPTH)
    }

    fn refine(&mut self, a: f64, b: f64, fs: [f64; 3], whole: f64, tol: f64, depth: usize) -> f64 {
        let [fa, fm, fb] = fs;
        let m = 0.5 * (a + b);
        let (flm, frm) = (self.eval(0.5 * (a + m)), self.eval(0.5 * (m + b)));
        let left = (m - a) / 6.0 * (fa + 4.0 * flm + fm);
        let right = (b - m) / 6.0 * (fm + 4.0 * frm + fb);
        let estimate = left + right;
        let delta = estimate - whole;

        // roundoff floor: never ask for more than the sum can resolve
        let floor = 64.0 * f64::EPSILON * estimate.abs().max(whole.abs());
        let accepted = tol.max(QUAD_REL_TOL * estimate.abs()).max(floor);
        if depth == 0 || self.evaluations >= QUAD_MAX_EVALUATIONS || delta.abs() <= 15.0 * accepted {
            return estimate + delta / 15.0;
        }
        self.refine(a, m, [fa, flm, fm], left, 0.5 * tol, depth - 1)
            + self.refine(m, b, [fm, frm, fb], right, 0.5 * tol, depth - 1)
    }
}
