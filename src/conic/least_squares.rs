//! Weighted linear least squares by singular value decomposition.
//!
//! The weighted problem `min Σ wᵢ (zᵢ − xᵢᵀβ)²` is rewritten as the ordinary problem on the
//! row-scaled design `√W·X` and solved from its thin SVD `U Σ Vᵀ`:
//!
//! ```text
//! β            = V Σ⁻¹ Uᵀ (√W z)
//! (XᵀWX)⁻¹     = V Σ⁻² Vᵀ
//! cond(√W·X)   = σmax / σmin
//! ```
//!
//! The condition number is checked against the configured ceiling before anything is
//! inverted, so rank-deficient designs surface as [`AquiflowError::SingularFit`] instead of
//! producing non-finite coefficients.

use nalgebra::{DMatrix, DVector};

use crate::aquiflow_errors::AquiflowError;

/// Solution of one weighted least-squares problem, in the coordinates of the design matrix.
#[derive(Debug, Clone)]
pub(crate) struct WeightedSolution {
    pub beta: DVector<f64>,
    /// `(XᵀWX)⁻¹`, not yet multiplied by any residual variance.
    pub normal_inverse: DMatrix<f64>,
    /// `z − Xβ` (unweighted).
    pub residuals: DVector<f64>,
    /// `Σ wᵢ rᵢ²`.
    pub weighted_rss: f64,
    pub condition_number: f64,
}

/// Solve the weighted least-squares problem `design · β ≈ z` with weights `w`.
///
/// Arguments
/// -----------------
/// * `design`: `n × p` design matrix.
/// * `z`: response vector of length `n`.
/// * `w`: non-negative weights of length `n`.
/// * `max_condition`: ceiling on `σmax / σmin` of the weighted design.
///
/// Return
/// ----------
/// * The [`WeightedSolution`], or [`AquiflowError::SingularFit`] when the weighted design is
///   rank deficient, too ill-conditioned, or yields non-finite numbers.
pub(crate) fn solve_weighted(
    design: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
    max_condition: f64,
) -> Result<WeightedSolution, AquiflowError> {
    let (n, p) = design.shape();
    if n < p {
        return Err(AquiflowError::SingularFit {
            condition_number: f64::INFINITY,
        });
    }

    let sqrt_w = w.map(|wi| wi.max(0.0).sqrt());
    let weighted_design = DMatrix::from_fn(n, p, |i, j| design[(i, j)] * sqrt_w[i]);
    let weighted_z = z.component_mul(&sqrt_w);

    let svd = weighted_design.svd(true, true);
    let sv = &svd.singular_values;
    let condition_number = sv.max() / sv.min();
    if !(condition_number <= max_condition) {
        return Err(AquiflowError::SingularFit { condition_number });
    }

    let (Some(u), Some(v_t)) = (svd.u.as_ref(), svd.v_t.as_ref()) else {
        return Err(AquiflowError::SingularFit { condition_number });
    };

    let inv_sv = sv.map(|s| 1.0 / s);
    let v = v_t.transpose();
    let beta = &v * (u.transpose() * &weighted_z).component_mul(&inv_sv);
    let normal_inverse = &v * DMatrix::from_diagonal(&inv_sv.map(|s| s * s)) * v_t;

    let residuals = z - design * &beta;
    let weighted_rss = residuals
        .iter()
        .zip(w.iter())
        .map(|(r, wi)| wi * r * r)
        .sum::<f64>();

    if beta.iter().chain(normal_inverse.iter()).any(|x| !x.is_finite()) || !weighted_rss.is_finite()
    {
        return Err(AquiflowError::SingularFit { condition_number });
    }

    Ok(WeightedSolution {
        beta,
        normal_inverse,
        residuals,
        weighted_rss,
        condition_number,
    })
}
