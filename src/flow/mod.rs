//! # Flow direction from the fitted potential
//!
//! Groundwater flows down the discharge-potential gradient, so the flow vector at a target
//! is `(−b, −c)` where `(b, c)` are the linear coefficients of the local conic fit.
//!
//! Two output conventions are available ([`FlowConvention`]):
//!
//! * `Vector` – `evp = (−b, −c)`, `varp = Cov(b, c)` (the sign flip leaves it unchanged).
//! * `Polar` – `evp = (magnitude, direction)` with `direction = atan2(−c, −b)` in `[0, 2π)`,
//!   `varp` propagated by the delta method `J·Cov(b, c)·Jᵀ`. At zero magnitude the direction
//!   is undefined; its variance is set to that of a uniform angle (`π²/3`), the magnitude
//!   variance to `tr(Cov(b, c)) / 2`, and the cross terms to zero.

pub mod pnorm;

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::aquiflow_errors::AquiflowError;
use crate::conic::FitResult;
use crate::constants::DPI;
use pnorm::ProjectedNormal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowConvention {
    #[default]
    Vector,
    Polar,
}

impl FromStr for FlowConvention {
    type Err = AquiflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VECTOR" => Ok(FlowConvention::Vector),
            "POLAR" => Ok(FlowConvention::Polar),
            _ => Err(AquiflowError::InvalidConfiguration(format!(
                "unknown flow convention {s:?}"
            ))),
        }
    }
}

impl fmt::Display for FlowConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowConvention::Vector => f.write_str("vector"),
            FlowConvention::Polar => f.write_str("polar"),
        }
    }
}

/// Flow estimate expressed in a given convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowEstimate {
    pub evp: Vector2<f64>,
    pub varp: Matrix2<f64>,
    pub convention: FlowConvention,
}

/// Angle of `v` in `[0, 2π)`; a zero vector (of either sign) points along +x.
fn heading(v: &Vector2<f64>) -> f64 {
    if v.x == 0.0 && v.y == 0.0 {
        return 0.0;
    }
    let theta = v.y.atan2(v.x).rem_euclid(DPI);
    if theta < DPI {
        theta
    } else {
        0.0
    }
}

impl FlowEstimate {
    /// Convert the gradient of a conic fit into a flow estimate.
    pub fn from_fit(fit: &FitResult, convention: FlowConvention) -> Self {
        FlowEstimate::from_gradient(fit.gradient(), fit.gradient_covariance(), convention)
    }

    /// Flow estimate from the potential gradient `(b, c)` and its covariance.
    pub fn from_gradient(
        gradient: Vector2<f64>,
        covariance: Matrix2<f64>,
        convention: FlowConvention,
    ) -> Self {
        let flow = Vector2::zeros() - gradient;
        match convention {
            FlowConvention::Vector => FlowEstimate {
                evp: flow,
                varp: covariance,
                convention,
            },
            FlowConvention::Polar => {
                let (b, c) = (gradient.x, gradient.y);
                let m = flow.norm();
                let theta = heading(&flow);
                let varp = if m > 0.0 {
                    let jac = Matrix2::new(b / m, c / m, -c / (m * m), b / (m * m));
                    jac * covariance * jac.transpose()
                } else {
                    Matrix2::new(
                        0.5 * covariance.trace(),
                        0.0,
                        0.0,
                        std::f64::consts::PI.powi(2) / 3.0,
                    )
                };
                FlowEstimate {
                    evp: Vector2::new(m, theta),
                    varp,
                    convention,
                }
            }
        }
    }

    /// The flow vector and its covariance, whatever the stored convention.
    pub fn flow_vector(&self) -> (Vector2<f64>, Matrix2<f64>) {
        match self.convention {
            FlowConvention::Vector => (self.evp, self.varp),
            FlowConvention::Polar => {
                let (m, theta) = (self.evp.x, self.evp.y);
                let (s, c) = theta.sin_cos();
                let k = Matrix2::new(c, -m * s, s, m * c);
                (Vector2::new(m * c, m * s), k * self.varp * k.transpose())
            }
        }
    }

    pub fn magnitude(&self) -> f64 {
        match self.convention {
            FlowConvention::Vector => self.evp.norm(),
            FlowConvention::Polar => self.evp.x,
        }
    }

    /// Flow direction [rad] in `[0, 2π)`, counter-clockwise from the +x axis.
    pub fn direction(&self) -> f64 {
        match self.convention {
            FlowConvention::Vector => heading(&self.evp),
            FlowConvention::Polar => self.evp.y,
        }
    }

    /// Probability that the true flow direction lies within `±half_width` of the estimate.
    ///
    /// With a degenerate covariance all the mass sits at the estimated direction (1.0), or is
    /// spread uniformly when the estimated vector is zero.
    pub fn direction_probability(&self, half_width: f64) -> f64 {
        let (mu, sigma) = self.flow_vector();
        let theta = self.direction();
        match ProjectedNormal::new(mu, sigma) {
            Some(pn) => pn.probability(theta - half_width, theta + half_width),
            None if mu.norm() > 0.0 => 1.0,
            None => (2.0 * half_width / DPI).min(1.0),
        }
    }
}
