//! # Leave-one-out cross-validation
//!
//! Every well with a qualifying head becomes a target in turn: the conic model is fitted to
//! its neighbors within the search radius, **excluding the well itself**, and the fitted
//! potential at the well (coefficient `a`) is compared with the observed head.
//!
//! Wells whose neighborhood is too small or degenerate are skipped, with the same rules as
//! the venue analysis. Records come back in well order.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

use super::params::AnalysisParams;
use super::progress_bar::{fmt_dur, TargetProgress};
use super::FlowAnalysis;
use crate::aquiflow_errors::AquiflowError;
use crate::conic::ConicSample;
use crate::maybe_rayon::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationRecord {
    pub well_id: String,
    pub x: f64,
    pub y: f64,
    pub observed: f64,
    /// Fitted head at the well from its neighbors.
    pub estimated: f64,
    /// Standard deviation of the fitted head.
    pub stdev: f64,
    /// Number of neighbors in the fit.
    pub n: usize,
}

impl CrossValidationRecord {
    /// `observed − estimated`
    pub fn residual(&self) -> f64 {
        self.observed - self.estimated
    }
}

impl FlowAnalysis {
    /// Leave-one-out residuals of the conic model at every qualifying well.
    ///
    /// Return
    /// ----------
    /// * One [`CrossValidationRecord`] per well that could be fitted, in well order, or
    ///   [`AquiflowError::InvalidConfiguration`].
    pub fn cross_validate(&self, params: &AnalysisParams) -> Result<Vec<CrossValidationRecord>, AquiflowError> {
        params.validate()?;
        let filter = params.well_filter();
        let fitter = params.fitter();
        let wells = self.index().wells();

        info!(wells = wells.len(), method = %params.method, "cross-validation started");
        let start = Instant::now();
        let progress = TargetProgress::new(wells.len());

        let outcomes: Vec<Result<Option<CrossValidationRecord>, AquiflowError>> = (0..wells.len())
            .into_par_iter()
            .map(|k| {
                let well = &wells[k];
                let Some(observed) = filter.head(well) else {
                    return Ok(None);
                };
                let samples: Vec<ConicSample> = self
                    .index()
                    .query(&well.location, params.radius, &filter)
                    .into_iter()
                    .filter(|n| n.index != k)
                    .map(|n| ConicSample::relative_to(&well.location, &n.well.location, n.head))
                    .collect();
                progress.inc();
                if samples.len() < params.required {
                    return Ok(None);
                }
                match fitter.fit(&samples) {
                    Ok(fit) => Ok(Some(CrossValidationRecord {
                        well_id: well.id.clone(),
                        x: well.location.x,
                        y: well.location.y,
                        observed,
                        estimated: fit.a(),
                        stdev: fit.covariance[(0, 0)].max(0.0).sqrt(),
                        n: samples.len(),
                    })),
                    Err(err) if err.is_per_target() => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .collect();

        let records = outcomes
            .into_iter()
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()?;

        let elapsed = start.elapsed();
        progress.finish(elapsed, false);
        info!(
            fitted = records.len(),
            skipped = wells.len() - records.len(),
            elapsed = %fmt_dur(elapsed),
            "cross-validation finished"
        );
        Ok(records)
    }
}
