//! Neighborhood selection: radius query plus the minimum-count policy.

use super::grid::TargetLocation;
use super::params::AnalysisParams;
use crate::aquiflow_errors::AquiflowError;
use crate::conic::ConicSample;
use crate::wells::{NeighborWell, SpatialWellIndex};

/// A target and the wells qualifying for its local fit.
#[derive(Debug, Clone)]
pub struct Neighborhood<'a> {
    pub target: TargetLocation,
    pub wells: Vec<NeighborWell<'a>>,
}

impl Neighborhood<'_> {
    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }

    /// Target-centred observations for the conic fit.
    pub fn samples(&self) -> Vec<ConicSample> {
        let target = self.target.point();
        self.wells
            .iter()
            .map(|n| ConicSample::relative_to(&target, &n.well.location, n.head))
            .collect()
    }
}

/// Gather the wells around `target`.
///
/// Return
/// ----------
/// * The [`Neighborhood`], or [`AquiflowError::InsufficientNeighbors`] when fewer than
///   `params.required` wells qualify.
pub fn select_neighborhood<'a>(
    index: &'a SpatialWellIndex,
    target: TargetLocation,
    params: &AnalysisParams,
) -> Result<Neighborhood<'a>, AquiflowError> {
    let wells = index.query(&target.point(), params.radius, &params.well_filter());
    if wells.len() < params.required {
        return Err(AquiflowError::InsufficientNeighbors {
            found: wells.len(),
            required: params.required,
        });
    }
    Ok(Neighborhood { target, wells })
}
