//! # Venue flow analysis
//!
//! [`FlowAnalysis`] owns the [`SpatialWellIndex`] built once from the well collection and
//! runs the per-target pipeline over a venue:
//!
//! ```text
//! venue polygon ─► TargetGrid ─► select_neighborhood ─► ConicFitter ─► FlowEstimate
//!                                                                        │
//!                                 AnalysisOutcome ◄─ ResultAggregator ◄──┘
//! ```
//!
//! ## Execution
//! -----------------
//! Targets are independent: with the `parallel` feature (default) they are dispatched on
//! the rayon thread pool, otherwise processed sequentially through the same code path.
//! Workers share only the read-only index, the parameters and an atomic cancellation
//! latch. The output order is the grid order, whatever the completion order.
//!
//! ## Cooperative cancellation
//! -----------------
//! [`FlowAnalysis::by_venue_with_cancel`] polls `should_cancel()` before each target. Once
//! it returns `true` the latch is set, the remaining targets are counted as cancelled, and
//! the outcome is flagged [`AnalysisOutcome::partial`] while keeping every completed record.
//!
//! ## Error semantics
//! -----------------
//! * Run-level errors ([`AquiflowError::InvalidConfiguration`], data-source failures) are
//!   returned before any target is processed.
//! * Per-target failures ([`AquiflowError::InsufficientNeighbors`],
//!   [`AquiflowError::SingularFit`]) only thin the output and are counted in
//!   [`Diagnostics`].
//!
//! ## Examples
//! -----------------
//! ```rust,no_run
//! use aquiflow::{AnalysisParams, FlowAnalysis, Venue};
//! # fn demo(wells: Vec<aquiflow::Well>) -> Result<(), aquiflow::AquiflowError> {
//! let analysis = FlowAnalysis::new(wells);
//! let venue = Venue::frame("Study area", 470_000.0, 490_000.0, 4_970_000.0, 4_990_000.0)?;
//! let params = AnalysisParams::builder()
//!     .aquifers(["QBAA".parse()?])
//!     .build()?;
//! let outcome = analysis.by_venue(&venue, &params)?;
//! println!("{}", outcome.diagnostics);
//! # Ok(()) }
//! ```

pub mod aggregator;
pub mod cross_validation;
pub mod grid;
pub mod neighborhood;
pub mod params;
pub mod progress_bar;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

pub use aggregator::{AnalysisOutcome, Diagnostics};
pub use cross_validation::CrossValidationRecord;
pub use grid::{TargetGrid, TargetLocation};
pub use params::AnalysisParams;

use crate::aquiflow_errors::AquiflowError;
use crate::flow::FlowEstimate;
use crate::maybe_rayon::*;
use crate::results::ResultRecord;
use crate::venues::{Venue, VenueKind, VenueSource};
use crate::wells::source::{load_wells, WellSource};
use crate::wells::{SpatialWellIndex, Well};
use aggregator::{ResultAggregator, TargetOutcome};
use neighborhood::select_neighborhood;
use progress_bar::{fmt_dur, TargetProgress};

#[derive(Debug)]
pub struct FlowAnalysis {
    index: SpatialWellIndex,
}

impl FlowAnalysis {
    /// Index `wells` and prepare the analysis.
    pub fn new(wells: Vec<Well>) -> Self {
        FlowAnalysis {
            index: SpatialWellIndex::new(wells),
        }
    }

    pub fn with_index(index: SpatialWellIndex) -> Self {
        FlowAnalysis { index }
    }

    /// Load the wells from a collaborator; its failures surface as
    /// [`AquiflowError::DataSource`].
    pub fn from_source<S: WellSource + ?Sized>(source: &S) -> Result<Self, AquiflowError> {
        Ok(FlowAnalysis::new(load_wells(source)?))
    }

    pub fn index(&self) -> &SpatialWellIndex {
        &self.index
    }

    /// Target grid of `venue`, anchored at its centroid.
    pub fn targets<'v>(venue: &'v Venue, params: &AnalysisParams) -> Result<TargetGrid<'v>, AquiflowError> {
        params.validate()?;
        Ok(TargetGrid::new(venue.polygon(), params.spacing, venue.centroid()))
    }

    /// Select, fit and estimate the flow at a single target.
    ///
    /// Return
    /// ----------
    /// * The [`ResultRecord`], or a per-target error
    ///   ([`AquiflowError::InsufficientNeighbors`] / [`AquiflowError::SingularFit`]).
    pub fn analyze_target(&self, target: TargetLocation, params: &AnalysisParams) -> Result<ResultRecord, AquiflowError> {
        let hood = select_neighborhood(&self.index, target, params)?;
        let fit = params.fitter().fit(&hood.samples())?;
        let estimate = FlowEstimate::from_fit(&fit, params.convention);
        Ok(ResultRecord {
            xtarget: target.x,
            ytarget: target.y,
            i: target.i,
            j: target.j,
            n: hood.len(),
            evp: estimate.evp,
            varp: estimate.varp,
            convention: estimate.convention,
        })
    }

    /// Run the analysis over every target of `venue`.
    pub fn by_venue(&self, venue: &Venue, params: &AnalysisParams) -> Result<AnalysisOutcome, AquiflowError> {
        self.by_venue_with_cancel(venue, params, || false)
    }

    /// Run the analysis over every target of `venue`, polling `should_cancel` between targets.
    ///
    /// Arguments
    /// -----------------
    /// * `venue`: the analysed domain.
    /// * `params`: validated configuration; re-checked before anything runs.
    /// * `should_cancel`: called before each target; `true` stops the run.
    ///
    /// Return
    /// ----------
    /// * The [`AnalysisOutcome`] (flagged partial when cancelled), or a run-level error.
    pub fn by_venue_with_cancel<F>(
        &self,
        venue: &Venue,
        params: &AnalysisParams,
        should_cancel: F,
    ) -> Result<AnalysisOutcome, AquiflowError>
    where
        F: Fn() -> bool + Sync,
    {
        let grid = FlowAnalysis::targets(venue, params)?;
        let targets: Vec<TargetLocation> = grid.iter().collect();

        info!(
            venue = %venue,
            targets = targets.len(),
            wells = self.index.len(),
            method = %params.method,
            "flow analysis started"
        );
        let start = Instant::now();
        let cancelled = AtomicBool::new(false);
        let progress = TargetProgress::new(targets.len());

        let outcomes: Vec<(TargetLocation, TargetOutcome)> = targets
            .into_par_iter()
            .map(|target| {
                if cancelled.load(Ordering::Relaxed) || should_cancel() {
                    cancelled.store(true, Ordering::Relaxed);
                    return (target, TargetOutcome::Cancelled);
                }
                let outcome = TargetOutcome::Done(self.analyze_target(target, params));
                progress.inc();
                (target, outcome)
            })
            .collect();

        let mut aggregator = ResultAggregator::new();
        for (target, outcome) in outcomes {
            aggregator.push(&target, outcome)?;
        }
        let outcome = aggregator.finish();

        let elapsed = start.elapsed();
        progress.finish(elapsed, outcome.partial);
        if outcome.partial {
            warn!(
                venue = %venue,
                completed = outcome.diagnostics.fitted,
                cancelled = outcome.diagnostics.cancelled,
                "flow analysis cancelled, returning partial results"
            );
        }
        info!(
            venue = %venue,
            fitted = outcome.diagnostics.fitted,
            skipped = outcome.diagnostics.skipped(),
            elapsed = %fmt_dur(elapsed),
            "flow analysis finished"
        );
        Ok(outcome)
    }

    /// Fetch the venue from a collaborator and analyse it.
    pub fn by_venue_code<S: VenueSource + ?Sized>(
        &self,
        source: &S,
        kind: VenueKind,
        code: &str,
        params: &AnalysisParams,
    ) -> Result<AnalysisOutcome, AquiflowError> {
        params.validate()?;
        let venue = source.venue(kind, code).map_err(AquiflowError::data_source)?;
        self.by_venue(&venue, params)
    }
}

#[cfg(test)]
mod analysis_test {
    use super::*;
    use crate::wells::Measurement;
    use hifitime::Epoch;

    fn grid_wells() -> Vec<Well> {
        let date = Epoch::from_gregorian_utc_at_midnight(2018, 4, 1);
        (0..21)
            .flat_map(|i| (0..21).map(move |j| (i, j)))
            .map(|(i, j)| {
                let (x, y) = (100.0 * i as f64, 100.0 * j as f64);
                Well::new(
                    format!("{i}-{j}"),
                    (x, y),
                    "QBAA".parse().unwrap(),
                    vec![Measurement::new(date, 200.0 + 1e-3 * x)],
                )
            })
            .collect()
    }

    fn params() -> AnalysisParams {
        AnalysisParams::builder()
            .aquifers(["QBAA".parse().unwrap()])
            .method(params::FitMethod::Ols)
            .radius(450.0)
            .spacing(500.0)
            .required(20)
            .build()
            .unwrap()
    }

    #[test]
    fn test_flow_points_down_gradient() {
        let analysis = FlowAnalysis::new(grid_wells());
        let venue = Venue::frame("Grid", 0.0, 2000.0, 0.0, 2000.0).unwrap();
        let outcome = analysis.by_venue(&venue, &params()).unwrap();
        assert_eq!(outcome.diagnostics.targets, 25);
        assert_eq!(outcome.records.len(), 25);
        for record in &outcome.records {
            assert!((record.evp.x + 1e-3).abs() < 1e-9);
            assert!(record.evp.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_params_stop_before_any_target() {
        let analysis = FlowAnalysis::new(grid_wells());
        let venue = Venue::frame("Grid", 0.0, 2000.0, 0.0, 2000.0).unwrap();
        let mut params = params();
        params.spacing = -1.0;
        assert!(matches!(
            analysis.by_venue(&venue, &params),
            Err(AquiflowError::InvalidConfiguration(_))
        ));
        params.spacing = 500.0;
        params.aquifers.clear();
        assert!(matches!(
            analysis.cross_validate(&params),
            Err(AquiflowError::InvalidConfiguration(_))
        ));
    }
}
