//! # Result aggregation
//!
//! Workers finish targets in arbitrary order. [`ResultAggregator`] collects every per-target
//! outcome, counts the skipped ones by reason, and hands back the records sorted by grid
//! index `(i, j)`, i.e. in the order of the target grid.

use std::fmt;

use super::grid::TargetLocation;
use crate::aquiflow_errors::AquiflowError;
use crate::results::ResultRecord;

/// Counts of processed targets by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Targets generated inside the venue.
    pub targets: usize,
    pub fitted: usize,
    pub insufficient_neighbors: usize,
    pub singular_fit: usize,
    /// Targets never processed because the run was cancelled.
    pub cancelled: usize,
}

impl Diagnostics {
    pub fn skipped(&self) -> usize {
        self.insufficient_neighbors + self.singular_fit + self.cancelled
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Target diagnostics")?;
            writeln!(f, "------------------")?;
            writeln!(f, "  targets                : {}", self.targets)?;
            writeln!(f, "  fitted                 : {}", self.fitted)?;
            writeln!(f, "  insufficient neighbors : {}", self.insufficient_neighbors)?;
            writeln!(f, "  singular fit           : {}", self.singular_fit)?;
            write!(f, "  cancelled              : {}", self.cancelled)
        } else {
            write!(
                f,
                "targets={}, fitted={}, insufficient={}, singular={}, cancelled={}",
                self.targets,
                self.fitted,
                self.insufficient_neighbors,
                self.singular_fit,
                self.cancelled
            )
        }
    }
}

/// Final output of an analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    /// One record per fitted target, in grid order.
    pub records: Vec<ResultRecord>,
    pub diagnostics: Diagnostics,
    /// True when the run was cancelled before every target was processed.
    pub partial: bool,
}

/// Outcome of one target.
#[derive(Debug)]
pub enum TargetOutcome {
    Done(Result<ResultRecord, AquiflowError>),
    Cancelled,
}

#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<ResultRecord>,
    diagnostics: Diagnostics,
    partial: bool,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of `target`.
    ///
    /// Per-target failures are counted; any other error is returned to the caller.
    pub fn push(&mut self, target: &TargetLocation, outcome: TargetOutcome) -> Result<(), AquiflowError> {
        self.diagnostics.targets += 1;
        match outcome {
            TargetOutcome::Done(Ok(record)) => {
                self.diagnostics.fitted += 1;
                self.records.push(record);
            }
            TargetOutcome::Done(Err(AquiflowError::InsufficientNeighbors { found, required })) => {
                tracing::debug!(i = target.i, j = target.j, found, required, "target skipped: insufficient neighbors");
                self.diagnostics.insufficient_neighbors += 1;
            }
            TargetOutcome::Done(Err(AquiflowError::SingularFit { condition_number })) => {
                tracing::debug!(i = target.i, j = target.j, condition_number, "target skipped: singular fit");
                self.diagnostics.singular_fit += 1;
            }
            TargetOutcome::Done(Err(err)) => return Err(err),
            TargetOutcome::Cancelled => {
                self.diagnostics.cancelled += 1;
                self.partial = true;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> AnalysisOutcome {
        self.records.sort_by_key(|r| (r.i, r.j));
        AnalysisOutcome {
            records: self.records,
            diagnostics: self.diagnostics,
            partial: self.partial,
        }
    }
}

#[cfg(test)]
mod aggregator_test {
    use super::*;
    use crate::flow::FlowConvention;
    use nalgebra::{Matrix2, Vector2};

    fn target(i: i64, j: i64) -> TargetLocation {
        TargetLocation {
            x: i as f64,
            y: j as f64,
            i,
            j,
        }
    }

    fn record(i: i64, j: i64) -> ResultRecord {
        ResultRecord {
            xtarget: i as f64,
            ytarget: j as f64,
            i,
            j,
            n: 30,
            evp: Vector2::new(1.0, 0.0),
            varp: Matrix2::identity(),
            convention: FlowConvention::Vector,
        }
    }

    #[test]
    fn test_order_independent_of_completion() {
        let mut agg = ResultAggregator::new();
        for (i, j) in [(1, 0), (0, 1), (-1, 2), (0, -3)] {
            agg.push(&target(i, j), TargetOutcome::Done(Ok(record(i, j)))).unwrap();
        }
        agg.push(
            &target(2, 2),
            TargetOutcome::Done(Err(AquiflowError::InsufficientNeighbors { found: 3, required: 25 })),
        )
        .unwrap();
        agg.push(
            &target(3, 3),
            TargetOutcome::Done(Err(AquiflowError::SingularFit { condition_number: 1e14 })),
        )
        .unwrap();

        let outcome = agg.finish();
        let order: Vec<(i64, i64)> = outcome.records.iter().map(|r| (r.i, r.j)).collect();
        assert_eq!(order, vec![(-1, 2), (0, -3), (0, 1), (1, 0)]);
        assert_eq!(
            outcome.diagnostics,
            Diagnostics {
                targets: 6,
                fitted: 4,
                insufficient_neighbors: 1,
                singular_fit: 1,
                cancelled: 0
            }
        );
        assert!(!outcome.partial);
        assert_eq!(outcome.diagnostics.skipped(), 2);
    }

    #[test]
    fn test_cancelled_marks_partial() {
        let mut agg = ResultAggregator::new();
        agg.push(&target(0, 0), TargetOutcome::Done(Ok(record(0, 0)))).unwrap();
        agg.push(&target(0, 1), TargetOutcome::Cancelled).unwrap();
        let outcome = agg.finish();
        assert!(outcome.partial);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.diagnostics.cancelled, 1);
        assert_eq!(
            outcome.diagnostics.to_string(),
            "targets=2, fitted=1, insufficient=0, singular=0, cancelled=1"
        );
    }

    #[test]
    fn test_run_level_error_propagates() {
        let mut agg = ResultAggregator::new();
        let err = agg
            .push(
                &target(0, 0),
                TargetOutcome::Done(Err(AquiflowError::InvalidConfiguration("x".into()))),
            )
            .unwrap_err();
        assert_eq!(err, AquiflowError::InvalidConfiguration("x".into()));
    }
}
