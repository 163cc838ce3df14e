//! # Target grid
//!
//! Targets are the nodes `anchor + (i·s, j·s)` of a square lattice anchored at the venue
//! centroid, restricted to the bounding box of the venue and then to the polygon itself
//! (boundary inclusive). The sequence is:
//!
//! * **lazy** – nodes are produced on demand by [`TargetGrid::iter`];
//! * **deterministic** – row-major by `(i, j)` ascending: `i` (x-offset) in the outer loop,
//!   `j` (y-offset) in the inner loop;
//! * **restartable** – every call to [`TargetGrid::iter`] starts over.

use itertools::Itertools;
use nalgebra::Point2;

use crate::geometry::Polygon;

/// A grid node retained inside the venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLocation {
    pub x: f64,
    pub y: f64,
    pub i: i64,
    pub j: i64,
}

impl TargetLocation {
    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone)]
pub struct TargetGrid<'a> {
    polygon: &'a Polygon,
    spacing: f64,
    anchor: Point2<f64>,
    i_range: (i64, i64),
    j_range: (i64, i64),
}

impl<'a> TargetGrid<'a> {
    /// Lattice over `polygon` with node distance `spacing` [m] and origin `anchor`.
    ///
    /// `spacing` must be positive and finite; the caller validates it through the analysis
    /// parameters.
    pub fn new(polygon: &'a Polygon, spacing: f64, anchor: Point2<f64>) -> Self {
        let e = polygon.extent();
        // Nodes landing on the extent edge up to rounding are kept.
        let tol = 1e-9;
        let lo = |min: f64, a: f64| ((min - a) / spacing - tol).ceil() as i64;
        let hi = |max: f64, a: f64| ((max - a) / spacing + tol).floor() as i64;

        let (i_range, j_range) = if polygon.area() > 0.0 {
            (
                (lo(e.xmin, anchor.x), hi(e.xmax, anchor.x)),
                (lo(e.ymin, anchor.y), hi(e.ymax, anchor.y)),
            )
        } else {
            ((0, -1), (0, -1))
        };

        TargetGrid {
            polygon,
            spacing,
            anchor,
            i_range,
            j_range,
        }
    }

    /// Number of lattice nodes in the bounding box (before the polygon test).
    pub fn candidate_count(&self) -> usize {
        let span = |(lo, hi): (i64, i64)| (hi - lo + 1).max(0) as usize;
        span(self.i_range) * span(self.j_range)
    }

    /// Lazily enumerate the targets inside the polygon.
    pub fn iter(&self) -> impl Iterator<Item = TargetLocation> + '_ {
        (self.i_range.0..=self.i_range.1)
            .cartesian_product(self.j_range.0..=self.j_range.1)
            .map(move |(i, j)| TargetLocation {
                x: self.anchor.x + i as f64 * self.spacing,
                y: self.anchor.y + j as f64 * self.spacing,
                i,
                j,
            })
            .filter(move |t| self.polygon.contains_point(&t.point()))
    }
}

#[cfg(test)]
mod grid_test {
    use super::*;

    #[test]
    fn test_unit_square_nine_nodes() {
        let square = Polygon::rectangle(0.0, 10.0, 0.0, 10.0).unwrap();
        let grid = TargetGrid::new(&square, 5.0, square.centroid());
        let targets: Vec<(f64, f64, i64, i64)> = grid.iter().map(|t| (t.x, t.y, t.i, t.j)).collect();
        assert_eq!(
            targets,
            vec![
                (0.0, 0.0, -1, -1),
                (0.0, 5.0, -1, 0),
                (0.0, 10.0, -1, 1),
                (5.0, 0.0, 0, -1),
                (5.0, 5.0, 0, 0),
                (5.0, 10.0, 0, 1),
                (10.0, 0.0, 1, -1),
                (10.0, 5.0, 1, 0),
                (10.0, 10.0, 1, 1),
            ]
        );
    }

    #[test]
    fn test_restartable_and_deterministic() {
        let tri = Polygon::new(vec![(0.0, 0.0), (100.0, 0.0), (0.0, 80.0), (0.0, 0.0)]).unwrap();
        let grid = TargetGrid::new(&tri, 7.0, tri.centroid());
        let first: Vec<_> = grid.iter().collect();
        let second: Vec<_> = grid.iter().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
        assert!(first.len() < grid.candidate_count());
        assert!(first.iter().all(|t| tri.contains_point(&t.point())));
        assert!(first
            .windows(2)
            .all(|w| (w[0].i, w[0].j) < (w[1].i, w[1].j)));
    }

    #[test]
    fn test_spacing_larger_than_venue() {
        let square = Polygon::rectangle(0.0, 10.0, 0.0, 10.0).unwrap();
        let grid = TargetGrid::new(&square, 1000.0, square.centroid());
        let targets: Vec<_> = grid.iter().collect();
        assert_eq!(targets.len(), 1);
        assert_eq!((targets[0].x, targets[0].y), (5.0, 5.0));
    }
}
