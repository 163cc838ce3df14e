//! # Spatial well index
//!
//! [`SpatialWellIndex`] buckets a well collection on a regular square grid so that radius
//! queries only visit the wells of the cells overlapping the query disc.
//!
//! ## Query contract
//!
//! [`SpatialWellIndex::query`] returns every well that satisfies **all** of:
//!
//! * Euclidean distance to the center `≤ radius` (inclusive),
//! * aquifer code in the filter's aquifer set,
//! * at least one finite measurement with `after ≤ date ≤ before`,
//!
//! together with its distance and the head chosen by the filter's [`HeadSelection`].
//! Results come in ascending well-index order (the order of the collection given to
//! [`SpatialWellIndex::new`]), which makes the output identical to a brute-force scan.
//!
//! The index is read-only after construction and is shared by reference between the
//! workers of an analysis run.

use std::collections::{HashMap, HashSet};

use ahash::RandomState;
use hifitime::Epoch;
use nalgebra::Point2;

use super::{AquiferCode, HeadSelection, Well};

pub type AquiferSet = HashSet<AquiferCode, RandomState>;

/// Attribute filters applied to every candidate well of a query.
#[derive(Debug, Clone, Copy)]
pub struct WellFilter<'a> {
    pub aquifers: &'a AquiferSet,
    pub after: Option<Epoch>,
    pub before: Option<Epoch>,
    pub selection: HeadSelection,
}

impl WellFilter<'_> {
    /// Head of `well` if it passes the aquifer and date filters.
    pub fn head(&self, well: &Well) -> Option<f64> {
        if !self.aquifers.contains(&well.aquifer) {
            return None;
        }
        well.head(self.after, self.before, self.selection)
    }
}

/// A well retained by a query.
#[derive(Debug, Clone, Copy)]
pub struct NeighborWell<'a> {
    pub well: &'a Well,
    /// Position of the well in the indexed collection.
    pub index: usize,
    pub distance: f64,
    pub head: f64,
}

#[derive(Debug)]
pub struct SpatialWellIndex {
    wells: Vec<Well>,
    cell_size: f64,
    origin: Point2<f64>,
    buckets: HashMap<(i64, i64), Vec<usize>, RandomState>,
}

impl SpatialWellIndex {
    /// Build the index with a cell size derived from the well density (about four wells
    /// per cell on average).
    pub fn new(wells: Vec<Well>) -> Self {
        let cell_size = density_cell_size(&wells);
        SpatialWellIndex::with_cell_size(wells, cell_size)
    }

    /// Build the index with an explicit cell size [m]. Non-positive or non-finite sizes fall
    /// back to the density-derived size.
    pub fn with_cell_size(wells: Vec<Well>, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            density_cell_size(&wells)
        };

        let origin = wells
            .iter()
            .map(|w| w.location)
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .fold(None::<Point2<f64>>, |acc, p| match acc {
                None => Some(p),
                Some(o) => Some(Point2::new(o.x.min(p.x), o.y.min(p.y))),
            })
            .unwrap_or_else(Point2::origin);

        let mut buckets: HashMap<(i64, i64), Vec<usize>, RandomState> = HashMap::default();
        for (index, well) in wells.iter().enumerate() {
            let p = well.location;
            if !(p.x.is_finite() && p.y.is_finite()) {
                continue;
            }
            buckets
                .entry(cell_of(&origin, cell_size, p.x, p.y))
                .or_default()
                .push(index);
        }

        SpatialWellIndex {
            wells,
            cell_size,
            origin,
            buckets,
        }
    }

    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }

    pub fn wells(&self) -> &[Well] {
        &self.wells
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Wells within `radius` of `center` passing `filter`, in ascending index order.
    ///
    /// Arguments
    /// -----------------
    /// * `center`: query point in projected coordinates [m].
    /// * `radius`: inclusive search radius [m].
    /// * `filter`: aquifer set, date window and head selection.
    ///
    /// Return
    /// ----------
    /// * The qualifying wells with their distance and selected head.
    pub fn query(&self, center: &Point2<f64>, radius: f64, filter: &WellFilter) -> Vec<NeighborWell<'_>> {
        if !(radius >= 0.0) || self.buckets.is_empty() {
            return Vec::new();
        }

        let (i0, j0) = cell_of(&self.origin, self.cell_size, center.x - radius, center.y - radius);
        let (i1, j1) = cell_of(&self.origin, self.cell_size, center.x + radius, center.y + radius);
        let spanned = i1
            .saturating_sub(i0)
            .saturating_add(1)
            .saturating_mul(j1.saturating_sub(j0).saturating_add(1));

        let mut candidates: Vec<usize> = if spanned > self.buckets.len() as i64 {
            self.buckets
                .iter()
                .filter(|((i, j), _)| (i0..=i1).contains(i) && (j0..=j1).contains(j))
                .flat_map(|(_, idx)| idx.iter().copied())
                .collect()
        } else {
            (i0..=i1)
                .flat_map(|i| (j0..=j1).map(move |j| (i, j)))
                .filter_map(|key| self.buckets.get(&key))
                .flat_map(|idx| idx.iter().copied())
                .collect()
        };
        candidates.sort_unstable();

        candidates
            .into_iter()
            .filter_map(|index| {
                let well = &self.wells[index];
                let distance = nalgebra::distance(center, &well.location);
                if !(distance <= radius) {
                    return None;
                }
                filter.head(well).map(|head| NeighborWell {
                    well,
                    index,
                    distance,
                    head,
                })
            })
            .collect()
    }
}

fn cell_of(origin: &Point2<f64>, cell_size: f64, x: f64, y: f64) -> (i64, i64) {
    (
        ((x - origin.x) / cell_size).floor() as i64,
        ((y - origin.y) / cell_size).floor() as i64,
    )
}

fn density_cell_size(wells: &[Well]) -> f64 {
    let finite = wells
        .iter()
        .map(|w| w.location)
        .filter(|p| p.x.is_finite() && p.y.is_finite());
    let (mut xmin, mut xmax, mut ymin, mut ymax) = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );
    let mut n = 0usize;
    for p in finite {
        xmin = xmin.min(p.x);
        xmax = xmax.max(p.x);
        ymin = ymin.min(p.y);
        ymax = ymax.max(p.y);
        n += 1;
    }
    if n < 2 {
        return 1.0;
    }
    let area = (xmax - xmin).max(1.0) * (ymax - ymin).max(1.0);
    (4.0 * area / n as f64).sqrt()
}

#[cfg(test)]
mod spatial_index_test {
    use super::*;
    use crate::wells::Measurement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn aquifers(codes: &[&str]) -> AquiferSet {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    fn random_wells(rng: &mut StdRng, n: usize) -> Vec<Well> {
        let codes = ["QBAA", "CJDN", "OSTP"];
        (0..n)
            .map(|k| {
                let year = rng.random_range(1980..2020);
                Well::new(
                    format!("W{k}"),
                    (rng.random_range(0.0..10_000.0), rng.random_range(0.0..10_000.0)),
                    codes[k % codes.len()].parse().unwrap(),
                    vec![Measurement::new(
                        Epoch::from_gregorian_utc_at_midnight(year, 7, 1),
                        rng.random_range(250.0..300.0),
                    )],
                )
            })
            .collect()
    }

    fn brute_force(wells: &[Well], center: &Point2<f64>, radius: f64, filter: &WellFilter) -> Vec<usize> {
        wells
            .iter()
            .enumerate()
            .filter(|(_, w)| nalgebra::distance(center, &w.location) <= radius)
            .filter(|(_, w)| filter.head(w).is_some())
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_query_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let wells = random_wells(&mut rng, 800);
        let set = aquifers(&["QBAA", "OSTP"]);
        let filter = WellFilter {
            aquifers: &set,
            after: Some(Epoch::from_gregorian_utc_at_midnight(1990, 1, 1)),
            before: None,
            selection: HeadSelection::MostRecent,
        };

        for cell in [50.0, 700.0, 5000.0, -1.0] {
            let index = SpatialWellIndex::with_cell_size(wells.clone(), cell);
            for _ in 0..100 {
                let center = Point2::new(rng.random_range(-500.0..10_500.0), rng.random_range(-500.0..10_500.0));
                let radius = rng.random_range(0.0..4000.0);
                let got: Vec<usize> = index
                    .query(&center, radius, &filter)
                    .iter()
                    .map(|n| n.index)
                    .collect();
                assert_eq!(got, brute_force(&wells, &center, radius, &filter));
            }
        }
    }

    #[test]
    fn test_radius_is_inclusive() {
        let set = aquifers(&["QBAA"]);
        let date = Epoch::from_gregorian_utc_at_midnight(2000, 1, 1);
        let wells = vec![
            Well::new("a", (3.0, 4.0), "QBAA".parse().unwrap(), vec![Measurement::new(date, 1.0)]),
            Well::new("b", (3.0, 4.1), "QBAA".parse().unwrap(), vec![Measurement::new(date, 2.0)]),
        ];
        let index = SpatialWellIndex::new(wells);
        let filter = WellFilter {
            aquifers: &set,
            after: None,
            before: None,
            selection: HeadSelection::MostRecent,
        };
        let hits = index.query(&Point2::origin(), 5.0, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].well.id, "a");
        assert_eq!(hits[0].distance, 5.0);
        assert_eq!(hits[0].head, 1.0);
    }

    #[test]
    fn test_empty_index() {
        let set = aquifers(&["QBAA"]);
        let index = SpatialWellIndex::new(Vec::new());
        assert!(index.is_empty());
        let filter = WellFilter {
            aquifers: &set,
            after: None,
            before: None,
            selection: HeadSelection::Mean,
        };
        assert!(index.query(&Point2::origin(), 100.0, &filter).is_empty());
    }
}
