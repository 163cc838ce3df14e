//! # Planar geometry for venue boundaries
//!
//! [`Polygon`] is a simple (non self-intersecting) closed ring of vertices in projected
//! coordinates [m]. It is the only shape the analysis core understands: circles and
//! rectangles are discretised into rings by [`crate::venues`].
//!
//! ## Conventions
//!
//! * The ring is **closed**: the first vertex is repeated as the last one.
//! * Vertices are stored **counter-clockwise** (domain on the left). A clockwise ring is
//!   reversed on construction, so [`Polygon::area`] is always positive.
//! * [`Polygon::contains_point`] is **boundary inclusive**: a point lying on an edge or on a
//!   vertex counts as inside. Target grids rely on this, e.g. the nodes on the sides of a
//!   square venue are retained.

use nalgebra::Point2;

use crate::aquiflow_errors::AquiflowError;

/// Axis-aligned bounding box `[xmin, xmax] × [ymin, ymax]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Length scale used for geometric tolerances.
    pub(crate) fn scale(&self) -> f64 {
        self.width().max(self.height()).max(1.0)
    }
}

/// A closed, counter-clockwise polygon ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2<f64>>,
    extent: Extent,
    area: f64,
}

impl Polygon {
    /// Build a polygon from a closed ring of `(x, y)` vertices.
    ///
    /// Arguments
    /// -----------------
    /// * `ring`: vertices with the first vertex repeated as the last one.
    ///
    /// Return
    /// ----------
    /// * The validated polygon, oriented counter-clockwise.
    /// * [`AquiflowError::InvalidVenue`] if the ring is not closed, has fewer than three
    ///   distinct vertices, contains non-finite coordinates, or encloses zero area.
    pub fn new(ring: Vec<(f64, f64)>) -> Result<Self, AquiflowError> {
        if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(AquiflowError::InvalidVenue(
                "ring contains non-finite coordinates".into(),
            ));
        }
        if ring.len() < 4 || ring.first() != ring.last() {
            return Err(AquiflowError::InvalidVenue(
                "ring must be closed (first vertex repeated as last)".into(),
            ));
        }

        let mut vertices: Vec<Point2<f64>> =
            ring.iter().map(|&(x, y)| Point2::new(x, y)).collect();

        let mut distinct: Vec<(f64, f64)> = ring[..ring.len() - 1].to_vec();
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(AquiflowError::InvalidVenue(format!(
                "ring has {} distinct vertices, at least 3 are required",
                distinct.len()
            )));
        }

        let mut area = signed_area(&vertices);
        let extent = extent_of(&vertices);
        if area.abs() <= f64::EPSILON * extent.scale() * extent.scale() {
            return Err(AquiflowError::InvalidVenue("ring encloses zero area".into()));
        }
        if area < 0.0 {
            vertices.reverse();
            area = -area;
        }

        Ok(Polygon {
            vertices,
            extent,
            area,
        })
    }

    /// Axis-aligned rectangle `[xmin, xmax] × [ymin, ymax]` as a polygon.
    pub fn rectangle(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, AquiflowError> {
        if !(xmin < xmax && ymin < ymax) {
            return Err(AquiflowError::InvalidVenue(format!(
                "rectangle bounds must satisfy xmin < xmax and ymin < ymax, got [{xmin}, {xmax}] x [{ymin}, {ymax}]"
            )));
        }
        Polygon::new(vec![
            (xmin, ymin),
            (xmax, ymin),
            (xmax, ymax),
            (xmin, ymax),
            (xmin, ymin),
        ])
    }

    /// Regular `n`-gon inscribed in the circle `(center, radius)`.
    pub fn circle(center: (f64, f64), radius: f64, n: usize) -> Result<Self, AquiflowError> {
        if !(radius > 0.0) || n < 3 {
            return Err(AquiflowError::InvalidVenue(format!(
                "circle needs radius > 0 and at least 3 vertices, got radius {radius} with {n} vertices"
            )));
        }
        let mut ring: Vec<(f64, f64)> = (0..n)
            .map(|k| {
                let theta = crate::constants::DPI * k as f64 / n as f64;
                (
                    center.0 + radius * theta.cos(),
                    center.1 + radius * theta.sin(),
                )
            })
            .collect();
        ring.push(ring[0]);
        Polygon::new(ring)
    }

    /// The closed ring, counter-clockwise, first vertex repeated as last.
    pub fn boundary(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Enclosed area [m²], always positive.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn perimeter(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// Area centroid of the ring.
    pub fn centroid(&self) -> Point2<f64> {
        let (mut sumx, mut sumy) = (0.0, 0.0);
        for w in self.vertices.windows(2) {
            let cross = w[0].x * w[1].y - w[1].x * w[0].y;
            sumx += (w[0].x + w[1].x) * cross;
            sumy += (w[0].y + w[1].y) * cross;
        }
        Point2::new(sumx / (6.0 * self.area), sumy / (6.0 * self.area))
    }

    /// Boundary-inclusive point-in-polygon test.
    ///
    /// Points within a tolerance of `1e-9 × extent size` from an edge are reported inside;
    /// otherwise the even-odd crossing rule decides.
    pub fn contains_point(&self, point: &Point2<f64>) -> bool {
        let e = &self.extent;
        let tol = 1e-9 * e.scale();
        if point.x < e.xmin - tol
            || point.x > e.xmax + tol
            || point.y < e.ymin - tol
            || point.y > e.ymax + tol
        {
            return false;
        }

        if self
            .vertices
            .windows(2)
            .any(|w| on_segment(&w[0], &w[1], point, tol))
        {
            return true;
        }

        let mut inside = false;
        for w in self.vertices.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if (a.y > point.y) != (b.y > point.y) {
                let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if point.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn signed_area(vertices: &[Point2<f64>]) -> f64 {
    vertices
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>()
        / 2.0
}

fn extent_of(vertices: &[Point2<f64>]) -> Extent {
    vertices.iter().fold(
        Extent {
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymin: f64::INFINITY,
            ymax: f64::NEG_INFINITY,
        },
        |e, p| Extent {
            xmin: e.xmin.min(p.x),
            xmax: e.xmax.max(p.x),
            ymin: e.ymin.min(p.y),
            ymax: e.ymax.max(p.y),
        },
    )
}

fn on_segment(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>, tol: f64) -> bool {
    let ab = b - a;
    let ap = p - a;
    let len = ab.norm();
    if len == 0.0 {
        return ap.norm() <= tol;
    }
    let cross = ab.x * ap.y - ab.y * ap.x;
    if cross.abs() > tol * len {
        return false;
    }
    let t = ab.dot(&ap) / (len * len);
    t >= -tol / len && t <= 1.0 + tol / len
}
