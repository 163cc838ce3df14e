//! # Venues
//!
//! A [`Venue`] is the polygonal domain over which analysis targets are generated. The set of
//! venue kinds is closed:
//!
//! | Kind           | Shape                         | Identifying code        |
//! |----------------|-------------------------------|-------------------------|
//! | `City`         | polygon                       | GNIS identifier         |
//! | `Township`     | polygon                       | GNIS identifier         |
//! | `County`       | polygon                       | FIPS code               |
//! | `Watershed`    | polygon                       | HUC10                   |
//! | `Subregion`    | polygon                       | HUC8                    |
//! | `Neighborhood` | circle (center + radius)      | –                       |
//! | `Frame`        | axis-aligned rectangle        | –                       |
//! | `Patch`        | arbitrary user polygon        | –                       |
//!
//! Every kind exposes the same capabilities: [`Venue::boundary`], [`Venue::centroid`],
//! [`Venue::polygon`], [`Venue::name`] and [`Venue::kind`]. Boundaries are supplied by an
//! external collaborator (see [`VenueSource`]); this module never reads geodatabases.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::aquiflow_errors::AquiflowError;
use crate::constants::CIRCLE_VERTICES;
use crate::geometry::Polygon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueKind {
    City,
    Township,
    County,
    Watershed,
    Subregion,
    Neighborhood,
    Frame,
    Patch,
}

/// A named administrative or hydrologic unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArea {
    pub name: String,
    pub code: String,
    pub polygon: Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Venue {
    City(NamedArea),
    Township(NamedArea),
    County(NamedArea),
    Watershed(NamedArea),
    Subregion(NamedArea),
    Neighborhood {
        name: String,
        center: Point2<f64>,
        radius: f64,
        polygon: Polygon,
    },
    Frame {
        name: String,
        polygon: Polygon,
    },
    Patch {
        name: String,
        polygon: Polygon,
    },
}

impl Venue {
    /// Build a named polygonal venue of one of the administrative / hydrologic kinds.
    ///
    /// Arguments
    /// -----------------
    /// * `kind`: one of `City`, `Township`, `County`, `Watershed`, `Subregion`.
    /// * `name`: display name, e.g. `"Hennepin"`.
    /// * `code`: identifying code from the source database.
    /// * `ring`: closed vertex ring in projected coordinates [m].
    ///
    /// Return
    /// ----------
    /// * The venue, or [`AquiflowError::InvalidVenue`] for a degenerate ring or a kind that is
    ///   not a named area.
    pub fn named(
        kind: VenueKind,
        name: impl Into<String>,
        code: impl Into<String>,
        ring: Vec<(f64, f64)>,
    ) -> Result<Self, AquiflowError> {
        let area = NamedArea {
            name: name.into(),
            code: code.into(),
            polygon: Polygon::new(ring)?,
        };
        match kind {
            VenueKind::City => Ok(Venue::City(area)),
            VenueKind::Township => Ok(Venue::Township(area)),
            VenueKind::County => Ok(Venue::County(area)),
            VenueKind::Watershed => Ok(Venue::Watershed(area)),
            VenueKind::Subregion => Ok(Venue::Subregion(area)),
            other => Err(AquiflowError::InvalidVenue(format!(
                "{other:?} is not a named area kind"
            ))),
        }
    }

    /// Circular venue discretised into a regular polygon.
    pub fn neighborhood(
        name: impl Into<String>,
        center: (f64, f64),
        radius: f64,
    ) -> Result<Self, AquiflowError> {
        let polygon = Polygon::circle(center, radius, CIRCLE_VERTICES)?;
        Ok(Venue::Neighborhood {
            name: name.into(),
            center: Point2::new(center.0, center.1),
            radius,
            polygon,
        })
    }

    /// Axis-aligned rectangular venue `[xmin, xmax] × [ymin, ymax]`.
    pub fn frame(
        name: impl Into<String>,
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    ) -> Result<Self, AquiflowError> {
        Ok(Venue::Frame {
            name: name.into(),
            polygon: Polygon::rectangle(xmin, xmax, ymin, ymax)?,
        })
    }

    /// Arbitrary user-drawn polygon.
    pub fn patch(name: impl Into<String>, ring: Vec<(f64, f64)>) -> Result<Self, AquiflowError> {
        Ok(Venue::Patch {
            name: name.into(),
            polygon: Polygon::new(ring)?,
        })
    }

    pub fn kind(&self) -> VenueKind {
        match self {
            Venue::City(_) => VenueKind::City,
            Venue::Township(_) => VenueKind::Township,
            Venue::County(_) => VenueKind::County,
            Venue::Watershed(_) => VenueKind::Watershed,
            Venue::Subregion(_) => VenueKind::Subregion,
            Venue::Neighborhood { .. } => VenueKind::Neighborhood,
            Venue::Frame { .. } => VenueKind::Frame,
            Venue::Patch { .. } => VenueKind::Patch,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Venue::City(a)
            | Venue::Township(a)
            | Venue::County(a)
            | Venue::Watershed(a)
            | Venue::Subregion(a) => &a.name,
            Venue::Neighborhood { name, .. } | Venue::Frame { name, .. } | Venue::Patch { name, .. } => {
                name
            }
        }
    }

    /// Identifying code for named areas, `None` for geometric venues.
    pub fn code(&self) -> Option<&str> {
        match self {
            Venue::City(a)
            | Venue::Township(a)
            | Venue::County(a)
            | Venue::Watershed(a)
            | Venue::Subregion(a) => Some(&a.code),
            _ => None,
        }
    }

    pub fn polygon(&self) -> &Polygon {
        match self {
            Venue::City(a)
            | Venue::Township(a)
            | Venue::County(a)
            | Venue::Watershed(a)
            | Venue::Subregion(a) => &a.polygon,
            Venue::Neighborhood { polygon, .. }
            | Venue::Frame { polygon, .. }
            | Venue::Patch { polygon, .. } => polygon,
        }
    }

    /// Closed boundary ring, counter-clockwise.
    pub fn boundary(&self) -> &[Point2<f64>] {
        self.polygon().boundary()
    }

    /// Grid anchor of the venue. Circles report their exact center.
    pub fn centroid(&self) -> Point2<f64> {
        match self {
            Venue::Neighborhood { center, .. } => *center,
            _ => self.polygon().centroid(),
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self.kind() {
            VenueKind::City => write!(f, "City of {name}"),
            VenueKind::Township => write!(f, "{name} Township"),
            VenueKind::County => write!(f, "{name} County"),
            VenueKind::Watershed => write!(f, "{name} Watershed"),
            VenueKind::Subregion => write!(f, "{name} Subregion"),
            VenueKind::Neighborhood => write!(f, "{name} Neighborhood"),
            VenueKind::Frame => write!(f, "{name} Frame"),
            VenueKind::Patch => write!(f, "{name} Patch"),
        }
    }
}

/// Collaborator supplying venue boundaries (geodatabase reader, catalog, ...).
pub trait VenueSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn venue(&self, kind: VenueKind, code: &str) -> Result<Venue, Self::Error>;
}
