//! # Wells and water-level measurements
//!
//! A [`Well`] is an immutable observational record: an identifier, a planar location, the
//! [`AquiferCode`] of the unit it is completed in, and the ordered list of its water-level
//! [`Measurement`]s.
//!
//! ## Head selection
//!
//! A well may carry several measurements inside the analysis date window. The
//! [`HeadSelection`] policy reduces them to the single head value used in the fit:
//!
//! * [`HeadSelection::MostRecent`] (default): the latest qualifying measurement. When two
//!   measurements share the same date, the later one in the list wins.
//! * [`HeadSelection::Mean`]: arithmetic mean of the qualifying measurements.
//! * [`HeadSelection::Median`]: median of the qualifying measurements.
//!
//! A well with no qualifying measurement yields `None` and is excluded from every query.
//!
//! ## See also
//! * [`spatial_index::SpatialWellIndex`] – radius queries over a well collection.
//! * [`source::WellSource`] – collaborator trait supplying wells.

pub mod source;
pub mod spatial_index;

pub use spatial_index::{AquiferSet, NeighborWell, SpatialWellIndex, WellFilter};

use std::fmt;
use std::str::FromStr;

use hifitime::Epoch;
use itertools::Itertools;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::aquiflow_errors::AquiflowError;
use crate::constants::{AQUIFER_CODE_LEN, FEET_TO_METERS};

/// Four-character aquifer code (e.g. `"QBAA"`, `"CJDN"`), stored upper-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AquiferCode([u8; AQUIFER_CODE_LEN]);

impl AquiferCode {
    pub fn as_str(&self) -> &str {
        // Only ASCII alphanumerics are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for AquiferCode {
    type Err = AquiflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != AQUIFER_CODE_LEN || !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(AquiflowError::InvalidAquiferCode(s.to_string()));
        }
        let mut code = [0u8; AQUIFER_CODE_LEN];
        for (dst, src) in code.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(AquiferCode(code))
    }
}

impl TryFrom<String> for AquiferCode {
    type Error = AquiflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AquiferCode> for String {
    fn from(code: AquiferCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for AquiferCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dated water-level elevation [m].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub date: Epoch,
    pub elevation: f64,
}

impl Measurement {
    pub fn new(date: Epoch, elevation: f64) -> Self {
        Measurement { date, elevation }
    }

    /// Build a measurement from an elevation recorded in feet.
    pub fn from_feet(date: Epoch, elevation_ft: f64) -> Self {
        Measurement {
            date,
            elevation: elevation_ft * FEET_TO_METERS,
        }
    }

    /// True when `after ≤ date ≤ before`; a `None` bound is open.
    pub fn within(&self, after: Option<Epoch>, before: Option<Epoch>) -> bool {
        after.is_none_or(|a| self.date >= a) && before.is_none_or(|b| self.date <= b)
    }
}

#[derive(Debug, Clone)]
pub struct Well {
    pub id: String,
    pub location: Point2<f64>,
    pub aquifer: AquiferCode,
    pub measurements: Vec<Measurement>,
}

impl Well {
    pub fn new(
        id: impl Into<String>,
        location: (f64, f64),
        aquifer: AquiferCode,
        measurements: Vec<Measurement>,
    ) -> Self {
        Well {
            id: id.into(),
            location: Point2::new(location.0, location.1),
            aquifer,
            measurements,
        }
    }

    /// Head value selected from the measurements inside `[after, before]`.
    pub fn head(
        &self,
        after: Option<Epoch>,
        before: Option<Epoch>,
        selection: HeadSelection,
    ) -> Option<f64> {
        selection.select(
            self.measurements
                .iter()
                .filter(|m| m.within(after, before) && m.elevation.is_finite()),
        )
    }
}

/// Reduction of a well's qualifying measurements to one head value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeadSelection {
    #[default]
    MostRecent,
    Mean,
    Median,
}

impl HeadSelection {
    pub fn select<'a>(&self, measurements: impl Iterator<Item = &'a Measurement>) -> Option<f64> {
        match self {
            HeadSelection::MostRecent => measurements
                .fold(None::<&Measurement>, |best, m| match best {
                    Some(b) if m.date < b.date => Some(b),
                    _ => Some(m),
                })
                .map(|m| m.elevation),
            HeadSelection::Mean => {
                let (sum, count) = measurements.fold((0.0, 0usize), |(s, c), m| (s + m.elevation, c + 1));
                (count > 0).then(|| sum / count as f64)
            }
            HeadSelection::Median => {
                let sorted = measurements
                    .map(|m| m.elevation)
                    .sorted_by(f64::total_cmp)
                    .collect::<Vec<_>>();
                let n = sorted.len();
                match n {
                    0 => None,
                    _ if n % 2 == 1 => Some(sorted[n / 2]),
                    _ => Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2])),
                }
            }
        }
    }
}

impl FromStr for HeadSelection {
    type Err = AquiflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MOSTRECENT" | "MOST_RECENT" | "RECENT" => Ok(HeadSelection::MostRecent),
            "MEAN" => Ok(HeadSelection::Mean),
            "MEDIAN" => Ok(HeadSelection::Median),
            _ => Err(AquiflowError::InvalidConfiguration(format!(
                "unknown head selection {s:?}"
            ))),
        }
    }
}
