//! # Result records and CSV export
//!
//! A [`ResultRecord`] is the final, immutable output for one target:
//! `(xtarget, ytarget, n, evp, varp)` plus the grid indices and the [`FlowConvention`] in
//! which `evp` / `varp` are expressed.
//!
//! [`write_csv`] flattens records into one row per target:
//!
//! ```text
//! xtarget,ytarget,i,j,n,convention,evp0,evp1,varp00,varp01,varp11,magnitude,direction_deg,p10
//! ```
//!
//! `p10` is the probability that the flow direction lies within ±10° of the estimate.

use std::io::Write;

use nalgebra::{Matrix2, Vector2};
use serde::Serialize;

use crate::aquiflow_errors::AquiflowError;
use crate::constants::{P10_HALF_WIDTH, RADEG};
use crate::flow::{FlowConvention, FlowEstimate};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRecord {
    pub xtarget: f64,
    pub ytarget: f64,
    /// Grid indices of the target relative to the venue centroid.
    pub i: i64,
    pub j: i64,
    /// Number of wells in the fit.
    pub n: usize,
    pub evp: Vector2<f64>,
    pub varp: Matrix2<f64>,
    pub convention: FlowConvention,
}

impl ResultRecord {
    fn estimate(&self) -> FlowEstimate {
        FlowEstimate {
            evp: self.evp,
            varp: self.varp,
            convention: self.convention,
        }
    }

    /// Flow vector and its covariance, converted from the polar form if needed.
    pub fn flow_vector(&self) -> (Vector2<f64>, Matrix2<f64>) {
        self.estimate().flow_vector()
    }

    /// Flow direction [rad] in `[0, 2π)`.
    pub fn direction(&self) -> f64 {
        self.estimate().direction()
    }

    pub fn magnitude(&self) -> f64 {
        self.estimate().magnitude()
    }

    /// Probability that the flow direction lies within `±half_width` [rad] of the estimate.
    pub fn direction_probability(&self, half_width: f64) -> f64 {
        self.estimate().direction_probability(half_width)
    }
}

#[derive(Debug, Serialize)]
struct CsvRow {
    xtarget: f64,
    ytarget: f64,
    i: i64,
    j: i64,
    n: usize,
    convention: FlowConvention,
    evp0: f64,
    evp1: f64,
    varp00: f64,
    varp01: f64,
    varp11: f64,
    magnitude: f64,
    direction_deg: f64,
    p10: f64,
}

impl From<&ResultRecord> for CsvRow {
    fn from(r: &ResultRecord) -> Self {
        CsvRow {
            xtarget: r.xtarget,
            ytarget: r.ytarget,
            i: r.i,
            j: r.j,
            n: r.n,
            convention: r.convention,
            evp0: r.evp.x,
            evp1: r.evp.y,
            varp00: r.varp[(0, 0)],
            varp01: r.varp[(0, 1)],
            varp11: r.varp[(1, 1)],
            magnitude: r.magnitude(),
            direction_deg: r.direction() / RADEG,
            p10: r.direction_probability(P10_HALF_WIDTH),
        }
    }
}

/// Write `records` as CSV (with header) to `writer`.
pub fn write_csv<W: Write>(records: &[ResultRecord], writer: W) -> Result<(), AquiflowError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(CsvRow::from(record))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod results_test {
    use super::*;
    use approx::assert_relative_eq;

    fn record(convention: FlowConvention) -> ResultRecord {
        let est = FlowEstimate::from_gradient(
            Vector2::new(0.0, 1e-3),
            Matrix2::identity() * 1e-10,
            convention,
        );
        ResultRecord {
            xtarget: 480_000.0,
            ytarget: 4_980_000.0,
            i: 2,
            j: -1,
            n: 31,
            evp: est.evp,
            varp: est.varp,
            convention,
        }
    }

    #[test]
    fn test_accessors_agree_between_conventions() {
        let v = record(FlowConvention::Vector);
        let p = record(FlowConvention::Polar);
        assert_relative_eq!(v.direction(), p.direction(), epsilon = 1e-12);
        assert_relative_eq!(v.direction() / RADEG, 270.0, epsilon = 1e-9);
        assert_relative_eq!(v.magnitude(), p.magnitude(), epsilon = 1e-15);
        let (pv, pcov) = p.flow_vector();
        assert_relative_eq!(pv, v.evp, epsilon = 1e-15);
        assert_relative_eq!(pcov, v.varp, epsilon = 1e-20, max_relative = 1e-9);
    }

    #[test]
    fn test_write_csv() {
        let mut buf = Vec::new();
        write_csv(&[record(FlowConvention::Vector), record(FlowConvention::Polar)], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "xtarget,ytarget,i,j,n,convention,evp0,evp1,varp00,varp01,varp11,magnitude,direction_deg,p10"
        );
        let first: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(first[0], "480000.0");
        assert_eq!(first[2], "2");
        assert_eq!(first[3], "-1");
        assert_eq!(first[4], "31");
        assert_eq!(first[5], "Vector");
        let p10: f64 = first[13].parse().unwrap();
        assert!(p10 > 0.99);
        assert!(lines.next().unwrap().contains(",Polar,"));
        assert!(lines.next().is_none());
    }
}
