//! # Analysis configuration
//!
//! [`AnalysisParams`] gathers every knob of a flow-direction run. Construct it with
//! [`AnalysisParams::builder`], which validates the values in [`AnalysisParamsBuilder::build`];
//! entry points re-check the same rules with [`AnalysisParams::validate`] before any target is
//! processed.
//!
//! Defaults
//! -----------------
//! | Parameter               | Default        |
//! |-------------------------|----------------|
//! | `spacing`               | 1000 m         |
//! | `radius`                | 3000 m         |
//! | `required`              | 25             |
//! | `aquifers`              | *(must be set)*|
//! | `after` / `before`      | open window    |
//! | `method`                | Tukey          |
//! | `head_selection`        | most recent    |
//! | `convention`            | vector         |
//! | `max_condition_number`  | 1e10           |
//! | `robust_max_iterations` | 50             |
//! | `robust_tolerance`      | 1e-8           |
//!
//! Examples
//! -----------------
//! ```rust,no_run
//! use aquiflow::AnalysisParams;
//! use aquiflow::conic::FitMethod;
//!
//! let params = AnalysisParams::builder()
//!     .aquifers(["QBAA".parse().unwrap(), "CJDN".parse().unwrap()])
//!     .radius(2500.0)
//!     .method(FitMethod::Huber)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```

use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use hifitime::Epoch;
use itertools::Itertools;

pub use crate::conic::FitMethod;
pub use crate::flow::FlowConvention;

use crate::aquiflow_errors::AquiflowError;
use crate::conic::ConicFitter;
use crate::constants::{
    CONIC_PARAMETERS, DEFAULT_MAX_CONDITION_NUMBER, DEFAULT_RADIUS, DEFAULT_REQUIRED,
    DEFAULT_ROBUST_MAX_ITERATIONS, DEFAULT_ROBUST_TOLERANCE, DEFAULT_SPACING,
};
use crate::wells::{AquiferCode, AquiferSet, HeadSelection, WellFilter};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    /// Distance between neighboring targets [m].
    pub spacing: f64,
    /// Search radius around each target [m].
    pub radius: f64,
    /// Minimum number of neighboring wells for a fit (> 6).
    pub required: usize,
    /// Aquifers whose wells take part in the fit.
    pub aquifers: AquiferSet,
    /// Earliest admissible measurement date (inclusive), `None` for no bound.
    pub after: Option<Epoch>,
    /// Latest admissible measurement date (inclusive), `None` for no bound.
    pub before: Option<Epoch>,
    pub method: FitMethod,
    pub head_selection: HeadSelection,
    pub convention: FlowConvention,
    /// Ceiling on the condition number of the scaled design matrix.
    pub max_condition_number: f64,
    pub robust_max_iterations: usize,
    pub robust_tolerance: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            spacing: DEFAULT_SPACING,
            radius: DEFAULT_RADIUS,
            required: DEFAULT_REQUIRED,
            aquifers: AquiferSet::default(),
            after: None,
            before: None,
            method: FitMethod::default(),
            head_selection: HeadSelection::default(),
            convention: FlowConvention::default(),
            max_condition_number: DEFAULT_MAX_CONDITION_NUMBER,
            robust_max_iterations: DEFAULT_ROBUST_MAX_ITERATIONS,
            robust_tolerance: DEFAULT_ROBUST_TOLERANCE,
        }
    }
}

impl AnalysisParams {
    pub fn builder() -> AnalysisParamsBuilder {
        AnalysisParamsBuilder::new()
    }

    /// Check every configuration invariant.
    ///
    /// Return
    /// ----------
    /// * `Ok(())`, or [`AquiflowError::InvalidConfiguration`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), AquiflowError> {
        if !gt0(self.spacing) || !self.spacing.is_finite() {
            return Err(AquiflowError::InvalidConfiguration(format!(
                "spacing must be a finite value > 0, got {}",
                self.spacing
            )));
        }
        if !gt0(self.radius) || !self.radius.is_finite() {
            return Err(AquiflowError::InvalidConfiguration(format!(
                "radius must be a finite value > 0, got {}",
                self.radius
            )));
        }
        if self.required <= CONIC_PARAMETERS {
            return Err(AquiflowError::InvalidConfiguration(format!(
                "required must exceed the {CONIC_PARAMETERS} conic parameters, got {}",
                self.required
            )));
        }
        if self.aquifers.is_empty() {
            return Err(AquiflowError::InvalidConfiguration(
                "aquifer set must not be empty".into(),
            ));
        }
        if let (Some(after), Some(before)) = (self.after, self.before) {
            if after > before {
                return Err(AquiflowError::InvalidConfiguration(format!(
                    "after ({after}) must not be later than before ({before})"
                )));
            }
        }
        if !gt1(self.max_condition_number) {
            return Err(AquiflowError::InvalidConfiguration(
                "max_condition_number must be > 1".into(),
            ));
        }
        if self.robust_max_iterations == 0 {
            return Err(AquiflowError::InvalidConfiguration(
                "robust_max_iterations must be >= 1".into(),
            ));
        }
        if !gt0(self.robust_tolerance) {
            return Err(AquiflowError::InvalidConfiguration(
                "robust_tolerance must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Attribute filter for well queries.
    pub fn well_filter(&self) -> WellFilter<'_> {
        WellFilter {
            aquifers: &self.aquifers,
            after: self.after,
            before: self.before,
            selection: self.head_selection,
        }
    }

    /// Conic fitter configured from these parameters.
    pub fn fitter(&self) -> ConicFitter {
        ConicFitter {
            method: self.method,
            radius: self.radius,
            max_condition_number: self.max_condition_number,
            robust_max_iterations: self.robust_max_iterations,
            robust_tolerance: self.robust_tolerance,
        }
    }
}

/// Return true iff x > 0.0 and comparable (i.e., not NaN).
#[inline]
fn gt0(x: f64) -> bool {
    x.partial_cmp(&0.0) == Some(Greater)
}

#[inline]
fn gt1(x: f64) -> bool {
    !matches!(x.partial_cmp(&1.0), None | Some(Less) | Some(Equal))
}

/// Builder for [`AnalysisParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisParamsBuilder {
    params: AnalysisParams,
}

impl AnalysisParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: AnalysisParams::default(),
        }
    }

    // --- Grid / neighborhood ---
    pub fn spacing(mut self, v: f64) -> Self {
        self.params.spacing = v;
        self
    }
    pub fn radius(mut self, v: f64) -> Self {
        self.params.radius = v;
        self
    }
    pub fn required(mut self, v: usize) -> Self {
        self.params.required = v;
        self
    }

    // --- Well filters ---
    pub fn aquifers(mut self, codes: impl IntoIterator<Item = AquiferCode>) -> Self {
        self.params.aquifers = codes.into_iter().collect();
        self
    }
    pub fn after(mut self, v: Epoch) -> Self {
        self.params.after = Some(v);
        self
    }
    pub fn before(mut self, v: Epoch) -> Self {
        self.params.before = Some(v);
        self
    }
    pub fn head_selection(mut self, v: HeadSelection) -> Self {
        self.params.head_selection = v;
        self
    }

    // --- Fit ---
    pub fn method(mut self, v: FitMethod) -> Self {
        self.params.method = v;
        self
    }
    pub fn convention(mut self, v: FlowConvention) -> Self {
        self.params.convention = v;
        self
    }
    pub fn max_condition_number(mut self, v: f64) -> Self {
        self.params.max_condition_number = v;
        self
    }
    pub fn robust_max_iterations(mut self, v: usize) -> Self {
        self.params.robust_max_iterations = v;
        self
    }
    pub fn robust_tolerance(mut self, v: f64) -> Self {
        self.params.robust_tolerance = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `spacing > 0`, `radius > 0` (finite).
    /// * `required > 6`: fewer observations than conic parameters leave the fit
    ///   underdetermined by construction.
    /// * non-empty aquifer set.
    /// * `after ≤ before` when both are set.
    /// * `max_condition_number > 1`, `robust_max_iterations ≥ 1`, `robust_tolerance > 0`.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(AnalysisParams)`, or `Err(AquiflowError::InvalidConfiguration)`.
    pub fn build(self) -> Result<AnalysisParams, AquiflowError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for AnalysisParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aquifers = self.aquifers.iter().sorted().join(",");
        let date = |d: Option<Epoch>| d.map_or_else(|| "open".to_string(), |e| e.to_string());

        if f.alternate() {
            const PARAM_COL: usize = 44;
            writeln!(f, "Flow Analysis Parameters")?;
            writeln!(f, "------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Grid / neighborhood]")?;
            line!("spacing        = {:.1} m", self.spacing, "Distance between targets")?;
            line!("radius         = {:.1} m", self.radius, "Search radius")?;
            line!("required       = {}", self.required, "Minimum neighboring wells")?;

            writeln!(f, "[Well filters]")?;
            line!("aquifers       = {}", aquifers, "Admissible aquifer codes")?;
            line!("after          = {}", date(self.after), "Earliest measurement")?;
            line!("before         = {}", date(self.before), "Latest measurement")?;
            line!("head_selection = {:?}", self.head_selection, "Multi-measurement policy")?;

            writeln!(f, "[Fit]")?;
            line!("method         = {}", self.method, "Weighting scheme")?;
            line!("convention     = {}", self.convention, "Output convention")?;
            line!("max_condition  = {:.1e}", self.max_condition_number, "Design condition ceiling")?;
            line!("robust_max_it  = {}", self.robust_max_iterations, "IRLS iteration cap")?;
            line!("robust_tol     = {:.1e}", self.robust_tolerance, "IRLS relative change")?;
            Ok(())
        } else {
            write!(
                f,
                "AnalysisParams(spacing={:.1}, radius={:.1}, required={}, aquifers=[{}], after={}, before={}, method={}, heads={:?}, convention={})",
                self.spacing,
                self.radius,
                self.required,
                aquifers,
                date(self.after),
                date(self.before),
                self.method,
                self.head_selection,
                self.convention,
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    fn qbaa() -> AquiferCode {
        "QBAA".parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = AnalysisParams::builder().aquifers([qbaa()]).build().unwrap();
        assert_eq!(params.spacing, 1000.0);
        assert_eq!(params.radius, 3000.0);
        assert_eq!(params.required, 25);
        assert_eq!(params.method, FitMethod::Tukey);
        assert_eq!(params.head_selection, HeadSelection::MostRecent);
        assert_eq!(params.convention, FlowConvention::Vector);
        assert!(params.after.is_none() && params.before.is_none());
    }

    #[test]
    fn test_invalid_configurations() {
        let base = || AnalysisParams::builder().aquifers([qbaa()]);
        let cases = [
            base().required(4),
            base().required(6),
            base().spacing(0.0),
            base().spacing(f64::NAN),
            base().radius(-1.0),
            base().max_condition_number(1.0),
            base().robust_max_iterations(0),
            base().robust_tolerance(0.0),
            AnalysisParams::builder(),
            base()
                .after(Epoch::from_gregorian_utc_at_midnight(2010, 1, 1))
                .before(Epoch::from_gregorian_utc_at_midnight(2000, 1, 1)),
        ];
        for builder in cases {
            let err = builder.build().unwrap_err();
            assert!(matches!(err, AquiflowError::InvalidConfiguration(_)), "{err:?}");
        }
    }

    #[test]
    fn test_required_seven_is_accepted() {
        assert!(AnalysisParams::builder()
            .aquifers([qbaa()])
            .required(7)
            .build()
            .is_ok());
    }

    #[test]
    fn test_display() {
        let params = AnalysisParams::builder()
            .aquifers(["CJDN".parse().unwrap(), qbaa()])
            .method(FitMethod::Ols)
            .build()
            .unwrap();
        let compact = format!("{params}");
        assert!(compact.starts_with("AnalysisParams(spacing=1000.0, radius=3000.0, required=25, aquifers=[CJDN,QBAA]"));
        assert!(compact.contains("method=OLS"));

        let pretty = format!("{params:#}");
        assert!(pretty.starts_with("Flow Analysis Parameters"));
        assert!(pretty.contains("[Fit]"));
        assert!(pretty.contains("after          = open"));
    }

    #[test]
    fn test_fitter_mirrors_params() {
        let params = AnalysisParams::builder()
            .aquifers([qbaa()])
            .radius(1500.0)
            .method(FitMethod::InverseDistance)
            .build()
            .unwrap();
        let fitter = params.fitter();
        assert_eq!(fitter.radius, 1500.0);
        assert_eq!(fitter.method, FitMethod::InverseDistance);
    }
}
