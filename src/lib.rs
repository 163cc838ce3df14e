//! # aquiflow
//!
//! Local groundwater flow-direction estimation from well water-level observations.
//!
//! At each node of a regular target grid laid over a venue, the wells within a search
//! radius are fitted with a quadratic discharge-potential model
//!
//! ```text
//! Φ(u, v) = a + b·u + c·v + d·u² + e·u·v + f·v²
//! ```
//!
//! and the flow is taken opposite to the potential gradient at the target, `(−b, −c)`,
//! together with its propagated covariance.
//!
//! ## Entry points
//!
//! * [`analysis::FlowAnalysis`] owns the well index and runs a venue analysis
//!   ([`analysis::FlowAnalysis::by_venue`]) or a leave-one-out cross-validation.
//! * [`analysis::params::AnalysisParams`] holds the validated configuration.
//! * [`venues::Venue`] describes the analysed domain.
//! * [`results::write_csv`] exports the result records.
pub mod analysis;
pub mod aquiflow_errors;
pub mod conic;
pub mod constants;
pub mod flow;
pub mod geometry;
mod maybe_rayon;
pub mod results;
pub mod venues;
pub mod wells;

pub use analysis::params::{AnalysisParams, FitMethod, FlowConvention};
pub use analysis::{AnalysisOutcome, FlowAnalysis};
pub use aquiflow_errors::AquiflowError;
pub use results::ResultRecord;
pub use venues::Venue;
pub use wells::{AquiferCode, HeadSelection, Measurement, Well};
