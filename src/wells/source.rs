//! Collaborator trait for the code that loads wells (geodatabase readers, services, ...).
//!
//! Failures raised by a source reach the caller as [`AquiflowError::DataSource`] with the
//! original error kept as `source()`.
use std::convert::Infallible;

use super::Well;
use crate::aquiflow_errors::AquiflowError;

pub trait WellSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the full well collection.
    fn wells(&self) -> Result<Vec<Well>, Self::Error>;
}

/// In-memory collections are their own source.
impl WellSource for Vec<Well> {
    type Error = Infallible;

    fn wells(&self) -> Result<Vec<Well>, Self::Error> {
        Ok(self.clone())
    }
}

/// Load wells from `source`, wrapping any failure unchanged.
pub fn load_wells<S: WellSource + ?Sized>(source: &S) -> Result<Vec<Well>, AquiflowError> {
    source.wells().map_err(AquiflowError::data_source)
}
