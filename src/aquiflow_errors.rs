use thiserror::Error;

#[derive(Error, Debug)]
pub enum AquiflowError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid venue: {0}")]
    InvalidVenue(String),

    #[error("Invalid aquifer code: {0:?}")]
    InvalidAquiferCode(String),

    #[error("Unknown fit method: {0}")]
    UnknownFitMethod(String),

    #[error("Insufficient neighbors: found {found}, required {required}")]
    InsufficientNeighbors { found: usize, required: usize },

    #[error("Design matrix is singular or ill-conditioned (condition number {condition_number:e})")]
    SingularFit { condition_number: f64 },

    #[error("Data source failure: {0}")]
    DataSource(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),
}

impl AquiflowError {
    /// Wrap a collaborator failure without altering it.
    pub fn data_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AquiflowError::DataSource(Box::new(err))
    }

    /// True for the per-target failures that only thin the output set.
    pub fn is_per_target(&self) -> bool {
        matches!(
            self,
            AquiflowError::InsufficientNeighbors { .. } | AquiflowError::SingularFit { .. }
        )
    }
}

impl PartialEq for AquiflowError {
    fn eq(&self, other: &Self) -> bool {
        use AquiflowError::*;
        match (self, other) {
            (InvalidConfiguration(a), InvalidConfiguration(b)) => a == b,
            (InvalidVenue(a), InvalidVenue(b)) => a == b,
            (InvalidAquiferCode(a), InvalidAquiferCode(b)) => a == b,
            (UnknownFitMethod(a), UnknownFitMethod(b)) => a == b,
            (
                InsufficientNeighbors {
                    found: f1,
                    required: r1,
                },
                InsufficientNeighbors {
                    found: f2,
                    required: r2,
                },
            ) => f1 == f2 && r1 == r2,

            // Not comparable by content: equal when the variant matches
            (SingularFit { .. }, SingularFit { .. }) => true,
            (DataSource(_), DataSource(_)) => true,
            (Csv(_), Csv(_)) => true,
            (IoError(_), IoError(_)) => true,

            _ => false,
        }
    }
}
