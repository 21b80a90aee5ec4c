use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient fundamentals: {complete_years} complete years (required {required_years})")]
    InsufficientFundamentals {
        complete_years: usize,
        required_years: usize,
    },

    #[error("Missing derived values: {}", .0.join(", "))]
    MissingDerivedValues(Vec<String>),

    #[error("Ambiguous ticker needs clarification: {0}")]
    AmbiguityUnresolved(String),

    #[error("External strategy error: {0}")]
    ExternalStrategy(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl AnalysisError {
    /// Whether the error means "skip this ticker" rather than a broken run.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientFundamentals { .. }
                | AnalysisError::MissingDerivedValues(_)
                | AnalysisError::AmbiguityUnresolved(_)
        )
    }
}
