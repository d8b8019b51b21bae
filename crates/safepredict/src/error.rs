use thiserror::Error;

/// Failures raised by a wrapped base estimator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Estimator has not been fitted")]
    NotFitted,

    #[error("Feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid training data: {0}")]
    InvalidTrainingData(String),

    #[error("Invalid estimator parameter: {0}")]
    InvalidParameter(String),

    #[error("Estimator error: {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafePredictError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Controller has not been seeded")]
    NotSeeded,

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Round mismatch: controller is at round {expected}, pending round is {got}")]
    RoundMismatch { expected: u64, got: u64 },
}

pub type SafePredictResult<T> = Result<T, SafePredictError>;
