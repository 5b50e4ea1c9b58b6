use std::time::Duration;

use polars::error::PolarsError;
use thiserror::Error;

/// Failure kinds surfaced by the forecasting core.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Shape mismatch: expected {expected} feature columns, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Forecast requested before the engine was trained")]
    NotTrained,

    #[error("Invalid bar series: {0}")]
    InvalidBars(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Data(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
