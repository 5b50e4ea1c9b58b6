use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HORIZON, DEFAULT_LOOKBACK, DEFAULT_THRESHOLD_PCT, EARLY_STOPPING_PATIENCE,
    MIN_TRAINING_WINDOWS, VALIDATION_SPLIT_RATIO,
};
use crate::error::{ForecastError, Result};
use crate::util::scaler::ScalerKind;

/// Which sequence regressor the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    Lstm,
    Linear,
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lstm" => Ok(ModelKind::Lstm),
            "linear" => Ok(ModelKind::Linear),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown model kind '{}'",
                other
            ))),
        }
    }
}

/// Configuration for training a sequence regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub patience: usize,
    pub min_delta: f64,
    pub hidden_size: usize,
    pub dropout: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 50,
            patience: EARLY_STOPPING_PATIENCE, // Early stopping patience
            min_delta: 1e-6,                   // Minimum improvement in validation loss
            hidden_size: 32,
            dropout: 0.2,
        }
    }
}

/// Per-request forecasting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Feature rows per model input window.
    pub lookback: usize,
    /// Days forecast per rollout.
    pub horizon: usize,
    /// Fraction of windows held out (chronological suffix) for validation.
    pub validation_split: f64,
    /// Windows below which the result carries the limited-data marker.
    pub min_training_windows: usize,
    pub scaler: ScalerKind,
    pub model: ModelKind,
    /// Percent tolerance used by threshold accuracy.
    pub threshold_pct: f64,
    pub training: TrainingConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            horizon: DEFAULT_HORIZON,
            validation_split: VALIDATION_SPLIT_RATIO,
            min_training_windows: MIN_TRAINING_WINDOWS,
            scaler: ScalerKind::MinMax,
            model: ModelKind::Lstm,
            threshold_pct: DEFAULT_THRESHOLD_PCT,
            training: TrainingConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ForecastConfig {
    /// Builds a configuration from `FORECAST_*` environment variables, falling
    /// back to the defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let training_defaults = defaults.training.clone();

        let scaler = env::var("FORECAST_SCALER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.scaler);
        let model = env::var("FORECAST_MODEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.model);

        Self {
            lookback: env_or("FORECAST_LOOKBACK", defaults.lookback),
            // A negative horizon means no forecast points
            horizon: env_or("FORECAST_HORIZON", defaults.horizon as i64).max(0) as usize,
            validation_split: env_or("FORECAST_VALIDATION_SPLIT", defaults.validation_split),
            min_training_windows: env_or(
                "FORECAST_MIN_TRAINING_WINDOWS",
                defaults.min_training_windows,
            ),
            scaler,
            model,
            threshold_pct: env_or("FORECAST_THRESHOLD_PCT", defaults.threshold_pct),
            training: TrainingConfig {
                learning_rate: env_or("FORECAST_LEARNING_RATE", training_defaults.learning_rate),
                batch_size: env_or("FORECAST_BATCH_SIZE", training_defaults.batch_size),
                epochs: env_or("FORECAST_EPOCHS", training_defaults.epochs),
                patience: env_or("FORECAST_PATIENCE", training_defaults.patience),
                ..training_defaults
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_request(self.lookback, self.validation_split)?;
        if self.training.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "batch_size must be positive".into(),
            ));
        }
        if !(self.threshold_pct > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "threshold_pct must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Checks the per-call parameters of a training request.
pub fn validate_request(lookback: usize, validation_split: f64) -> Result<()> {
    if lookback == 0 {
        return Err(ForecastError::InvalidParameter(
            "lookback must be at least 1".into(),
        ));
    }
    if !(validation_split > 0.0 && validation_split < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "validation split must be in (0, 1), got {}",
            validation_split
        )));
    }
    Ok(())
}
