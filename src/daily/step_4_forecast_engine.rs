// External crates
use chrono::{Days, NaiveDate};
use crossbeam_channel::RecvTimeoutError;
use log::{info, warn};
use ndarray::{s, Array2};
use serde::Serialize;
use std::thread;
use std::time::Duration;

// Internal modules
use super::lstm::step_4_lstm_regressor::LstmRegressor;
use super::step_1_window_builder::WindowBuilder;
use super::step_2_sequence_regressor::{CancellationToken, SequenceRegressor, TrainingSummary};
use super::step_3_linear_regressor::LinearRegressor;
use crate::config::{validate_request, ForecastConfig, ModelKind};
use crate::constants::{CLOSE_COLUMN_INDEX, HARD_FLOOR_WINDOWS};
use crate::error::{ForecastError, Result};
use crate::util::feature_engineering::{FeatureEngine, FeatureMatrix};
use crate::util::metrics::AccuracyReport;
use crate::util::ohlcv::OhlcvBar;
use crate::util::scaler::Scaler;

/// Regressor chosen at runtime from [`ModelKind`].
pub type DynRegressor = Box<dyn SequenceRegressor + Send>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_close: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub accuracy: AccuracyReport,
    pub points: Vec<ForecastPoint>,
    /// Set when fewer windows than `min_training_windows` were available
    pub limited_data: bool,
    pub warnings: Vec<String>,
    pub last_close: f64,
    pub last_date: NaiveDate,
}

/// Request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForecastPhase {
    Untrained,
    Trained,
    RollingOut,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
struct TrainedState {
    lookback: usize,
    report: AccuracyReport,
    summary: TrainingSummary,
}

/// Owns one scaler and one regressor and turns bar history into forecasts.
///
/// The engine trains at most once until [`reset`](Self::reset) or a request
/// with a different lookback; later requests reuse the trained state.
pub struct ForecastEngine<R: SequenceRegressor> {
    config: ForecastConfig,
    feature_engine: FeatureEngine,
    scaler: Scaler,
    regressor: R,
    phase: ForecastPhase,
    trained: Option<TrainedState>,
    cancel: CancellationToken,
}

impl ForecastEngine<DynRegressor> {
    /// Builds an engine with the regressor selected by `config.model`.
    pub fn from_config(config: ForecastConfig) -> Self {
        let regressor: DynRegressor = match config.model {
            ModelKind::Lstm => Box::new(LstmRegressor::new(config.training.clone())),
            ModelKind::Linear => Box::new(LinearRegressor::new(&config.training)),
        };
        Self::new(config, regressor)
    }
}

impl<R: SequenceRegressor> ForecastEngine<R> {
    pub fn new(config: ForecastConfig, regressor: R) -> Self {
        let scaler = Scaler::new(config.scaler);
        Self {
            config,
            feature_engine: FeatureEngine::new(),
            scaler,
            regressor,
            phase: ForecastPhase::Untrained,
            trained: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn phase(&self) -> ForecastPhase {
        self.phase
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    /// Report from the most recent training run.
    pub fn accuracy_report(&self) -> Option<&AccuracyReport> {
        self.trained.as_ref().map(|t| &t.report)
    }

    pub fn training_summary(&self) -> Option<&TrainingSummary> {
        self.trained.as_ref().map(|t| &t.summary)
    }

    /// Token observed by the regressor between epochs.
    ///
    /// Cancelling it aborts the running fit, or the next one if no fit is
    /// running. The engine re-arms the token once the aborted fit returns.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drops the trained state so the next request retrains from scratch.
    pub fn reset(&mut self) {
        self.scaler = Scaler::new(self.config.scaler);
        self.trained = None;
        self.phase = ForecastPhase::Untrained;
        self.cancel = CancellationToken::new();
    }

    /// Trains (unless warm for this lookback), scores the validation split and
    /// rolls out `horizon` days.
    ///
    /// Thin data above the hard floor of `lookback + 2` rows still produces a
    /// result, flagged with `limited_data`.
    ///
    /// With `horizon == 0` no points are produced, but an engine that is not
    /// warm still fits and scores the regressor to fill the accuracy report.
    pub fn train_and_forecast(
        &mut self,
        bars: &[OhlcvBar],
        lookback: usize,
        horizon: usize,
        validation_split: f64,
    ) -> Result<ForecastResult> {
        match self.run_request(bars, lookback, horizon, validation_split) {
            Ok(result) => {
                self.phase = ForecastPhase::Done;
                Ok(result)
            }
            Err(e) => {
                warn!("Forecast request failed: {}", e);
                self.phase = ForecastPhase::Failed;
                Err(e)
            }
        }
    }

    fn run_request(
        &mut self,
        bars: &[OhlcvBar],
        lookback: usize,
        horizon: usize,
        validation_split: f64,
    ) -> Result<ForecastResult> {
        validate_request(lookback, validation_split)?;
        OhlcvBar::validate_series(bars)?;

        let hard_floor = lookback + HARD_FLOOR_WINDOWS;
        if bars.len() < hard_floor {
            return Err(ForecastError::InsufficientData {
                required: hard_floor,
                available: bars.len(),
            });
        }

        let mut warnings = Vec::new();
        let n_windows = bars.len() - lookback;
        let limited_data = n_windows < self.config.min_training_windows;
        if limited_data {
            let message = format!(
                "only {} windows available, {} recommended; forecast confidence is reduced",
                n_windows, self.config.min_training_windows
            );
            warn!("{}", message);
            warnings.push(message);
        }

        let matrix = self.feature_engine.derive(bars)?;

        let warm = matches!(&self.trained, Some(state) if state.lookback == lookback);
        if warm {
            info!("Reusing trained {} model", self.regressor.name());
        } else {
            self.train(&matrix, lookback, validation_split)?;
        }
        self.phase = ForecastPhase::Trained;

        let report = self
            .accuracy_report()
            .cloned()
            .ok_or(ForecastError::NotTrained)?;

        self.phase = ForecastPhase::RollingOut;
        let points = roll_forward(&self.scaler, &self.regressor, &matrix, lookback, horizon)?;

        let last = bars[bars.len() - 1];
        Ok(ForecastResult {
            accuracy: report,
            points,
            limited_data,
            warnings,
            last_close: last.close,
            last_date: last.date,
        })
    }

    fn train(&mut self, matrix: &FeatureMatrix, lookback: usize, validation_split: f64) -> Result<()> {
        self.trained = None;
        self.phase = ForecastPhase::Untrained;

        let scaled = self.scaler.fit_transform(matrix.values())?;
        let builder = WindowBuilder::new(lookback, CLOSE_COLUMN_INDEX);
        let windows = builder.build_for_training(&scaled, HARD_FLOOR_WINDOWS)?;
        let (train, validation) = windows.split_chronological(validation_split)?;

        info!(
            "Fitting {} on {} training / {} validation windows",
            self.regressor.name(),
            train.len(),
            validation.len()
        );
        let summary = match self.regressor.fit(&train, &validation, &self.cancel) {
            Ok(summary) => summary,
            Err(e) => {
                if self.cancel.is_cancelled() {
                    self.cancel = CancellationToken::new();
                }
                return Err(e);
            }
        };

        let scaled_predicted = self.regressor.predict_batch(&validation)?;
        let scaled_previous: Vec<f64> = (0..validation.len())
            .map(|i| validation.window(i)[[lookback - 1, CLOSE_COLUMN_INDEX]])
            .collect();

        let actual = self
            .scaler
            .inverse_transform_column(CLOSE_COLUMN_INDEX, &validation.targets().to_vec())?;
        let predicted = self
            .scaler
            .inverse_transform_column(CLOSE_COLUMN_INDEX, &scaled_predicted)?;
        let previous = self
            .scaler
            .inverse_transform_column(CLOSE_COLUMN_INDEX, &scaled_previous)?;

        let report =
            AccuracyReport::compute(&actual, &predicted, &previous, self.config.threshold_pct);
        info!(
            "Validation: RMSE {:.4}, MAPE {:.2}%, R2 {:.4}, direction {:.1}%",
            report.rmse, report.mape, report.r2, report.directional_accuracy
        );

        self.trained = Some(TrainedState {
            lookback,
            report,
            summary,
        });
        Ok(())
    }

    /// Rolls out `horizon` days with the existing trained state.
    ///
    /// The scaler is not refitted, so repeated calls with the same bars give
    /// the same points.
    pub fn forecast_only(&self, bars: &[OhlcvBar], horizon: usize) -> Result<Vec<ForecastPoint>> {
        let state = self.trained.as_ref().ok_or(ForecastError::NotTrained)?;
        if horizon == 0 {
            return Ok(Vec::new());
        }
        OhlcvBar::validate_series(bars)?;
        if bars.len() < state.lookback {
            return Err(ForecastError::InsufficientData {
                required: state.lookback,
                available: bars.len(),
            });
        }

        let matrix = self.feature_engine.derive(bars)?;
        roll_forward(&self.scaler, &self.regressor, &matrix, state.lookback, horizon)
    }
}

impl<R: SequenceRegressor + Send + 'static> ForecastEngine<R> {
    /// Runs [`train_and_forecast`](Self::train_and_forecast) on a worker thread.
    ///
    /// On success the engine is handed back with the result. On timeout the
    /// running fit is cancelled and the engine, with its partial state, is
    /// dropped along with the worker.
    pub fn train_and_forecast_with_timeout(
        mut self,
        bars: Vec<OhlcvBar>,
        lookback: usize,
        horizon: usize,
        validation_split: f64,
        timeout: Duration,
    ) -> Result<(Self, ForecastResult)> {
        let token = self.cancellation_token();
        let (tx, rx) = crossbeam_channel::bounded(1);

        thread::Builder::new()
            .name("forecast-worker".into())
            .spawn(move || {
                let result = self.train_and_forecast(&bars, lookback, horizon, validation_split);
                // The receiver is gone after a timeout
                let _ = tx.send((self, result));
            })?;

        match rx.recv_timeout(timeout) {
            Ok((engine, result)) => result.map(|r| (engine, r)),
            Err(RecvTimeoutError::Timeout) => {
                warn!("Forecast timed out after {:?}; cancelling training", timeout);
                token.cancel();
                Err(ForecastError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ForecastError::TrainingFailed(
                "forecast worker exited without a result".into(),
            )),
        }
    }
}

/// Autoregressive rollout from the last window of `matrix`.
///
/// Each synthetic row copies the previous row and replaces only the close,
/// so the other indicators stay frozen at their last observed values.
fn roll_forward<R: SequenceRegressor + ?Sized>(
    scaler: &Scaler,
    regressor: &R,
    matrix: &FeatureMatrix,
    lookback: usize,
    horizon: usize,
) -> Result<Vec<ForecastPoint>> {
    if horizon == 0 {
        return Ok(Vec::new());
    }

    let last_date = matrix.last_date().ok_or(ForecastError::InsufficientData {
        required: lookback,
        available: 0,
    })?;
    let scaled = scaler.transform(matrix.values())?;
    let mut window = WindowBuilder::new(lookback, CLOSE_COLUMN_INDEX).last_window(&scaled)?;

    let mut scaled_predictions = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let next = regressor.predict(window.view())?;

        let mut synthetic = window.row(lookback - 1).to_owned();
        synthetic[CLOSE_COLUMN_INDEX] = next;

        let mut shifted = Array2::zeros(window.raw_dim());
        shifted
            .slice_mut(s![..lookback - 1, ..])
            .assign(&window.slice(s![1.., ..]));
        shifted.row_mut(lookback - 1).assign(&synthetic);
        window = shifted;

        scaled_predictions.push(next);
    }

    let prices = scaler.inverse_transform_column(CLOSE_COLUMN_INDEX, &scaled_predictions)?;
    prices
        .into_iter()
        .enumerate()
        .map(|(k, predicted_close)| {
            let date = last_date
                .checked_add_days(Days::new(k as u64 + 1))
                .ok_or_else(|| {
                    ForecastError::InvalidParameter("forecast date out of range".into())
                })?;
            Ok(ForecastPoint {
                date,
                predicted_close,
            })
        })
        .collect()
}
