// External crates
use ndarray::ArrayView2;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Internal modules
use super::step_1_window_builder::WindowSet;
use crate::error::{ForecastError, Result};

/// Cooperative cancellation flag shared between a caller and a running fit.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with `TrainingFailed` once cancelled. Fits call this between epochs.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ForecastError::TrainingFailed("training cancelled".into()))
        } else {
            Ok(())
        }
    }
}

/// Outcome of one fit call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub final_train_loss: f64,
    pub stopped_early: bool,
}

/// Tracks validation loss and signals when no improvement larger than
/// `min_delta` has been seen for `patience` consecutive epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best_loss: f64,
    best_epoch: usize,
    epochs_no_improve: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience: patience.max(1),
            min_delta,
            best_loss: f64::INFINITY,
            best_epoch: 0,
            epochs_no_improve: 0,
        }
    }

    /// Records the loss of `epoch` and returns true when it is a new best.
    pub fn record(&mut self, epoch: usize, val_loss: f64) -> bool {
        if self.best_loss - val_loss > self.min_delta {
            self.best_loss = val_loss;
            self.best_epoch = epoch;
            self.epochs_no_improve = 0;
            true
        } else {
            self.epochs_no_improve += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.epochs_no_improve >= self.patience
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }
}

/// A model mapping one `[lookback, features]` window to the next scaled close.
///
/// `fit` must leave the regressor holding the weights with the lowest
/// validation loss seen. `predict` must be deterministic once fitted.
pub trait SequenceRegressor {
    fn name(&self) -> &str;

    fn fit(
        &mut self,
        train: &WindowSet,
        validation: &WindowSet,
        cancel: &CancellationToken,
    ) -> Result<TrainingSummary>;

    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<f64>;

    fn predict_batch(&self, windows: &WindowSet) -> Result<Vec<f64>> {
        (0..windows.len())
            .map(|i| self.predict(windows.window(i)))
            .collect()
    }
}

impl<R: SequenceRegressor + ?Sized> SequenceRegressor for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fit(
        &mut self,
        train: &WindowSet,
        validation: &WindowSet,
        cancel: &CancellationToken,
    ) -> Result<TrainingSummary> {
        (**self).fit(train, validation, cancel)
    }

    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<f64> {
        (**self).predict(window)
    }

    fn predict_batch(&self, windows: &WindowSet) -> Result<Vec<f64>> {
        (**self).predict_batch(windows)
    }
}

/// Rejects windows whose shape differs from the one the model was fitted on.
pub fn check_window_shape(
    window: ArrayView2<'_, f64>,
    lookback: usize,
    n_features: usize,
) -> Result<()> {
    let (rows, cols) = window.dim();
    if cols != n_features {
        return Err(ForecastError::ShapeMismatch {
            expected: n_features,
            found: cols,
        });
    }
    if rows != lookback {
        return Err(ForecastError::InsufficientData {
            required: lookback,
            available: rows,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_stopping_patience() {
        let mut stopping = EarlyStopping::new(2, 1e-6);
        assert!(stopping.record(1, 1.0));
        assert!(stopping.record(2, 0.5));
        assert!(!stopping.record(3, 0.5));
        assert!(!stopping.should_stop());
        assert!(!stopping.record(4, 0.6));
        assert!(stopping.should_stop());
        assert_eq!(stopping.best_epoch(), 2);
        assert_eq!(stopping.best_loss(), 0.5);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ForecastError::TrainingFailed(_))));
    }
}
