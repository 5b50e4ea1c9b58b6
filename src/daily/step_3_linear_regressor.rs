// External crates
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};

// Internal modules
use super::step_1_window_builder::WindowSet;
use super::step_2_sequence_regressor::{
    check_window_shape, CancellationToken, EarlyStopping, SequenceRegressor, TrainingSummary,
};
use crate::config::TrainingConfig;
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
struct LinearWeights {
    weights: Array1<f64>,
    bias: f64,
    lookback: usize,
    n_features: usize,
}

/// Linear baseline over the flattened window.
///
/// Fitted with full-batch gradient descent from zero weights, so two fits on
/// the same data give the same model. One epoch is one gradient step.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    epochs: usize,
    patience: usize,
    min_delta: f64,
    fitted: Option<LinearWeights>,
}

impl LinearRegressor {
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            epochs: config.epochs.max(1),
            patience: config.patience,
            min_delta: config.min_delta,
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn flatten(windows: &WindowSet) -> Result<Array2<f64>> {
    let n = windows.len();
    let width = windows.lookback() * windows.n_features();
    Array2::from_shape_vec((n, width), windows.inputs().iter().copied().collect()).map_err(|_| {
        ForecastError::ShapeMismatch {
            expected: width,
            found: windows.inputs().len() / n.max(1),
        }
    })
}

fn mse(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>, bias: f64) -> f64 {
    let residual = x.dot(weights) + bias - y;
    residual.mapv(|r| r * r).mean().unwrap_or(0.0)
}

impl SequenceRegressor for LinearRegressor {
    fn name(&self) -> &str {
        "linear"
    }

    fn fit(
        &mut self,
        train: &WindowSet,
        validation: &WindowSet,
        cancel: &CancellationToken,
    ) -> Result<TrainingSummary> {
        self.fitted = None;
        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let x = flatten(train)?;
        let y = train.targets();
        let x_val = flatten(validation)?;
        let y_val = validation.targets();
        let n = x.nrows() as f64;

        // Step 1/trace(H) with H = 2/n [X 1]^T [X 1] bounds the largest eigenvalue
        let trace = 2.0 / n * (x.mapv(|v| v * v).sum() + n);
        let step = 1.0 / trace;

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        let mut best = (weights.clone(), bias);
        let mut stopping = EarlyStopping::new(self.patience, self.min_delta);
        let mut train_loss = f64::INFINITY;
        let mut epochs_run = 0;
        let mut stopped_early = false;

        for epoch in 1..=self.epochs {
            cancel.check()?;
            epochs_run = epoch;

            let residual = x.dot(&weights) + bias - y;
            train_loss = residual.mapv(|r| r * r).mean().unwrap_or(0.0);
            if !train_loss.is_finite() {
                return Err(ForecastError::TrainingFailed(format!(
                    "linear model diverged at epoch {}",
                    epoch
                )));
            }

            let grad_w = x.t().dot(&residual) * (2.0 / n);
            let grad_b = residual.sum() * 2.0 / n;
            weights.scaled_add(-step, &grad_w);
            bias -= step * grad_b;

            let val_loss = if validation.is_empty() {
                mse(&x, y, &weights, bias)
            } else {
                mse(&x_val, y_val, &weights, bias)
            };
            debug!(
                "Linear epoch {}/{}: train loss {:.6}, val loss {:.6}",
                epoch, self.epochs, train_loss, val_loss
            );

            if stopping.record(epoch, val_loss) {
                best = (weights.clone(), bias);
            }
            if stopping.should_stop() {
                info!(
                    "Early stopping at epoch {} (best val loss {:.6} at epoch {})",
                    epoch,
                    stopping.best_loss(),
                    stopping.best_epoch()
                );
                stopped_early = true;
                break;
            }
        }

        if !stopping.best_loss().is_finite() {
            return Err(ForecastError::TrainingFailed(
                "validation loss never became finite".into(),
            ));
        }

        let (weights, bias) = best;
        self.fitted = Some(LinearWeights {
            weights,
            bias,
            lookback: train.lookback(),
            n_features: train.n_features(),
        });

        Ok(TrainingSummary {
            epochs_run,
            best_epoch: stopping.best_epoch(),
            best_val_loss: stopping.best_loss(),
            final_train_loss: train_loss,
            stopped_early,
        })
    }

    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<f64> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotTrained)?;
        check_window_shape(window, fitted.lookback, fitted.n_features)?;
        let dot: f64 = window
            .iter()
            .zip(fitted.weights.iter())
            .map(|(x, w)| x * w)
            .sum();
        Ok(dot + fitted.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily::step_1_window_builder::WindowBuilder;

    // Single feature following x_t = 0.01 * t, so the next value is linear in the window
    fn linear_windows() -> (WindowSet, WindowSet) {
        let matrix = Array2::from_shape_fn((120, 1), |(r, _)| r as f64 * 0.01);
        WindowBuilder::new(4, 0)
            .build(&matrix)
            .unwrap()
            .split_chronological(0.2)
            .unwrap()
    }

    fn config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            patience: 50,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_fit_reduces_validation_loss() {
        let (train, val) = linear_windows();
        let mut short = LinearRegressor::new(&config(1));
        let mut long = LinearRegressor::new(&config(300));
        let token = CancellationToken::new();
        let s1 = short.fit(&train, &val, &token).unwrap();
        let s2 = long.fit(&train, &val, &token).unwrap();
        assert!(s2.best_val_loss < s1.best_val_loss);
        assert!(long.is_fitted());
    }

    fn validation_mse<R: SequenceRegressor>(model: &R, windows: &WindowSet) -> f64 {
        let predictions = model.predict_batch(windows).unwrap();
        predictions
            .iter()
            .zip(windows.targets().iter())
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>()
            / windows.len() as f64
    }

    #[test]
    fn test_early_stop_keeps_best_epoch_weights() {
        // Rises through the training windows, then reverses in the validation tail
        let matrix = Array2::from_shape_fn((120, 1), |(r, _)| {
            if r < 96 {
                r as f64 * 0.01
            } else {
                0.96 - (r - 96) as f64 * 0.01
            }
        });
        let (train, val) = WindowBuilder::new(4, 0)
            .build(&matrix)
            .unwrap()
            .split_chronological(0.2)
            .unwrap();

        // Only the first epoch clears a min_delta this large
        let stubborn = TrainingConfig {
            epochs: 500,
            patience: 3,
            min_delta: 10.0,
            ..TrainingConfig::default()
        };
        let mut model = LinearRegressor::new(&stubborn);
        let summary = model.fit(&train, &val, &CancellationToken::new()).unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.best_epoch, 1);
        assert_eq!(summary.epochs_run, 4);
        assert!(summary.best_epoch < summary.epochs_run);

        let recomputed = validation_mse(&model, &val);
        assert!(
            (recomputed - summary.best_val_loss).abs() <= 1e-12 * summary.best_val_loss.max(1.0),
            "{} != {}",
            recomputed,
            summary.best_val_loss
        );

        // Same weights as a model that only ever ran one epoch
        let mut one_epoch = LinearRegressor::new(&TrainingConfig {
            epochs: 1,
            ..stubborn
        });
        one_epoch.fit(&train, &val, &CancellationToken::new()).unwrap();
        for i in 0..val.len() {
            assert_eq!(
                model.predict(val.window(i)).unwrap(),
                one_epoch.predict(val.window(i)).unwrap()
            );
        }
    }

    #[test]
    fn test_predict_is_deterministic_and_checks_shape() {
        let (train, val) = linear_windows();
        let mut model = LinearRegressor::new(&config(50));
        model.fit(&train, &val, &CancellationToken::new()).unwrap();

        let window = val.window(0);
        assert_eq!(model.predict(window).unwrap(), model.predict(window).unwrap());

        let wrong = Array2::<f64>::zeros((4, 2));
        assert!(matches!(
            model.predict(wrong.view()),
            Err(ForecastError::ShapeMismatch { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn test_cancelled_fit_leaves_model_untrained() {
        let (train, val) = linear_windows();
        let mut model = LinearRegressor::new(&config(10));
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            model.fit(&train, &val, &token),
            Err(ForecastError::TrainingFailed(_))
        ));
        assert!(!model.is_fitted());
        assert!(matches!(
            model.predict(val.window(0)),
            Err(ForecastError::NotTrained)
        ));
    }
}
