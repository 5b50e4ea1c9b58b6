// External imports
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::cast::ToElement;
use burn::tensor::{backend::Backend, Tensor};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use log::{debug, info};
use ndarray::ArrayView2;

// Internal imports
use super::step_1_tensor_preparation::{targets_to_tensor, window_to_tensor, windows_to_tensor};
use super::step_3_lstm_model_arch::{LstmForecaster, LstmForecasterConfig};
use crate::config::TrainingConfig;
use crate::daily::step_1_window_builder::WindowSet;
use crate::daily::step_2_sequence_regressor::{
    check_window_shape, CancellationToken, EarlyStopping, SequenceRegressor, TrainingSummary,
};
use crate::error::{ForecastError, Result};

pub type BurnBackend = Autodiff<NdArray<f32>>;
type InferenceBackend = NdArray<f32>;

#[derive(Debug)]
struct FittedLstm {
    model: LstmForecaster<InferenceBackend>,
    lookback: usize,
    n_features: usize,
}

/// Recurrent regressor trained with Adam on mini-batches of windows.
///
/// Batches are taken in chronological order. After training the regressor
/// keeps the weights of the epoch with the lowest validation MSE.
#[derive(Debug)]
pub struct LstmRegressor {
    config: TrainingConfig,
    device: NdArrayDevice,
    fitted: Option<FittedLstm>,
}

fn mse<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = predictions - targets;
    (diff.clone() * diff).mean()
}

impl LstmRegressor {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            device: NdArrayDevice::default(),
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

impl SequenceRegressor for LstmRegressor {
    fn name(&self) -> &str {
        "lstm"
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

        let device = self.device.clone();
        let n_train = train.len();
        let batch_size = self.config.batch_size.max(1);
        let epochs = self.config.epochs.max(1);

        let mut model: LstmForecaster<BurnBackend> = LstmForecasterConfig::new(
            train.n_features(),
            self.config.hidden_size,
            self.config.dropout,
        )
        .init(&device);
        let mut optimizer = AdamConfig::new().init();

        let train_x = windows_to_tensor::<BurnBackend>(train, &device);
        let train_y = targets_to_tensor::<BurnBackend>(train, &device);
        let val_tensors = (!validation.is_empty()).then(|| {
            (
                windows_to_tensor::<InferenceBackend>(validation, &device),
                targets_to_tensor::<InferenceBackend>(validation, &device),
            )
        });

        let mut stopping = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut best_model = model.valid();
        let mut train_loss = f64::INFINITY;
        let mut epochs_run = 0;
        let mut stopped_early = false;

        info!(
            "Training LSTM on {} windows ({} validation), batch size {}",
            n_train,
            validation.len(),
            batch_size
        );

        for epoch in 1..=epochs {
            cancel.check()?;
            epochs_run = epoch;

            let mut epoch_loss = 0.0;
            let mut num_batches = 0;
            let mut start = 0;
            while start < n_train {
                let len = batch_size.min(n_train - start);
                let batch_x = train_x.clone().narrow(0, start, len);
                let batch_y = train_y.clone().narrow(0, start, len);

                let predictions = model.forward(batch_x, true);
                let loss_tensor = mse(predictions, batch_y);
                let loss = loss_tensor.clone().into_scalar().to_f64();
                if !loss.is_finite() {
                    return Err(ForecastError::TrainingFailed(format!(
                        "non-finite training loss at epoch {}",
                        epoch
                    )));
                }

                let grads = loss_tensor.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(self.config.learning_rate, model, grads);

                epoch_loss += loss;
                num_batches += 1;
                start += len;
            }
            train_loss = epoch_loss / num_batches as f64;

            let inference = model.valid();
            let val_loss = match &val_tensors {
                Some((val_x, val_y)) => mse(inference.forward(val_x.clone(), false), val_y.clone())
                    .into_scalar()
                    .to_f64(),
                None => train_loss,
            };
            debug!(
                "Epoch {}/{}: train loss {:.6}, val loss {:.6}",
                epoch, epochs, train_loss, val_loss
            );

            if stopping.record(epoch, val_loss) {
                best_model = inference;
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

        self.fitted = Some(FittedLstm {
            model: best_model,
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

        let x = window_to_tensor::<InferenceBackend>(window, &self.device);
        let value = fitted.model.forward(x, false).into_scalar().to_f64();
        if !value.is_finite() {
            return Err(ForecastError::TrainingFailed(
                "model produced a non-finite prediction".into(),
            ));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily::step_1_window_builder::WindowBuilder;
    use ndarray::Array2;

    fn sine_windows() -> (WindowSet, WindowSet) {
        let matrix = Array2::from_shape_fn((80, 2), |(r, c)| {
            let t = r as f64 * 0.2;
            if c == 0 {
                0.5 + 0.4 * t.sin()
            } else {
                0.5 + 0.4 * t.cos()
            }
        });
        WindowBuilder::new(10, 0)
            .build(&matrix)
            .unwrap()
            .split_chronological(0.2)
            .unwrap()
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 3,
            batch_size: 16,
            hidden_size: 8,
            learning_rate: 0.01,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_fit_then_predict() {
        let (train, val) = sine_windows();
        let mut model = LstmRegressor::new(quick_config());
        let summary = model.fit(&train, &val, &CancellationToken::new()).unwrap();
        assert!(summary.epochs_run >= 1 && summary.epochs_run <= 3);
        assert!(summary.best_val_loss.is_finite());
        assert!(model.is_fitted());

        let first = model.predict(val.window(0)).unwrap();
        let second = model.predict(val.window(0)).unwrap();
        assert!(first.is_finite());
        assert_eq!(first, second);
    }

    #[test]
    fn test_early_stop_keeps_best_epoch_weights() {
        let (train, val) = sine_windows();
        // Only the first epoch clears a min_delta this large
        let config = TrainingConfig {
            epochs: 10,
            patience: 2,
            min_delta: 10.0,
            ..quick_config()
        };
        let mut model = LstmRegressor::new(config);
        let summary = model.fit(&train, &val, &CancellationToken::new()).unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.best_epoch, 1);
        assert_eq!(summary.epochs_run, 3);

        let predictions = model.predict_batch(&val).unwrap();
        let recomputed = predictions
            .iter()
            .zip(val.targets().iter())
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>()
            / val.len() as f64;
        // Validation loss is accumulated in f32
        assert!(
            (recomputed - summary.best_val_loss).abs() <= 1e-4 * summary.best_val_loss.max(1.0),
            "{} != {}",
            recomputed,
            summary.best_val_loss
        );
    }

    #[test]
    fn test_predict_before_fit() {
        let (_, val) = sine_windows();
        let model = LstmRegressor::new(quick_config());
        assert!(matches!(
            model.predict(val.window(0)),
            Err(ForecastError::NotTrained)
        ));
    }

    #[test]
    fn test_cancelled_before_first_epoch() {
        let (train, val) = sine_windows();
        let mut model = LstmRegressor::new(quick_config());
        let token = CancellationToken::new();
        token.cancel();
        assert!(model.fit(&train, &val, &token).is_err());
        assert!(!model.is_fitted());
    }
}
