// External crates
use log::debug;
use ndarray::{s, Array1, Array2, Array3, ArrayView2};
use rayon::prelude::*;

// Internal modules
use crate::error::{ForecastError, Result};

/// Lookback windows `[n, lookback, features]` with one target per window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    inputs: Array3<f64>,
    targets: Array1<f64>,
}

impl WindowSet {
    pub fn new(inputs: Array3<f64>, targets: Array1<f64>) -> Result<Self> {
        if inputs.dim().0 != targets.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: inputs.dim().0,
                found: targets.len(),
            });
        }
        Ok(Self { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn lookback(&self) -> usize {
        self.inputs.dim().1
    }

    pub fn n_features(&self) -> usize {
        self.inputs.dim().2
    }

    pub fn inputs(&self) -> &Array3<f64> {
        &self.inputs
    }

    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    pub fn window(&self, index: usize) -> ArrayView2<'_, f64> {
        self.inputs.slice(s![index, .., ..])
    }

    /// Splits into a chronological prefix for training and suffix for
    /// validation. Never shuffles; both halves hold at least one window.
    pub fn split_chronological(&self, validation_split: f64) -> Result<(WindowSet, WindowSet)> {
        let n = self.len();
        if n < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                available: n,
            });
        }
        let n_val = ((n as f64 * validation_split).round() as usize).clamp(1, n - 1);
        let n_train = n - n_val;

        let train = WindowSet {
            inputs: self.inputs.slice(s![..n_train, .., ..]).to_owned(),
            targets: self.targets.slice(s![..n_train]).to_owned(),
        };
        let validation = WindowSet {
            inputs: self.inputs.slice(s![n_train.., .., ..]).to_owned(),
            targets: self.targets.slice(s![n_train..]).to_owned(),
        };
        Ok((train, validation))
    }
}

/// Slices a scaled feature matrix into fixed-length lookback windows.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    lookback: usize,
    target_column: usize,
}

impl WindowBuilder {
    pub fn new(lookback: usize, target_column: usize) -> Self {
        Self {
            lookback,
            target_column,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Window `i` covers rows `[i, i + lookback)` and targets row `i + lookback`,
    /// giving `n_rows - lookback` windows. Requires `n_rows >= lookback`.
    pub fn build(&self, scaled: &Array2<f64>) -> Result<WindowSet> {
        let (n_rows, n_features) = scaled.dim();
        if self.lookback == 0 || n_rows < self.lookback {
            return Err(ForecastError::InsufficientData {
                required: self.lookback.max(1),
                available: n_rows,
            });
        }
        if self.target_column >= n_features {
            return Err(ForecastError::ShapeMismatch {
                expected: self.target_column + 1,
                found: n_features,
            });
        }

        let n_windows = n_rows - self.lookback;
        let lookback = self.lookback;
        let mut data = vec![0f64; n_windows * lookback * n_features];

        // Each chunk is one window
        if !data.is_empty() {
            data.par_chunks_mut(lookback * n_features)
                .enumerate()
                .for_each(|(i, chunk)| {
                    let rows = scaled.slice(s![i..i + lookback, ..]);
                    for (dst, src) in chunk.iter_mut().zip(rows.iter()) {
                        *dst = *src;
                    }
                });
        }

        let targets: Array1<f64> = (0..n_windows)
            .map(|i| scaled[[i + lookback, self.target_column]])
            .collect();
        let inputs = Array3::from_shape_vec((n_windows, lookback, n_features), data).map_err(
            |_| ForecastError::ShapeMismatch {
                expected: n_features,
                found: scaled.ncols(),
            },
        )?;

        debug!(
            "Built {} windows of {} rows x {} features",
            n_windows, lookback, n_features
        );
        WindowSet::new(inputs, targets)
    }

    /// Like [`build`](Self::build) but fails unless at least `min_windows`
    /// windows are produced.
    pub fn build_for_training(&self, scaled: &Array2<f64>, min_windows: usize) -> Result<WindowSet> {
        let n_rows = scaled.nrows();
        if n_rows < self.lookback + min_windows {
            return Err(ForecastError::InsufficientData {
                required: self.lookback + min_windows,
                available: n_rows,
            });
        }
        self.build(scaled)
    }

    /// The most recent `lookback` rows, used to seed a rollout.
    pub fn last_window(&self, scaled: &Array2<f64>) -> Result<Array2<f64>> {
        let n_rows = scaled.nrows();
        if self.lookback == 0 || n_rows < self.lookback {
            return Err(ForecastError::InsufficientData {
                required: self.lookback.max(1),
                available: n_rows,
            });
        }
        Ok(scaled.slice(s![n_rows - self.lookback.., ..]).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Row r holds [r, 10r]
    fn ramp(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(r, c)| if c == 0 { r as f64 } else { 10.0 * r as f64 })
    }

    #[test]
    fn test_window_count_order_and_targets() {
        let builder = WindowBuilder::new(3, 0);
        let windows = builder.build(&ramp(10)).unwrap();
        assert_eq!(windows.len(), 7);
        assert_eq!(windows.lookback(), 3);
        assert_eq!(windows.n_features(), 2);

        for i in 0..windows.len() {
            let w = windows.window(i);
            for t in 0..3 {
                assert_eq!(w[[t, 0]], (i + t) as f64);
                assert_eq!(w[[t, 1]], 10.0 * (i + t) as f64);
            }
            assert_eq!(windows.targets()[i], (i + 3) as f64);
        }
    }

    #[test]
    fn test_exact_lookback_gives_no_windows() {
        let builder = WindowBuilder::new(5, 0);
        let windows = builder.build(&ramp(5)).unwrap();
        assert!(windows.is_empty());
        assert!(builder.build(&ramp(4)).is_err());
    }

    #[test]
    fn test_training_floor() {
        let builder = WindowBuilder::new(30, 0);
        let err = builder.build_for_training(&ramp(129), 100).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData {
                required: 130,
                available: 129
            }
        ));
        assert_eq!(builder.build_for_training(&ramp(130), 100).unwrap().len(), 100);
    }

    #[test]
    fn test_chronological_split() {
        let windows = WindowBuilder::new(2, 0).build(&ramp(12)).unwrap();
        let (train, val) = windows.split_chronological(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
        // Validation continues right after training
        assert_eq!(train.targets()[7], 9.0);
        assert_eq!(val.targets()[0], 10.0);
        assert_eq!(val.window(0)[[0, 0]], 8.0);
    }

    #[test]
    fn test_split_keeps_one_window_each_side() {
        let windows = WindowBuilder::new(2, 0).build(&ramp(4)).unwrap();
        let (train, val) = windows.split_chronological(0.01).unwrap();
        assert_eq!((train.len(), val.len()), (1, 1));
    }

    #[test]
    fn test_last_window() {
        let builder = WindowBuilder::new(3, 0);
        let last = builder.last_window(&ramp(6)).unwrap();
        assert_eq!(last.column(0).to_vec(), vec![3.0, 4.0, 5.0]);
    }
}
