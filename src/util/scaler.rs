// External crates
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Internal modules
use crate::error::{ForecastError, Result};

/// Per-column scaling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerKind {
    /// (x - min) / (max - min)
    MinMax,
    /// (x - median) / IQR
    Robust,
}

impl FromStr for ScalerKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minmax" | "min_max" => Ok(ScalerKind::MinMax),
            "robust" => Ok(ScalerKind::Robust),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown scaler '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FittedParams {
    center: Array1<f64>,
    scale: Array1<f64>,
}

/// Reversible column-wise transform, fitted once over the full feature matrix
/// and reused until the next explicit fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    kind: ScalerKind,
    params: Option<FittedParams>,
}

impl Scaler {
    pub fn new(kind: ScalerKind) -> Self {
        Self { kind, params: None }
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Number of columns the scaler was fitted on.
    pub fn n_columns(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.center.len())
    }

    pub fn fit(&mut self, matrix: &Array2<f64>) -> Result<()> {
        if matrix.nrows() == 0 {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let n_cols = matrix.ncols();
        let mut center = Array1::zeros(n_cols);
        let mut scale = Array1::ones(n_cols);

        for (j, column) in matrix.axis_iter(Axis(1)).enumerate() {
            let mut sorted: Vec<f64> = column.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));

            let (c, range) = match self.kind {
                ScalerKind::MinMax => {
                    let min = sorted[0];
                    let max = sorted[sorted.len() - 1];
                    (min, max - min)
                }
                ScalerKind::Robust => {
                    let q1 = quantile(&sorted, 0.25);
                    let q3 = quantile(&sorted, 0.75);
                    (quantile(&sorted, 0.5), q3 - q1)
                }
            };
            center[j] = c;
            // Constant columns keep unit scale so the transform stays invertible
            scale[j] = if range.abs() < f64::EPSILON { 1.0 } else { range };
        }

        self.params = Some(FittedParams { center, scale });
        Ok(())
    }

    pub fn fit_transform(&mut self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(matrix)?;
        self.transform(matrix)
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.checked_params(matrix.ncols())?;
        Ok((matrix - &params.center) / &params.scale)
    }

    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.checked_params(scaled.ncols())?;
        Ok(scaled * &params.scale + &params.center)
    }

    /// Inverse-transforms values of a single column by padding every other
    /// column with zeros, inverting the full rows and reading the column back.
    pub fn inverse_transform_column(&self, column: usize, values: &[f64]) -> Result<Vec<f64>> {
        let n_cols = self.n_columns().ok_or(ForecastError::NotTrained)?;
        if column >= n_cols {
            return Err(ForecastError::ShapeMismatch {
                expected: n_cols,
                found: column + 1,
            });
        }
        let mut padded = Array2::zeros((values.len(), n_cols));
        for (i, &v) in values.iter().enumerate() {
            padded[[i, column]] = v;
        }
        let restored = self.inverse_transform(&padded)?;
        Ok(restored.column(column).to_vec())
    }

    fn checked_params(&self, n_cols: usize) -> Result<&FittedParams> {
        let params = self.params.as_ref().ok_or(ForecastError::NotTrained)?;
        if params.center.len() != n_cols {
            return Err(ForecastError::ShapeMismatch {
                expected: params.center.len(),
                found: n_cols,
            });
        }
        Ok(params)
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_matrix() -> Array2<f64> {
        array![
            [100.0, 0.01, 5.0],
            [102.0, -0.02, 5.0],
            [98.0, 0.03, 5.0],
            [250.0, 0.00, 5.0],
            [101.0, 0.05, 5.0],
        ]
    }

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_round_trip_both_kinds() {
        for kind in [ScalerKind::MinMax, ScalerKind::Robust] {
            let m = sample_matrix();
            let mut scaler = Scaler::new(kind);
            let scaled = scaler.fit_transform(&m).unwrap();
            let restored = scaler.inverse_transform(&scaled).unwrap();
            assert_close(&restored, &m);
        }
    }

    #[test]
    fn test_min_max_range() {
        let mut scaler = Scaler::new(ScalerKind::MinMax);
        let scaled = scaler.fit_transform(&sample_matrix()).unwrap();
        let close = scaled.column(0);
        assert!((close[2] - 0.0).abs() < 1e-12);
        assert!((close[3] - 1.0).abs() < 1e-12);
        // Constant column maps to zero with unit scale
        assert!(scaled.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_robust_uses_median_and_iqr() {
        let mut scaler = Scaler::new(ScalerKind::Robust);
        let scaled = scaler.fit_transform(&sample_matrix()).unwrap();
        // closes sorted: 98, 100, 101, 102, 250 -> median 101, IQR 2
        assert!((scaled[[4, 0]] - 0.0).abs() < 1e-12);
        assert!((scaled[[1, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut scaler = Scaler::new(ScalerKind::MinMax);
        scaler.fit(&sample_matrix()).unwrap();
        let narrow = array![[1.0, 2.0]];
        assert!(matches!(
            scaler.transform(&narrow),
            Err(ForecastError::ShapeMismatch { expected: 3, found: 2 })
        ));
        assert!(scaler.inverse_transform(&narrow).is_err());
    }

    #[test]
    fn test_unfitted_and_empty() {
        let scaler = Scaler::new(ScalerKind::Robust);
        assert!(matches!(
            scaler.transform(&sample_matrix()),
            Err(ForecastError::NotTrained)
        ));
        let mut scaler = Scaler::new(ScalerKind::Robust);
        assert!(matches!(
            scaler.fit(&Array2::zeros((0, 3))),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_inverse_transform_column_matches_full_inverse() {
        let m = sample_matrix();
        let mut scaler = Scaler::new(ScalerKind::MinMax);
        let scaled = scaler.fit_transform(&m).unwrap();
        let closes: Vec<f64> = scaled.column(0).to_vec();
        let restored = scaler.inverse_transform_column(0, &closes).unwrap();
        for (r, o) in restored.iter().zip(m.column(0).iter()) {
            assert!((r - o).abs() < 1e-9);
        }
    }
}
