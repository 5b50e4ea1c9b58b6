use serde::{Deserialize, Serialize};

/// Accuracy of the validation-split predictions, in price scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Mean absolute percentage error, in percent
    pub mape: f64,
    pub r2: f64,
    /// Share of windows whose predicted move had the right sign, in percent
    pub directional_accuracy: f64,
    pub rmse: f64,
    /// Share of predictions within `threshold_pct` of the actual, in percent
    pub threshold_accuracy: f64,
    pub threshold_pct: f64,
    pub samples: usize,
}

impl AccuracyReport {
    /// `previous` holds the last known close of each validation window, used
    /// as the reference for direction.
    pub fn compute(actual: &[f64], predicted: &[f64], previous: &[f64], threshold_pct: f64) -> Self {
        Self {
            mape: mape(actual, predicted),
            r2: r2_score(actual, predicted),
            directional_accuracy: directional_accuracy(actual, predicted, previous),
            rmse: rmse(actual, predicted),
            threshold_accuracy: threshold_accuracy(actual, predicted, threshold_pct),
            threshold_pct,
            samples: actual.len().min(predicted.len()),
        }
    }
}

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / n as f64).sqrt()
}

/// Mean absolute percentage error; zero actuals are skipped
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return 0.0;
    }
    terms.iter().sum::<f64>() / terms.len() as f64 * 100.0
}

/// Coefficient of determination; 0.0 when the actuals have no variance
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

pub fn directional_accuracy(actual: &[f64], predicted: &[f64], previous: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len()).min(previous.len());
    if n == 0 {
        return 0.0;
    }
    let correct = (0..n)
        .filter(|&i| {
            let true_move = (actual[i] - previous[i]).signum();
            let pred_move = (predicted[i] - previous[i]).signum();
            true_move == pred_move
        })
        .count();
    correct as f64 / n as f64 * 100.0
}

pub fn threshold_accuracy(actual: &[f64], predicted: &[f64], threshold_pct: f64) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let within = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| {
            if **a == 0.0 {
                **p == 0.0
            } else {
                ((*a - *p) / *a).abs() * 100.0 <= threshold_pct
            }
        })
        .count();
    within as f64 / n as f64 * 100.0
}
