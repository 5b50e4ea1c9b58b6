use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Checks that dates are strictly increasing and every value is finite.
    pub fn validate_series(bars: &[OhlcvBar]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_finite() {
                return Err(ForecastError::InvalidBars(format!(
                    "bar {} ({}) contains a non-finite value",
                    i, bar.date
                )));
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(ForecastError::InvalidBars(format!(
                    "dates must be strictly increasing: {} is followed by {}",
                    bars[i - 1].date,
                    bar.date
                )));
            }
        }
        Ok(())
    }
}
