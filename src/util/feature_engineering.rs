// External crates
use chrono::NaiveDate;
use log::debug;
use ndarray::{Array2, ArrayView1};
use polars::prelude::*;

// Internal modules
use crate::constants::{
    BOLLINGER_NUM_STD, BOLLINGER_WINDOW, CLOSE_COLUMN_INDEX, FEATURE_COLUMNS, MACD_FAST_SPAN,
    MACD_SLOW_SPAN, ROC_PERIOD, RSI_WINDOW, SMA_LONG_WINDOW, SMA_SHORT_WINDOW, VOLUME_WINDOW,
};
use crate::error::Result;
use crate::util::ohlcv::OhlcvBar;

/// Feature rows aligned one-to-one with the input bars.
///
/// Every row carries the same ordered column set ([`FEATURE_COLUMNS`]) and no
/// cell is ever undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    dates: Vec<NaiveDate>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, dates: Vec<NaiveDate>, values: Array2<f64>) -> Self {
        Self {
            columns,
            dates,
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| self.values.column(idx))
    }

    pub fn close(&self) -> ArrayView1<'_, f64> {
        self.values.column(CLOSE_COLUMN_INDEX)
    }
}

/// Derives the technical-indicator feature matrix from raw bars.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureEngine;

impl FeatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Computes every indicator from trailing windows only. Warm-up gaps are
    /// forward-filled, then zero-filled, so short inputs degrade instead of
    /// failing.
    pub fn derive(&self, bars: &[OhlcvBar]) -> Result<FeatureMatrix> {
        let close = Series::new(
            "close".into(),
            bars.iter().map(|b| b.close).collect::<Vec<f64>>(),
        );
        let volume = Series::new(
            "volume".into(),
            bars.iter().map(|b| b.volume).collect::<Vec<f64>>(),
        );
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();

        let volume_ma = calculate_sma(&volume, VOLUME_WINDOW)?;
        let volume_ratio = calculate_ratio(&volume, &volume_ma)?;

        // Same order as FEATURE_COLUMNS
        let raw_columns: Vec<Series> = vec![
            close.clone(),
            calculate_returns(&close, 1)?,
            calculate_sma(&close, SMA_SHORT_WINDOW)?,
            calculate_sma(&close, SMA_LONG_WINDOW)?,
            calculate_ema(&close, SMA_SHORT_WINDOW)?,
            calculate_ema(&close, SMA_LONG_WINDOW)?,
            calculate_rsi(&close, RSI_WINDOW)?,
            calculate_roc(&close, ROC_PERIOD)?,
            calculate_macd(&close, MACD_FAST_SPAN, MACD_SLOW_SPAN)?,
            calculate_bollinger_band_width(&close, BOLLINGER_WINDOW, BOLLINGER_NUM_STD)?,
            volume_ma,
            volume_ratio,
        ];
        debug_assert_eq!(raw_columns.len(), FEATURE_COLUMNS.len());

        let filled = raw_columns
            .iter()
            .map(forward_fill_then_zero)
            .collect::<PolarsResult<Vec<Vec<f64>>>>()?;

        let n_rows = bars.len();
        let values = Array2::from_shape_fn((n_rows, FEATURE_COLUMNS.len()), |(i, j)| filled[j][i]);
        debug!(
            "Derived {} feature rows x {} columns",
            n_rows,
            FEATURE_COLUMNS.len()
        );

        Ok(FeatureMatrix::new(
            FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            dates,
            values,
        ))
    }
}

fn trailing_window(window: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        center: false,
        weights: None,
        fn_params: None,
    }
}

fn undefined_like(series: &Series) -> Series {
    Series::full_null(series.name().clone(), series.len(), &DataType::Float64)
}

fn to_options(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    Ok(series.f64()?.into_iter().collect())
}

fn safe_div(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let v = num / den;
    v.is_finite().then_some(v)
}

/// Element-wise `num / den`; zero or undefined denominators give null.
pub fn calculate_ratio(num: &Series, den: &Series) -> PolarsResult<Series> {
    let ratio: Vec<Option<f64>> = to_options(num)?
        .into_iter()
        .zip(to_options(den)?)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) => safe_div(n, d),
            _ => None,
        })
        .collect();
    Ok(Series::new(num.name().clone(), ratio))
}

/// Carries the last defined value forward; leading gaps become 0.0.
/// Non-finite cells count as undefined.
pub fn forward_fill_then_zero(series: &Series) -> PolarsResult<Vec<f64>> {
    let cleaned: Vec<Option<f64>> = to_options(series)?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    let filled = Series::new(series.name().clone(), cleaned)
        .fill_null(FillNullStrategy::Forward(None))?
        .fill_null(FillNullStrategy::Zero)?;
    Ok(filled.f64()?.into_no_null_iter().collect())
}

/// Trailing simple moving average; null until `window` values are available.
pub fn calculate_sma(series: &Series, window: usize) -> PolarsResult<Series> {
    if window == 0 {
        return Ok(undefined_like(series));
    }
    series.rolling_mean(trailing_window(window))
}

/// Trailing sample standard deviation (n - 1 denominator).
pub fn calculate_rolling_std(series: &Series, window: usize) -> PolarsResult<Series> {
    if window < 2 {
        return Ok(undefined_like(series));
    }
    series.rolling_std(trailing_window(window))
}

/// Exponential moving average with alpha = 2 / (span + 1), seeded with the
/// first value.
pub fn calculate_ema(series: &Series, span: usize) -> PolarsResult<Series> {
    ewm_mean(
        series,
        EWMOptions {
            alpha: 2.0 / (span as f64 + 1.0),
            adjust: false,
            bias: false,
            min_periods: 1,
            ignore_nulls: true,
        },
    )
}

/// Fractional change over `lag` rows.
pub fn calculate_returns(series: &Series, lag: usize) -> PolarsResult<Series> {
    if lag == 0 {
        return Ok(undefined_like(series));
    }
    let previous = series.shift(lag as i64);
    let returns: Vec<Option<f64>> = to_options(series)?
        .into_iter()
        .zip(to_options(&previous)?)
        .map(|(cur, prev)| match (cur, prev) {
            (Some(cur), Some(prev)) => safe_div(cur - prev, prev),
            _ => None,
        })
        .collect();
    Ok(Series::new(series.name().clone(), returns))
}

/// Rate of change over `period` rows, in percent.
pub fn calculate_roc(series: &Series, period: usize) -> PolarsResult<Series> {
    let roc: Vec<Option<f64>> = to_options(&calculate_returns(series, period)?)?
        .into_iter()
        .map(|r| r.map(|v| v * 100.0))
        .collect();
    Ok(Series::new("roc".into(), roc))
}

/// Relative strength index from simple rolling means of gains and losses.
pub fn calculate_rsi(series: &Series, window: usize) -> PolarsResult<Series> {
    if window == 0 {
        return Ok(undefined_like(series));
    }
    let previous = series.shift(1);
    let deltas: Vec<Option<f64>> = to_options(series)?
        .into_iter()
        .zip(to_options(&previous)?)
        .map(|(cur, prev)| cur.zip(prev).map(|(c, p)| c - p))
        .collect();

    // Row 0 has no delta, so the first full window ends at row `window`
    let gains = Series::new(
        "gains".into(),
        deltas.iter().map(|d| d.map(|d| d.max(0.0))).collect::<Vec<_>>(),
    );
    let losses = Series::new(
        "losses".into(),
        deltas.iter().map(|d| d.map(|d| (-d).max(0.0))).collect::<Vec<_>>(),
    );
    let avg_gain = to_options(&gains.rolling_mean(trailing_window(window))?)?;
    let avg_loss = to_options(&losses.rolling_mean(trailing_window(window))?)?;

    let rsi: Vec<Option<f64>> = avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) if l == 0.0 => (g != 0.0).then_some(100.0),
            (Some(g), Some(l)) => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        })
        .collect();
    Ok(Series::new("rsi".into(), rsi))
}

/// MACD line: fast EMA minus slow EMA.
pub fn calculate_macd(series: &Series, fast_span: usize, slow_span: usize) -> PolarsResult<Series> {
    let fast = calculate_ema(series, fast_span)?;
    let slow = calculate_ema(series, slow_span)?;
    Ok((&fast - &slow)?.with_name("macd".into()))
}

/// Bollinger band width (upper - lower) divided by the close.
pub fn calculate_bollinger_band_width(
    series: &Series,
    window: usize,
    num_std: f64,
) -> PolarsResult<Series> {
    let std = calculate_rolling_std(series, window)?;
    let width: Vec<Option<f64>> = to_options(series)?
        .into_iter()
        .zip(to_options(&std)?)
        .map(|(close, sd)| match (close, sd) {
            (Some(close), Some(sd)) => safe_div(2.0 * num_std * sd, close),
            _ => None,
        })
        .collect();
    Ok(Series::new("bollinger_band_width".into(), width))
}
