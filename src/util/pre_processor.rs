// External crates
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

// Local modules
use crate::daily::step_4_forecast_engine::ForecastPoint;
use crate::error::{ForecastError, Result};
use crate::util::ohlcv::OhlcvBar;

const DATE_ALIASES: [&str; 6] = ["date", "time", "timestamp", "datetime", "dt", "day"];
const OPEN_ALIASES: [&str; 4] = ["open", "o", "op", "open_price"];
const HIGH_ALIASES: [&str; 3] = ["high", "h", "high_price"];
const LOW_ALIASES: [&str; 3] = ["low", "l", "low_price"];
const CLOSE_ALIASES: [&str; 6] = ["close", "c", "cl", "close_price", "adj close", "adj_close"];
const VOLUME_ALIASES: [&str; 4] = ["volume", "vol", "v", "volumes"];

/// Loads a CSV file of daily bars, sorted by date.
///
/// # Arguments
///
/// * `full_path` - Path to the CSV file
///
/// # Returns
///
/// Returns the validated bar series or an error
pub fn load_bars_csv(full_path: &Path) -> Result<Vec<OhlcvBar>> {
    info!("Loading bars from: {}", full_path.display());

    if !full_path.exists() {
        return Err(ForecastError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", full_path.display()),
        )));
    }

    let file = File::open(full_path)?;
    let df = CsvReader::new(file).finish()?;
    bars_from_dataframe(&df)
}

/// Case-insensitive lookup of the first column matching one of `aliases`.
fn find_column(df: &DataFrame, aliases: &[&str]) -> PolarsResult<String> {
    df.get_column_names()
        .into_iter()
        .find(|name| aliases.contains(&name.to_lowercase().trim()))
        .map(|name| name.to_string())
        .ok_or_else(|| {
            PolarsError::ColumnNotFound(
                format!("Required column {} not found", aliases[0]).into(),
            )
        })
}

fn numeric_column(df: &DataFrame, aliases: &[&str]) -> PolarsResult<Vec<Option<f64>>> {
    let name = find_column(df, aliases)?;
    let column = df.column(&name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        // Timestamps such as "2024-01-02 00:00:00-05:00" keep their date part
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok())
}

/// Converts an OHLCV DataFrame into bars. Rows with a missing value or an
/// unparsable date are dropped.
pub fn bars_from_dataframe(df: &DataFrame) -> Result<Vec<OhlcvBar>> {
    let date_name = find_column(df, &DATE_ALIASES)?;
    let date_column = df.column(&date_name)?.cast(&DataType::String)?;
    let dates: Vec<Option<NaiveDate>> = date_column
        .str()?
        .into_iter()
        .map(|d| d.and_then(parse_date))
        .collect();

    let open = numeric_column(df, &OPEN_ALIASES)?;
    let high = numeric_column(df, &HIGH_ALIASES)?;
    let low = numeric_column(df, &LOW_ALIASES)?;
    let close = numeric_column(df, &CLOSE_ALIASES)?;
    let volume = numeric_column(df, &VOLUME_ALIASES)?;

    let mut bars = Vec::with_capacity(df.height());
    let mut dropped = 0usize;
    for i in 0..df.height() {
        match (dates[i], open[i], high[i], low[i], close[i], volume[i]) {
            (Some(date), Some(o), Some(h), Some(l), Some(c), Some(v)) => {
                bars.push(OhlcvBar::new(date, o, h, l, c, v))
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!("Dropped {} rows with missing values", dropped);
    }

    bars.sort_by_key(|b| b.date);
    OhlcvBar::validate_series(&bars)?;
    Ok(bars)
}

/// Forecast points as a two-column DataFrame (`date`, `predicted_close`).
pub fn forecast_to_dataframe(points: &[ForecastPoint]) -> PolarsResult<DataFrame> {
    let dates: Vec<String> = points
        .iter()
        .map(|p| p.date.format("%Y-%m-%d").to_string())
        .collect();
    let closes: Vec<f64> = points.iter().map(|p| p.predicted_close).collect();

    DataFrame::new(vec![
        Series::new("date".into(), dates).into_column(),
        Series::new("predicted_close".into(), closes).into_column(),
    ])
}

pub fn write_forecast_csv(path: &Path, points: &[ForecastPoint]) -> Result<()> {
    let mut df = forecast_to_dataframe(points)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    info!("Wrote {} forecast rows to {}", points.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_bars_csv_with_capitalized_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        // Deliberately out of order
        writeln!(file, "2024-01-03,11.0,12.0,10.5,11.5,1200").unwrap();
        writeln!(file, "2024-01-02,10.0,11.0,9.5,10.5,1000").unwrap();
        writeln!(file, "2024-01-04,11.5,12.5,11.0,12.0,1300").unwrap();
        drop(file);

        let bars = load_bars_csv(&path).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, 10.5);
        assert_eq!(bars[2].volume, 1300.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_bars_csv(Path::new("does/not/exist.csv"));
        assert!(matches!(result, Err(ForecastError::Io(_))));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let df = DataFrame::new(vec![
            Series::new("date".into(), vec!["2024-01-02".to_string()]).into_column(),
            Series::new("close".into(), vec![1.0]).into_column(),
        ])
        .unwrap();
        assert!(matches!(
            bars_from_dataframe(&df),
            Err(ForecastError::Data(_))
        ));
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let df = DataFrame::new(vec![
            Series::new("date".into(), vec!["2024-01-02".to_string(), "2024-01-02".to_string()])
                .into_column(),
            Series::new("open".into(), vec![1.0, 1.0]).into_column(),
            Series::new("high".into(), vec![1.0, 1.0]).into_column(),
            Series::new("low".into(), vec![1.0, 1.0]).into_column(),
            Series::new("close".into(), vec![1.0, 1.0]).into_column(),
            Series::new("volume".into(), vec![1.0, 1.0]).into_column(),
        ])
        .unwrap();
        assert!(matches!(
            bars_from_dataframe(&df),
            Err(ForecastError::InvalidBars(_))
        ));
    }

    #[test]
    fn test_write_forecast_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        let points = vec![
            ForecastPoint {
                date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                predicted_close: 101.5,
            },
            ForecastPoint {
                date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
                predicted_close: 102.25,
            },
        ];
        write_forecast_csv(&path, &points).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "date,predicted_close");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2024-02-01,101.5"));
    }
}
