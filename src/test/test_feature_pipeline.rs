// Internal imports
use crate::constants::{CLOSE_COLUMN_INDEX, FEATURE_COLUMNS};
use crate::daily::step_1_window_builder::WindowBuilder;
use crate::util::feature_engineering::FeatureEngine;
use crate::util::scaler::{Scaler, ScalerKind};
use crate::util::test_utils::{generate_random_walk_bars, generate_trending_bars};

#[test]
fn test_every_column_populated_for_any_length() {
    let engine = FeatureEngine::new();
    for n in [1usize, 2, 13, 19, 20, 49, 50, 51, 120] {
        let bars = generate_random_walk_bars(n, n as u64);
        let matrix = engine.derive(&bars).unwrap();
        assert_eq!(matrix.n_rows(), n);
        assert_eq!(matrix.n_cols(), FEATURE_COLUMNS.len());
        assert!(
            matrix.values().iter().all(|v| v.is_finite()),
            "undefined value for n = {}",
            n
        );
    }
}

#[test]
fn test_column_order_and_close_slot() {
    let bars = generate_trending_bars(60);
    let matrix = FeatureEngine::new().derive(&bars).unwrap();
    let names: Vec<&str> = matrix.columns().iter().map(|c| c.as_str()).collect();
    assert_eq!(names, FEATURE_COLUMNS.to_vec());
    for (i, bar) in bars.iter().enumerate() {
        assert_eq!(matrix.values()[[i, CLOSE_COLUMN_INDEX]], bar.close);
    }
    assert_eq!(matrix.dates().len(), 60);
    assert_eq!(matrix.last_date(), bars.last().map(|b| b.date));
}

#[test]
fn test_short_history_zero_fills_long_indicators() {
    // Fewer bars than the 50-day window
    let bars = generate_trending_bars(30);
    let matrix = FeatureEngine::new().derive(&bars).unwrap();
    let sma50 = matrix.column("SMA50").unwrap();
    assert!(sma50.iter().all(|v| *v == 0.0));
    let sma20 = matrix.column("SMA20").unwrap();
    assert_eq!(sma20[0], 0.0);
    assert!(sma20[19] > 0.0);
}

#[test]
fn test_scaler_round_trip_on_features() {
    let matrix = FeatureEngine::new().derive(&generate_random_walk_bars(200, 7)).unwrap();
    for kind in [ScalerKind::MinMax, ScalerKind::Robust] {
        let mut scaler = Scaler::new(kind);
        let scaled = scaler.fit_transform(matrix.values()).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();
        for (a, b) in restored.iter().zip(matrix.values().iter()) {
            assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{} != {}", a, b);
        }
    }
}

#[test]
fn test_windows_target_next_scaled_close() {
    let matrix = FeatureEngine::new().derive(&generate_trending_bars(150)).unwrap();
    let mut scaler = Scaler::new(ScalerKind::MinMax);
    let scaled = scaler.fit_transform(matrix.values()).unwrap();

    let windows = WindowBuilder::new(30, CLOSE_COLUMN_INDEX).build(&scaled).unwrap();
    assert_eq!(windows.len(), 120);
    for i in [0usize, 57, 119] {
        let window = windows.window(i);
        for t in 0..30 {
            assert_eq!(window.row(t), scaled.row(i + t));
        }
        assert_eq!(windows.targets()[i], scaled[[i + 30, CLOSE_COLUMN_INDEX]]);
    }
}
