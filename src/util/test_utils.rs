// External imports
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Internal imports
use crate::util::ohlcv::OhlcvBar;

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

/// Daily bars with a strictly increasing close, one calendar day apart.
pub fn generate_trending_bars(num_rows: usize) -> Vec<OhlcvBar> {
    (0..num_rows)
        .map(|i| {
            let close = 100.0 + i as f64 * 0.5 + (i as f64 * 0.3).sin() * 0.2;
            let open = close - 0.25;
            OhlcvBar::new(
                start_date() + Days::new(i as u64),
                open,
                close + 0.5,
                open - 0.5,
                close,
                10_000.0 + (i % 7) as f64 * 500.0,
            )
        })
        .collect()
}

/// Seeded random walk around $100 with realistic OHLC relationships.
pub fn generate_random_walk_bars(num_rows: usize, seed: u64) -> Vec<OhlcvBar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut current_price: f64 = 100.0 + rng.random_range(0.0..50.0);

    (0..num_rows)
        .map(|i| {
            // Random price movement between -1% and +1%
            let movement = rng.random_range(-0.01..0.01);
            current_price *= 1.0 + movement;

            let open = current_price * (1.0 + rng.random_range(-0.005..0.005));
            let high = current_price.max(open) * (1.0 + rng.random_range(0.0..0.005));
            let low = current_price.min(open) * (1.0 - rng.random_range(0.0..0.005));
            let volume = rng.random_range(10_000.0..110_000.0);

            OhlcvBar::new(
                start_date() + Days::new(i as u64),
                open,
                high,
                low,
                current_price,
                volume,
            )
        })
        .collect()
}
