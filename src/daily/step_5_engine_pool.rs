// External crates
use dashmap::DashMap;
use log::info;
use std::sync::{Arc, Mutex, MutexGuard};

// Internal modules
use super::step_2_sequence_regressor::SequenceRegressor;
use super::step_4_forecast_engine::{ForecastEngine, ForecastPoint, ForecastResult};
use crate::error::{ForecastError, Result};
use crate::util::ohlcv::OhlcvBar;

type SharedEngine<R> = Arc<Mutex<ForecastEngine<R>>>;

/// One engine per instrument symbol.
///
/// Requests for the same symbol are serialised on that engine's mutex;
/// different symbols proceed independently.
pub struct EnginePool<R: SequenceRegressor> {
    engines: DashMap<String, SharedEngine<R>>,
    factory: Box<dyn Fn() -> ForecastEngine<R> + Send + Sync>,
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn lock<'a, R: SequenceRegressor>(
    engine: &'a SharedEngine<R>,
    symbol: &str,
) -> Result<MutexGuard<'a, ForecastEngine<R>>> {
    engine.lock().map_err(|_| {
        ForecastError::TrainingFailed(format!("engine for {} was poisoned by a panic", symbol))
    })
}

impl<R: SequenceRegressor> EnginePool<R> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> ForecastEngine<R> + Send + Sync + 'static,
    {
        Self {
            engines: DashMap::new(),
            factory: Box::new(factory),
        }
    }

    /// Engine for `symbol`, created on first use.
    pub fn engine(&self, symbol: &str) -> SharedEngine<R> {
        let key = normalize(symbol);
        self.engines
            .entry(key.clone())
            .or_insert_with(|| {
                info!("Creating forecast engine for {}", key);
                Arc::new(Mutex::new((self.factory)()))
            })
            .value()
            .clone()
    }

    pub fn train_and_forecast(
        &self,
        symbol: &str,
        bars: &[OhlcvBar],
        lookback: usize,
        horizon: usize,
        validation_split: f64,
    ) -> Result<ForecastResult> {
        let engine = self.engine(symbol);
        let mut guard = lock(&engine, symbol)?;
        guard.train_and_forecast(bars, lookback, horizon, validation_split)
    }

    /// Fails with `NotTrained` for a symbol that has never been trained.
    pub fn forecast_only(
        &self,
        symbol: &str,
        bars: &[OhlcvBar],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>> {
        let engine = self
            .engines
            .get(&normalize(symbol))
            .map(|entry| entry.value().clone())
            .ok_or(ForecastError::NotTrained)?;
        let guard = lock(&engine, symbol)?;
        guard.forecast_only(bars, horizon)
    }

    pub fn reset(&self, symbol: &str) -> Result<()> {
        let engine = self.engines.get(&normalize(symbol)).map(|e| e.value().clone());
        if let Some(engine) = engine {
            lock(&engine, symbol)?.reset();
        }
        Ok(())
    }

    pub fn remove(&self, symbol: &str) -> bool {
        self.engines.remove(&normalize(symbol)).is_some()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
