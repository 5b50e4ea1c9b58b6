pub mod config;
pub mod constants;
pub mod daily;
pub mod error;
#[cfg(test)]
pub mod test;
pub mod util {
    pub mod feature_engineering;
    pub mod instruments;
    pub mod metrics;
    pub mod ohlcv;
    pub mod pre_processor;
    pub mod scaler;
    #[cfg(test)]
    pub mod test_utils;
}

pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use daily::step_4_forecast_engine::{
    DynRegressor, ForecastEngine, ForecastPhase, ForecastPoint, ForecastResult,
};
pub use error::{ForecastError, Result};
