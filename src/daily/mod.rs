pub mod lstm;
pub mod step_1_window_builder;
pub mod step_2_sequence_regressor;
pub mod step_3_linear_regressor;
pub mod step_4_forecast_engine;
pub mod step_5_engine_pool;
