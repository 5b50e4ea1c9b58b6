pub mod step_1_tensor_preparation;
pub mod step_2_lstm_cell;
pub mod step_3_lstm_model_arch;
pub mod step_4_lstm_regressor;
