// External imports
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

// Internal imports
use super::step_2_lstm_cell::LstmCell;

/// LSTM followed by dropout and a linear head producing the next scaled close.
#[derive(Module, Debug)]
pub struct LstmForecaster<B: Backend> {
    input_size: usize,
    hidden_size: usize,

    lstm: LstmCell<B>,
    dropout: Dropout,
    output_layer: Linear<B>,
}

impl<B: Backend> LstmForecaster<B> {
    pub fn new(input_size: usize, hidden_size: usize, dropout_rate: f64, device: &B::Device) -> Self {
        let lstm = LstmCell::new(input_size, hidden_size, device);
        let dropout = DropoutConfig::new(dropout_rate).init();
        let output_layer = LinearConfig::new(hidden_size, 1).init(device);

        Self {
            input_size,
            hidden_size,
            lstm,
            dropout,
            output_layer,
        }
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, input_size]
    /// * `is_training` - Whether dropout is applied
    ///
    /// # Returns
    ///
    /// Returns the output tensor of shape [batch_size, 1]
    pub fn forward(&self, x: Tensor<B, 3>, is_training: bool) -> Tensor<B, 2> {
        let last_hidden = self.lstm.forward(x);

        let dropped = if is_training {
            self.dropout.forward(last_hidden)
        } else {
            last_hidden
        };

        self.output_layer.forward(dropped)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

/// Configuration for the LstmForecaster
#[derive(Debug, Clone)]
pub struct LstmForecasterConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub dropout_rate: f64,
}

impl LstmForecasterConfig {
    pub fn new(input_size: usize, hidden_size: usize, dropout_rate: f64) -> Self {
        Self {
            input_size,
            hidden_size,
            dropout_rate,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmForecaster<B> {
        LstmForecaster::new(self.input_size, self.hidden_size, self.dropout_rate, device)
    }
}
