// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

/// Single-layer LSTM over a lookback window.
///
/// The four gates share one input projection and one recurrent projection of
/// width `4 * hidden_size`, laid out as input, forget, cell, output.
#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,

    input_gates: Linear<B>,
    recurrent_gates: Linear<B>,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let input_gates = LinearConfig::new(input_size, 4 * hidden_size).init(device);
        let recurrent_gates = LinearConfig::new(hidden_size, 4 * hidden_size)
            .with_bias(false)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_gates,
            recurrent_gates,
        }
    }

    /// Runs the window through the cell.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, input_size]
    ///
    /// # Returns
    ///
    /// The hidden state after the last step, shape [batch_size, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let device = x.device();
        let [batch_size, sequence_length, _] = x.dims();
        let hidden = self.hidden_size;

        let mut h = Tensor::zeros([batch_size, hidden], &device);
        let mut c = Tensor::zeros([batch_size, hidden], &device);

        for t in 0..sequence_length {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, self.input_size]);

            let gates = self.input_gates.forward(x_t) + self.recurrent_gates.forward(h);

            let i_t = activation::sigmoid(gates.clone().narrow(1, 0, hidden));
            let f_t = activation::sigmoid(gates.clone().narrow(1, hidden, hidden));
            let g_t = activation::tanh(gates.clone().narrow(1, 2 * hidden, hidden));
            let o_t = activation::sigmoid(gates.narrow(1, 3 * hidden, hidden));

            c = f_t * c + i_t * g_t;
            h = o_t * activation::tanh(c.clone());
        }

        h
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}
