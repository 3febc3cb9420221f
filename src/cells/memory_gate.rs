use burn::module::{Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// LSTM-style gates deciding what a wrapped continuous-time cell receives
///
/// - z = W_in @ x + b + W_rec @ flat(cell_state)
/// - i, ig, fg, og = split(z, 4)
/// - m' = m * sigmoid(fg + forget_gate_bias) + tanh(i) * sigmoid(ig)
/// - cell_input = tanh(m') * sigmoid(og)
#[derive(Module, Debug)]
pub struct MemoryGate<B: Backend> {
    /// Maps input to 4 * memory_size (with bias)
    pub input_kernel: Linear<B>,
    /// Maps the wrapped cell's flattened state to 4 * memory_size (no bias)
    pub recurrent_kernel: Linear<B>,
    input_size: usize,
    memory_size: usize,
    forget_gate_bias: f64,
}

impl<B: Backend> MemoryGate<B> {
    /// # Arguments
    /// * `input_size` - Size of the external input
    /// * `memory_size` - Width of the memory, equal to the wrapped cell's flattened state
    /// * `forget_gate_bias` - Constant added to the forget gate before the sigmoid
    pub fn new(
        input_size: usize,
        memory_size: usize,
        forget_gate_bias: f64,
        device: &B::Device,
    ) -> Self {
        let mut input_kernel = LinearConfig::new(input_size, 4 * memory_size)
            .with_bias(true)
            .init(device);
        // Gates start unbiased so only forget_gate_bias tilts them
        input_kernel.bias = Some(Param::from_tensor(Tensor::zeros(
            [4 * memory_size],
            device,
        )));

        let recurrent_kernel = LinearConfig::new(memory_size, 4 * memory_size)
            .with_bias(false)
            .init(device);

        Self {
            input_kernel,
            recurrent_kernel,
            input_size,
            memory_size,
            forget_gate_bias,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    pub fn forget_gate_bias(&self) -> f64 {
        self.forget_gate_bias
    }

    /// Returns `(cell_input, new_memory)`
    ///
    /// # Arguments
    /// * `input` - `[batch, input_size]`
    /// * `cell_state` - the wrapped cell's flattened state, `[batch, memory_size]`
    /// * `memory` - `[batch, memory_size]`
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        cell_state: Tensor<B, 2>,
        memory: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let z = self.input_kernel.forward(input) + self.recurrent_kernel.forward(cell_state);

        // Split into 4 gates
        let chunks = z.chunk(4, 1);
        let input_activation = chunks[0].clone().tanh();
        let input_gate = activation::sigmoid(chunks[1].clone());
        let forget_gate = activation::sigmoid(chunks[2].clone().add_scalar(self.forget_gate_bias));
        let output_gate = activation::sigmoid(chunks[3].clone());

        let new_memory = memory * forget_gate + input_activation * input_gate;
        let cell_input = new_memory.clone().tanh() * output_gate;

        (cell_input, new_memory)
    }
}
