//! Wired CfC Cell Implementation
//!
//! Multi-layer CfC cell that respects NCP wiring structure.
//! Creates separate CfC cells for each layer of the wiring, following the
//! connectivity patterns defined by the adjacency matrices.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::cfc_cell::{CfCCell, CfcConfig};
use super::{check_width, RnnCell};
use crate::error::{NcpError, NcpResult};
use crate::sparsity::SparsityMask;
use crate::wirings::Wiring;

/// Wired CfC Cell - Multi-layer CfC respecting NCP wiring structure
///
/// Layer `l` reads the output of layer `l - 1` (the sensory input for the
/// first layer). Its mask stacks the wiring block feeding it on top of an
/// all-ones recurrent block.
#[derive(Module, Debug)]
pub struct WiredCfCCell<B: Backend> {
    /// The layers of CfC cells, one per wiring layer
    layers: Vec<CfCCell<B>>,
    /// Layer sizes for state partitioning
    layer_sizes: Vec<usize>,
    state_size: usize,
    motor_size: usize,
    sensory_size: usize,
}

impl<B: Backend> WiredCfCCell<B> {
    /// Create a new WiredCfCCell with a given wiring
    ///
    /// The wiring must be built. Backbone settings of `config` are ignored;
    /// each layer's heads read `cat(layer input, layer state)` directly.
    pub fn new(config: &CfcConfig, wiring: &dyn Wiring, device: &B::Device) -> NcpResult<Self> {
        let input_dim = wiring.input_dim().ok_or_else(|| {
            NcpError::State(
                "unknown number of input features; build the wiring first".to_string(),
            )
        })?;
        let sensory = SparsityMask::sensory(wiring)?;
        let internal = SparsityMask::internal(wiring);
        let config = CfcConfig {
            backbone_layers: 0,
            proj_size: None,
            ..config.clone()
        };

        let num_layers = wiring.num_layers();
        let mut layers = Vec::with_capacity(num_layers);
        let mut layer_sizes = Vec::with_capacity(num_layers);
        let mut previous: Option<Vec<usize>> = None;

        for l in 0..num_layers {
            let hidden_units = wiring.neurons_of_layer(l)?;
            let num_hidden = hidden_units.len();

            let input_mask = match previous {
                None => {
                    let sensory_rows: Vec<usize> = (0..input_dim).collect();
                    sensory.block(&sensory_rows, &hidden_units)?
                }
                Some(ref prev_units) => internal.block(prev_units, &hidden_units)?,
            };
            let input_size = input_mask.shape().0;
            let mask = input_mask.stack_rows(&SparsityMask::dense(num_hidden, num_hidden))?;

            // Only the last layer exposes motor outputs
            let motor_size = if l + 1 == num_layers {
                wiring.output_dim().min(num_hidden)
            } else {
                num_hidden
            };
            layers.push(config.init_masked(
                input_size,
                num_hidden,
                motor_size,
                Some(&mask),
                device,
            )?);
            layer_sizes.push(num_hidden);
            previous = Some(hidden_units);
        }

        tracing::debug!(
            layers = num_layers,
            ?layer_sizes,
            input_dim,
            "wired CfC cell built"
        );

        Ok(Self {
            layers,
            layer_sizes,
            state_size: wiring.units(),
            motor_size: wiring.output_dim(),
            sensory_size: input_dim,
        })
    }

    pub fn motor_size(&self) -> usize {
        self.motor_size
    }

    pub fn num_layers(&self) -> usize {
        self.layer_sizes.len()
    }

    /// Sizes of each layer, in state order
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn layers(&self) -> &[CfCCell<B>] {
        &self.layers
    }

    /// Perform a forward pass through the wired CfC cell
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch_size, sensory_size]
    /// * `hx` - Hidden state tensor of shape [batch_size, state_size], layer-ordered
    /// * `elapsed` - Elapsed time per sample, shape [batch_size]
    ///
    /// # Returns
    /// * `(output, new_hidden)` - Output is motor neurons, new_hidden is full state
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        hx: Tensor<B, 2>,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Tensor<B, 2>)> {
        check_width("wired CfC input", &input, self.sensory_size)?;
        check_width("wired CfC state", &hx, self.state_size)?;

        let mut new_h_states: Vec<Tensor<B, 2>> = Vec::with_capacity(self.num_layers());
        let mut layer_input = input;
        let mut start_idx = 0;

        for (layer, &layer_size) in self.layers.iter().zip(&self.layer_sizes) {
            let h_state = hx.clone().narrow(1, start_idx, layer_size);
            start_idx += layer_size;

            let (output, new_h) = layer.forward(layer_input, h_state, elapsed.clone())?;
            layer_input = output;
            new_h_states.push(new_h);
        }

        Ok((layer_input, Tensor::cat(new_h_states, 1)))
    }
}

impl<B: Backend> RnnCell<B> for WiredCfCCell<B> {
    type State = Tensor<B, 2>;

    fn input_size(&self) -> usize {
        self.sensory_size
    }

    fn state_size(&self) -> usize {
        self.state_size
    }

    fn output_size(&self) -> usize {
        self.motor_size
    }

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State {
        Tensor::zeros([batch, self.state_size], device)
    }

    fn flatten_state(&self, state: &Self::State) -> Tensor<B, 2> {
        state.clone()
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Self::State,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Self::State)> {
        self.forward(input, state, elapsed)
    }
}
