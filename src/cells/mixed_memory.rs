//! Mixed-memory wrapper: a discrete gated memory in front of any cell.
//!
//! Each step the [`MemoryGate`] mixes the external input with the wrapped
//! cell's previous state into a new memory, and the wrapped cell is stepped
//! on `tanh(memory) * output_gate` instead of the raw input. Elapsed time is
//! forwarded to the wrapped cell unchanged.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::memory_gate::MemoryGate;
use super::{check_width, RnnCell};
use crate::error::{NcpError, NcpResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixedMemoryConfig {
    /// Added to the forget gate pre-activation; positive values favor remembering
    pub forget_gate_bias: f64,
}

impl Default for MixedMemoryConfig {
    fn default() -> Self {
        Self {
            forget_gate_bias: 1.0,
        }
    }
}

impl MixedMemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forget_gate_bias(mut self, forget_gate_bias: f64) -> Self {
        self.forget_gate_bias = forget_gate_bias;
        self
    }

    /// Wrap `cell`, reading external inputs of width `input_size`.
    ///
    /// The wrapped cell is fed the gated memory, so it must accept inputs as
    /// wide as its own flattened state.
    pub fn init<B: Backend, C: RnnCell<B>>(
        &self,
        cell: C,
        input_size: usize,
        device: &B::Device,
    ) -> NcpResult<MixedMemoryCell<B, C>> {
        if cell.input_size() != cell.state_size() {
            return Err(NcpError::Config(format!(
                "wrapped cell takes {} inputs but its state is {} wide",
                cell.input_size(),
                cell.state_size()
            )));
        }
        if self.forget_gate_bias.is_nan() {
            return Err(NcpError::Config("forget_gate_bias must be a number".to_string()));
        }

        let gate = MemoryGate::new(input_size, cell.state_size(), self.forget_gate_bias, device);
        tracing::debug!(
            input_size,
            memory_size = cell.state_size(),
            forget_gate_bias = self.forget_gate_bias,
            "mixed-memory cell built"
        );
        Ok(MixedMemoryCell { gate, cell })
    }
}

/// State of a [`MixedMemoryCell`]: the gated memory plus the wrapped cell's own state
#[derive(Clone, Debug)]
pub struct MixedMemoryState<B: Backend, S> {
    pub memory: Tensor<B, 2>,
    pub cell: S,
}

/// Any [`RnnCell`] behind a [`MemoryGate`]
#[derive(Clone, Debug)]
pub struct MixedMemoryCell<B: Backend, C> {
    pub gate: MemoryGate<B>,
    pub cell: C,
}

impl<B: Backend, C: RnnCell<B>> MixedMemoryCell<B, C> {
    pub fn inner(&self) -> &C {
        &self.cell
    }

    pub fn memory_size(&self) -> usize {
        self.gate.memory_size()
    }
}

impl<B: Backend, C: RnnCell<B>> RnnCell<B> for MixedMemoryCell<B, C> {
    type State = MixedMemoryState<B, C::State>;

    fn input_size(&self) -> usize {
        self.gate.input_size()
    }

    /// Memory followed by the wrapped cell's flattened state
    fn state_size(&self) -> usize {
        self.gate.memory_size() + self.cell.state_size()
    }

    fn output_size(&self) -> usize {
        self.cell.output_size()
    }

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State {
        MixedMemoryState {
            memory: Tensor::zeros([batch, self.gate.memory_size()], device),
            cell: self.cell.initial_state(batch, device),
        }
    }

    fn flatten_state(&self, state: &Self::State) -> Tensor<B, 2> {
        Tensor::cat(
            vec![state.memory.clone(), self.cell.flatten_state(&state.cell)],
            1,
        )
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Self::State,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Self::State)> {
        check_width("mixed-memory input", &input, self.gate.input_size())?;
        check_width("mixed-memory memory", &state.memory, self.gate.memory_size())?;
        let flat = self.cell.flatten_state(&state.cell);
        check_width("mixed-memory cell state", &flat, self.gate.memory_size())?;

        let (cell_input, memory) = self.gate.forward(input, flat, state.memory);
        let (output, cell) = self.cell.step(cell_input, state.cell, elapsed)?;

        Ok((output, MixedMemoryState { memory, cell }))
    }
}
