//! # RNN Cell Implementations
//!
//! Single-timestep cells for Neural Circuit Policies. Each cell implements
//! [`RnnCell`], so any of them can be driven by [`Rnn`](crate::rnn::Rnn) or
//! wrapped by [`MixedMemoryCell`].
//!
//! ## Cell Types
//!
//! | Cell | Description | Use Case |
//! |------|-------------|----------|
//! | [`LTCCell`] | Liquid Time-Constant, iterative ODE solve | Biologically accurate, slower |
//! | [`CfCCell`] | Closed-form Continuous-time | Fast, no unfold loop |
//! | [`WiredCfCCell`] | One CfC cell per wiring layer | NCP layer structure |
//! | [`MixedMemoryCell`] | Gated memory around any cell | Long-term dependencies |
//!
//! ## CfC Operating Modes
//!
//! ### Default Mode
//! ```text
//! h = tanh(ff1) × (1 - σ(t_a·t + t_b)) + tanh(ff2) × σ(t_a·t + t_b)
//! ```
//!
//! ### Pure Mode
//! ```text
//! h = -A × exp(-t × (|w_τ| + |ff1|)) × ff1 + A
//! ```
//!
//! ### NoGate Mode
//! ```text
//! h = tanh(ff1) + tanh(ff2) × σ(t_a·t + t_b)
//! ```
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_size]` | Input features |
//! | `state` | `[batch, state_size]` | Previous state (flattened) |
//! | `elapsed` | `[batch]` | Elapsed time per sample |
//! | `output` | `[batch, output_size]` | Cell output |
//!
//! ## Example
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use ncps::cells::{LtcConfig, RnnCell};
//! use ncps::wirings::{FullyConnected, Wiring};
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let mut wiring = FullyConnected::new(8, Some(2), 1234, true).unwrap();
//! wiring.build(4).unwrap();
//! let cell = LtcConfig::new().init::<Backend>(&wiring, None, &device).unwrap();
//!
//! let state = cell.initial_state(3, &device);
//! let input = Tensor::<Backend, 2>::zeros([3, 4], &device);
//! let elapsed = Tensor::<Backend, 1>::ones([3], &device);
//! let (output, state) = cell.step(input, state, elapsed).unwrap();
//! assert_eq!(output.dims(), [3, 2]);
//! assert_eq!(state.dims(), [3, 8]);
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{NcpError, NcpResult};

pub mod cfc_cell;
pub mod ltc_cell;
pub mod mapping;
pub mod memory_gate;
pub mod mixed_memory;
pub mod wired_cfc_cell;

pub use cfc_cell::{CfCCell, CfcConfig, CfcMode};
pub use ltc_cell::{LTCCell, LtcConfig};
pub use mapping::{Mapping, MappingMode};
pub use memory_gate::MemoryGate;
pub use mixed_memory::{MixedMemoryCell, MixedMemoryConfig, MixedMemoryState};
pub use wired_cfc_cell::WiredCfCCell;

/// A recurrent update rule evaluated one timestep at a time
pub trait RnnCell<B: Backend> {
    /// State carried between timesteps
    type State: Clone + std::fmt::Debug;

    fn input_size(&self) -> usize;

    /// Width of [`RnnCell::flatten_state`]
    fn state_size(&self) -> usize;

    fn output_size(&self) -> usize;

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State;

    /// The state as one `[batch, state_size]` tensor
    fn flatten_state(&self, state: &Self::State) -> Tensor<B, 2>;

    /// Advance by `elapsed` time units, returning `(output, new_state)`
    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Self::State,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Self::State)>;
}

/// Fail with a shape error unless `tensor`'s last dimension is `expected`
pub(crate) fn check_width<B: Backend>(
    context: &'static str,
    tensor: &Tensor<B, 2>,
    expected: usize,
) -> NcpResult<()> {
    let [_, actual] = tensor.dims();
    if actual != expected {
        return Err(NcpError::shape(context, expected, actual));
    }
    Ok(())
}

/// `[batch]` elapsed times broadcast to `[batch, width]`
pub(crate) fn expand_elapsed<B: Backend>(
    elapsed: Tensor<B, 1>,
    batch: usize,
    width: usize,
) -> NcpResult<Tensor<B, 2>> {
    let [len] = elapsed.dims();
    if len != batch {
        return Err(NcpError::shape("elapsed time batch", batch, len));
    }
    Ok(elapsed.unsqueeze_dim::<2>(1).expand([batch, width]))
}
