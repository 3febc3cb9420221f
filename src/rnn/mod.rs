//! # Sequence Processing
//!
//! [`Rnn`] drives any [`RnnCell`] over a sequence, threading the state from
//! one timestep to the next.
//!
//! ## Available Layers
//!
//! | Layer | Cell | Notes |
//! |-------|------|-------|
//! | [`LTC`] | [`LTCCell`] | Iterative ODE solve, `ode_unfolds` per step |
//! | [`CfC`] | [`CfCCell`] | Closed form, one evaluation per step |
//! | [`WiredCfC`] | [`WiredCfCCell`] | One CfC per wiring layer |
//! | `Rnn<B, MixedMemoryCell<B, C>>` | [`MixedMemoryCell`] | Gated memory around `C` |
//!
//! ## Tensor Shapes
//!
//! | Format | Input shape | Default |
//! |--------|-------------|---------|
//! | Batch-first | `[batch, seq_len, features]` | ✓ Yes |
//! | Sequence-first | `[seq_len, batch, features]` | No |
//!
//! | Setting | Output shape |
//! |---------|--------------|
//! | `return_sequences=true` (default) | `[batch, seq_len, output_size]` |
//! | `return_sequences=false` | `[batch, 1, output_size]` |
//!
//! Timespans, when given, are `[batch, seq_len]`; they default to ones.
//!
//! ## Example
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use ncps::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let mut wiring = AutoNCP::new(16, 4, 0.5, 42).unwrap();
//! wiring.build(8).unwrap();
//! let ltc: LTC<Backend> = Rnn::new(LtcConfig::new().init(&wiring, None, &device).unwrap());
//!
//! let input = Tensor::<Backend, 3>::zeros([2, 5, 8], &device);
//! let (output, state) = ltc.forward(input, None, None).unwrap();
//! assert_eq!(output.dims(), [2, 5, 4]);
//! assert_eq!(state.dims(), [2, 16]);
//! ```

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::cells::{CfCCell, LTCCell, MixedMemoryCell, RnnCell, WiredCfCCell};
use crate::error::{NcpError, NcpResult};

/// LTC cell over a sequence
pub type LTC<B> = Rnn<B, LTCCell<B>>;
/// CfC cell over a sequence
pub type CfC<B> = Rnn<B, CfCCell<B>>;
/// Layered wired CfC cell over a sequence
pub type WiredCfC<B> = Rnn<B, WiredCfCCell<B>>;
/// Any cell behind a memory gate, over a sequence
pub type MixedMemoryRnn<B, C> = Rnn<B, MixedMemoryCell<B, C>>;

/// Recurrent driver feeding one timestep at a time to its cell
#[derive(Clone, Debug)]
pub struct Rnn<B: Backend, C> {
    cell: C,
    /// Whether input is batch-first (batch, seq, features) vs (seq, batch, features)
    batch_first: bool,
    /// Whether to return full sequence or just last timestep
    return_sequences: bool,
    _backend: PhantomData<B>,
}

impl<B: Backend, C: RnnCell<B>> Rnn<B, C> {
    pub fn new(cell: C) -> Self {
        Self {
            cell,
            batch_first: true,
            return_sequences: true,
            _backend: PhantomData,
        }
    }

    /// Set whether input is batch-first (default: true)
    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    /// Set whether to return full sequences (default: true)
    pub fn with_return_sequences(mut self, return_sequences: bool) -> Self {
        self.return_sequences = return_sequences;
        self
    }

    pub fn cell(&self) -> &C {
        &self.cell
    }

    pub fn into_cell(self) -> C {
        self.cell
    }

    pub fn input_size(&self) -> usize {
        self.cell.input_size()
    }

    pub fn output_size(&self) -> usize {
        self.cell.output_size()
    }

    /// Run the cell over every timestep of `input`
    ///
    /// # Returns
    /// `(output, final_state)`; output is `[batch, seq, output_size]`, or
    /// `[batch, 1, output_size]` without `return_sequences`.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Option<C::State>,
        timespans: Option<Tensor<B, 2>>,
    ) -> NcpResult<(Tensor<B, 3>, C::State)> {
        let device = input.device();
        let [d0, d1, _] = input.dims();
        let (batch_size, seq_len) = if self.batch_first { (d0, d1) } else { (d1, d0) };
        if seq_len == 0 {
            return Err(NcpError::Range("input sequence is empty".to_string()));
        }

        let timespans =
            timespans.unwrap_or_else(|| Tensor::<B, 2>::ones([batch_size, seq_len], &device));
        let [ts_batch, ts_len] = timespans.dims();
        if ts_batch != batch_size {
            return Err(NcpError::shape("timespan batch", batch_size, ts_batch));
        }
        if ts_len != seq_len {
            return Err(NcpError::shape("timespan length", seq_len, ts_len));
        }

        let mut current_state =
            state.unwrap_or_else(|| self.cell.initial_state(batch_size, &device));
        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step_input = if self.batch_first {
                input.clone().narrow(1, t, 1).squeeze(1)
            } else {
                input.clone().narrow(0, t, 1).squeeze(0)
            };
            let step_time = timespans.clone().narrow(1, t, 1).squeeze(1);

            let (output, new_state) = self.cell.step(step_input, current_state, step_time)?;
            current_state = new_state;

            if self.return_sequences || t == seq_len - 1 {
                outputs.push(output);
            }
        }

        // [batch, seq, output_size]
        Ok((Tensor::stack(outputs, 1), current_state))
    }
}
