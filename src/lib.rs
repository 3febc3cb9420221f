//! # NCPS - Neural Circuit Policies (Rust)
//!
//! Sparse, signed wirings and the continuous-time cells they constrain,
//! built on the Burn framework.
//!
//! ## Features
//!
//! - **Wirings**: custom, fully connected, NCP, AutoNCP and random connectivity
//! - **Sparsity Masks**: binary and sign masks multiplied into weights on every step
//! - **LTC**: Liquid Time-Constant cells with a semi-implicit ODE solver
//! - **CfC**: Closed-form Continuous-time cells (3 modes: default, no_gate, pure)
//! - **Mixed Memory**: LSTM-style gated memory around any cell
//! - **Configuration**: serde configs that rebuild wirings with identical masks
//!
//! ## Quick Start
//!
//! ```rust
//! use ncps::prelude::*;
//!
//! // Create a wiring configuration
//! let mut wiring = AutoNCP::new(32, 8, 0.5, 22222).unwrap();
//! wiring.build(16).unwrap(); // 16 input features
//!
//! assert_eq!(wiring.units(), 32);
//! assert_eq!(wiring.output_dim(), 8);
//! ```
//!
//! ## Cell-level Usage
//!
//! ```rust
//! use burn::backend::NdArray;
//! use ncps::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let wiring = FullyConnected::new(32, Some(8), 1234, true).unwrap();
//! let cell = LtcConfig::new()
//!     .with_input_mapping(MappingMode::Affine)
//!     .init::<Backend>(&wiring, Some(16), &device)
//!     .unwrap();
//! assert_eq!(cell.output_size(), 8);
//! ```

pub mod activation;
pub mod cells;
pub mod error;
pub mod rnn;
pub mod sparsity;
pub mod wirings;

pub use error::{NcpError, NcpResult};

pub mod prelude {
    pub use crate::activation::{Activation, LeCun};
    pub use crate::cells::{
        CfCCell, CfcConfig, CfcMode, LTCCell, LtcConfig, MappingMode, MixedMemoryCell,
        MixedMemoryConfig, MixedMemoryState, RnnCell, WiredCfCCell,
    };
    pub use crate::error::{NcpError, NcpResult};
    pub use crate::rnn::{CfC, Rnn, WiredCfC, LTC};
    pub use crate::sparsity::SparsityMask;
    pub use crate::wirings::{
        wiring_from_config, AutoNCP, Custom, FullyConnected, NeuronType, Random, Wiring,
        WiringConfig, NCP,
    };
}
