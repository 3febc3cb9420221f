//! Sparse, signed connectivity between the neurons of a circuit.
//!
//! | Wiring | Description |
//! |--------|-------------|
//! | [`Custom`] | Empty adjacency, assembled synapse by synapse |
//! | [`FullyConnected`] | Every pair wired, dense baseline |
//! | [`NCP`] | Sensory → inter → command ⟲ → motor layered circuit |
//! | [`AutoNCP`] | [`NCP`] sized from a unit count and a sparsity level |
//! | [`Random`] | Uniform random sparsity |

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{NcpError, NcpResult};

mod base;
mod ncp;
mod random;

pub use base::{Connectivity, Custom, FullyConnected, NeuronGroups, NeuronType, Polarity, Wiring};
pub use ncp::{AutoNCP, NCP};
pub use random::Random;

/// Which wiring a [`WiringConfig`] describes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WiringKind {
    #[default]
    Custom,
    FullyConnected,
    Ncp,
    AutoNcp,
    Random,
}

/// Configuration struct for serialization/deserialization of wiring structures
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiringConfig {
    pub kind: WiringKind,
    pub units: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjacency_matrix: Option<Vec<Vec<i32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensory_adjacency_matrix: Option<Vec<Vec<i32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dim: Option<usize>,
    // FullyConnected fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erev_init_seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_connections: Option<bool>,
    // NCP fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_inter_neurons: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_command_neurons: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_motor_neurons: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensory_fanout: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inter_fanout: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrent_command_synapses: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motor_fanin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_fanin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    // AutoNCP / Random fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparsity_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
}

impl WiringConfig {
    pub fn to_json(&self) -> NcpResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> NcpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reconstruct any wiring from its configuration
pub fn wiring_from_config(config: &WiringConfig) -> NcpResult<Box<dyn Wiring>> {
    let wiring: Box<dyn Wiring> = match config.kind {
        WiringKind::Custom => Box::new(Custom::from_config(config)?),
        WiringKind::FullyConnected => Box::new(FullyConnected::from_config(config)?),
        WiringKind::Ncp => Box::new(NCP::from_config(config)?),
        WiringKind::AutoNcp => Box::new(AutoNCP::from_config(config)?),
        WiringKind::Random => Box::new(Random::from_config(config)?),
    };
    Ok(wiring)
}

pub(crate) fn matrix_to_rows(matrix: &Array2<i32>) -> Vec<Vec<i32>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

pub(crate) fn matrix_from_rows(
    rows: &[Vec<i32>],
    shape: (usize, usize),
    what: &str,
) -> NcpResult<Array2<i32>> {
    if rows.len() != shape.0 || rows.iter().any(|row| row.len() != shape.1) {
        return Err(NcpError::Config(format!(
            "{} matrix does not have shape {}x{}",
            what, shape.0, shape.1
        )));
    }
    let flat: Vec<i32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec(shape, flat)
        .map_err(|err| NcpError::Config(format!("invalid {} matrix: {}", what, err)))
}
