use std::fmt;
use std::ops::Range;

use ndarray::{Array2, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::{matrix_from_rows, matrix_to_rows, WiringConfig, WiringKind};
use crate::error::{NcpError, NcpResult};

/// Functional group a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuronType {
    Motor,
    Command,
    Inter,
}

impl fmt::Display for NeuronType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeuronType::Motor => "motor",
            NeuronType::Command => "command",
            NeuronType::Inter => "inter",
        };
        f.write_str(name)
    }
}

/// Sign of a synapse, applied structurally through the sign mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Excitatory,
    Inhibitory,
}

impl Polarity {
    /// Fair coin flip between excitatory and inhibitory
    pub fn balanced<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen::<bool>() {
            Polarity::Excitatory
        } else {
            Polarity::Inhibitory
        }
    }

    /// Roughly one inhibitory synapse for every two excitatory ones
    pub fn mostly_excitatory<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen::<f64>() < 0.33 {
            Polarity::Inhibitory
        } else {
            Polarity::Excitatory
        }
    }
}

impl From<Polarity> for i32 {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Excitatory => 1,
            Polarity::Inhibitory => -1,
        }
    }
}

impl TryFrom<i32> for Polarity {
    type Error = NcpError;

    fn try_from(value: i32) -> NcpResult<Self> {
        match value {
            1 => Ok(Polarity::Excitatory),
            -1 => Ok(Polarity::Inhibitory),
            other => Err(NcpError::Range(format!(
                "polarity must be -1 or 1, got {}",
                other
            ))),
        }
    }
}

/// Sizes of the motor, command and inter groups.
///
/// Unit ids are laid out motor first, then command, then inter, so the motor
/// group is always the prefix `0..motor` that cells expose as their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuronGroups {
    pub motor: usize,
    pub command: usize,
    pub inter: usize,
}

impl NeuronGroups {
    pub fn new(motor: usize, command: usize, inter: usize) -> Self {
        Self {
            motor,
            command,
            inter,
        }
    }

    /// Groups of a flat wiring: `output_dim` motor units, the rest inter
    pub fn flat(units: usize, output_dim: usize) -> NcpResult<Self> {
        if output_dim > units {
            return Err(NcpError::Config(format!(
                "output dimension {} exceeds number of units {}",
                output_dim, units
            )));
        }
        let groups = Self::new(output_dim, 0, units - output_dim);
        groups.validate()?;
        Ok(groups)
    }

    /// Every wiring needs a unit, and a motor unit to read its output from
    pub(crate) fn validate(&self) -> NcpResult<()> {
        if self.units() == 0 {
            return Err(NcpError::Config("wiring needs at least one unit".to_string()));
        }
        if self.motor == 0 {
            return Err(NcpError::Config(
                "wiring needs at least one motor neuron".to_string(),
            ));
        }
        Ok(())
    }

    pub fn units(&self) -> usize {
        self.motor + self.command + self.inter
    }

    pub fn size(&self, neuron_type: NeuronType) -> usize {
        match neuron_type {
            NeuronType::Motor => self.motor,
            NeuronType::Command => self.command,
            NeuronType::Inter => self.inter,
        }
    }

    pub fn range(&self, neuron_type: NeuronType) -> Range<usize> {
        match neuron_type {
            NeuronType::Motor => 0..self.motor,
            NeuronType::Command => self.motor..self.motor + self.command,
            NeuronType::Inter => self.motor + self.command..self.units(),
        }
    }

    pub fn ids(&self, neuron_type: NeuronType) -> Vec<usize> {
        self.range(neuron_type).collect()
    }

    pub fn type_of(&self, neuron_id: usize) -> NcpResult<NeuronType> {
        [NeuronType::Motor, NeuronType::Command, NeuronType::Inter]
            .into_iter()
            .find(|&ty| self.range(ty).contains(&neuron_id))
            .ok_or_else(|| {
                NcpError::Range(format!(
                    "neuron {} outside [0, {})",
                    neuron_id,
                    self.units()
                ))
            })
    }
}

/// Signed adjacency storage exclusively owned by a wiring while it is built.
///
/// Entries are -1, 0 or 1. The sensory matrix exists only once the input
/// width has been bound.
#[derive(Clone, Debug, PartialEq)]
pub struct Connectivity {
    adjacency: Array2<i32>,
    sensory: Option<Array2<i32>>,
}

impl Connectivity {
    pub fn new(units: usize) -> Self {
        Self {
            adjacency: Array2::zeros((units, units)),
            sensory: None,
        }
    }

    /// Restore connectivity from previously materialized matrices
    pub fn from_matrices(
        adjacency: Array2<i32>,
        sensory: Option<Array2<i32>>,
    ) -> NcpResult<Self> {
        let units = adjacency.nrows();
        if adjacency.ncols() != units {
            return Err(NcpError::Config(format!(
                "adjacency matrix must be square, got {}x{}",
                units,
                adjacency.ncols()
            )));
        }
        check_entries(&adjacency, "adjacency")?;
        if let Some(ref sensory) = sensory {
            if sensory.ncols() != units {
                return Err(NcpError::Config(format!(
                    "sensory adjacency matrix has {} columns, expected {}",
                    sensory.ncols(),
                    units
                )));
            }
            check_entries(sensory, "sensory adjacency")?;
        }
        Ok(Self { adjacency, sensory })
    }

    pub fn units(&self) -> usize {
        self.adjacency.nrows()
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.sensory.as_ref().map(|m| m.nrows())
    }

    /// Bind the input width and allocate an empty sensory matrix.
    ///
    /// Returns `Ok(true)` when the width was bound by this call and `Ok(false)`
    /// when the same width had already been bound.
    pub fn bind_input(&mut self, input_dim: usize) -> NcpResult<bool> {
        match self.input_dim() {
            Some(existing) if existing == input_dim => Ok(false),
            Some(existing) => Err(NcpError::State(format!(
                "conflicting input dimensions: wiring was built with {}, got {}",
                existing, input_dim
            ))),
            None if input_dim == 0 => Err(NcpError::Config(
                "input dimension must be positive".to_string(),
            )),
            None => {
                self.sensory = Some(Array2::zeros((input_dim, self.units())));
                Ok(true)
            }
        }
    }

    pub fn add_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> NcpResult<()> {
        let units = self.units();
        if src >= units || dest >= units {
            return Err(NcpError::Range(format!(
                "invalid synapse: src={}, dest={}, units={}",
                src, dest, units
            )));
        }
        let polarity = Polarity::try_from(polarity)?;
        self.adjacency[[src, dest]] = polarity.into();
        Ok(())
    }

    pub fn add_sensory_synapse(
        &mut self,
        src: usize,
        dest: usize,
        polarity: i32,
    ) -> NcpResult<()> {
        let units = self.units();
        let sensory = self.sensory.as_mut().ok_or_else(|| {
            NcpError::State("wiring must be built before adding sensory synapses".to_string())
        })?;
        if src >= sensory.nrows() || dest >= units {
            return Err(NcpError::Range(format!(
                "invalid sensory synapse: src={}, dest={}, input_dim={}, units={}",
                src,
                dest,
                sensory.nrows(),
                units
            )));
        }
        let polarity = Polarity::try_from(polarity)?;
        sensory[[src, dest]] = polarity.into();
        Ok(())
    }

    pub fn has_synapse(&self, src: usize, dest: usize) -> bool {
        self.adjacency
            .get([src, dest])
            .map_or(false, |&polarity| polarity != 0)
    }

    pub fn has_sensory_synapse(&self, src: usize, dest: usize) -> bool {
        self.sensory
            .as_ref()
            .and_then(|m| m.get([src, dest]))
            .map_or(false, |&polarity| polarity != 0)
    }

    pub fn adjacency(&self) -> &Array2<i32> {
        &self.adjacency
    }

    pub fn sensory(&self) -> Option<&Array2<i32>> {
        self.sensory.as_ref()
    }

    /// Incoming unit-to-unit synapses of every unit
    pub fn in_degrees(&self) -> Vec<usize> {
        count_nonzero(&self.adjacency, Axis(0))
    }

    /// Outgoing unit-to-unit synapses of every unit
    pub fn out_degrees(&self) -> Vec<usize> {
        count_nonzero(&self.adjacency, Axis(1))
    }

    /// Incoming sensory synapses of every unit (all zero before build)
    pub fn sensory_in_degrees(&self) -> Vec<usize> {
        match self.sensory {
            Some(ref sensory) => count_nonzero(sensory, Axis(0)),
            None => vec![0; self.units()],
        }
    }
}

fn check_entries(matrix: &Array2<i32>, what: &str) -> NcpResult<()> {
    match matrix.iter().find(|v| !(-1..=1).contains(*v)) {
        Some(bad) => Err(NcpError::Range(format!(
            "{} entries must be in {{-1, 0, 1}}, found {}",
            what, bad
        ))),
        None => Ok(()),
    }
}

/// Count non-zero entries per column (`Axis(0)`) or per row (`Axis(1)`)
fn count_nonzero(matrix: &Array2<i32>, axis: Axis) -> Vec<usize> {
    matrix
        .map(|&v| usize::from(v != 0))
        .sum_axis(axis)
        .to_vec()
}

/// Base trait for wiring configurations in Neural Circuit Policies
pub trait Wiring: Send + Sync + fmt::Debug {
    /// Adjacency storage backing this wiring
    fn connectivity(&self) -> &Connectivity;

    fn connectivity_mut(&mut self) -> &mut Connectivity;

    /// Group partition of the units
    fn groups(&self) -> NeuronGroups;

    /// Bind the input width and generate the sensory synapses.
    ///
    /// Building again with the same width is a no-op, a different width is
    /// a [`NcpError::State`].
    fn build(&mut self, input_dim: usize) -> NcpResult<()>;

    /// Flat configuration sufficient to rebuild identical masks
    fn config(&self) -> WiringConfig;

    fn units(&self) -> usize {
        self.connectivity().units()
    }

    /// Number of motor neurons
    fn output_dim(&self) -> usize {
        self.groups().motor
    }

    /// Number of sensory inputs, `None` until built
    fn input_dim(&self) -> Option<usize> {
        self.connectivity().input_dim()
    }

    fn is_built(&self) -> bool {
        self.input_dim().is_some()
    }

    fn num_layers(&self) -> usize {
        1
    }

    /// Unit ids of one layer, ordered from sensory side to motor side
    fn neurons_of_layer(&self, layer_id: usize) -> NcpResult<Vec<usize>> {
        if layer_id == 0 {
            Ok((0..self.units()).collect())
        } else {
            Err(NcpError::Range(format!("unknown layer {}", layer_id)))
        }
    }

    fn neuron_type(&self, neuron_id: usize) -> NcpResult<NeuronType> {
        self.groups().type_of(neuron_id)
    }

    fn adjacency_matrix(&self) -> &Array2<i32> {
        self.connectivity().adjacency()
    }

    fn sensory_adjacency_matrix(&self) -> Option<&Array2<i32>> {
        self.connectivity().sensory()
    }

    fn add_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> NcpResult<()> {
        self.connectivity_mut().add_synapse(src, dest, polarity)
    }

    fn add_sensory_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> NcpResult<()> {
        self.connectivity_mut()
            .add_sensory_synapse(src, dest, polarity)
    }

    fn synapse_count(&self) -> usize {
        self.connectivity().in_degrees().iter().sum()
    }

    fn sensory_synapse_count(&self) -> usize {
        self.connectivity().sensory_in_degrees().iter().sum()
    }

    fn in_degrees(&self) -> Vec<usize> {
        self.connectivity().in_degrees()
    }

    fn out_degrees(&self) -> Vec<usize> {
        self.connectivity().out_degrees()
    }

    fn sensory_in_degrees(&self) -> Vec<usize> {
        self.connectivity().sensory_in_degrees()
    }
}

/// Wiring assembled synapse by synapse through [`Wiring::add_synapse`]
#[derive(Clone, Debug)]
pub struct Custom {
    groups: NeuronGroups,
    connectivity: Connectivity,
}

impl Custom {
    pub fn new(groups: NeuronGroups) -> NcpResult<Self> {
        groups.validate()?;
        Ok(Self {
            groups,
            connectivity: Connectivity::new(groups.units()),
        })
    }

    /// `units` neurons of which the first `output_dim` are motor neurons
    pub fn with_units(units: usize, output_dim: usize) -> NcpResult<Self> {
        Self::new(NeuronGroups::flat(units, output_dim)?)
    }

    pub fn from_config(config: &WiringConfig) -> NcpResult<Self> {
        config.expect_kind(WiringKind::Custom)?;
        let groups = config.groups()?;
        Ok(Self {
            groups,
            connectivity: config.connectivity()?,
        })
    }
}

impl Wiring for Custom {
    fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    fn connectivity_mut(&mut self) -> &mut Connectivity {
        &mut self.connectivity
    }

    fn groups(&self) -> NeuronGroups {
        self.groups
    }

    fn build(&mut self, input_dim: usize) -> NcpResult<()> {
        if self.connectivity.bind_input(input_dim)? {
            tracing::debug!(input_dim, units = self.units(), "custom wiring built");
        }
        Ok(())
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            num_motor_neurons: Some(self.groups.motor),
            num_command_neurons: Some(self.groups.command),
            num_inter_neurons: Some(self.groups.inter),
            ..WiringConfig::from_wiring(WiringKind::Custom, self)
        }
    }
}

/// Fully connected wiring structure, used as a dense baseline
#[derive(Clone, Debug)]
pub struct FullyConnected {
    groups: NeuronGroups,
    connectivity: Connectivity,
    self_connections: bool,
    erev_init_seed: u64,
}

impl FullyConnected {
    pub fn new(
        units: usize,
        output_dim: Option<usize>,
        erev_init_seed: u64,
        self_connections: bool,
    ) -> NcpResult<Self> {
        if units == 0 {
            return Err(NcpError::Config("wiring needs at least one unit".to_string()));
        }
        let groups = NeuronGroups::flat(units, output_dim.unwrap_or(units))?;
        let mut connectivity = Connectivity::new(units);
        let mut rng = StdRng::seed_from_u64(erev_init_seed);

        for src in 0..units {
            for dest in 0..units {
                if src == dest && !self_connections {
                    continue;
                }
                let polarity = Polarity::mostly_excitatory(&mut rng);
                connectivity.add_synapse(src, dest, polarity.into())?;
            }
        }

        Ok(Self {
            groups,
            connectivity,
            self_connections,
            erev_init_seed,
        })
    }

    pub fn self_connections(&self) -> bool {
        self.self_connections
    }

    pub fn from_config(config: &WiringConfig) -> NcpResult<Self> {
        config.expect_kind(WiringKind::FullyConnected)?;
        let groups = NeuronGroups::flat(config.units, config.output_dim.unwrap_or(config.units))?;
        let erev_init_seed = config.erev_init_seed.unwrap_or(1111);
        let self_connections = config.self_connections.unwrap_or(true);

        if config.adjacency_matrix.is_none() {
            let mut wiring = Self::new(
                config.units,
                Some(groups.motor),
                erev_init_seed,
                self_connections,
            )?;
            if let Some(input_dim) = config.input_dim {
                wiring.build(input_dim)?;
            }
            return Ok(wiring);
        }

        Ok(Self {
            groups,
            connectivity: config.connectivity()?,
            self_connections,
            erev_init_seed,
        })
    }
}

impl Wiring for FullyConnected {
    fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    fn connectivity_mut(&mut self) -> &mut Connectivity {
        &mut self.connectivity
    }

    fn groups(&self) -> NeuronGroups {
        self.groups
    }

    fn build(&mut self, input_dim: usize) -> NcpResult<()> {
        if !self.connectivity.bind_input(input_dim)? {
            return Ok(());
        }

        let mut rng = StdRng::seed_from_u64(self.erev_init_seed);
        for src in 0..input_dim {
            for dest in 0..self.units() {
                let polarity = Polarity::mostly_excitatory(&mut rng);
                self.connectivity
                    .add_sensory_synapse(src, dest, polarity.into())?;
            }
        }
        tracing::debug!(
            input_dim,
            units = self.units(),
            "fully connected wiring built"
        );
        Ok(())
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            erev_init_seed: Some(self.erev_init_seed),
            self_connections: Some(self.self_connections),
            ..WiringConfig::from_wiring(WiringKind::FullyConnected, self)
        }
    }
}

impl WiringConfig {
    /// Fields every wiring shares: kind, sizes and the materialized matrices
    pub(crate) fn from_wiring(kind: WiringKind, wiring: &dyn Wiring) -> Self {
        WiringConfig {
            kind,
            units: wiring.units(),
            output_dim: Some(wiring.output_dim()),
            input_dim: wiring.input_dim(),
            adjacency_matrix: Some(matrix_to_rows(wiring.adjacency_matrix())),
            sensory_adjacency_matrix: wiring.sensory_adjacency_matrix().map(matrix_to_rows),
            ..WiringConfig::default()
        }
    }

    /// Rebuild the stored matrices, validating shapes and entries
    pub(crate) fn connectivity(&self) -> NcpResult<Connectivity> {
        let adjacency = match self.adjacency_matrix {
            Some(ref rows) => matrix_from_rows(rows, (self.units, self.units), "adjacency")?,
            None => Array2::zeros((self.units, self.units)),
        };
        let sensory = match (&self.sensory_adjacency_matrix, self.input_dim) {
            (Some(rows), Some(input_dim)) => Some(matrix_from_rows(
                rows,
                (input_dim, self.units),
                "sensory adjacency",
            )?),
            (Some(_), None) => {
                return Err(NcpError::Config(
                    "input_dim required when a sensory adjacency matrix is present".to_string(),
                ))
            }
            (None, Some(input_dim)) => Some(Array2::zeros((input_dim, self.units))),
            (None, None) => None,
        };
        Connectivity::from_matrices(adjacency, sensory)
    }

    pub(crate) fn expect_kind(&self, kind: WiringKind) -> NcpResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(NcpError::Config(format!(
                "expected a {:?} wiring config, got {:?}",
                kind, self.kind
            )))
        }
    }

    /// Explicit group sizes, checked against `units`
    pub(crate) fn groups(&self) -> NcpResult<NeuronGroups> {
        let groups = match (
            self.num_motor_neurons,
            self.num_command_neurons,
            self.num_inter_neurons,
        ) {
            (Some(motor), command, Some(inter)) => {
                NeuronGroups::new(motor, command.unwrap_or(0), inter)
            }
            _ => NeuronGroups::flat(self.units, self.output_dim.unwrap_or(self.units))?,
        };
        if groups.units() != self.units {
            return Err(NcpError::Config(format!(
                "group sizes {}+{}+{} do not sum to {} units",
                groups.motor, groups.command, groups.inter, self.units
            )));
        }
        groups.validate()?;
        Ok(groups)
    }
}
