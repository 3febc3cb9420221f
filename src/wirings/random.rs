use rand::prelude::*;

use super::base::{Connectivity, NeuronGroups, Polarity, Wiring};
use super::{WiringConfig, WiringKind};
use crate::error::{NcpError, NcpResult};

/// Random sparsity wiring structure
#[derive(Clone, Debug)]
pub struct Random {
    groups: NeuronGroups,
    connectivity: Connectivity,
    sparsity_level: f64,
    random_seed: u64,
}

/// Draw `round(total * (1 - sparsity))` distinct `(src, dest)` pairs
fn sample_pairs(
    rng: &mut StdRng,
    sources: usize,
    targets: usize,
    sparsity_level: f64,
) -> Vec<(usize, usize)> {
    let total_possible = sources * targets;
    let num_synapses = (total_possible as f64 * (1.0 - sparsity_level)).round() as usize;

    let all_pairs: Vec<(usize, usize)> = (0..sources)
        .flat_map(|src| (0..targets).map(move |dest| (src, dest)))
        .collect();

    all_pairs
        .choose_multiple(rng, num_synapses)
        .copied()
        .collect()
}

impl Random {
    pub fn new(
        units: usize,
        output_dim: Option<usize>,
        sparsity_level: f64,
        random_seed: u64,
    ) -> NcpResult<Self> {
        if !(0.0..1.0).contains(&sparsity_level) {
            return Err(NcpError::Config(format!(
                "sparsity level must be in range [0, 1), got {}",
                sparsity_level
            )));
        }
        if units == 0 {
            return Err(NcpError::Config("wiring needs at least one unit".to_string()));
        }

        let groups = NeuronGroups::flat(units, output_dim.unwrap_or(units))?;
        let mut connectivity = Connectivity::new(units);
        let mut rng = StdRng::seed_from_u64(random_seed);

        for (src, dest) in sample_pairs(&mut rng, units, units, sparsity_level) {
            let polarity = Polarity::mostly_excitatory(&mut rng);
            connectivity.add_synapse(src, dest, polarity.into())?;
        }

        Ok(Self {
            groups,
            connectivity,
            sparsity_level,
            random_seed,
        })
    }

    pub fn sparsity_level(&self) -> f64 {
        self.sparsity_level
    }

    pub fn from_config(config: &WiringConfig) -> NcpResult<Self> {
        config.expect_kind(WiringKind::Random)?;
        let mut wiring = Self::new(
            config.units,
            config.output_dim,
            config.sparsity_level.unwrap_or(0.5),
            config.random_seed.unwrap_or(1111),
        )?;

        if config.adjacency_matrix.is_some() {
            wiring.connectivity = config.connectivity()?;
        } else if let Some(input_dim) = config.input_dim {
            wiring.build(input_dim)?;
        }
        Ok(wiring)
    }
}

impl Wiring for Random {
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

        let mut rng = StdRng::seed_from_u64(self.random_seed);
        let pairs = sample_pairs(&mut rng, input_dim, self.units(), self.sparsity_level);
        for (src, dest) in pairs {
            let polarity = Polarity::mostly_excitatory(&mut rng);
            self.connectivity
                .add_sensory_synapse(src, dest, polarity.into())?;
        }

        tracing::debug!(
            input_dim,
            sparsity = self.sparsity_level,
            sensory_synapses = self.sensory_synapse_count(),
            "random wiring built"
        );
        Ok(())
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            sparsity_level: Some(self.sparsity_level),
            random_seed: Some(self.random_seed),
            ..WiringConfig::from_wiring(WiringKind::Random, self)
        }
    }
}
