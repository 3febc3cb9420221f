use rand::prelude::*;

use super::base::{Connectivity, NeuronGroups, NeuronType, Polarity, Wiring};
use super::{WiringConfig, WiringKind};
use crate::error::{NcpError, NcpResult};

/// Random draws allowed per missing synapse and per candidate partner before
/// a fallback pass gives up.
const MAX_FALLBACK_DRAWS_PER_SYNAPSE: usize = 32;

/// Which adjacency matrix a generated synapse lands in
#[derive(Clone, Copy, Debug)]
enum Projection {
    Sensory,
    Internal,
}

impl Projection {
    fn connected(self, connectivity: &Connectivity, src: usize, dest: usize) -> bool {
        match self {
            Projection::Sensory => connectivity.has_sensory_synapse(src, dest),
            Projection::Internal => connectivity.has_synapse(src, dest),
        }
    }

    fn connect(
        self,
        connectivity: &mut Connectivity,
        src: usize,
        dest: usize,
        polarity: Polarity,
    ) -> NcpResult<()> {
        match self {
            Projection::Sensory => connectivity.add_sensory_synapse(src, dest, polarity.into()),
            Projection::Internal => connectivity.add_synapse(src, dest, polarity.into()),
        }
    }
}

/// `(anchor, candidate) -> (src, dest)`
type Orientation = fn(usize, usize) -> (usize, usize);

fn fan_in(anchor: usize, candidate: usize) -> (usize, usize) {
    (candidate, anchor)
}

fn fan_out(anchor: usize, candidate: usize) -> (usize, usize) {
    (anchor, candidate)
}

/// Tops up every anchor whose degree towards `candidates` is below
/// `min_degree`, adding random synapses until it reaches
/// `max(min_degree, fill_to)`. Returns the number of synapses added.
#[allow(clippy::too_many_arguments)]
fn top_up(
    connectivity: &mut Connectivity,
    rng: &mut StdRng,
    projection: Projection,
    anchors: &[usize],
    candidates: &[usize],
    orient: Orientation,
    min_degree: usize,
    fill_to: usize,
) -> NcpResult<usize> {
    if min_degree > candidates.len() {
        return Err(NcpError::Config(format!(
            "minimum degree {} exceeds the {} available partners",
            min_degree,
            candidates.len()
        )));
    }
    let mut added = 0;
    let wanted = fill_to.max(min_degree).min(candidates.len());

    for &anchor in anchors {
        let mut degree = candidates
            .iter()
            .filter(|&&c| {
                let (src, dest) = orient(anchor, c);
                projection.connected(connectivity, src, dest)
            })
            .count();
        if degree >= min_degree {
            continue;
        }

        let mut budget = (wanted - degree) * candidates.len() * MAX_FALLBACK_DRAWS_PER_SYNAPSE;
        while degree < wanted {
            if budget == 0 {
                tracing::warn!(anchor, degree, wanted, "fallback wiring exhausted its draws");
                return Err(NcpError::Config(format!(
                    "could not give neuron {} {} synapses after repeated random draws",
                    anchor, wanted
                )));
            }
            budget -= 1;

            let Some(&candidate) = candidates.choose(rng) else {
                break;
            };
            let (src, dest) = orient(anchor, candidate);
            if projection.connected(connectivity, src, dest) {
                continue;
            }
            projection.connect(connectivity, src, dest, Polarity::balanced(rng))?;
            degree += 1;
            added += 1;
        }
    }

    Ok(added)
}

/// Neural Circuit Policy wiring structure
/// Implements a 4-layer architecture: sensories -> inter -> command -> motor
#[derive(Clone, Debug)]
pub struct NCP {
    groups: NeuronGroups,
    connectivity: Connectivity,
    sensory_fanout: usize,
    inter_fanout: usize,
    recurrent_command_synapses: usize,
    motor_fanin: usize,
    min_fanin: usize,
    seed: u64,
}

impl NCP {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inter_neurons: usize,
        command_neurons: usize,
        motor_neurons: usize,
        sensory_fanout: usize,
        inter_fanout: usize,
        recurrent_command_synapses: usize,
        motor_fanin: usize,
        seed: u64,
    ) -> NcpResult<Self> {
        for (name, count) in [
            ("inter", inter_neurons),
            ("command", command_neurons),
            ("motor", motor_neurons),
        ] {
            if count == 0 {
                return Err(NcpError::Config(format!(
                    "NCP needs at least one {} neuron",
                    name
                )));
            }
        }
        if motor_fanin > command_neurons {
            return Err(NcpError::Config(format!(
                "motor fanin {} exceeds number of command neurons {}",
                motor_fanin, command_neurons
            )));
        }
        if sensory_fanout > inter_neurons {
            return Err(NcpError::Config(format!(
                "sensory fanout {} exceeds number of inter neurons {}",
                sensory_fanout, inter_neurons
            )));
        }
        if inter_fanout > command_neurons {
            return Err(NcpError::Config(format!(
                "inter fanout {} exceeds number of command neurons {}",
                inter_fanout, command_neurons
            )));
        }

        // Neuron IDs: [0..motor ... command ... inter]
        let groups = NeuronGroups::new(motor_neurons, command_neurons, inter_neurons);

        Ok(Self {
            groups,
            connectivity: Connectivity::new(groups.units()),
            sensory_fanout,
            inter_fanout,
            recurrent_command_synapses,
            motor_fanin,
            min_fanin: 1,
            seed,
        })
    }

    /// Minimum number of synapses every inter, command and motor neuron
    /// receives from its preceding layer (default 1).
    pub fn with_min_fanin(mut self, min_fanin: usize) -> NcpResult<Self> {
        let limit = self.groups.inter.min(self.groups.command);
        if min_fanin > limit {
            return Err(NcpError::Config(format!(
                "minimum fanin {} exceeds the smallest source layer ({} neurons)",
                min_fanin, limit
            )));
        }
        self.min_fanin = min_fanin;
        Ok(self)
    }

    pub fn min_fanin(&self) -> usize {
        self.min_fanin
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn build_sensory_to_inter_layer(&mut self, rng: &mut StdRng, input_dim: usize) -> NcpResult<()> {
        let inter_neurons = self.groups.ids(NeuronType::Inter);
        let sensory_neurons: Vec<usize> = (0..input_dim).collect();

        // Connect each sensory neuron to exactly sensory_fanout inter neurons
        for &src in &sensory_neurons {
            let selected: Vec<usize> = inter_neurons
                .choose_multiple(rng, self.sensory_fanout)
                .copied()
                .collect();
            for dest in selected {
                let polarity = Polarity::balanced(rng);
                self.connectivity
                    .add_sensory_synapse(src, dest, polarity.into())?;
            }
        }

        let mean_inter_fanin = (input_dim * self.sensory_fanout / self.groups.inter)
            .max(1)
            .min(input_dim);
        let added = top_up(
            &mut self.connectivity,
            rng,
            Projection::Sensory,
            &inter_neurons,
            &sensory_neurons,
            fan_in,
            self.min_fanin,
            mean_inter_fanin,
        )?;
        if added > 0 {
            tracing::debug!(added, "sensory synapses added to starved inter neurons");
        }
        Ok(())
    }

    fn build_inter_to_command_layer(&mut self, rng: &mut StdRng) -> NcpResult<()> {
        let inter_neurons = self.groups.ids(NeuronType::Inter);
        let command_neurons = self.groups.ids(NeuronType::Command);

        for &src in &inter_neurons {
            let selected: Vec<usize> = command_neurons
                .choose_multiple(rng, self.inter_fanout)
                .copied()
                .collect();
            for dest in selected {
                let polarity = Polarity::balanced(rng);
                self.connectivity.add_synapse(src, dest, polarity.into())?;
            }
        }

        let mean_command_fanin = (self.groups.inter * self.inter_fanout / self.groups.command)
            .max(1)
            .min(self.groups.inter);
        let added = top_up(
            &mut self.connectivity,
            rng,
            Projection::Internal,
            &command_neurons,
            &inter_neurons,
            fan_in,
            self.min_fanin,
            mean_command_fanin,
        )?;
        if added > 0 {
            tracing::debug!(added, "inter synapses added to starved command neurons");
        }
        Ok(())
    }

    fn build_recurrent_command_layer(&mut self, rng: &mut StdRng) -> NcpResult<()> {
        let command_neurons = self.groups.ids(NeuronType::Command);
        for _ in 0..self.recurrent_command_synapses {
            let (Some(&src), Some(&dest)) =
                (command_neurons.choose(rng), command_neurons.choose(rng))
            else {
                break;
            };
            let polarity = Polarity::balanced(rng);
            self.connectivity.add_synapse(src, dest, polarity.into())?;
        }
        Ok(())
    }

    fn build_command_to_motor_layer(&mut self, rng: &mut StdRng) -> NcpResult<()> {
        let motor_neurons = self.groups.ids(NeuronType::Motor);
        let command_neurons = self.groups.ids(NeuronType::Command);

        for &dest in &motor_neurons {
            let selected: Vec<usize> = command_neurons
                .choose_multiple(rng, self.motor_fanin)
                .copied()
                .collect();
            for src in selected {
                let polarity = Polarity::balanced(rng);
                self.connectivity.add_synapse(src, dest, polarity.into())?;
            }
        }

        top_up(
            &mut self.connectivity,
            rng,
            Projection::Internal,
            &motor_neurons,
            &command_neurons,
            fan_in,
            self.min_fanin,
            self.motor_fanin,
        )?;

        // Command neurons that drive no motor neuron get motor targets
        let mean_command_fanout = (self.groups.motor * self.motor_fanin / self.groups.command)
            .max(1)
            .min(self.groups.motor);
        let added = top_up(
            &mut self.connectivity,
            rng,
            Projection::Internal,
            &command_neurons,
            &motor_neurons,
            fan_out,
            1,
            mean_command_fanout,
        )?;
        if added > 0 {
            tracing::debug!(added, "motor synapses added to silent command neurons");
        }
        Ok(())
    }

    pub fn from_config(config: &WiringConfig) -> NcpResult<Self> {
        config.expect_kind(WiringKind::Ncp)?;
        let groups = config.groups()?;
        let required = |value: Option<usize>, name: &str| {
            value.ok_or_else(|| NcpError::Config(format!("NCP config is missing {}", name)))
        };

        let mut ncp = NCP::new(
            groups.inter,
            groups.command,
            groups.motor,
            required(config.sensory_fanout, "sensory_fanout")?,
            required(config.inter_fanout, "inter_fanout")?,
            required(config.recurrent_command_synapses, "recurrent_command_synapses")?,
            required(config.motor_fanin, "motor_fanin")?,
            config.seed.unwrap_or(22222),
        )?
        .with_min_fanin(config.min_fanin.unwrap_or(1))?;

        ncp.restore_or_build(config)?;
        Ok(ncp)
    }

    /// Adopt the stored matrices if present, otherwise regenerate from the seed
    fn restore_or_build(&mut self, config: &WiringConfig) -> NcpResult<()> {
        if config.adjacency_matrix.is_some() {
            self.connectivity = config.connectivity()?;
        } else if let Some(input_dim) = config.input_dim {
            self.build(input_dim)?;
        }
        Ok(())
    }
}

impl Wiring for NCP {
    fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    fn connectivity_mut(&mut self) -> &mut Connectivity {
        &mut self.connectivity
    }

    fn groups(&self) -> NeuronGroups {
        self.groups
    }

    fn num_layers(&self) -> usize {
        3
    }

    fn neurons_of_layer(&self, layer_id: usize) -> NcpResult<Vec<usize>> {
        match layer_id {
            0 => Ok(self.groups.ids(NeuronType::Inter)),
            1 => Ok(self.groups.ids(NeuronType::Command)),
            2 => Ok(self.groups.ids(NeuronType::Motor)),
            _ => Err(NcpError::Range(format!("unknown layer {}", layer_id))),
        }
    }

    fn build(&mut self, input_dim: usize) -> NcpResult<()> {
        if self.min_fanin > input_dim {
            return Err(NcpError::Config(format!(
                "minimum fanin {} exceeds input dimension {}",
                self.min_fanin, input_dim
            )));
        }
        if !self.connectivity.bind_input(input_dim)? {
            return Ok(());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.build_sensory_to_inter_layer(&mut rng, input_dim)?;
        self.build_inter_to_command_layer(&mut rng)?;
        self.build_recurrent_command_layer(&mut rng)?;
        self.build_command_to_motor_layer(&mut rng)?;

        tracing::debug!(
            input_dim,
            units = self.units(),
            synapses = self.synapse_count(),
            sensory_synapses = self.sensory_synapse_count(),
            "NCP wiring built"
        );
        Ok(())
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            num_inter_neurons: Some(self.groups.inter),
            num_command_neurons: Some(self.groups.command),
            num_motor_neurons: Some(self.groups.motor),
            sensory_fanout: Some(self.sensory_fanout),
            inter_fanout: Some(self.inter_fanout),
            recurrent_command_synapses: Some(self.recurrent_command_synapses),
            motor_fanin: Some(self.motor_fanin),
            min_fanin: Some(self.min_fanin),
            seed: Some(self.seed),
            ..WiringConfig::from_wiring(WiringKind::Ncp, self)
        }
    }
}

/// AutoNCP provides an easier way to create NCP wiring
#[derive(Clone, Debug)]
pub struct AutoNCP {
    ncp: NCP,
    sparsity_level: f64,
    seed: u64,
}

impl AutoNCP {
    pub fn new(units: usize, output_size: usize, sparsity_level: f64, seed: u64) -> NcpResult<Self> {
        if output_size + 2 >= units {
            return Err(NcpError::Config(format!(
                "output size {} must be less than units-2 (units = {})",
                output_size, units
            )));
        }
        if !(0.0..=0.9).contains(&sparsity_level) {
            return Err(NcpError::Config(format!(
                "sparsity level must be between 0.0 and 0.9, got {}",
                sparsity_level
            )));
        }

        let density_level = 1.0 - sparsity_level;
        let inter_and_command_neurons = units - output_size;
        let command_neurons = ((inter_and_command_neurons as f64 * 0.4).ceil() as usize).max(1);
        let inter_neurons = inter_and_command_neurons - command_neurons;

        let sensory_fanout = ((inter_neurons as f64 * density_level).ceil() as usize).max(1);
        let inter_fanout = ((command_neurons as f64 * density_level).ceil() as usize).max(1);
        let recurrent_command_synapses =
            ((command_neurons as f64 * density_level * 2.0).ceil() as usize).max(1);
        let motor_fanin = ((command_neurons as f64 * density_level).ceil() as usize).max(1);

        let ncp = NCP::new(
            inter_neurons,
            command_neurons,
            output_size,
            sensory_fanout,
            inter_fanout,
            recurrent_command_synapses,
            motor_fanin,
            seed,
        )?;

        Ok(Self {
            ncp,
            sparsity_level,
            seed,
        })
    }

    pub fn sparsity_level(&self) -> f64 {
        self.sparsity_level
    }

    /// The generated NCP this wiring delegates to
    pub fn ncp(&self) -> &NCP {
        &self.ncp
    }

    pub fn from_config(config: &WiringConfig) -> NcpResult<Self> {
        config.expect_kind(WiringKind::AutoNcp)?;
        let output_size = config
            .output_dim
            .ok_or_else(|| NcpError::Config("AutoNCP config is missing output_dim".to_string()))?;
        let mut auto = AutoNCP::new(
            config.units,
            output_size,
            config.sparsity_level.unwrap_or(0.5),
            config.seed.unwrap_or(22222),
        )?;
        auto.ncp.restore_or_build(config)?;
        Ok(auto)
    }
}

impl Wiring for AutoNCP {
    fn connectivity(&self) -> &Connectivity {
        self.ncp.connectivity()
    }

    fn connectivity_mut(&mut self) -> &mut Connectivity {
        self.ncp.connectivity_mut()
    }

    fn groups(&self) -> NeuronGroups {
        self.ncp.groups()
    }

    fn num_layers(&self) -> usize {
        self.ncp.num_layers()
    }

    fn neurons_of_layer(&self, layer_id: usize) -> NcpResult<Vec<usize>> {
        self.ncp.neurons_of_layer(layer_id)
    }

    fn build(&mut self, input_dim: usize) -> NcpResult<()> {
        self.ncp.build(input_dim)
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            kind: WiringKind::AutoNcp,
            sparsity_level: Some(self.sparsity_level),
            seed: Some(self.seed),
            ..self.ncp.config()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_up_reaches_minimum() {
        let mut connectivity = Connectivity::new(6);
        let mut rng = StdRng::seed_from_u64(7);
        let sources = [0, 1, 2];
        let targets = [3, 4, 5];
        connectivity.add_synapse(0, 3, 1).unwrap();

        top_up(
            &mut connectivity,
            &mut rng,
            Projection::Internal,
            &targets,
            &sources,
            fan_in,
            2,
            2,
        )
        .unwrap();

        for &dest in &targets {
            let fanin = sources
                .iter()
                .filter(|&&src| connectivity.has_synapse(src, dest))
                .count();
            assert!(fanin >= 2, "neuron {} has fanin {}", dest, fanin);
        }
    }

    #[test]
    fn test_top_up_rejects_unreachable_minimum() {
        let mut connectivity = Connectivity::new(4);
        let mut rng = StdRng::seed_from_u64(7);
        let result = top_up(
            &mut connectivity,
            &mut rng,
            Projection::Internal,
            &[3],
            &[0, 1],
            fan_in,
            3,
            3,
        );
        assert!(matches!(result, Err(NcpError::Config(_))));
    }

    #[test]
    fn test_fallback_connects_every_command_neuron() {
        // A single inter neuron with fanout 1 reaches only one of four commands
        let mut ncp = NCP::new(1, 4, 1, 1, 1, 0, 1, 5).unwrap();
        ncp.build(1).unwrap();
        let adjacency = ncp.adjacency_matrix();
        for dest in ncp.groups().range(NeuronType::Command) {
            assert_ne!(adjacency[[5, dest]], 0, "command {} is unreachable", dest);
        }
    }
}
