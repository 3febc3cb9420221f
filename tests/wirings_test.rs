//! Tests for the wirings module

use ncps::wirings::*;
use ncps::NcpError;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(wiring: &dyn Wiring) {
        let groups = wiring.groups();
        assert_eq!(
            groups.motor + groups.command + groups.inter,
            wiring.units(),
            "group sizes must partition the units"
        );
        assert!(wiring
            .adjacency_matrix()
            .iter()
            .all(|x| [-1, 0, 1].contains(x)));
        if let Some(sensory) = wiring.sensory_adjacency_matrix() {
            assert!(sensory.iter().all(|x| [-1, 0, 1].contains(x)));
        }
    }

    fn sample_ncp(seed: u64) -> NCP {
        NCP::new(
            10,   // inter_neurons
            8,    // command_neurons
            5,    // motor_neurons
            6,    // sensory_fanout
            6,    // inter_fanout
            4,    // recurrent_command_synapses
            6,    // motor_fanin
            seed, // seed
        )
        .unwrap()
    }

    #[test]
    fn test_fully_connected_creation() {
        let fc = FullyConnected::new(10, None, 1234, true).unwrap();
        assert_eq!(fc.units(), 10);
        assert_eq!(fc.output_dim(), 10);
        assert!(!fc.is_built());
        assert_eq!(fc.synapse_count(), 100);
        assert_valid(&fc);

        let no_self = FullyConnected::new(10, None, 1234, false).unwrap();
        assert_eq!(no_self.synapse_count(), 90);
        assert!((0..10).all(|i| no_self.adjacency_matrix()[[i, i]] == 0));
    }

    #[test]
    fn test_fully_connected_build() {
        let mut fc = FullyConnected::new(10, Some(5), 1234, true).unwrap();
        fc.build(20).unwrap();
        assert!(fc.is_built());
        assert_eq!(fc.input_dim(), Some(20));

        let sensory = fc.sensory_adjacency_matrix().unwrap();
        assert_eq!(sensory.shape(), &[20, 10]);
        assert_eq!(fc.sensory_synapse_count(), 200);
        assert_valid(&fc);
    }

    #[test]
    fn test_fully_connected_is_seeded() {
        let a = FullyConnected::new(12, None, 99, true).unwrap();
        let b = FullyConnected::new(12, None, 99, true).unwrap();
        assert_eq!(a.adjacency_matrix(), b.adjacency_matrix());

        let inhibitory = a.adjacency_matrix().iter().filter(|&&x| x == -1).count();
        assert!(inhibitory > 0 && inhibitory < 144);
    }

    #[test]
    fn test_build_is_idempotent_for_same_width() {
        let mut fc = FullyConnected::new(10, None, 1234, true).unwrap();
        fc.build(20).unwrap();
        let before = fc.sensory_adjacency_matrix().unwrap().clone();

        fc.build(20).unwrap();
        assert_eq!(fc.sensory_adjacency_matrix().unwrap(), &before);
    }

    #[test]
    fn test_conflicting_input_dim() {
        let mut fc = FullyConnected::new(10, None, 1234, true).unwrap();
        fc.build(20).unwrap();
        assert!(matches!(fc.build(30), Err(NcpError::State(_))));
        assert_eq!(fc.input_dim(), Some(20));
    }

    #[test]
    fn test_zero_input_dim_is_config_error() {
        let mut wiring = Custom::with_units(4, 1).unwrap();
        assert!(matches!(wiring.build(0), Err(NcpError::Config(_))));
        assert!(!wiring.is_built());
    }

    #[test]
    fn test_add_synapse_overwrites() {
        let mut wiring = Custom::with_units(4, 1).unwrap();
        wiring.add_synapse(0, 3, 1).unwrap();
        wiring.add_synapse(0, 3, -1).unwrap();

        assert_eq!(wiring.adjacency_matrix()[[0, 3]], -1);
        assert_eq!(wiring.synapse_count(), 1);
    }

    #[test]
    fn test_add_synapse_range_errors() {
        let mut wiring = Custom::with_units(4, 1).unwrap();
        assert!(matches!(wiring.add_synapse(4, 0, 1), Err(NcpError::Range(_))));
        assert!(matches!(wiring.add_synapse(0, 4, 1), Err(NcpError::Range(_))));
        assert!(matches!(wiring.add_synapse(0, 1, 0), Err(NcpError::Range(_))));
        assert!(matches!(wiring.add_synapse(0, 1, 2), Err(NcpError::Range(_))));
        assert_eq!(wiring.synapse_count(), 0);
    }

    #[test]
    fn test_add_sensory_synapse_requires_build() {
        let mut wiring = Custom::with_units(4, 1).unwrap();
        assert!(matches!(
            wiring.add_sensory_synapse(0, 0, 1),
            Err(NcpError::State(_))
        ));

        wiring.build(2).unwrap();
        wiring.add_sensory_synapse(1, 3, -1).unwrap();
        assert_eq!(wiring.sensory_adjacency_matrix().unwrap()[[1, 3]], -1);
        assert!(matches!(
            wiring.add_sensory_synapse(2, 0, 1),
            Err(NcpError::Range(_))
        ));
        assert!(matches!(
            wiring.add_sensory_synapse(0, 4, 1),
            Err(NcpError::Range(_))
        ));
    }

    #[test]
    fn test_degrees() {
        let mut wiring = Custom::with_units(3, 1).unwrap();
        wiring.add_synapse(0, 1, 1).unwrap();
        wiring.add_synapse(2, 1, -1).unwrap();
        wiring.add_synapse(1, 0, 1).unwrap();

        assert_eq!(wiring.in_degrees(), vec![1, 2, 0]);
        assert_eq!(wiring.out_degrees(), vec![1, 1, 1]);
    }

    #[test]
    fn test_ncp_structure() {
        let ncp = sample_ncp(22222);

        assert_eq!(ncp.units(), 23); // 10 + 8 + 5
        assert_eq!(ncp.output_dim(), 5);
        assert_eq!(ncp.num_layers(), 3);
        assert_eq!(ncp.neurons_of_layer(0).unwrap().len(), 10); // inter
        assert_eq!(ncp.neurons_of_layer(1).unwrap().len(), 8); // command
        assert_eq!(ncp.neurons_of_layer(2).unwrap(), vec![0, 1, 2, 3, 4]); // motor
        assert!(matches!(ncp.neurons_of_layer(3), Err(NcpError::Range(_))));
    }

    #[test]
    fn test_ncp_neuron_types() {
        let ncp = sample_ncp(22222);

        assert_eq!(ncp.neuron_type(0).unwrap(), NeuronType::Motor);
        assert_eq!(ncp.neuron_type(4).unwrap(), NeuronType::Motor);
        assert_eq!(ncp.neuron_type(5).unwrap(), NeuronType::Command);
        assert_eq!(ncp.neuron_type(12).unwrap(), NeuronType::Command);
        assert_eq!(ncp.neuron_type(13).unwrap(), NeuronType::Inter);
        assert_eq!(ncp.neuron_type(22).unwrap(), NeuronType::Inter);
        assert!(matches!(ncp.neuron_type(23), Err(NcpError::Range(_))));
        assert_eq!(NeuronType::Command.to_string(), "command");
    }

    #[test]
    fn test_ncp_is_reproducible() {
        let mut a = sample_ncp(7);
        let mut b = sample_ncp(7);
        a.build(12).unwrap();
        b.build(12).unwrap();

        assert_eq!(a.adjacency_matrix(), b.adjacency_matrix());
        assert_eq!(a.sensory_adjacency_matrix(), b.sensory_adjacency_matrix());
    }

    #[test]
    fn test_ncp_layered_connectivity() {
        let mut ncp = sample_ncp(22222);
        ncp.build(12).unwrap();
        assert_valid(&ncp);

        let adjacency = ncp.adjacency_matrix();
        let motor = ncp.neurons_of_layer(2).unwrap();
        let command = ncp.neurons_of_layer(1).unwrap();
        let inter = ncp.neurons_of_layer(0).unwrap();

        // Sensory inputs only reach inter neurons
        let sensory = ncp.sensory_adjacency_matrix().unwrap();
        for src in 0..12 {
            for dest in motor.iter().chain(&command) {
                assert_eq!(sensory[[src, *dest]], 0);
            }
        }
        // Motor neurons never project anywhere
        for &src in &motor {
            assert!(adjacency.row(src).iter().all(|&x| x == 0));
        }
        // Inter neurons never reach motor neurons directly
        for &src in &inter {
            for &dest in &motor {
                assert_eq!(adjacency[[src, dest]], 0);
            }
        }
    }

    #[test]
    fn test_ncp_minimum_fanin_holds_for_any_seed() {
        for seed in [1, 2, 3, 42, 22222] {
            let mut ncp = NCP::new(12, 6, 3, 2, 2, 3, 2, seed)
                .unwrap()
                .with_min_fanin(2)
                .unwrap();
            ncp.build(4).unwrap();

            let sensory_in = ncp.sensory_in_degrees();
            for inter in ncp.neurons_of_layer(0).unwrap() {
                assert!(sensory_in[inter] >= 2, "seed {}: inter {} starved", seed, inter);
            }

            let adjacency = ncp.adjacency_matrix();
            let inter = ncp.neurons_of_layer(0).unwrap();
            for command in ncp.neurons_of_layer(1).unwrap() {
                let fanin = inter
                    .iter()
                    .filter(|&&src| adjacency[[src, command]] != 0)
                    .count();
                assert!(fanin >= 2, "seed {}: command {} starved", seed, command);
            }

            let out = ncp.out_degrees();
            for command in ncp.neurons_of_layer(1).unwrap() {
                assert!(out[command] >= 1, "seed {}: command {} is silent", seed, command);
            }
            let in_degrees = ncp.in_degrees();
            for motor in ncp.neurons_of_layer(2).unwrap() {
                assert!(in_degrees[motor] >= 2);
            }
        }
    }

    #[test]
    fn test_ncp_invalid_parameters() {
        // motor fanin larger than command layer
        assert!(matches!(
            NCP::new(10, 4, 2, 3, 3, 2, 5, 1),
            Err(NcpError::Config(_))
        ));
        // sensory fanout larger than inter layer
        assert!(matches!(
            NCP::new(3, 4, 2, 4, 3, 2, 2, 1),
            Err(NcpError::Config(_))
        ));
        // empty group
        assert!(matches!(
            NCP::new(3, 0, 2, 1, 0, 0, 0, 1),
            Err(NcpError::Config(_))
        ));
        // min fanin larger than a source layer
        let ncp = NCP::new(3, 4, 2, 2, 2, 2, 2, 1).unwrap();
        assert!(matches!(ncp.with_min_fanin(4), Err(NcpError::Config(_))));
        // min fanin larger than the input width
        let mut ncp = NCP::new(3, 4, 2, 2, 2, 2, 2, 1)
            .unwrap()
            .with_min_fanin(3)
            .unwrap();
        assert!(matches!(ncp.build(2), Err(NcpError::Config(_))));
    }

    #[test]
    fn test_auto_ncp() {
        let mut wiring = AutoNCP::new(32, 8, 0.5, 22222).unwrap();
        wiring.build(16).unwrap();

        assert_eq!(wiring.units(), 32);
        assert_eq!(wiring.output_dim(), 8);
        assert_eq!(wiring.num_layers(), 3);
        assert_eq!(wiring.sparsity_level(), 0.5);
        assert_valid(&wiring);

        let groups = wiring.groups();
        assert_eq!(groups.motor, 8);
        assert_eq!(groups.command, 10); // ceil(0.4 * 24)
        assert_eq!(groups.inter, 14);
    }

    #[test]
    fn test_auto_ncp_invalid() {
        assert!(matches!(
            AutoNCP::new(10, 8, 0.5, 1),
            Err(NcpError::Config(_))
        ));
        assert!(matches!(
            AutoNCP::new(32, 8, 0.95, 1),
            Err(NcpError::Config(_))
        ));
        assert!(matches!(
            AutoNCP::new(32, 8, -0.1, 1),
            Err(NcpError::Config(_))
        ));
    }

    #[test]
    fn test_random_wiring() {
        let mut wiring = Random::new(10, Some(3), 0.75, 1111).unwrap();
        assert_eq!(wiring.synapse_count(), 25);
        wiring.build(4).unwrap();
        assert_eq!(wiring.sensory_synapse_count(), 10);
        assert_valid(&wiring);

        assert!(matches!(
            Random::new(10, None, 1.0, 1),
            Err(NcpError::Config(_))
        ));
    }

    #[test]
    fn test_output_dim_bounded_by_units() {
        assert!(matches!(
            FullyConnected::new(4, Some(5), 1, true),
            Err(NcpError::Config(_))
        ));
        assert!(matches!(Custom::with_units(4, 5), Err(NcpError::Config(_))));
    }

    #[test]
    fn test_wiring_needs_a_motor_neuron() {
        assert!(matches!(
            FullyConnected::new(3, Some(0), 1, true),
            Err(NcpError::Config(_))
        ));
        assert!(matches!(
            Random::new(3, Some(0), 0.5, 1),
            Err(NcpError::Config(_))
        ));
        assert!(matches!(Custom::with_units(3, 0), Err(NcpError::Config(_))));
        assert!(matches!(
            Custom::new(NeuronGroups::new(0, 2, 2)),
            Err(NcpError::Config(_))
        ));
    }
}
