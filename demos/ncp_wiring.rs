//! NCP (Neural Circuit Policy) Wiring Example
//!
//! Builds layered NCP wirings, inspects their structure and drives both an
//! LTC and a layer-by-layer wired CfC with them.

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use ncps::prelude::*;

type Backend = NdArray<f32>;

fn describe(wiring: &dyn Wiring) -> NcpResult<()> {
    let names = ["inter", "command", "motor"];
    for (layer, name) in names.iter().enumerate().take(wiring.num_layers()) {
        println!("    - {} {} neurons", wiring.neurons_of_layer(layer)?.len(), name);
    }
    println!(
        "  Synapses: {} internal, {} sensory",
        wiring.synapse_count(),
        wiring.sensory_synapse_count()
    );
    Ok(())
}

fn main() -> NcpResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== NCP Wiring Example ===\n");
    let device = Default::default();

    // Example 1: AutoNCP sized from a unit count and sparsity
    println!("Example 1: AutoNCP Wiring with LTC");
    let mut wiring = AutoNCP::new(64, 8, 0.65, 22222)?;
    wiring.build(16)?;
    describe(&wiring)?;

    let ltc: LTC<Backend> = Rnn::new(LtcConfig::new().init(&wiring, None, &device)?);
    let input = Tensor::<Backend, 3>::random([2, 20, 16], Distribution::Uniform(-1.0, 1.0), &device);
    let (output, _state) = ltc.forward(input, None, None)?;
    println!("  Output shape: {:?} (motor neurons only)", output.dims());
    println!();

    // Example 2: Manual NCP with a guaranteed fan-in of 2
    println!("Example 2: Custom NCP Configuration");
    let mut manual = NCP::new(
        12,    // inter_neurons
        8,     // command_neurons
        4,     // motor_neurons
        5,     // sensory_fanout
        4,     // inter_fanout
        3,     // recurrent_command_synapses
        4,     // motor_fanin
        12345, // seed
    )?
    .with_min_fanin(2)?;
    manual.build(20)?;
    describe(&manual)?;

    let wired = WiredCfCCell::new(&CfcConfig::new(), &manual, &device)?;
    println!("  Wired CfC layer sizes: {:?}", wired.layer_sizes());
    let cfc: WiredCfC<Backend> = Rnn::new(wired);

    let input2 = Tensor::<Backend, 3>::random([4, 15, 20], Distribution::Uniform(0.0, 1.0), &device);
    let (output2, _state2) = cfc.forward(input2, None, None)?;
    println!("  Output shape: {:?}", output2.dims());
    println!();

    // Example 3: Sparsity level against synapse count
    println!("Example 3: Connectivity Comparison");
    for sparsity in [0.0, 0.3, 0.6, 0.9] {
        let mut wiring = AutoNCP::new(64, 8, sparsity, 42)?;
        wiring.build(16)?;
        println!(
            "  AutoNCP(64, 8, sparsity {:.1}): {} internal synapses",
            sparsity,
            wiring.synapse_count()
        );
    }
    println!();

    // Example 4: Unit roles
    println!("Example 4: Neuron types of the manual NCP");
    for id in [0, 4, 12, 23] {
        println!("  neuron {:>2}: {}", id, manual.neuron_type(id)?);
    }
    println!();

    println!("=== NCP Examples completed! ===");
    Ok(())
}
