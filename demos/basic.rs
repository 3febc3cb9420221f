//! Basic usage example of NCPS with CfC and LTC cells
//!
//! Runs a dense CfC over a sequence, then the same input through a wired
//! LTC whose synapses come from an AutoNCP wiring.
//!
//! Set `RUST_LOG=debug` to see cell and wiring construction logs.

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use ncps::prelude::*;

type Backend = NdArray<f32>;

fn main() -> NcpResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== NCPS Basic Example ===\n");
    let device = Default::default();

    // Example 1: Dense CfC, batch-first
    println!("Example 1: Dense CfC");
    let cfc: CfC<Backend> = Rnn::new(CfcConfig::new().init(20, 50, &device)?);

    let input = Tensor::<Backend, 3>::random([4, 10, 20], Distribution::Uniform(-1.0, 1.0), &device);
    let (output, state) = cfc.forward(input, None, None)?;

    println!("  Input shape:  [4, 10, 20]");
    println!("  Output shape: {:?}", output.dims());
    println!("  State shape:  {:?}", state.dims());
    println!();

    // Example 2: Sequence-first, last timestep only
    println!("Example 2: Sequence-first, last timestep only");
    let cfc_last: CfC<Backend> = Rnn::new(
        CfcConfig::new()
            .with_mode(CfcMode::NoGate)
            .init(20, 32, &device)?,
    )
    .with_batch_first(false)
    .with_return_sequences(false);

    let input_seq =
        Tensor::<Backend, 3>::random([10, 2, 20], Distribution::Uniform(-1.0, 1.0), &device);
    let (output_last, _) = cfc_last.forward(input_seq, None, None)?;

    println!("  Input shape:  [10, 2, 20]");
    println!("  Output shape: {:?}", output_last.dims());
    println!();

    // Example 3: Wired LTC with irregular sampling
    println!("Example 3: Wired LTC with irregular timespans");
    let mut wiring = AutoNCP::new(24, 4, 0.5, 12345)?;
    wiring.build(20)?;
    let ltc: LTC<Backend> = Rnn::new(LtcConfig::new().init(&wiring, None, &device)?);

    let input = Tensor::<Backend, 3>::random([2, 5, 20], Distribution::Uniform(-1.0, 1.0), &device);
    let timespans =
        Tensor::<Backend, 2>::random([2, 5], Distribution::Uniform(0.5, 2.0), &device);
    let (output_wired, _) = ltc.forward(input, None, Some(timespans))?;

    println!(
        "  Wiring: {} units, {} synapses, {} sensory synapses",
        wiring.units(),
        wiring.synapse_count(),
        wiring.sensory_synapse_count()
    );
    println!("  Output shape: {:?}", output_wired.dims());
    println!("  Output dimension is the motor count ({})", wiring.output_dim());
    println!();

    println!("=== Examples completed successfully! ===");
    Ok(())
}
