//! Mixed Memory Example
//!
//! Wraps a wired CfC cell in a gated memory and compares how much of an
//! early impulse survives a long run of zeros, with and without the wrapper.

use burn::backend::NdArray;
use burn::tensor::Tensor;
use ncps::prelude::*;
use ncps::rnn::MixedMemoryRnn;

type Backend = NdArray<f32>;

/// A single impulse at t = 0 followed by silence, `[1, seq_len, features]`
fn impulse(seq_len: usize, features: usize) -> Tensor<Backend, 3> {
    let device = Default::default();
    let head = Tensor::<Backend, 3>::ones([1, 1, features], &device);
    let tail = Tensor::<Backend, 3>::zeros([1, seq_len - 1, features], &device);
    Tensor::cat(vec![head, tail], 1)
}

fn main() -> NcpResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Mixed Memory Example ===\n");
    let device = Default::default();

    // The wrapped cell reads the gated memory, which is as wide as its state
    let units = 16;
    let mut wiring = AutoNCP::new(units, 2, 0.5, 7)?;
    wiring.build(units)?;

    let plain = CfcConfig::new().init_with_wiring::<Backend>(&wiring, &device)?;
    let wrapped = MixedMemoryConfig::new()
        .with_forget_gate_bias(3.0)
        .init(plain.clone(), 4, &device)?;
    println!(
        "Wrapped cell: {} inputs, {} state values ({} memory + {} cell)",
        wrapped.input_size(),
        wrapped.state_size(),
        wrapped.memory_size(),
        wrapped.inner().state_size()
    );

    let rnn: MixedMemoryRnn<Backend, CfCCell<Backend>> = Rnn::new(wrapped);
    let (output, state) = rnn.forward(impulse(50, 4), None, None)?;
    println!("  Output shape: {:?}", output.dims());
    println!(
        "  Memory magnitude after 50 steps: {:.4}",
        state.memory.abs().mean().into_scalar()
    );

    let plain_rnn: CfC<Backend> = Rnn::new(plain);
    let (_, plain_state) = plain_rnn.forward(impulse(50, units), None, None)?;
    println!(
        "  Plain CfC state magnitude after 50 steps: {:.4}",
        plain_state.abs().mean().into_scalar()
    );

    println!("\n=== Mixed Memory Example completed! ===");
    Ok(())
}
