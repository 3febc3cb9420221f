//! Save and Load Example
//!
//! Persists a wiring and a cell configuration as JSON, reloads them and
//! checks that the rebuilt cell carries the same structural masks.
//! Learned weights are a separate concern handled by Burn's record types.

use std::error::Error;
use std::fs;

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use ncps::prelude::*;

type Backend = NdArray<f32>;

#[derive(serde::Serialize, serde::Deserialize)]
struct SavedModel {
    wiring: WiringConfig,
    cell: LtcConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Model Save/Load Example ===\n");
    let device = Default::default();

    let mut wiring = AutoNCP::new(32, 4, 0.7, 99999)?;
    wiring.build(10)?;
    let cell_config = LtcConfig::new().with_ode_unfolds(4);
    let ltc = cell_config.init::<Backend>(&wiring, None, &device)?;

    println!("Created model:");
    println!("  Units: {}", wiring.units());
    println!("  Internal synapses: {}", wiring.synapse_count());
    println!("  Sensory synapses: {}", wiring.sensory_synapse_count());
    println!();

    // Save
    let path = std::env::temp_dir().join("ncps_model_config.json");
    let saved = SavedModel {
        wiring: wiring.config(),
        cell: ltc.config(),
    };
    fs::write(&path, serde_json::to_string_pretty(&saved)?)?;
    println!("Saved configuration to {}", path.display());

    // Load
    let loaded: SavedModel = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let restored_wiring = wiring_from_config(&loaded.wiring)?;
    let restored = loaded
        .cell
        .init::<Backend>(restored_wiring.as_ref(), None, &device)?;

    let same_masks = wiring.adjacency_matrix() == restored_wiring.adjacency_matrix()
        && wiring.sensory_adjacency_matrix() == restored_wiring.sensory_adjacency_matrix();
    println!("  Masks identical after reload: {}", same_masks);
    println!("  ODE unfolds after reload: {}", restored.ode_unfolds());

    let rnn: LTC<Backend> = Rnn::new(restored);
    let input = Tensor::<Backend, 3>::random([1, 10, 10], Distribution::Uniform(-1.0, 1.0), &device);
    let (output, _) = rnn.forward(input, None, None)?;
    println!("  Output shape: {:?}", output.dims());

    fs::remove_file(&path)?;
    println!("\n=== Save/Load Example completed! ===");
    Ok(())
}
