//! Configuration round-trips: wirings and cells rebuilt from flat configs

use burn::backend::NdArray;
use ncps::prelude::*;
use ncps::wirings::WiringKind;

type Backend = NdArray<f32>;

fn built_wirings() -> Vec<Box<dyn Wiring>> {
    let mut custom = Custom::with_units(5, 2).unwrap();
    custom.add_synapse(4, 0, -1).unwrap();
    custom.add_synapse(3, 1, 1).unwrap();

    let mut wirings: Vec<Box<dyn Wiring>> = vec![
        Box::new(custom),
        Box::new(FullyConnected::new(6, Some(2), 77, false).unwrap()),
        Box::new(NCP::new(6, 4, 2, 3, 2, 3, 2, 5).unwrap()),
        Box::new(AutoNCP::new(16, 3, 0.6, 11).unwrap()),
        Box::new(Random::new(8, Some(2), 0.4, 13).unwrap()),
    ];
    for wiring in wirings.iter_mut() {
        wiring.build(4).unwrap();
    }
    wirings
}

fn assert_same_structure(a: &dyn Wiring, b: &dyn Wiring) {
    assert_eq!(a.units(), b.units());
    assert_eq!(a.groups(), b.groups());
    assert_eq!(a.input_dim(), b.input_dim());
    assert_eq!(a.num_layers(), b.num_layers());
    assert_eq!(a.adjacency_matrix(), b.adjacency_matrix());
    assert_eq!(a.sensory_adjacency_matrix(), b.sensory_adjacency_matrix());
}

#[test]
fn test_every_wiring_survives_json() {
    for wiring in built_wirings() {
        let json = wiring.config().to_json().unwrap();
        let config = WiringConfig::from_json(&json).unwrap();
        let restored = wiring_from_config(&config).unwrap();

        assert_same_structure(wiring.as_ref(), restored.as_ref());
        assert_eq!(restored.config(), wiring.config());
    }
}

#[test]
fn test_seeded_wirings_regenerate_without_matrices() {
    for wiring in built_wirings() {
        let mut config = wiring.config();
        if config.kind == WiringKind::Custom {
            continue;
        }
        config.adjacency_matrix = None;
        config.sensory_adjacency_matrix = None;

        let restored = wiring_from_config(&config).unwrap();
        assert_same_structure(wiring.as_ref(), restored.as_ref());
    }
}

#[test]
fn test_masks_identical_after_restore() {
    let device = Default::default();
    let mut wiring = AutoNCP::new(12, 2, 0.5, 99).unwrap();
    wiring.build(3).unwrap();
    let restored = wiring_from_config(&wiring.config()).unwrap();

    let original = SparsityMask::sensory(&wiring).unwrap();
    let rebuilt = SparsityMask::sensory(restored.as_ref()).unwrap();
    assert_eq!(original, rebuilt);

    let a = LtcConfig::new().init::<Backend>(&wiring, None, &device).unwrap();
    let b = LtcConfig::new()
        .init::<Backend>(restored.as_ref(), None, &device)
        .unwrap();
    let masks = |cell: &LTCCell<Backend>| {
        [cell.sparsity_mask.val(), cell.erev.val(), cell.sensory_erev.val()]
            .map(|tensor| tensor.into_data().to_vec::<f32>().unwrap())
    };
    assert_eq!(masks(&a), masks(&b));
}

#[test]
fn test_unbuilt_wiring_round_trip() {
    let wiring = NCP::new(4, 3, 2, 2, 2, 1, 2, 3).unwrap();
    let config = wiring.config();
    assert_eq!(config.input_dim, None);
    assert!(config.sensory_adjacency_matrix.is_none());

    let mut restored = wiring_from_config(&config).unwrap();
    assert!(!restored.is_built());
    restored.build(2).unwrap();

    let mut fresh = wiring.clone();
    fresh.build(2).unwrap();
    assert_same_structure(&fresh, restored.as_ref());
}

#[test]
fn test_malformed_configs_are_rejected() {
    let mut config = FullyConnected::new(3, None, 1, true).unwrap().config();
    config.adjacency_matrix = Some(vec![vec![1, 0], vec![0, 1]]);
    assert!(matches!(
        wiring_from_config(&config),
        Err(NcpError::Config(_))
    ));

    let mut config = Custom::with_units(2, 1).unwrap().config();
    config.adjacency_matrix = Some(vec![vec![0, 2], vec![0, 0]]);
    assert!(matches!(wiring_from_config(&config), Err(NcpError::Range(_))));

    let mut config = Custom::with_units(2, 1).unwrap().config();
    config.kind = WiringKind::Ncp;
    assert!(wiring_from_config(&config).is_err());

    assert!(matches!(
        WiringConfig::from_json("{\"kind\": \"hexagonal\"}"),
        Err(NcpError::Serialization(_))
    ));
}

#[test]
fn test_cell_configs_survive_json() {
    let ltc = LtcConfig::new()
        .with_ode_unfolds(3)
        .with_input_mapping(MappingMode::Linear)
        .with_output_mapping(MappingMode::None)
        .with_implicit_constraints(false);
    let json = serde_json::to_string(&ltc).unwrap();
    assert!(json.contains("\"linear\""));
    assert_eq!(serde_json::from_str::<LtcConfig>(&json).unwrap(), ltc);

    let bounded = LtcConfig::new().with_input_mapping(MappingMode::Nonlinear(Activation::Tanh));
    let json = serde_json::to_string(&bounded).unwrap();
    assert!(json.contains("\"input_mapping\":\"tanh\""));
    assert_eq!(serde_json::from_str::<LtcConfig>(&json).unwrap(), bounded);

    let cfc = CfcConfig::new()
        .with_mode(CfcMode::Pure)
        .with_activation(Activation::Gelu)
        .with_backbone(32, 2, 0.25);
    let json = serde_json::to_string(&cfc).unwrap();
    assert!(json.contains("\"pure\""));
    assert_eq!(serde_json::from_str::<CfcConfig>(&json).unwrap(), cfc);

    let memory = MixedMemoryConfig::new().with_forget_gate_bias(2.5);
    let json = serde_json::to_string(&memory).unwrap();
    assert_eq!(serde_json::from_str::<MixedMemoryConfig>(&json).unwrap(), memory);

    // Missing fields fall back to defaults
    assert_eq!(serde_json::from_str::<LtcConfig>("{}").unwrap(), LtcConfig::new());
}

#[test]
fn test_cell_config_rebuilds_same_structure() {
    let device = Default::default();
    let mut wiring = FullyConnected::new(6, Some(2), 3, true).unwrap();
    wiring.build(4).unwrap();

    let config = LtcConfig::new()
        .with_ode_unfolds(2)
        .with_output_mapping(MappingMode::Linear);
    let cell = config.init::<Backend>(&wiring, None, &device).unwrap();
    let rebuilt = cell
        .config()
        .init::<Backend>(&wiring, None, &device)
        .unwrap();

    assert_eq!(rebuilt.config(), config);
    assert_eq!(rebuilt.ode_unfolds(), 2);
    assert_eq!(rebuilt.output_mapping.mode(), MappingMode::Linear);
}
