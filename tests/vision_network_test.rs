//! Forward-pass contract of the vision network

use std::cell::Cell;

use assert_matches::assert_matches;
use tch::{nn, Device, Kind, Tensor};
use vision_net::{
    FilterSpec, ModelInput, ModelOptions, ObservationShape, ResolverError, TorchModel,
    VisionNetError, VisionNetwork,
};

fn atari_options() -> ModelOptions {
    ModelOptions::with_filters([
        FilterSpec::new(16, 8, 4),
        FilterSpec::new(32, 4, 2),
        FilterSpec::new(256, 11, 1),
    ])
}

fn small_network(vs: &nn::VarStore) -> VisionNetwork {
    let shape = ObservationShape::new(9, 9, 3).unwrap();
    let options = ModelOptions::with_filters([FilterSpec::new(8, 3, 2), FilterSpec::new(16, 5, 1)]);
    VisionNetwork::new(&vs.root(), shape, 4, &options).unwrap()
}

#[test]
fn test_atari_scenario_shapes() {
    tch::manual_seed(0);
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(84, 84, 4).unwrap();
    let net = VisionNetwork::new(&vs.root(), shape, 6, &atari_options()).unwrap();

    let obs = Tensor::rand([2, 84, 84, 4], (Kind::Float, Device::Cpu));
    let out = net.forward(&ModelInput::new(obs), Vec::new()).unwrap();

    assert_eq!(out.features.size(), vec![2, 256]);
    assert_eq!(out.logits.size(), vec![2, 6]);
    assert_eq!(out.value.size(), vec![2]);
}

#[test]
fn test_forward_is_deterministic() {
    tch::manual_seed(1);
    let vs = nn::VarStore::new(Device::Cpu);
    let net = small_network(&vs);
    let obs = Tensor::rand([5, 9, 9, 3], (Kind::Float, Device::Cpu));

    let first = net.forward(&ModelInput::new(obs.shallow_clone()), Vec::new()).unwrap();
    let second = net.forward(&ModelInput::new(obs), Vec::new()).unwrap();

    assert!(first.logits.equal(&second.logits));
    assert!(first.features.equal(&second.features));
    assert!(first.value.equal(&second.value));
}

#[test]
fn test_heads_share_features() {
    let vs = nn::VarStore::new(Device::Cpu);
    let net = small_network(&vs);
    let obs = Tensor::rand([3, 9, 9, 3], (Kind::Float, Device::Cpu));

    let out = net.forward(&ModelInput::new(obs), Vec::new()).unwrap();

    let variables = vs.variables();
    let logits = out.features.linear(
        &variables["logits.linear.weight"],
        Some(&variables["logits.linear.bias"]),
    );
    assert!(logits.allclose(&out.logits, 1e-5, 1e-6, false));
    // Last conv is followed by a ReLU
    assert!(out.features.min().double_value(&[]) >= 0.0);
}

#[test]
fn test_hidden_state_passthrough() {
    let vs = nn::VarStore::new(Device::Cpu);
    let net = small_network(&vs);
    let obs = Tensor::rand([2, 9, 9, 3], (Kind::Float, Device::Cpu));

    let state = vec![
        Tensor::rand([2, 32], (Kind::Float, Device::Cpu)),
        Tensor::zeros([2, 32], (Kind::Float, Device::Cpu)),
    ];
    let ptrs: Vec<_> = state.iter().map(|t| t.data_ptr()).collect();
    let snapshot: Vec<_> = state.iter().map(|t| t.copy()).collect();

    let out = net.forward(&ModelInput::new(obs.shallow_clone()), state).unwrap();
    assert_eq!(out.hidden_state.len(), 2);
    for ((returned, ptr), before) in out.hidden_state.iter().zip(ptrs).zip(snapshot) {
        assert_eq!(returned.data_ptr(), ptr);
        assert!(returned.equal(&before));
    }

    let out = net.forward(&ModelInput::new(obs), Vec::new()).unwrap();
    assert!(out.hidden_state.is_empty());
}

#[test]
fn test_non_collapsing_filters_fail_at_forward() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(10, 10, 3).unwrap();
    let options = ModelOptions::with_filters([FilterSpec::new(16, 3, 1)]);
    let net = VisionNetwork::new(&vs.root(), shape, 4, &options).unwrap();

    let obs = Tensor::rand([2, 10, 10, 3], (Kind::Float, Device::Cpu));
    let result = net.forward(&ModelInput::new(obs), Vec::new());

    assert_matches!(
        result,
        Err(VisionNetError::ShapeMismatch { stage: "conv output", actual, .. })
            if actual == vec![2, 16, 8, 8]
    );
    assert!(net.check_spatial_collapse().is_err());
}

#[test]
fn test_default_filters_resolved_once() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(9, 9, 3).unwrap();
    let calls = Cell::new(0);
    let resolver = |requested: &ObservationShape| -> Result<Vec<FilterSpec>, ResolverError> {
        calls.set(calls.get() + 1);
        assert_eq!(*requested, ObservationShape::new(9, 9, 3).unwrap());
        Ok(vec![FilterSpec::new(8, 3, 2), FilterSpec::new(16, 5, 1)])
    };

    let net = VisionNetwork::with_resolver(&vs.root(), shape, 4, &ModelOptions::default(), &resolver)
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(net.layers()[0].in_channels, 3);
    assert_eq!(vs.variables()["convs.0.conv.weight"].size(), vec![8, 3, 3, 3]);
}

#[test]
fn test_explicit_filters_skip_resolver() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(9, 9, 3).unwrap();
    let calls = Cell::new(0);
    let resolver = |_: &ObservationShape| -> Result<Vec<FilterSpec>, ResolverError> {
        calls.set(calls.get() + 1);
        Ok(Vec::new())
    };
    let options = ModelOptions::with_filters([FilterSpec::new(8, 9, 1)]);

    VisionNetwork::with_resolver(&vs.root(), shape, 2, &options, &resolver).unwrap();
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_default_resolver_84x84() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(84, 84, 1).unwrap();
    let net = VisionNetwork::new(&vs.root(), shape, 3, &ModelOptions::default()).unwrap();

    assert_eq!(net.layers().len(), 3);
    assert_eq!(net.layers()[0].in_channels, 1);
    assert_eq!(net.feature_size(), 256);
    assert!(net.check_spatial_collapse().is_ok());
}

#[test]
fn test_resolver_errors_propagate() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(64, 64, 3).unwrap();

    let result = VisionNetwork::new(&vs.root(), shape, 3, &ModelOptions::default());
    assert_matches!(
        result,
        Err(VisionNetError::Resolver(ResolverError::NoDefault { shape: [64, 64, 3] }))
    );
}

#[test]
fn test_empty_resolved_filters_rejected() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(9, 9, 3).unwrap();
    let resolver = |_: &ObservationShape| -> Result<Vec<FilterSpec>, ResolverError> { Ok(Vec::new()) };

    let result = VisionNetwork::with_resolver(&vs.root(), shape, 3, &ModelOptions::default(), &resolver);
    assert_matches!(result, Err(VisionNetError::Configuration(_)));
}

#[test]
fn test_uint8_observations_are_cast() {
    let vs = nn::VarStore::new(Device::Cpu);
    let net = small_network(&vs);
    let obs = Tensor::ones([2, 9, 9, 3], (Kind::Uint8, Device::Cpu));

    let out = net.forward(&ModelInput::new(obs), Vec::new()).unwrap();
    assert_eq!(out.logits.kind(), Kind::Float);
    assert_eq!(out.logits.size(), vec![2, 4]);
}

#[test]
fn test_wrong_observation_layout_rejected() {
    let vs = nn::VarStore::new(Device::Cpu);
    let net = small_network(&vs);

    // Channel-first input instead of channel-last
    let obs = Tensor::rand([2, 3, 9, 9], (Kind::Float, Device::Cpu));
    assert_matches!(
        net.forward(&ModelInput::new(obs), Vec::new()),
        Err(VisionNetError::ShapeMismatch { stage: "observation", .. })
    );

    let obs = Tensor::rand([9, 9, 3], (Kind::Float, Device::Cpu));
    assert_matches!(
        net.forward(&ModelInput::new(obs), Vec::new()),
        Err(VisionNetError::ShapeMismatch { stage: "observation", .. })
    );
}

#[test]
fn test_value_head_uses_normc() {
    let vs = nn::VarStore::new(Device::Cpu);
    let shape = ObservationShape::new(9, 9, 3).unwrap();
    let options = ModelOptions {
        value_init_std: 0.01,
        ..ModelOptions::with_filters([FilterSpec::new(8, 3, 2), FilterSpec::new(16, 5, 1)])
    };
    VisionNetwork::new(&vs.root(), shape, 4, &options).unwrap();

    let weight = &vs.variables()["value_branch.linear.weight"];
    assert_eq!(weight.size(), vec![1, 16]);
    let norm = weight.square().sum(Kind::Float).sqrt().double_value(&[]);
    assert!((norm - 0.01).abs() < 1e-6);
}

#[test]
fn test_save_and_reload_reproduces_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vision.safetensors");
    let obs = Tensor::rand([2, 9, 9, 3], (Kind::Float, Device::Cpu));

    let vs1 = nn::VarStore::new(Device::Cpu);
    let net1 = small_network(&vs1);
    net1.save_model(&vs1, &path).unwrap();
    let expected = net1.forward(&ModelInput::new(obs.shallow_clone()), Vec::new()).unwrap();

    let mut vs2 = nn::VarStore::new(Device::Cpu);
    let net2 = small_network(&vs2);
    net2.load_model(&mut vs2, &path).unwrap();
    let actual = net2.forward(&ModelInput::new(obs), Vec::new()).unwrap();

    assert!(actual.logits.allclose(&expected.logits, 1e-6, 1e-6, false));
    assert!(actual.value.allclose(&expected.value, 1e-6, 1e-6, false));
}

#[test]
fn test_trait_object() {
    let vs = nn::VarStore::new(Device::Cpu);
    let model: Box<dyn TorchModel> = Box::new(small_network(&vs));

    assert_eq!(model.num_outputs(), 4);
    assert_eq!(model.observation_shape().channels, 3);
    assert_eq!(model.device(), Device::Cpu);

    let obs = Tensor::rand([1, 9, 9, 3], (Kind::Float, Device::Cpu));
    let out = model.forward(&ModelInput::new(obs), Vec::new()).unwrap();
    assert_eq!(out.value.size(), vec![1]);
}
