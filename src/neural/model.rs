//! Shared model interface
//!
//! Every policy model maps a named input bundle and a recurrent state to
//! `(logits, features, value, state)`. Non-recurrent models hand the state
//! back untouched.
//!
//! Models are `Send` but not `Sync`: libtorch tensors may move between
//! threads, but concurrent forward passes over one parameter set need
//! caller-side synchronization (e.g. a `Mutex`), and must not overlap with
//! optimizer steps.

use std::collections::HashMap;

use tch::{Device, Kind, Tensor};

use crate::neural::observation::ObservationShape;
use crate::Result;

/// Recurrent state threaded through successive forward calls. Empty when unused.
pub type HiddenState = Vec<Tensor>;

/// Named input tensors. `obs` is always present.
#[derive(Debug)]
pub struct ModelInput {
    pub obs: Tensor,
    extra: HashMap<String, Tensor>,
}

impl ModelInput {
    pub fn new(obs: Tensor) -> Self {
        Self {
            obs,
            extra: HashMap::new(),
        }
    }

    /// Attach an additional named tensor (e.g. `prev_actions`).
    pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.extra.insert(name.into(), tensor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        match name {
            "obs" => Some(&self.obs),
            _ => self.extra.get(name),
        }
    }
}

#[derive(Debug)]
pub struct ModelOutput {
    /// `[batch, num_outputs]`
    pub logits: Tensor,
    /// `[batch, feature_size]`
    pub features: Tensor,
    /// `[batch]`
    pub value: Tensor,
    pub hidden_state: HiddenState,
}

pub trait TorchModel: Send {
    fn observation_shape(&self) -> &ObservationShape;

    fn num_outputs(&self) -> i64;

    fn device(&self) -> Device;

    /// Model-specific pass over a float observation batch already on [`Self::device`].
    fn forward_impl(&self, obs: &Tensor, hidden_state: HiddenState) -> Result<ModelOutput>;

    /// Cast observations to float, move them to the model device and run the model.
    fn forward(&self, input: &ModelInput, hidden_state: HiddenState) -> Result<ModelOutput> {
        let obs = input.obs.to_kind(Kind::Float).to_device(self.device());
        self.forward_impl(&obs, hidden_state)
    }
}
