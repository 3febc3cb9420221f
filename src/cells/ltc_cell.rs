//! Liquid Time-Constant (LTC) Cell Implementation
//!
//! Reference: Hasani et al., "Liquid time-constant networks", AAAI 2021

use burn::module::{Module, Param};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

use super::mapping::{Mapping, MappingMode};
use super::{check_width, expand_elapsed, RnnCell};
use crate::activation::softplus;
use crate::error::{NcpError, NcpResult};
use crate::sparsity::SparsityMask;
use crate::wirings::Wiring;

/// Construction parameters of an [`LTCCell`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtcConfig {
    /// Semi-implicit Euler sub-steps per timestep
    pub ode_unfolds: usize,
    pub epsilon: f64,
    pub input_mapping: MappingMode,
    pub output_mapping: MappingMode,
    /// Keep positive parameters positive through softplus instead of clamping
    pub implicit_constraints: bool,
}

impl Default for LtcConfig {
    fn default() -> Self {
        Self {
            ode_unfolds: 6,
            epsilon: 1e-8,
            input_mapping: MappingMode::Affine,
            output_mapping: MappingMode::Affine,
            implicit_constraints: true,
        }
    }
}

impl LtcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ode_unfolds(mut self, ode_unfolds: usize) -> Self {
        self.ode_unfolds = ode_unfolds;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_input_mapping(mut self, mode: MappingMode) -> Self {
        self.input_mapping = mode;
        self
    }

    pub fn with_output_mapping(mut self, mode: MappingMode) -> Self {
        self.output_mapping = mode;
        self
    }

    pub fn with_implicit_constraints(mut self, implicit: bool) -> Self {
        self.implicit_constraints = implicit;
        self
    }

    fn validate(&self) -> NcpResult<()> {
        if self.ode_unfolds == 0 {
            return Err(NcpError::Config("ode_unfolds must be positive".to_string()));
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(NcpError::Config(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Build a cell over `wiring`.
    ///
    /// The sensory mask comes from the wiring when it is built; otherwise
    /// `in_features` must be given and every input reaches every unit.
    pub fn init<B: Backend>(
        &self,
        wiring: &dyn Wiring,
        in_features: Option<usize>,
        device: &B::Device,
    ) -> NcpResult<LTCCell<B>> {
        self.validate()?;

        let state_size = wiring.units();
        let motor_size = wiring.output_dim();
        if motor_size == 0 {
            return Err(NcpError::Config(
                "LTC cell needs a wiring with at least one motor neuron".to_string(),
            ));
        }
        let sensory_mask = match (wiring.input_dim(), in_features) {
            (Some(bound), Some(requested)) if bound != requested => {
                return Err(NcpError::shape("LTC in_features", bound, requested));
            }
            (Some(_), _) => SparsityMask::sensory(wiring)?,
            (None, Some(requested)) => SparsityMask::dense(requested, state_size),
            (None, None) => {
                return Err(NcpError::State(
                    "LTCCell needs in_features or a wiring built with input_dim".to_string(),
                ))
            }
        };
        let sensory_size = sensory_mask.shape().0;
        let internal_mask = SparsityMask::internal(wiring);

        let cell = LTCCell {
            gleak: init_param([state_size], 0.001, 1.0, device),
            vleak: init_param([state_size], -0.2, 0.2, device),
            cm: init_param([state_size], 0.4, 0.6, device),
            sigma: init_param([state_size, state_size], 3.0, 8.0, device),
            mu: init_param([state_size, state_size], 0.3, 0.8, device),
            w: init_param([state_size, state_size], 0.001, 1.0, device),
            erev: Param::from_tensor(internal_mask.sign_tensor(device)),
            sparsity_mask: Param::from_tensor(internal_mask.binary_tensor(device)),
            sensory_sigma: init_param([sensory_size, state_size], 3.0, 8.0, device),
            sensory_mu: init_param([sensory_size, state_size], 0.3, 0.8, device),
            sensory_w: init_param([sensory_size, state_size], 0.001, 1.0, device),
            sensory_erev: Param::from_tensor(sensory_mask.sign_tensor(device)),
            sensory_sparsity_mask: Param::from_tensor(sensory_mask.binary_tensor(device)),
            input_mapping: Mapping::new(self.input_mapping, sensory_size, device),
            output_mapping: Mapping::new(self.output_mapping, motor_size, device),
            ode_unfolds: self.ode_unfolds,
            epsilon: self.epsilon,
            state_size,
            motor_size,
            sensory_size,
            implicit_constraints: self.implicit_constraints,
        };

        tracing::debug!(
            units = state_size,
            motor = motor_size,
            sensory = sensory_size,
            synapses = internal_mask.allowed(),
            sensory_synapses = sensory_mask.allowed(),
            ode_unfolds = self.ode_unfolds,
            "LTC cell built"
        );
        Ok(cell)
    }
}

fn init_param<B: Backend, const D: usize>(
    shape: [usize; D],
    min: f64,
    max: f64,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    let tensor = Tensor::random(shape, Distribution::Uniform(min, max), device);
    Param::from_tensor(tensor)
}

/// Liquid Time-Constant (LTC) Cell
#[derive(Debug, Module)]
pub struct LTCCell<B: Backend> {
    /// Leak conductance (must be positive)
    pub gleak: Param<Tensor<B, 1>>,
    /// Leak reversal potential, the resting target of each unit
    pub vleak: Param<Tensor<B, 1>>,
    /// Membrane capacitance (must be positive)
    pub cm: Param<Tensor<B, 1>>,
    /// Sigmoid steepness for internal synapses
    pub sigma: Param<Tensor<B, 2>>,
    /// Sigmoid center for internal synapses
    pub mu: Param<Tensor<B, 2>>,
    /// Synaptic weights for internal synapses (must be positive)
    pub w: Param<Tensor<B, 2>>,
    /// Reversal potentials for internal synapses, the wiring's sign mask
    pub erev: Param<Tensor<B, 2>>,
    /// Binary mask for internal synapses
    pub sparsity_mask: Param<Tensor<B, 2>>,
    pub sensory_sigma: Param<Tensor<B, 2>>,
    pub sensory_mu: Param<Tensor<B, 2>>,
    pub sensory_w: Param<Tensor<B, 2>>,
    pub sensory_erev: Param<Tensor<B, 2>>,
    pub sensory_sparsity_mask: Param<Tensor<B, 2>>,
    pub input_mapping: Mapping<B>,
    pub output_mapping: Mapping<B>,
    ode_unfolds: usize,
    epsilon: f64,
    state_size: usize,
    motor_size: usize,
    sensory_size: usize,
    implicit_constraints: bool,
}

impl<B: Backend> LTCCell<B> {
    /// Same weights, different number of ODE sub-steps
    pub fn with_ode_unfolds(mut self, ode_unfolds: usize) -> NcpResult<Self> {
        if ode_unfolds == 0 {
            return Err(NcpError::Config("ode_unfolds must be positive".to_string()));
        }
        self.ode_unfolds = ode_unfolds;
        Ok(self)
    }

    pub fn ode_unfolds(&self) -> usize {
        self.ode_unfolds
    }

    pub fn motor_size(&self) -> usize {
        self.motor_size
    }

    pub fn sensory_size(&self) -> usize {
        self.sensory_size
    }

    pub fn implicit_constraints(&self) -> bool {
        self.implicit_constraints
    }

    /// The configuration that rebuilds a cell with this structure
    pub fn config(&self) -> LtcConfig {
        LtcConfig {
            ode_unfolds: self.ode_unfolds,
            epsilon: self.epsilon,
            input_mapping: self.input_mapping.mode(),
            output_mapping: self.output_mapping.mode(),
            implicit_constraints: self.implicit_constraints,
        }
    }

    /// Clamp positive parameters to be >= 0 (explicit constraint mode)
    pub fn apply_weight_constraints(&mut self) {
        if self.implicit_constraints {
            return;
        }
        self.w = Param::from_tensor(self.w.val().clamp_min(0.0));
        self.sensory_w = Param::from_tensor(self.sensory_w.val().clamp_min(0.0));
        self.cm = Param::from_tensor(self.cm.val().clamp_min(0.0));
        self.gleak = Param::from_tensor(self.gleak.val().clamp_min(0.0));
    }

    fn make_positive<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        if self.implicit_constraints {
            softplus(x)
        } else {
            x
        }
    }

    /// `sigmoid(sigma * (v - mu))` per synapse, `[batch, sources, units]`
    fn synapse_activation(
        v: &Tensor<B, 2>,
        mu: Tensor<B, 2>,
        sigma: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let [batch, sources] = v.dims();
        let [_, units] = mu.dims();
        let shape = [batch, sources, units];

        let v_expanded = v.clone().unsqueeze_dim::<3>(2).expand(shape);
        let mu_expanded = mu.unsqueeze::<3>().expand(shape);
        let sigma_expanded = sigma.unsqueeze::<3>().expand(shape);

        activation::sigmoid(sigma_expanded.mul(v_expanded.sub(mu_expanded)))
    }

    /// Masked synaptic currents summed over sources: `(Σ w·σ·erev, Σ w·σ)`
    fn synaptic_currents(
        activation: Tensor<B, 3>,
        w: Tensor<B, 2>,
        mask: Tensor<B, 2>,
        erev: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let shape = activation.dims();
        let w_activation = activation
            .mul(w.mul(mask).unsqueeze::<3>().expand(shape));
        let rev_activation = w_activation.clone().mul(erev.unsqueeze::<3>().expand(shape));

        let numerator: Tensor<B, 2> = rev_activation.sum_dim(1).squeeze(1);
        let denominator: Tensor<B, 2> = w_activation.sum_dim(1).squeeze(1);
        (numerator, denominator)
    }

    fn ode_solver(
        &self,
        inputs: Tensor<B, 2>,
        state: Tensor<B, 2>,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<Tensor<B, 2>> {
        let [batch, state_size] = state.dims();
        let shape = [batch, state_size];

        // Sensory currents stay constant across the unfolds
        let sensory_activation =
            Self::synapse_activation(&inputs, self.sensory_mu.val(), self.sensory_sigma.val());
        let (w_numerator_sensory, w_denominator_sensory) = Self::synaptic_currents(
            sensory_activation,
            self.make_positive(self.sensory_w.val()),
            self.sensory_sparsity_mask.val(),
            self.sensory_erev.val(),
        );

        // cm_t = cm / (elapsed / ode_unfolds)
        let dt = expand_elapsed(elapsed.clone(), batch, state_size)?
            .div_scalar(self.ode_unfolds as f64);
        let shortest: f64 = elapsed.min().into_scalar().elem();
        if shortest.is_nan() || shortest <= 0.0 {
            return Err(NcpError::Range(format!(
                "elapsed time must be positive, got {}",
                shortest
            )));
        }
        let cm_t = self
            .make_positive(self.cm.val())
            .unsqueeze::<2>()
            .expand(shape)
            .div(dt);

        let w_pos = self.make_positive(self.w.val());
        let gleak = self
            .make_positive(self.gleak.val())
            .unsqueeze::<2>()
            .expand(shape);
        let vleak = self.vleak.val().unsqueeze::<2>().expand(shape);
        let leak_current = gleak.clone().mul(vleak);

        let mut v_pre = state;
        for _ in 0..self.ode_unfolds {
            let activation = Self::synapse_activation(&v_pre, self.mu.val(), self.sigma.val());
            let (w_numerator, w_denominator) = Self::synaptic_currents(
                activation,
                w_pos.clone(),
                self.sparsity_mask.val(),
                self.erev.val(),
            );

            let numerator = cm_t
                .clone()
                .mul(v_pre)
                .add(leak_current.clone())
                .add(w_numerator)
                .add(w_numerator_sensory.clone());
            let denominator = cm_t
                .clone()
                .add(gleak.clone())
                .add(w_denominator)
                .add(w_denominator_sensory.clone())
                .add_scalar(self.epsilon);

            v_pre = numerator.div(denominator);
        }

        Ok(v_pre)
    }

    pub fn forward(
        &self,
        inputs: Tensor<B, 2>,
        states: Tensor<B, 2>,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Tensor<B, 2>)> {
        check_width("LTC input", &inputs, self.sensory_size)?;
        check_width("LTC state", &states, self.state_size)?;

        let mapped_inputs = self.input_mapping.forward(inputs);
        let new_states = self.ode_solver(mapped_inputs, states, elapsed)?;
        let output = self
            .output_mapping
            .forward(new_states.clone().narrow(1, 0, self.motor_size));

        Ok((output, new_states))
    }
}

impl<B: Backend> RnnCell<B> for LTCCell<B> {
    type State = Tensor<B, 2>;

    fn input_size(&self) -> usize {
        self.sensory_size
    }

    fn state_size(&self) -> usize {
        self.state_size
    }

    fn output_size(&self) -> usize {
        self.motor_size
    }

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State {
        Tensor::zeros([batch, self.state_size], device)
    }

    fn flatten_state(&self, state: &Self::State) -> Tensor<B, 2> {
        state.clone()
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Self::State,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Self::State)> {
        self.forward(input, state, elapsed)
    }
}
