//! Closed-form Continuous-time (CfC) Cell Implementation
//!
//! The CfC cell is a fast approximation of the LTC (Liquid Time-Constant) cell.
//! It evaluates a closed-form solution of the continuous-time dynamics once per
//! timestep instead of unfolding an ODE solver.
//!
//! Three modes are supported:
//! - **Default**: Gated interpolation between two feedforward paths
//! - **Pure**: Direct ODE solution without gating
//! - **NoGate**: Simplified gating with addition instead of interpolation

use std::fmt;
use std::str::FromStr;

use burn::module::{Module, Param};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::{check_width, expand_elapsed, RnnCell};
use crate::activation::Activation;
use crate::error::{NcpError, NcpResult};
use crate::sparsity::SparsityMask;
use crate::wirings::Wiring;

/// CfC cell operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfcMode {
    /// Default gated mode: h = tanh(ff1) * (1 - σ) + tanh(ff2) * σ
    #[default]
    Default,
    /// No-gate mode: h = tanh(ff1) + tanh(ff2) * σ
    NoGate,
    /// Pure ODE solution without gating
    Pure,
}

impl CfcMode {
    pub fn name(self) -> &'static str {
        match self {
            CfcMode::Default => "default",
            CfcMode::NoGate => "no_gate",
            CfcMode::Pure => "pure",
        }
    }

    fn code(self) -> u8 {
        match self {
            CfcMode::Default => 0,
            CfcMode::Pure => 1,
            CfcMode::NoGate => 2,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => CfcMode::Pure,
            2 => CfcMode::NoGate,
            _ => CfcMode::Default,
        }
    }
}

impl FromStr for CfcMode {
    type Err = NcpError;

    fn from_str(name: &str) -> NcpResult<Self> {
        match name {
            "default" => Ok(CfcMode::Default),
            "no_gate" => Ok(CfcMode::NoGate),
            "pure" => Ok(CfcMode::Pure),
            other => Err(NcpError::Config(format!(
                "unknown CfC mode '{}', expected default, no_gate or pure",
                other
            ))),
        }
    }
}

impl fmt::Display for CfcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Construction parameters of a [`CfCCell`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfcConfig {
    pub mode: CfcMode,
    pub backbone_units: usize,
    /// Hidden layers between `cat(input, state)` and the heads; 0 disables the backbone
    pub backbone_layers: usize,
    pub backbone_dropout: f64,
    pub activation: Activation,
    /// Linear projection of the output to this width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proj_size: Option<usize>,
}

impl Default for CfcConfig {
    fn default() -> Self {
        Self {
            mode: CfcMode::Default,
            backbone_units: 128,
            backbone_layers: 1,
            backbone_dropout: 0.0,
            activation: Activation::LecunTanh,
            proj_size: None,
        }
    }
}

impl CfcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: CfcMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_backbone(mut self, units: usize, layers: usize, dropout: f64) -> Self {
        self.backbone_units = units;
        self.backbone_layers = layers;
        self.backbone_dropout = dropout;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_proj_size(mut self, proj_size: usize) -> Self {
        self.proj_size = Some(proj_size);
        self
    }

    fn validate(&self) -> NcpResult<()> {
        if !(0.0..1.0).contains(&self.backbone_dropout) {
            return Err(NcpError::Config(format!(
                "backbone dropout must be in [0, 1), got {}",
                self.backbone_dropout
            )));
        }
        if self.backbone_layers > 0 && self.backbone_units == 0 {
            return Err(NcpError::Config(
                "backbone layers need at least one unit".to_string(),
            ));
        }
        if self.proj_size == Some(0) {
            return Err(NcpError::Config("proj_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Dense cell whose output is the whole hidden state
    pub fn init<B: Backend>(
        &self,
        input_size: usize,
        hidden_size: usize,
        device: &B::Device,
    ) -> NcpResult<CfCCell<B>> {
        self.init_masked(input_size, hidden_size, hidden_size, None, device)
    }

    /// Cell shaped by a built wiring.
    ///
    /// The heads read `cat(input, state)` directly so the wiring mask lines
    /// up with their weights; the backbone settings are not used.
    pub fn init_with_wiring<B: Backend>(
        &self,
        wiring: &dyn Wiring,
        device: &B::Device,
    ) -> NcpResult<CfCCell<B>> {
        let mask = SparsityMask::sensory(wiring)?.stack_rows(&SparsityMask::internal(wiring))?;
        let input_size = wiring.input_dim().unwrap_or_default();
        let config = CfcConfig {
            backbone_layers: 0,
            ..self.clone()
        };
        config.init_masked(
            input_size,
            wiring.units(),
            wiring.output_dim(),
            Some(&mask),
            device,
        )
    }

    pub(crate) fn init_masked<B: Backend>(
        &self,
        input_size: usize,
        hidden_size: usize,
        motor_size: usize,
        mask: Option<&SparsityMask>,
        device: &B::Device,
    ) -> NcpResult<CfCCell<B>> {
        self.validate()?;
        if hidden_size == 0 {
            return Err(NcpError::Config("CfC cell needs at least one unit".to_string()));
        }
        if motor_size == 0 {
            return Err(NcpError::Config(
                "CfC cell needs at least one motor unit".to_string(),
            ));
        }
        if motor_size > hidden_size {
            return Err(NcpError::Config(format!(
                "motor size {} exceeds hidden size {}",
                motor_size, hidden_size
            )));
        }

        let cat_size = input_size + hidden_size;
        let sparsity_mask = match mask {
            Some(mask) if mask.shape() != (cat_size, hidden_size) => {
                return Err(NcpError::shape("CfC mask rows", cat_size, mask.shape().0));
            }
            Some(mask) => Some(Param::from_tensor(mask.binary_tensor(device))),
            None => None,
        };

        let mut backbone = Vec::with_capacity(self.backbone_layers);
        let mut head_size = cat_size;
        for _ in 0..self.backbone_layers {
            backbone.push(LinearConfig::new(head_size, self.backbone_units).init(device));
            head_size = self.backbone_units;
        }

        let head = || {
            LinearConfig::new(head_size, hidden_size)
                .with_bias(true)
                .init(device)
        };
        let (ff2, time_a, time_b, w_tau, a) = match self.mode {
            CfcMode::Pure => (
                None,
                None,
                None,
                Some(Param::from_tensor(Tensor::zeros([hidden_size], device))),
                Some(Param::from_tensor(Tensor::ones([hidden_size], device))),
            ),
            CfcMode::Default | CfcMode::NoGate => {
                (Some(head()), Some(head()), Some(head()), None, None)
            }
        };

        let cell = CfCCell {
            backbone,
            dropout: DropoutConfig::new(self.backbone_dropout).init(),
            ff1: head(),
            ff2,
            time_a,
            time_b,
            w_tau,
            a,
            sparsity_mask,
            projection: self
                .proj_size
                .map(|proj| LinearConfig::new(motor_size, proj).init(device)),
            input_size,
            hidden_size,
            motor_size,
            backbone_units: self.backbone_units,
            mode: self.mode.code(),
            activation: self.activation.code(),
        };

        tracing::debug!(
            input_size,
            hidden_size,
            motor_size,
            mode = %self.mode,
            backbone_layers = self.backbone_layers,
            masked = mask.is_some(),
            "CfC cell built"
        );
        Ok(cell)
    }
}

/// A Closed-form Continuous-time cell
///
/// Processes single time-steps; see [`Rnn`](crate::rnn::Rnn) for sequences.
#[derive(Module, Debug)]
pub struct CfCCell<B: Backend> {
    backbone: Vec<Linear<B>>,
    dropout: Dropout,
    pub ff1: Linear<B>,
    pub ff2: Option<Linear<B>>,
    pub time_a: Option<Linear<B>>,
    pub time_b: Option<Linear<B>>,
    pub w_tau: Option<Param<Tensor<B, 1>>>,
    pub a: Option<Param<Tensor<B, 1>>>,
    /// Binary mask over the ff1/ff2 weights, `[input + hidden, hidden]`
    sparsity_mask: Option<Param<Tensor<B, 2>>>,
    projection: Option<Linear<B>>,
    input_size: usize,
    hidden_size: usize,
    motor_size: usize,
    backbone_units: usize,
    /// Mode: 0=Default, 1=Pure, 2=NoGate
    mode: u8,
    activation: u8,
}

impl<B: Backend> CfCCell<B> {
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn motor_size(&self) -> usize {
        self.motor_size
    }

    pub fn mode(&self) -> CfcMode {
        CfcMode::from_code(self.mode)
    }

    pub fn activation(&self) -> Activation {
        Activation::from_code(self.activation)
    }

    pub fn has_sparsity_mask(&self) -> bool {
        self.sparsity_mask.is_some()
    }

    pub fn backbone_layers(&self) -> usize {
        self.backbone.len()
    }

    pub fn config(&self) -> CfcConfig {
        CfcConfig {
            mode: self.mode(),
            backbone_units: self.backbone_units,
            backbone_layers: self.backbone.len(),
            backbone_dropout: self.dropout.prob,
            activation: self.activation(),
            proj_size: self
                .projection
                .as_ref()
                .map(|projection| projection.weight.val().dims()[1]),
        }
    }

    /// Linear head, with the wiring mask multiplied into its weight
    fn head(&self, layer: &Linear<B>, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let Some(ref mask) = self.sparsity_mask else {
            return layer.forward(x);
        };
        let y = x.matmul(layer.weight.val().mul(mask.val()));
        match layer.bias {
            Some(ref bias) => {
                let dims = y.dims();
                y.add(bias.val().unsqueeze::<2>().expand(dims))
            }
            None => y,
        }
    }

    /// Perform a forward pass through the CfC cell
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        hx: Tensor<B, 2>,
        elapsed: Tensor<B, 1>,
    ) -> NcpResult<(Tensor<B, 2>, Tensor<B, 2>)> {
        check_width("CfC input", &input, self.input_size)?;
        check_width("CfC state", &hx, self.hidden_size)?;
        let [batch_size, _] = input.dims();
        let shape = [batch_size, self.hidden_size];
        let ts = expand_elapsed(elapsed, batch_size, self.hidden_size)?;

        let mut x = Tensor::cat(vec![input, hx], 1);
        let backbone_activation = self.activation();
        for layer in &self.backbone {
            x = self.dropout.forward(backbone_activation.forward(layer.forward(x)));
        }

        let ff1 = self.head(&self.ff1, x.clone());

        let new_hidden = match self.mode() {
            CfcMode::Pure => {
                let (Some(w_tau), Some(a)) = (&self.w_tau, &self.a) else {
                    return Err(NcpError::State(
                        "pure CfC cell is missing w_tau or A".to_string(),
                    ));
                };
                let w_tau = w_tau.val().unsqueeze::<2>().expand(shape);
                let a = a.val().unsqueeze::<2>().expand(shape);

                let decay = ts.mul(w_tau.abs().add(ff1.clone().abs())).neg().exp();
                a.clone().neg().mul(decay).mul(ff1).add(a)
            }
            mode => {
                let (Some(ff2), Some(time_a), Some(time_b)) =
                    (&self.ff2, &self.time_a, &self.time_b)
                else {
                    return Err(NcpError::State(
                        "gated CfC cell is missing its ff2/time heads".to_string(),
                    ));
                };
                let ff1 = ff1.tanh();
                let ff2 = self.head(ff2, x.clone()).tanh();
                let t_a = time_a.forward(x.clone());
                let t_b = time_b.forward(x);
                let t_interp = activation::sigmoid(t_a.mul(ts).add(t_b));

                if mode == CfcMode::NoGate {
                    ff1.add(t_interp.mul(ff2))
                } else {
                    ff1.mul(t_interp.clone().neg().add_scalar(1.0))
                        .add(t_interp.mul(ff2))
                }
            }
        };

        let output = new_hidden.clone().narrow(1, 0, self.motor_size);
        let output = match self.projection {
            Some(ref projection) => projection.forward(output),
            None => output,
        };
        Ok((output, new_hidden))
    }
}

impl<B: Backend> RnnCell<B> for CfCCell<B> {
    type State = Tensor<B, 2>;

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn state_size(&self) -> usize {
        self.hidden_size
    }

    fn output_size(&self) -> usize {
        self.config().proj_size.unwrap_or(self.motor_size)
    }

    fn initial_state(&self, batch: usize, device: &B::Device) -> Self::State {
        Tensor::zeros([batch, self.hidden_size], device)
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

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    fn ones_elapsed(batch: usize) -> Tensor<TestBackend, 1> {
        Tensor::ones([batch], &get_test_device())
    }

    #[test]
    fn test_cfc_cell_creation() {
        let device = get_test_device();
        let cell = CfcConfig::new().init::<TestBackend>(20, 50, &device).unwrap();

        assert_eq!(cell.input_size(), 20);
        assert_eq!(cell.hidden_size(), 50);
        assert_eq!(cell.output_size(), 50);
        assert_eq!(cell.mode(), CfcMode::Default);
        assert_eq!(cell.backbone_layers(), 1);
        assert_eq!(cell.config(), CfcConfig::default());
    }

    #[test]
    fn test_cfc_forward_every_mode() {
        let device = get_test_device();
        for mode in [CfcMode::Default, CfcMode::NoGate, CfcMode::Pure] {
            let cell = CfcConfig::new()
                .with_mode(mode)
                .init::<TestBackend>(20, 50, &device)
                .unwrap();
            assert_eq!(cell.mode(), mode);

            let input = Tensor::<TestBackend, 2>::ones([2, 20], &device);
            let hx = Tensor::<TestBackend, 2>::zeros([2, 50], &device);
            let (output, new_hidden) = cell.forward(input, hx, ones_elapsed(2)).unwrap();

            assert_eq!(output.dims(), [2, 50]);
            assert_eq!(new_hidden.dims(), [2, 50]);
        }
    }

    #[test]
    fn test_cfc_state_change() {
        let device = get_test_device();
        let cell = CfcConfig::new().init::<TestBackend>(20, 50, &device).unwrap();

        let input = Tensor::<TestBackend, 2>::ones([2, 20], &device);
        let hx = Tensor::<TestBackend, 2>::zeros([2, 50], &device);

        let (output, new_hidden) = cell.forward(input, hx.clone(), ones_elapsed(2)).unwrap();

        let diff = (new_hidden.clone() - hx).abs().mean().into_scalar();
        assert!(diff > 0.0, "State should change after forward pass");

        // Without a wiring or projection the output is the new state
        let output_diff = (output - new_hidden).abs().mean().into_scalar();
        assert!(output_diff < 1e-6, "Output should equal new_hidden");
    }

    #[test]
    fn test_pure_mode_fresh_cell_formula() {
        // w_tau = 0 and A = 1 at init, so h = 1 - exp(-t·|ff1|)·ff1
        let device = get_test_device();
        let cell = CfcConfig::new()
            .with_mode(CfcMode::Pure)
            .with_backbone(0, 0, 0.0)
            .init::<TestBackend>(3, 4, &device)
            .unwrap();

        let input = Tensor::<TestBackend, 2>::ones([1, 3], &device);
        let hx = Tensor::<TestBackend, 2>::zeros([1, 4], &device);
        let x = Tensor::cat(vec![input.clone(), hx.clone()], 1);
        let ff1 = cell.ff1.forward(x);
        let expected = ff1.clone().abs().neg().exp().mul(ff1).neg().add_scalar(1.0);

        let (output, _) = cell.forward(input, hx, ones_elapsed(1)).unwrap();
        let diff = (output - expected).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_cfc_backbone_configurations() {
        let device = get_test_device();

        let flat = CfcConfig::new()
            .with_backbone(0, 0, 0.0)
            .init::<TestBackend>(20, 50, &device)
            .unwrap();
        assert_eq!(flat.backbone_layers(), 0);

        let deep = CfcConfig::new()
            .with_backbone(64, 3, 0.2)
            .init::<TestBackend>(20, 50, &device)
            .unwrap();
        assert_eq!(deep.backbone_layers(), 3);

        let input = Tensor::<TestBackend, 2>::zeros([2, 20], &device);
        let hx = Tensor::<TestBackend, 2>::zeros([2, 50], &device);
        let (output, _) = deep.forward(input, hx, ones_elapsed(2)).unwrap();
        assert_eq!(output.dims(), [2, 50]);
    }

    #[test]
    fn test_cfc_activations() {
        let device = get_test_device();

        for name in ["relu", "tanh", "gelu", "silu", "lecun_tanh"] {
            let activation: Activation = name.parse().unwrap();
            let cell = CfcConfig::new()
                .with_backbone(64, 1, 0.0)
                .with_activation(activation)
                .init::<TestBackend>(20, 50, &device)
                .unwrap();
            assert_eq!(cell.activation(), activation);

            let input = Tensor::<TestBackend, 2>::zeros([2, 20], &device);
            let hx = Tensor::<TestBackend, 2>::zeros([2, 50], &device);
            let (output, _) = cell.forward(input, hx, ones_elapsed(2)).unwrap();
            assert_eq!(output.dims()[0], 2);
        }
    }

    #[test]
    fn test_cfc_invalid_configuration() {
        let device = get_test_device();
        let err = CfcConfig::new()
            .with_backbone(64, 1, 1.5)
            .init::<TestBackend>(20, 50, &device)
            .unwrap_err();
        assert!(matches!(err, NcpError::Config(_)));

        assert!(matches!(
            "invalid_mode".parse::<CfcMode>(),
            Err(NcpError::Config(_))
        ));
    }

    #[test]
    fn test_cfc_projection() {
        let device = get_test_device();
        let cell = CfcConfig::new()
            .with_proj_size(3)
            .init::<TestBackend>(4, 10, &device)
            .unwrap();
        assert_eq!(cell.output_size(), 3);

        let input = Tensor::<TestBackend, 2>::zeros([5, 4], &device);
        let hx = Tensor::<TestBackend, 2>::zeros([5, 10], &device);
        let (output, new_hidden) = cell.forward(input, hx, ones_elapsed(5)).unwrap();
        assert_eq!(output.dims(), [5, 3]);
        assert_eq!(new_hidden.dims(), [5, 10]);
    }

    #[test]
    fn test_cfc_batch_processing() {
        let device = get_test_device();
        let cell = CfcConfig::new().init::<TestBackend>(20, 50, &device).unwrap();

        for batch in [1, 8, 32] {
            let input = Tensor::<TestBackend, 2>::zeros([batch, 20], &device);
            let hx = Tensor::<TestBackend, 2>::zeros([batch, 50], &device);

            let (output, _) = cell.forward(input, hx, ones_elapsed(batch)).unwrap();
            assert_eq!(output.dims(), [batch, 50]);
        }
    }

    #[test]
    fn test_cfc_rejects_wrong_widths() {
        let device = get_test_device();
        let cell = CfcConfig::new().init::<TestBackend>(4, 6, &device).unwrap();

        let err = cell
            .forward(
                Tensor::zeros([2, 5], &device),
                Tensor::zeros([2, 6], &device),
                ones_elapsed(2),
            )
            .unwrap_err();
        assert_eq!(err, NcpError::shape("CfC input", 4, 5));

        let err = cell
            .forward(
                Tensor::zeros([2, 4], &device),
                Tensor::zeros([2, 7], &device),
                ones_elapsed(2),
            )
            .unwrap_err();
        assert_eq!(err, NcpError::shape("CfC state", 6, 7));
    }
}
