//! Activation functions shared by the cells.
//!
//! [`Activation`] is the closed set of names a CfC backbone accepts; anything
//! outside the table is rejected with a configuration error.

use std::fmt;
use std::str::FromStr;

use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{NcpError, NcpResult};

/// Scaled tanh, `1.7159 * tanh(0.666 * x)`
///
/// ```rust
/// use burn::backend::NdArray;
/// use burn::tensor::Tensor;
/// use ncps::activation::LeCun;
///
/// let device = Default::default();
/// let x = Tensor::<NdArray<f32>, 1>::from_floats([0.0, 1.0, -1.0], &device);
/// let y = LeCun::forward(x);
/// assert_eq!(y.dims(), [3]);
/// ```
pub struct LeCun;

impl LeCun {
    pub fn forward<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
        (x * 0.666f32).tanh() * 1.7159f32
    }
}

/// Numerically stable `ln(1 + e^x)`
pub fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    // max(x, 0) + ln(1 + e^-|x|)
    x.clone().clamp_min(0.0) + x.abs().neg().exp().add_scalar(1.0).log()
}

/// Element-wise nonlinearity selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Gelu,
    Silu,
    #[default]
    LecunTanh,
    Sigmoid,
    Softplus,
    Identity,
}

const ACTIVATION_NAMES: [(&str, Activation); 8] = [
    ("relu", Activation::Relu),
    ("tanh", Activation::Tanh),
    ("gelu", Activation::Gelu),
    ("silu", Activation::Silu),
    ("lecun_tanh", Activation::LecunTanh),
    ("sigmoid", Activation::Sigmoid),
    ("softplus", Activation::Softplus),
    ("identity", Activation::Identity),
];

impl Activation {
    pub fn name(self) -> &'static str {
        ACTIVATION_NAMES
            .iter()
            .find(|(_, activation)| *activation == self)
            .map(|(name, _)| *name)
            .unwrap_or("identity")
    }

    /// Position in the name table, the form cells store
    pub(crate) fn code(self) -> u8 {
        ACTIVATION_NAMES
            .iter()
            .position(|(_, activation)| *activation == self)
            .unwrap_or(ACTIVATION_NAMES.len() - 1) as u8
    }

    pub(crate) fn from_code(code: u8) -> Self {
        ACTIVATION_NAMES
            .get(code as usize)
            .map(|(_, activation)| *activation)
            .unwrap_or(Activation::Identity)
    }

    pub fn forward<B: Backend, const D: usize>(self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => activation::relu(x),
            Activation::Tanh => x.tanh(),
            Activation::Gelu => activation::gelu(x),
            Activation::Silu => activation::silu(x),
            Activation::LecunTanh => LeCun::forward(x),
            Activation::Sigmoid => activation::sigmoid(x),
            Activation::Softplus => softplus(x),
            Activation::Identity => x,
        }
    }
}

impl FromStr for Activation {
    type Err = NcpError;

    fn from_str(name: &str) -> NcpResult<Self> {
        ACTIVATION_NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, activation)| *activation)
            .ok_or_else(|| {
                let known: Vec<&str> = ACTIVATION_NAMES.iter().map(|(n, _)| *n).collect();
                NcpError::Config(format!(
                    "unknown activation '{}', expected one of {:?}",
                    name, known
                ))
            })
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_softplus_is_stable() {
        let device = Default::default();
        let x = Tensor::<Backend, 1>::from_floats([-100.0f32, 0.0, 100.0], &device);
        let y = softplus(x).into_data().to_vec::<f32>().unwrap();

        assert!(y[0] >= 0.0 && y[0] < 1e-6);
        assert!((y[1] - 2f32.ln()).abs() < 1e-6);
        assert!((y[2] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_activation_names_round_trip() {
        for (name, activation) in ACTIVATION_NAMES {
            assert_eq!(name.parse::<Activation>().unwrap(), activation);
            assert_eq!(activation.to_string(), name);
            assert_eq!(Activation::from_code(activation.code()), activation);
        }
    }

    #[test]
    fn test_unknown_activation_is_config_error() {
        let err = "swish2".parse::<Activation>().unwrap_err();
        assert!(matches!(err, NcpError::Config(_)));
    }

    #[test]
    fn test_activation_table_forward() {
        let device = Default::default();
        let x = Tensor::<Backend, 1>::from_floats([-1.0f32, 0.5], &device);

        let relu = Activation::Relu.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
        assert_eq!(relu, vec![0.0, 0.5]);

        let identity = Activation::Identity
            .forward(x.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(identity, vec![-1.0, 0.5]);

        let lecun = Activation::LecunTanh.forward(x).into_data().to_vec::<f32>().unwrap();
        assert!((lecun[1] - 1.7159 * (0.666f32 * 0.5).tanh()).abs() < 1e-5);
    }
}
