//! Element-wise input/output mappings of the LTC cell.

use std::fmt;
use std::str::FromStr;

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::{NcpError, NcpResult};

/// Stored in place of an activation code when the mapping is not a nonlinearity
const NO_NONLINEARITY: u8 = u8::MAX;

/// Input/output mapping modes
///
/// Serialized as a single name: `"affine"`, `"linear"`, `"none"`, or any
/// [`Activation`] name such as `"relu"` for a fixed nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MappingMode {
    /// Affine mapping: y = w * x + b
    #[default]
    Affine,
    /// Linear mapping: y = w * x
    Linear,
    /// No mapping (pass-through)
    None,
    /// Parameter-free nonlinearity: y = f(x)
    Nonlinear(Activation),
}

impl MappingMode {
    pub fn name(self) -> &'static str {
        match self {
            MappingMode::Affine => "affine",
            MappingMode::Linear => "linear",
            MappingMode::None => "none",
            MappingMode::Nonlinear(activation) => activation.name(),
        }
    }
}

impl FromStr for MappingMode {
    type Err = NcpError;

    fn from_str(name: &str) -> NcpResult<Self> {
        match name {
            "affine" => Ok(MappingMode::Affine),
            "linear" => Ok(MappingMode::Linear),
            "none" => Ok(MappingMode::None),
            other => other.parse::<Activation>().map(MappingMode::Nonlinear).map_err(|_| {
                NcpError::Config(format!(
                    "unknown mapping '{}', expected affine, linear, none or an activation name",
                    other
                ))
            }),
        }
    }
}

impl TryFrom<String> for MappingMode {
    type Error = NcpError;

    fn try_from(name: String) -> NcpResult<Self> {
        name.parse()
    }
}

impl From<MappingMode> for String {
    fn from(mode: MappingMode) -> Self {
        mode.name().to_string()
    }
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-feature scale and shift, or a fixed nonlinearity
///
/// The mode is implied by which parameters exist and by the stored
/// activation code.
#[derive(Module, Debug)]
pub struct Mapping<B: Backend> {
    pub weight: Option<Param<Tensor<B, 1>>>,
    pub bias: Option<Param<Tensor<B, 1>>>,
    nonlinearity: u8,
}

impl<B: Backend> Mapping<B> {
    /// Identity-initialized mapping over `size` features
    pub fn new(mode: MappingMode, size: usize, device: &B::Device) -> Self {
        let weight = match mode {
            MappingMode::Affine | MappingMode::Linear => {
                Some(Param::from_tensor(Tensor::ones([size], device)))
            }
            MappingMode::None | MappingMode::Nonlinear(_) => None,
        };
        let bias = match mode {
            MappingMode::Affine => Some(Param::from_tensor(Tensor::zeros([size], device))),
            _ => None,
        };
        let nonlinearity = match mode {
            MappingMode::Nonlinear(activation) => activation.code(),
            _ => NO_NONLINEARITY,
        };
        Self {
            weight,
            bias,
            nonlinearity,
        }
    }

    pub fn mode(&self) -> MappingMode {
        match (&self.weight, &self.bias) {
            (Some(_), Some(_)) => MappingMode::Affine,
            (Some(_), None) => MappingMode::Linear,
            _ if self.nonlinearity != NO_NONLINEARITY => {
                MappingMode::Nonlinear(Activation::from_code(self.nonlinearity))
            }
            _ => MappingMode::None,
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let dims = x.dims();
        let mut result = x;
        if let Some(ref w) = self.weight {
            result = result.mul(w.val().unsqueeze::<2>().expand(dims));
        }
        if let Some(ref b) = self.bias {
            result = result.add(b.val().unsqueeze::<2>().expand(dims));
        }
        if self.nonlinearity != NO_NONLINEARITY {
            result = Activation::from_code(self.nonlinearity).forward(result);
        }
        result
    }
}
