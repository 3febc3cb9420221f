//! Binary and sign masks materialized from a wiring's adjacency matrices.
//!
//! Cells copy these into constant tensors when they are built and multiply
//! them into their dense weights on every forward call, so entries absent
//! from the wiring stay structurally zero whatever the raw weight holds.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{concatenate, Array2, Axis};

use crate::error::{NcpError, NcpResult};
use crate::wirings::Wiring;

/// `(binary, sign)` pair for one weight matrix laid out `[source, target]`
#[derive(Clone, Debug, PartialEq)]
pub struct SparsityMask {
    binary: Array2<f32>,
    sign: Array2<f32>,
}

impl SparsityMask {
    /// Binary = |adjacency|, sign = adjacency
    pub fn from_adjacency(adjacency: &Array2<i32>) -> Self {
        Self {
            binary: adjacency.mapv(|x| x.abs() as f32),
            sign: adjacency.mapv(|x| x as f32),
        }
    }

    /// Unit-to-unit mask, `[units, units]`
    pub fn internal(wiring: &dyn Wiring) -> Self {
        Self::from_adjacency(wiring.adjacency_matrix())
    }

    /// Input-to-unit mask, `[input_dim, units]`
    pub fn sensory(wiring: &dyn Wiring) -> NcpResult<Self> {
        wiring
            .sensory_adjacency_matrix()
            .map(Self::from_adjacency)
            .ok_or_else(|| {
                NcpError::State(
                    "wiring has no input dimension; call build(input_dim) first".to_string(),
                )
            })
    }

    /// All-ones mask with excitatory sign everywhere
    pub fn dense(rows: usize, cols: usize) -> Self {
        Self {
            binary: Array2::ones((rows, cols)),
            sign: Array2::ones((rows, cols)),
        }
    }

    /// Gather the sub-block selecting `rows` sources and `cols` targets
    pub fn block(&self, rows: &[usize], cols: &[usize]) -> NcpResult<Self> {
        let (num_rows, num_cols) = self.shape();
        if let Some(&row) = rows.iter().find(|&&r| r >= num_rows) {
            return Err(NcpError::Range(format!(
                "mask row {} outside [0, {})",
                row, num_rows
            )));
        }
        if let Some(&col) = cols.iter().find(|&&c| c >= num_cols) {
            return Err(NcpError::Range(format!(
                "mask column {} outside [0, {})",
                col, num_cols
            )));
        }

        let gather = |matrix: &Array2<f32>| {
            matrix
                .select(Axis(0), rows)
                .select(Axis(1), cols)
        };
        Ok(Self {
            binary: gather(&self.binary),
            sign: gather(&self.sign),
        })
    }

    /// Stack `below` under `self`; both must have the same column count
    pub fn stack_rows(&self, below: &SparsityMask) -> NcpResult<Self> {
        if self.shape().1 != below.shape().1 {
            return Err(NcpError::shape("mask columns", self.shape().1, below.shape().1));
        }
        let stack = |top: &Array2<f32>, bottom: &Array2<f32>| {
            concatenate(Axis(0), &[top.view(), bottom.view()])
                .map_err(|err| NcpError::Config(format!("cannot stack masks: {}", err)))
        };
        Ok(Self {
            binary: stack(&self.binary, &below.binary)?,
            sign: stack(&self.sign, &below.sign)?,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.binary.dim()
    }

    pub fn binary(&self) -> &Array2<f32> {
        &self.binary
    }

    pub fn sign(&self) -> &Array2<f32> {
        &self.sign
    }

    /// Number of structurally allowed entries
    pub fn allowed(&self) -> usize {
        self.binary.iter().filter(|&&x| x != 0.0).count()
    }

    pub fn binary_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        to_tensor(&self.binary, device)
    }

    pub fn sign_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        to_tensor(&self.sign, device)
    }
}

fn to_tensor<B: Backend>(matrix: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, cols) = matrix.dim();
    let data: Vec<f32> = matrix.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [rows, cols]), device)
}
