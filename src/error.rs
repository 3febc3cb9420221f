//! Error types shared by wirings, masks and cells.

use thiserror::Error;

pub type NcpResult<T> = Result<T, NcpError>;

/// Errors raised while wiring, building or stepping a circuit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NcpError {
    /// Index or polarity outside its declared bounds
    #[error("Out of range: {0}")]
    Range(String),

    /// A prerequisite binding is missing, or a rebinding is incompatible
    #[error("Invalid state: {0}")]
    State(String),

    /// Runtime tensor shape disagrees with the statically bound shape
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    Shape {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unsupported or inconsistent configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NcpError {
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        NcpError::Shape {
            context,
            expected,
            actual,
        }
    }
}

impl From<serde_json::Error> for NcpError {
    fn from(err: serde_json::Error) -> Self {
        NcpError::Serialization(err.to_string())
    }
}
