use thiserror::Error;

use crate::tensor::DType;

/// Errors raised by the kernels, the statistics builders and the normalizers.
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Normalizer has not been fit, call fit before '{operation}'")]
    NotFitted { operation: String },

    #[error("Illegal state in '{operation}': {reason}")]
    IllegalState { operation: String, reason: String },

    #[error("Invalid argument in '{operation}': {reason}")]
    InvalidArgument { operation: String, reason: String },

    #[error("Type mismatch in '{operation}': expected {expected}, got {got}")]
    TypeMismatch {
        operation: String,
        expected: DType,
        got: DType,
    },

    #[error("Operation '{operation}' does not support {dtype} elements")]
    Unsupported { operation: String, dtype: DType },

    #[error("Could not parse '{value}' at line {line}, column {column}")]
    Parse {
        line: u64,
        column: usize,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Pickle error: {0}")]
    Pickle(#[from] serde_pickle::Error),
}

impl PreprocessError {
    pub fn not_fitted(operation: &str) -> Self {
        Self::NotFitted {
            operation: operation.to_string(),
        }
    }

    pub fn illegal_state(operation: &str, reason: impl Into<String>) -> Self {
        Self::IllegalState {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(operation: &str, expected: DType, got: DType) -> Self {
        Self::TypeMismatch {
            operation: operation.to_string(),
            expected,
            got,
        }
    }

    pub fn unsupported(operation: &str, dtype: DType) -> Self {
        Self::Unsupported {
            operation: operation.to_string(),
            dtype,
        }
    }
}

pub type Result<T> = std::result::Result<T, PreprocessError>;
