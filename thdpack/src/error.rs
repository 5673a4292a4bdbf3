//! Error types for thdpack

use thiserror::Error;

/// Result type alias using thdpack's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for thdpack operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Dtype mismatch: expected {expected}, got {got}")]
    DtypeMismatch { expected: String, got: String },

    #[error("Invalid parallel config: {0}")]
    InvalidParallelConfig(String),

    #[error("Communication error: {0}")]
    Comm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::DtypeMismatch`] from anything displayable.
    pub fn dtype_mismatch(expected: impl ToString, got: impl ToString) -> Self {
        Self::DtypeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::ShapeMismatch {
            expected: vec![2, 8],
            got: vec![2, 7],
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected [2, 8], got [2, 7]"
        );
    }

    #[test]
    fn test_dtype_mismatch_helper() {
        let err = Error::dtype_mismatch(DType::Bool, DType::I64);
        assert_eq!(err.to_string(), "Dtype mismatch: expected bool, got i64");
    }

    #[test]
    fn test_json_from() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
