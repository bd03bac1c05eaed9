use std::error::Error;
use std::fmt;

use crate::math::ShapeError;

/// Errors raised by the classification pipeline.
#[derive(Debug)]
pub enum ClassifierError {
    /// Unknown classifier or sampler name, or an invalid hyper-parameter.
    Config(String),
    /// Malformed input: shape mismatch, unknown class column, too few samples.
    Data(String),
    /// Labels are mandatory for the operation but some rows have none.
    MissingLabels { column: String, count: usize },
    /// An operation was called before the component was fitted.
    Unfitted(&'static str),
    /// A leaf classifier failed to train.
    Training(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClassifierError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            ClassifierError::Data(msg) => write!(f, "invalid data: {}", msg),
            ClassifierError::MissingLabels { column, count } => write!(
                f,
                "{} rows have no value in label column '{}'",
                count, column
            ),
            ClassifierError::Unfitted(what) => write!(f, "{} must be fitted first", what),
            ClassifierError::Training(msg) => write!(f, "training failed: {}", msg),
        }
    }
}

impl Error for ClassifierError {}

impl From<ShapeError> for ClassifierError {
    fn from(err: ShapeError) -> Self {
        ClassifierError::Data(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
