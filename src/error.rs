//! Error types for reimburse operations.
//!
//! Only input validation, training-data and configuration problems reach
//! callers. Numeric trouble during training and uncovered lookup categories
//! are recovered inside the predictors and never show up here.

use std::fmt;

/// Main error type for reimburse operations.
///
/// # Examples
///
/// ```
/// use reimburse::error::ReimburseError;
///
/// let err = ReimburseError::Validation {
///     field: "days".to_string(),
///     value: "0".to_string(),
///     constraint: "> 0".to_string(),
/// };
/// assert!(err.to_string().contains("days"));
/// ```
#[derive(Debug)]
pub enum ReimburseError {
    /// A raw prediction input is outside the valid domain.
    Validation {
        /// Input name (`days`, `miles`, `receipts`)
        field: String,
        /// Offending value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// The training set is empty or contains malformed records.
    TrainingData {
        /// Error description
        message: String,
    },

    /// Invalid configuration value.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Vector/matrix dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for ReimburseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReimburseError::Validation {
                field,
                value,
                constraint,
            } => {
                write!(f, "Invalid input: {field} = {value}, expected {constraint}")
            }
            ReimburseError::TrainingData { message } => {
                write!(f, "Invalid training data: {message}")
            }
            ReimburseError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            ReimburseError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            ReimburseError::Io(e) => write!(f, "I/O error: {e}"),
            ReimburseError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            ReimburseError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ReimburseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReimburseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReimburseError {
    fn from(err: std::io::Error) -> Self {
        ReimburseError::Io(err)
    }
}

impl From<serde_json::Error> for ReimburseError {
    fn from(err: serde_json::Error) -> Self {
        ReimburseError::Serialization(err.to_string())
    }
}

impl From<&str> for ReimburseError {
    fn from(msg: &str) -> Self {
        ReimburseError::Other(msg.to_string())
    }
}

impl From<String> for ReimburseError {
    fn from(msg: String) -> Self {
        ReimburseError::Other(msg)
    }
}

impl ReimburseError {
    /// Create a validation error for a raw input.
    #[must_use]
    pub fn validation(field: &str, value: impl fmt::Display, constraint: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a training data error.
    #[must_use]
    pub fn training_data(message: impl Into<String>) -> Self {
        Self::TrainingData {
            message: message.into(),
        }
    }

    /// Create an invalid hyperparameter error.
    #[must_use]
    pub fn hyperparameter(param: &str, value: impl fmt::Display, constraint: &str) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// True for errors caused by the caller's raw input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, ReimburseError>;
