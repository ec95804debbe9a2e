//! Error types for the reimburse CLI.

use reimburse::ReimburseError;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Bad trip input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Empty or malformed training cases
    #[error("Invalid training data: {0}")]
    TrainingData(String),

    /// Bad config value
    #[error("Invalid config: {0}")]
    Config(String),

    /// Unreadable engine artifact
    #[error("Invalid model file: {0}")]
    InvalidModel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Evaluation below the requested threshold
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    /// Any other library error
    #[error("{0}")]
    Reimburse(String),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::from(2),
            Self::FileNotFound(_) => ExitCode::from(3),
            Self::TrainingData(_) => ExitCode::from(4),
            Self::Config(_) => ExitCode::from(5),
            Self::InvalidModel(_) => ExitCode::from(6),
            Self::Io(_) => ExitCode::from(7),
            Self::EvaluationFailed(_) => ExitCode::from(8),
            Self::Reimburse(_) => ExitCode::from(1),
        }
    }
}

impl From<ReimburseError> for CliError {
    fn from(e: ReimburseError) -> Self {
        match e {
            ReimburseError::Validation { .. } => Self::InvalidInput(e.to_string()),
            ReimburseError::TrainingData { .. } => Self::TrainingData(e.to_string()),
            ReimburseError::InvalidHyperparameter { .. } => Self::Config(e.to_string()),
            ReimburseError::Serialization(_) => Self::InvalidModel(e.to_string()),
            ReimburseError::Io(io) => Self::Io(io),
            ReimburseError::DimensionMismatch { .. } | ReimburseError::Other(_) => {
                Self::Reimburse(e.to_string())
            }
        }
    }
}
