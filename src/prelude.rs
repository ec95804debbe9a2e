//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use reimburse::prelude::*;
//! ```

pub use crate::config::EngineConfig;
pub use crate::data::{TrainingExample, TrainingSet, Trip};
pub use crate::diagnostics::{DiagnosticSink, SilentSink, StderrSink, Verbosity};
pub use crate::engine::{Engine, Prediction};
pub use crate::error::{ReimburseError, Result};
pub use crate::metrics::{mae, mse, r_squared, rmse, Evaluation};
pub use crate::optim::TrainerConfig;
pub use crate::primitives::{Matrix, Vector};
pub use crate::traits::Predictor;
