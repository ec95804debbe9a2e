//! Reimburse: learns a travel reimbursement function from labeled examples.
//!
//! Given `(days, miles, receipts)`, the [`Engine`](engine::Engine) predicts a
//! cent-rounded reimbursement by combining three learned estimators:
//! polynomial regression over engineered features, k-nearest-neighbor
//! averaging, and a categorical lookup table with a rule-based fallback.
//! A declarative routing table picks or blends their outputs per regime, and
//! an ordered list of deterministic corrections finishes the result.
//!
//! # Quick Start
//!
//! ```
//! use reimburse::prelude::*;
//!
//! let json = r#"[
//!   {"input": {"trip_duration_days": 1, "miles_traveled": 50, "total_receipts_amount": 20}, "expected_output": 120.5},
//!   {"input": {"trip_duration_days": 3, "miles_traveled": 200, "total_receipts_amount": 300}, "expected_output": 520.0},
//!   {"input": {"trip_duration_days": 5, "miles_traveled": 400, "total_receipts_amount": 600}, "expected_output": 980.25}
//! ]"#;
//! let data = TrainingSet::from_json_str(json).expect("valid cases");
//!
//! let config = EngineConfig::default()
//!     .with_trainer(TrainerConfig::default().with_max_iterations(200));
//! let engine = Engine::build(&data, config, &SilentSink).expect("engine builds");
//!
//! let amount = engine.predict(3, 210.0, 310.0).expect("valid input");
//! assert!(amount.is_finite() && amount >= 0.0);
//! assert!(engine.predict(0, 10.0, 10.0).is_err());
//! ```
//!
//! # Modules
//!
//! - [`data`]: Validated trips and the training-set JSON loader
//! - [`features`]: Polynomial feature terms and extraction
//! - [`preprocessing`]: Z-score normalization
//! - [`optim`]: Batch gradient descent with L2, clipping and early stopping
//! - [`linear_model`]: The polynomial predictor
//! - [`neighbors`]: Similarity metrics and the k-NN predictor
//! - [`lookup`]: Category bands, bucket statistics and the fallback estimator
//! - [`ensemble`]: Rule-based routing between component predictors
//! - [`corrections`]: Deterministic post-processing stages
//! - [`engine`]: The immutable, serializable engine
//! - [`config`]: One declarative configuration for all components
//! - [`metrics`]: Error metrics and evaluation summaries
//! - [`model_selection`]: K-fold cross-validation and train/test splitting
//! - [`analysis`]: Exploratory summaries of a labeled set
//! - [`diagnostics`]: Typed build events and injectable sinks

pub mod analysis;
pub mod config;
pub mod corrections;
pub mod data;
pub mod diagnostics;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod linear_model;
pub mod lookup;
pub mod metrics;
pub mod model_selection;
pub mod neighbors;
pub mod optim;
pub mod prelude;
pub mod preprocessing;
pub mod primitives;
pub mod rules;
pub mod traits;

pub use engine::Engine;
pub use error::{ReimburseError, Result};
pub use primitives::{Matrix, Vector};
pub use traits::Predictor;
