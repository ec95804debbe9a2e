//! One declarative configuration for the whole engine.
//!
//! Every threshold, band, rule table, multiplier and hyperparameter used by
//! the predictors lives in [`EngineConfig`]. Missing JSON fields fall back
//! to the defaults, so a config file only needs the values it changes:
//!
//! ```
//! use reimburse::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{"trainer": {"max_iterations": 200}}"#)
//!     .expect("valid config");
//! assert_eq!(config.trainer.max_iterations, 200);
//! assert_eq!(config.trainer.learning_rate, 0.01);
//! ```

use crate::corrections::{self, Correction};
use crate::ensemble::EnsembleConfig;
use crate::error::Result;
use crate::features::FeatureSet;
use crate::lookup::LookupConfig;
use crate::neighbors::KnnConfig;
use crate::optim::TrainerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for every component of an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Polynomial feature terms.
    pub features: FeatureSet,
    /// Gradient-descent hyperparameters.
    pub trainer: TrainerConfig,
    /// Nearest-neighbor settings.
    pub knn: KnnConfig,
    /// Lookup bands, position rules and fallback.
    pub lookup: LookupConfig,
    /// Ensemble routing table.
    pub ensemble: EnsembleConfig,
    /// Post-processing stages applied to the ensemble output.
    pub corrections: Vec<Correction>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            features: FeatureSet::default(),
            trainer: TrainerConfig::default(),
            knn: KnnConfig::default(),
            lookup: LookupConfig::default(),
            ensemble: EnsembleConfig::default(),
            corrections: corrections::default_corrections(),
        }
    }
}

impl EngineConfig {
    /// Sets the feature terms.
    #[must_use]
    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    /// Sets the trainer hyperparameters.
    #[must_use]
    pub fn with_trainer(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    /// Sets the k-NN settings.
    #[must_use]
    pub fn with_knn(mut self, knn: KnnConfig) -> Self {
        self.knn = knn;
        self
    }

    /// Sets the lookup settings.
    #[must_use]
    pub fn with_lookup(mut self, lookup: LookupConfig) -> Self {
        self.lookup = lookup;
        self
    }

    /// Sets the ensemble routing table.
    #[must_use]
    pub fn with_ensemble(mut self, ensemble: EnsembleConfig) -> Self {
        self.ensemble = ensemble;
        self
    }

    /// Sets the correction stages.
    #[must_use]
    pub fn with_corrections(mut self, corrections: Vec<Correction>) -> Self {
        self.corrections = corrections;
        self
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`](crate::error::ReimburseError::InvalidHyperparameter)
    /// naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.trainer.validate()?;
        self.knn.validate()?;
        self.lookup.validate()?;
        self.ensemble.validate()?;
        corrections::validate_all(&self.corrections)
    }

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON, otherwise the errors
    /// of [`EngineConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file can't be read, otherwise the errors
    /// of [`EngineConfig::from_json_str`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
