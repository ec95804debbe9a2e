//! The built, immutable prediction engine.
//!
//! Building is the only phase that does work on the training set: it fits
//! the polynomial model, stores the examples in the similarity index,
//! aggregates the lookup table and validates the routing table. After
//! [`Engine::build`] returns, every method takes `&self`, so an engine can
//! be shared across threads and queried concurrently without locking.
//!
//! ```text
//! TrainingSet ─┬─ FeatureSet → Normalizer → GradientDescent → PolynomialModel ─┐
//!              ├─ SimilarityIndex ─────────────────────────────────────────────┼─ EnsembleCombiner → corrections
//!              └─ LookupTable ─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use reimburse::config::EngineConfig;
//! use reimburse::data::TrainingSet;
//! use reimburse::diagnostics::SilentSink;
//! use reimburse::engine::Engine;
//! use reimburse::optim::TrainerConfig;
//!
//! let data = TrainingSet::from_json_str(r#"[
//!     {"input": {"trip_duration_days": 1, "miles_traveled": 50, "total_receipts_amount": 20.5}, "expected_output": 120.0},
//!     {"input": {"trip_duration_days": 3, "miles_traveled": 180, "total_receipts_amount": 300.0}, "expected_output": 480.0},
//!     {"input": {"trip_duration_days": 6, "miles_traveled": 700, "total_receipts_amount": 900.0}, "expected_output": 1300.0}
//! ]"#).expect("valid training data");
//!
//! let config = EngineConfig::default()
//!     .with_trainer(TrainerConfig::default().with_max_iterations(200));
//! let engine = Engine::build(&data, config, &SilentSink).expect("build");
//!
//! let amount = engine.predict(3, 200.0, 310.0).expect("valid input");
//! assert!(amount.is_finite());
//! assert!(engine.predict(0, 200.0, 310.0).is_err());
//! ```

use crate::config::EngineConfig;
use crate::corrections::{self, CorrectedPredictor, Correction};
use crate::data::{TrainingSet, Trip};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::ensemble::{ComponentOutputs, EnsembleCombiner};
use crate::error::{ReimburseError, Result};
use crate::linear_model::PolynomialModel;
use crate::lookup::{CategoryKey, LookupEstimate, LookupTable};
use crate::neighbors::KnnPredictor;
use crate::traits::Predictor;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Artifact format version written by [`Engine::save`].
pub const FORMAT_VERSION: u32 = 1;

/// The three component predictors and the combiner that merges them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePredictor {
    polynomial: PolynomialModel,
    knn: KnnPredictor,
    lookup: LookupTable,
    combiner: EnsembleCombiner,
}

impl EnsemblePredictor {
    /// Outputs of every component for `trip`, plus the lookup provenance.
    #[must_use]
    pub fn components(&self, trip: &Trip) -> (ComponentOutputs, LookupEstimate) {
        let lookup = self.lookup.estimate(trip);
        let outputs = ComponentOutputs {
            polynomial: self.polynomial.predict(trip),
            knn: self.knn.predict(trip),
            lookup: lookup.value,
        };
        (outputs, lookup)
    }
}

impl Predictor for EnsemblePredictor {
    fn predict(&self, trip: &Trip) -> f64 {
        let (outputs, _) = self.components(trip);
        self.combiner.combine(trip, &outputs).value
    }
}

/// Full breakdown of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Validated input.
    pub trip: Trip,
    /// Component outputs.
    pub components: ComponentOutputs,
    /// Lookup category.
    pub category: CategoryKey,
    /// Human-readable lookup category.
    pub category_label: String,
    /// True when the lookup used its fallback estimator.
    pub lookup_fallback: bool,
    /// Lookup position rule that fired, if any.
    pub lookup_rule: Option<String>,
    /// Ensemble rule that decided the output.
    pub ensemble_rule: String,
    /// Ensemble output before corrections.
    pub ensemble_value: f64,
    /// Final amount after corrections.
    pub value: f64,
}

/// A built engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EngineFields")]
pub struct Engine {
    format_version: u32,
    predictor: CorrectedPredictor<EnsemblePredictor>,
}

#[derive(Deserialize)]
struct EngineFields {
    format_version: u32,
    predictor: CorrectedPredictor<EnsemblePredictor>,
}

impl TryFrom<EngineFields> for Engine {
    type Error = ReimburseError;

    fn try_from(fields: EngineFields) -> Result<Self> {
        if fields.format_version != FORMAT_VERSION {
            return Err(ReimburseError::Serialization(format!(
                "unsupported engine format version {} (expected {FORMAT_VERSION})",
                fields.format_version
            )));
        }
        // components re-check their own invariants while deserializing;
        // the rule tables are checked here
        let ensemble = fields.predictor.base();
        ensemble.knn.config().validate()?;
        ensemble.combiner.config().validate()?;
        corrections::validate_all(fields.predictor.corrections())?;
        Ok(Self {
            format_version: fields.format_version,
            predictor: fields.predictor,
        })
    }
}

impl Engine {
    /// Runs the build phase.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] for an invalid
    /// configuration. Numeric trouble during training is recovered.
    pub fn build(data: &TrainingSet, config: EngineConfig, sink: &dyn DiagnosticSink) -> Result<Self> {
        config.validate()?;
        sink.emit(&DiagnosticEvent::BuildStarted {
            examples: data.len(),
        });

        let EngineConfig {
            features,
            trainer,
            knn,
            lookup,
            ensemble,
            corrections,
        } = config;

        let polynomial = PolynomialModel::fit(data, features, &trainer, sink)?;
        let knn = KnnPredictor::new(data, knn)?;
        let lookup = LookupTable::train(data, lookup, sink)?;
        let combiner = EnsembleCombiner::new(ensemble)?;

        sink.emit(&DiagnosticEvent::BuildFinished);

        Ok(Self {
            format_version: FORMAT_VERSION,
            predictor: CorrectedPredictor::new(
                EnsemblePredictor {
                    polynomial,
                    knn,
                    lookup,
                    combiner,
                },
                corrections,
            ),
        })
    }

    /// Validates raw inputs and predicts.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::Validation`] when `days <= 0`, or `miles` or
    /// `receipts` is negative or not finite. No predictor runs in that case.
    pub fn predict(&self, days: i64, miles: f64, receipts: f64) -> Result<f64> {
        Ok(self.predict_trip(&Trip::new(days, miles, receipts)?))
    }

    /// Predicts an already validated trip.
    #[must_use]
    pub fn predict_trip(&self, trip: &Trip) -> f64 {
        self.predictor.predict(trip)
    }

    /// Predicts every trip, in parallel when the `parallel` feature is on.
    #[must_use]
    pub fn predict_batch(&self, trips: &[Trip]) -> Vec<f64> {
        #[cfg(feature = "parallel")]
        {
            trips.par_iter().map(|t| self.predict_trip(t)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            trips.iter().map(|t| self.predict_trip(t)).collect()
        }
    }

    /// Prediction with every intermediate value.
    #[must_use]
    pub fn explain(&self, trip: &Trip) -> Prediction {
        let ensemble = self.predictor.base();
        let (components, lookup) = ensemble.components(trip);
        let combined = ensemble.combiner.combine(trip, &components);
        Prediction {
            trip: *trip,
            components,
            category: lookup.key,
            category_label: ensemble.lookup.config().bands.describe(&lookup.key),
            lookup_fallback: lookup.fallback,
            lookup_rule: lookup.rule,
            ensemble_rule: combined.rule,
            ensemble_value: combined.value,
            value: self.predictor.correct(trip, combined.value),
        }
    }

    /// Polynomial component.
    #[must_use]
    pub fn polynomial(&self) -> &PolynomialModel {
        &self.predictor.base().polynomial
    }

    /// k-NN component.
    #[must_use]
    pub fn knn(&self) -> &KnnPredictor {
        &self.predictor.base().knn
    }

    /// Lookup component.
    #[must_use]
    pub fn lookup(&self) -> &LookupTable {
        &self.predictor.base().lookup
    }

    /// Routing table.
    #[must_use]
    pub fn combiner(&self) -> &EnsembleCombiner {
        &self.predictor.base().combiner
    }

    /// Correction stages.
    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        self.predictor.corrections()
    }

    /// Serializes the whole engine to JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores an engine, re-checking every invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::Serialization`] for malformed JSON, an
    /// unsupported format version or a broken invariant (for example a
    /// coefficient count that doesn't match the feature set).
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the engine artifact.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Reads an engine artifact written by [`Engine::save`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error, or the errors of [`Engine::from_json_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

impl Predictor for Engine {
    fn predict(&self, trip: &Trip) -> f64 {
        self.predict_trip(trip)
    }

    fn predict_all(&self, trips: &[Trip]) -> Vec<f64> {
        self.predict_batch(trips)
    }
}
