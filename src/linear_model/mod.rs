//! Polynomial regression over engineered features.
//!
//! [`PolynomialModel`] is linear in its coefficients but polynomial (and
//! piecewise) in the raw inputs: the nonlinearity lives entirely in the
//! [`FeatureSet`]. Fitting runs feature extraction, normalization and
//! gradient descent once; the resulting model is frozen.
//!
//! ```text
//! ŷ = round_cents( w · normalize(extract(trip)) )
//! ```
//!
//! # Examples
//!
//! ```
//! use reimburse::data::{TrainingExample, TrainingSet, Trip};
//! use reimburse::diagnostics::SilentSink;
//! use reimburse::features::FeatureSet;
//! use reimburse::linear_model::PolynomialModel;
//! use reimburse::optim::TrainerConfig;
//! use reimburse::traits::Predictor;
//!
//! let examples = (1..=6)
//!     .map(|d| TrainingExample::new(Trip::new(d, 10.0, 5.0).expect("valid"), 100.0 * d as f64))
//!     .collect::<Result<Vec<_>, _>>()
//!     .expect("finite targets");
//! let data = TrainingSet::new(examples).expect("non-empty");
//!
//! let model = PolynomialModel::fit(&data, FeatureSet::default(), &TrainerConfig::default(), &SilentSink)
//!     .expect("fit should succeed");
//! let amount = model.predict(&Trip::new(3, 10.0, 5.0).expect("valid"));
//! assert!(amount.is_finite());
//! ```

use crate::data::{TrainingSet, Trip};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::{ReimburseError, Result};
use crate::features::FeatureSet;
use crate::optim::{ConvergenceStatus, GradientDescent, TrainerConfig};
use crate::preprocessing::{NormalizationParams, Normalizer};
use crate::primitives::{round_cents, Vector};
use crate::traits::Predictor;
use serde::{Deserialize, Serialize};

/// How the coefficients were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// Training MSE of the kept coefficients.
    pub best_mse: f64,
    /// Gradient-descent iterations run.
    pub iterations: usize,
    /// Why training stopped.
    pub status: ConvergenceStatus,
}

/// Frozen polynomial regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelFields")]
pub struct PolynomialModel {
    features: FeatureSet,
    normalization: NormalizationParams,
    coefficients: Vector<f64>,
    summary: FitSummary,
}

#[derive(Deserialize)]
struct ModelFields {
    features: FeatureSet,
    normalization: NormalizationParams,
    coefficients: Vector<f64>,
    summary: FitSummary,
}

impl TryFrom<ModelFields> for PolynomialModel {
    type Error = ReimburseError;

    fn try_from(fields: ModelFields) -> Result<Self> {
        Self::from_parts(
            fields.features,
            fields.normalization,
            fields.coefficients,
            fields.summary,
        )
    }
}

impl PolynomialModel {
    /// Extracts, normalizes and trains on `data`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid trainer configuration. Numeric
    /// divergence during training is recovered, not reported.
    pub fn fit(
        data: &TrainingSet,
        features: FeatureSet,
        trainer: &TrainerConfig,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self> {
        let raw = features.extract_matrix(data.iter().map(|ex| ex.trip()))?;
        let normalization = Normalizer::new().fit(&raw)?;
        let x = normalization.apply_matrix(&raw)?;

        sink.emit(&DiagnosticEvent::FeaturesExtracted {
            rows: x.n_rows(),
            cols: x.n_cols(),
            constant_features: normalization.count_unit_stds(),
        });

        let report = GradientDescent::new(trainer.clone()).train(&x, &data.targets(), sink)?;

        Self::from_parts(
            features,
            normalization,
            report.coefficients,
            FitSummary {
                best_mse: report.best_mse,
                iterations: report.iterations,
                status: report.status,
            },
        )
    }

    /// Assembles a model from explicit parts, checking that the coefficient
    /// vector, the normalization params and the feature set agree in length.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::DimensionMismatch`] on a length disagreement
    /// and [`ReimburseError::InvalidHyperparameter`] for non-finite coefficients.
    pub fn from_parts(
        features: FeatureSet,
        normalization: NormalizationParams,
        coefficients: Vector<f64>,
        summary: FitSummary,
    ) -> Result<Self> {
        if coefficients.len() != features.len() {
            return Err(ReimburseError::dimension_mismatch(
                "coefficients",
                features.len(),
                coefficients.len(),
            ));
        }
        if normalization.width() != features.len() {
            return Err(ReimburseError::dimension_mismatch(
                "normalization width",
                features.len(),
                normalization.width(),
            ));
        }
        if !coefficients.is_finite() {
            return Err(ReimburseError::hyperparameter(
                "coefficients",
                "non-finite",
                "all finite",
            ));
        }
        Ok(Self {
            features,
            normalization,
            coefficients,
            summary,
        })
    }

    /// Feature terms the model was trained on.
    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Frozen normalization params.
    #[must_use]
    pub fn normalization(&self) -> &NormalizationParams {
        &self.normalization
    }

    /// Coefficients aligned with [`FeatureSet::names`].
    #[must_use]
    pub fn coefficients(&self) -> &Vector<f64> {
        &self.coefficients
    }

    /// Training outcome.
    #[must_use]
    pub fn summary(&self) -> &FitSummary {
        &self.summary
    }

    /// Unrounded model output.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::DimensionMismatch`] if the extracted
    /// features don't match the stored normalization width.
    pub fn predict_unrounded(&self, trip: &Trip) -> Result<f64> {
        let z = self.normalization.apply(&self.features.extract(trip))?;
        if z.len() != self.coefficients.len() {
            return Err(ReimburseError::dimension_mismatch(
                "coefficients",
                self.coefficients.len(),
                z.len(),
            ));
        }
        Ok(z.dot(&self.coefficients))
    }
}

impl Predictor for PolynomialModel {
    fn predict(&self, trip: &Trip) -> f64 {
        match self.predict_unrounded(trip) {
            Ok(raw) if raw.is_finite() => round_cents(raw),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingExample;
    use crate::diagnostics::{RecordingSink, SilentSink, Verbosity};
    use crate::features::Feature;
    use crate::rules::Variable;

    fn set(rows: &[(i64, f64, f64, f64)]) -> TrainingSet {
        TrainingSet::new(
            rows.iter()
                .map(|&(d, m, r, y)| {
                    TrainingExample::new(Trip::new(d, m, r).expect("valid trip"), y)
                        .expect("finite target")
                })
                .collect(),
        )
        .expect("non-empty")
    }

    fn linear_features() -> FeatureSet {
        FeatureSet::new(vec![
            Feature::power(Variable::Days, 1),
            Feature::power(Variable::Miles, 1),
        ])
        .expect("valid features")
    }

    #[test]
    fn test_recovers_linear_function() {
        // y = 100 d + 0.5 m
        let data = set(&[
            (1, 10.0, 0.0, 105.0),
            (2, 40.0, 0.0, 220.0),
            (3, 20.0, 0.0, 310.0),
            (4, 80.0, 0.0, 440.0),
            (5, 60.0, 0.0, 530.0),
        ]);
        let trainer = TrainerConfig::default()
            .with_l2(0.0)
            .with_max_iterations(20_000);
        let model = PolynomialModel::fit(&data, linear_features(), &trainer, &SilentSink)
            .expect("fit");
        let trip = Trip::new(3, 50.0, 0.0).expect("valid");
        assert!((model.predict(&trip) - 325.0).abs() < 0.5);
    }

    #[test]
    fn test_coefficients_align_with_features() {
        let data = set(&[(1, 1.0, 1.0, 10.0), (2, 2.0, 2.0, 20.0)]);
        let model = PolynomialModel::fit(
            &data,
            FeatureSet::default(),
            &TrainerConfig::default().with_max_iterations(50),
            &SilentSink,
        )
        .expect("fit");
        assert_eq!(model.coefficients().len(), model.features().len());
        assert_eq!(model.normalization().width(), model.features().len());
    }

    #[test]
    fn test_identical_inputs_different_targets() {
        let data = set(&[
            (5, 250.0, 150.75, 700.0),
            (5, 250.0, 150.75, 800.0),
            (5, 250.0, 150.75, 900.0),
        ]);
        let sink = RecordingSink::new(Verbosity::Verbose);
        let model = PolynomialModel::fit(
            &data,
            FeatureSet::default(),
            &TrainerConfig::default(),
            &sink,
        )
        .expect("fit");
        assert!(model.normalization().stds().iter().all(|&s| s == 1.0));
        let amount = model.predict(&Trip::new(5, 250.0, 150.75).expect("valid"));
        assert!((amount - 800.0).abs() < 1e-6);
        assert_eq!(
            sink.count(|e| matches!(
                e,
                DiagnosticEvent::FeaturesExtracted { constant_features, .. }
                    if *constant_features == model.features().len() - 1
            )),
            1
        );
    }

    #[test]
    fn test_predictions_are_cent_rounded() {
        let data = set(&[(1, 13.0, 7.77, 91.31), (3, 101.0, 33.1, 412.09), (7, 999.0, 1500.0, 1700.2)]);
        let model = PolynomialModel::fit(
            &data,
            FeatureSet::default(),
            &TrainerConfig::default().with_max_iterations(500),
            &SilentSink,
        )
        .expect("fit");
        let p = model.predict(&Trip::new(2, 33.3, 44.4).expect("valid"));
        assert!((p * 100.0 - (p * 100.0).round()).abs() < 1e-6);
    }

    #[test]
    fn test_predict_unrounded_agrees_with_predict() {
        let data = set(&[(1, 10.0, 0.0, 105.0), (2, 40.0, 0.0, 220.0), (4, 80.0, 0.0, 440.0)]);
        let model = PolynomialModel::fit(
            &data,
            linear_features(),
            &TrainerConfig::default().with_max_iterations(200),
            &SilentSink,
        )
        .expect("fit");
        let trip = Trip::new(3, 55.5, 0.0).expect("valid");
        let raw = model.predict_unrounded(&trip).expect("widths agree");
        assert_eq!(round_cents(raw), model.predict(&trip));
    }

    #[test]
    fn test_retraining_is_reproducible() {
        let data = set(&[(1, 50.0, 20.0, 120.0), (4, 300.0, 500.0, 900.0), (9, 800.0, 1500.0, 1800.0)]);
        let cfg = TrainerConfig::default().with_max_iterations(800);
        let a = PolynomialModel::fit(&data, FeatureSet::default(), &cfg, &SilentSink).expect("fit");
        let b = PolynomialModel::fit(&data, FeatureSet::default(), &cfg, &SilentSink).expect("fit");
        assert_eq!(a.coefficients(), b.coefficients());
    }

    #[test]
    fn test_from_parts_rejects_length_mismatch() {
        let features = linear_features();
        let params = NormalizationParams::new(vec![0.0, 0.0], vec![1.0, 1.0]).expect("params");
        let summary = FitSummary {
            best_mse: 0.0,
            iterations: 0,
            status: ConvergenceStatus::MaxIterations,
        };
        let err = PolynomialModel::from_parts(
            features.clone(),
            params.clone(),
            Vector::from_slice(&[1.0, 2.0]),
            summary,
        )
        .expect_err("2 coefficients for 3 columns");
        assert!(matches!(err, ReimburseError::DimensionMismatch { .. }));
        assert!(PolynomialModel::from_parts(
            features,
            params,
            Vector::from_slice(&[1.0, 2.0, 3.0]),
            summary
        )
        .is_ok());
    }

    #[test]
    fn test_serde_rechecks_invariant() {
        let data = set(&[(1, 1.0, 1.0, 10.0), (2, 2.0, 2.0, 20.0)]);
        let model = PolynomialModel::fit(
            &data,
            linear_features(),
            &TrainerConfig::default().with_max_iterations(10),
            &SilentSink,
        )
        .expect("fit");
        let json = serde_json::to_string(&model).expect("serialize");
        let back: PolynomialModel = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, model);

        let mut value: serde_json::Value = serde_json::from_str(&json).expect("json");
        value["coefficients"]["data"] = serde_json::json!([1.0]);
        assert!(serde_json::from_value::<PolynomialModel>(value).is_err());
    }
}
