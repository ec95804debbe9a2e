//! Declarative routing rules for the combiner.

use crate::rules::Conditions;
use serde::{Deserialize, Serialize};

/// One of the component predictors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Polynomial regression.
    Polynomial,
    /// Nearest neighbors.
    Knn,
    /// Categorical lookup.
    Lookup,
}

/// Linear blend weights; normalized by their sum when applied.
///
/// A rule usually blends two predictors and leaves the third at 0, but any
/// non-negative mix of all three is accepted (the default fallback blend
/// uses all three).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    /// Polynomial share.
    pub polynomial: f64,
    /// k-NN share.
    pub knn: f64,
    /// Lookup share.
    pub lookup: f64,
}

impl BlendWeights {
    /// Explicit weights.
    #[must_use]
    pub const fn new(polynomial: f64, knn: f64, lookup: f64) -> Self {
        Self {
            polynomial,
            knn,
            lookup,
        }
    }

    /// Sum of the three weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.polynomial + self.knn + self.lookup
    }

    /// True when every weight is finite, non-negative and they sum to > 0.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.polynomial, self.knn, self.lookup]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
            && self.total() > 0.0
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Use one predictor's output as is.
    Select {
        /// Chosen predictor.
        source: Source,
    },
    /// Fixed-weight linear blend.
    Blend {
        /// Blend weights.
        weights: BlendWeights,
    },
}

/// A named routing rule; rules are tried in order and the first match decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRule {
    /// Reported as the deciding rule.
    pub name: String,
    /// Regime.
    pub when: Conditions,
    /// Outcome for matching trips.
    pub decision: Decision,
}

impl EnsembleRule {
    /// Rule that picks a single predictor.
    #[must_use]
    pub fn select(name: &str, when: Conditions, source: Source) -> Self {
        Self {
            name: name.to_string(),
            when,
            decision: Decision::Select { source },
        }
    }

    /// Rule that blends the predictors.
    #[must_use]
    pub fn blend(name: &str, when: Conditions, weights: BlendWeights) -> Self {
        Self {
            name: name.to_string(),
            when,
            decision: Decision::Blend { weights },
        }
    }
}
