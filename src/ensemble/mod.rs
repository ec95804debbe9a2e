//! Rule-driven ensemble over the three component predictors.
//!
//! [`EnsembleCombiner`] walks an ordered list of [`EnsembleRule`]s keyed on
//! trip regimes. The first rule whose conditions match either selects one
//! predictor or returns a fixed-weight blend; when no rule matches, the
//! default blend (weighted toward k-NN) applies. The deciding rule's name is
//! always reported.
//!
//! # Example
//!
//! ```
//! use reimburse::data::Trip;
//! use reimburse::ensemble::{ComponentOutputs, EnsembleCombiner};
//!
//! let combiner = EnsembleCombiner::default();
//! let outputs = ComponentOutputs { polynomial: 300.0, knn: 320.0, lookup: 310.0 };
//! let combined = combiner.combine(&Trip::new(3, 150.0, 200.0).expect("valid"), &outputs);
//! assert_eq!(combined.rule, "default");
//! assert_eq!(combined.value, 312.0);
//! ```

mod routing;

pub use routing::{BlendWeights, Decision, EnsembleRule, Source};

use crate::data::Trip;
use crate::error::{ReimburseError, Result};
use crate::primitives::round_cents;
use crate::rules::{Conditions, Interval};
use serde::{Deserialize, Serialize};

/// Name reported when no rule matched.
pub const DEFAULT_RULE: &str = "default";

/// Outputs of the component predictors for one trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentOutputs {
    /// Polynomial regression output.
    pub polynomial: f64,
    /// k-NN output.
    pub knn: f64,
    /// Lookup output.
    pub lookup: f64,
}

impl ComponentOutputs {
    /// Output of one source.
    #[must_use]
    pub fn get(&self, source: Source) -> f64 {
        match source {
            Source::Polynomial => self.polynomial,
            Source::Knn => self.knn,
            Source::Lookup => self.lookup,
        }
    }

    /// Normalized linear blend.
    #[must_use]
    pub fn blend(&self, weights: &BlendWeights) -> f64 {
        let total = weights.total();
        if total > 0.0 {
            (weights.polynomial * self.polynomial
                + weights.knn * self.knn
                + weights.lookup * self.lookup)
                / total
        } else {
            (self.polynomial + self.knn + self.lookup) / 3.0
        }
    }
}

/// Combined output and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combined {
    /// Final amount, rounded to cents.
    pub value: f64,
    /// Deciding rule, or [`DEFAULT_RULE`].
    pub rule: String,
}

/// Ordered rule table plus the fallback blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Tried in order; the first match decides.
    pub rules: Vec<EnsembleRule>,
    /// Blend used when no rule matches.
    pub default: BlendWeights,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        let single_day = Conditions::any().with_days(Interval::exactly(1));
        Self {
            rules: vec![
                EnsembleRule::blend(
                    "single_day_extreme_mileage",
                    single_day.clone().with_miles(Interval::at_least(600.0)),
                    BlendWeights::new(0.3, 0.7, 0.0),
                ),
                EnsembleRule::blend("single_day", single_day, BlendWeights::new(0.0, 0.5, 0.5)),
                EnsembleRule::select(
                    "long_trip_overspend",
                    Conditions::any()
                        .with_days(Interval::at_least(7.0))
                        .with_receipts_per_day(Interval::at_least(150.0))
                        .with_miles_per_day(Interval::below(150.0)),
                    Source::Lookup,
                ),
                EnsembleRule::blend(
                    "extreme_receipts",
                    Conditions::any().with_receipts(Interval::at_least(2000.0)),
                    BlendWeights::new(0.5, 0.5, 0.0),
                ),
                EnsembleRule::blend(
                    "efficiency_sweet_spot",
                    Conditions::any().with_miles_per_day(Interval::between(180.0, 220.0)),
                    BlendWeights::new(0.0, 0.5, 0.5),
                ),
            ],
            default: BlendWeights::new(0.3, 0.5, 0.2),
        }
    }
}

impl EnsembleConfig {
    /// Checks weights and conditions.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] for a blend with a
    /// negative or non-finite weight, a zero-sum blend or malformed conditions.
    pub fn validate(&self) -> Result<()> {
        if !self.default.is_valid() {
            return Err(ReimburseError::hyperparameter(
                "ensemble.default",
                format!("{:?}", self.default),
                "non-negative weights summing to > 0",
            ));
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.when.is_well_formed() {
                return Err(ReimburseError::hyperparameter(
                    &format!("ensemble.rules[{idx}].when"),
                    &rule.name,
                    "intervals with min < max",
                ));
            }
            if let Decision::Blend { weights } = &rule.decision {
                if !weights.is_valid() {
                    return Err(ReimburseError::hyperparameter(
                        &format!("ensemble.rules[{idx}].weights"),
                        &rule.name,
                        "non-negative weights summing to > 0",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Applies an [`EnsembleConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnsembleCombiner {
    config: EnsembleConfig,
}

impl EnsembleCombiner {
    /// Validates and wraps `config`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EnsembleConfig::validate`].
    pub fn new(config: EnsembleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The rule table.
    #[must_use]
    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// First rule matching `trip`, if any.
    #[must_use]
    pub fn route(&self, trip: &Trip) -> Option<&EnsembleRule> {
        self.config.rules.iter().find(|r| r.when.matches(trip))
    }

    /// Merges component outputs into one cent-rounded amount.
    #[must_use]
    pub fn combine(&self, trip: &Trip, outputs: &ComponentOutputs) -> Combined {
        let (raw, rule) = match self.route(trip) {
            Some(rule) => {
                let raw = match &rule.decision {
                    Decision::Select { source } => outputs.get(*source),
                    Decision::Blend { weights } => outputs.blend(weights),
                };
                (raw, rule.name.clone())
            }
            None => (outputs.blend(&self.config.default), DEFAULT_RULE.to_string()),
        };
        Combined {
            value: if raw.is_finite() { round_cents(raw) } else { 0.0 },
            rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    const OUTPUTS: ComponentOutputs = ComponentOutputs {
        polynomial: 100.0,
        knn: 200.0,
        lookup: 400.0,
    };

    #[test]
    fn test_single_day_routes_by_mileage() {
        let combiner = EnsembleCombiner::default();
        let extreme = combiner.combine(&trip(1, 1082.0, 1809.49), &OUTPUTS);
        let modest = combiner.combine(&trip(1, 50.0, 20.0), &OUTPUTS);
        assert_eq!(extreme.rule, "single_day_extreme_mileage");
        assert_eq!(modest.rule, "single_day");
        assert_ne!(extreme.rule, modest.rule);
        assert_eq!(extreme.value, 170.0);
        assert_eq!(modest.value, 300.0);
    }

    #[test]
    fn test_select_uses_one_source() {
        let combiner = EnsembleCombiner::default();
        let out = combiner.combine(&trip(8, 795.0, 1645.99), &OUTPUTS);
        assert_eq!(out.rule, "long_trip_overspend");
        assert_eq!(out.value, 400.0);
    }

    #[test]
    fn test_first_match_wins() {
        // 1 day with huge receipts matches both single_day and extreme_receipts
        let combiner = EnsembleCombiner::default();
        let out = combiner.combine(&trip(1, 10.0, 2500.0), &OUTPUTS);
        assert_eq!(out.rule, "single_day");
    }

    #[test]
    fn test_default_blend() {
        let combiner = EnsembleCombiner::default();
        let out = combiner.combine(&trip(3, 100.0, 200.0), &OUTPUTS);
        assert_eq!(out.rule, DEFAULT_RULE);
        // 0.3*100 + 0.5*200 + 0.2*400
        assert_eq!(out.value, 210.0);
    }

    #[test]
    fn test_blend_normalizes_weights() {
        let weights = BlendWeights::new(2.0, 2.0, 0.0);
        assert_eq!(OUTPUTS.blend(&weights), 150.0);
    }

    #[test]
    fn test_builtin_rules_use_at_most_two_sources() {
        for rule in &EnsembleConfig::default().rules {
            if let Decision::Blend { weights } = rule.decision {
                let used = [weights.polynomial, weights.knn, weights.lookup]
                    .iter()
                    .filter(|w| **w > 0.0)
                    .count();
                assert!(used <= 2, "{} blends {used} sources", rule.name);
            }
        }
    }

    #[test]
    fn test_three_way_blend_is_accepted() {
        let mut cfg = EnsembleConfig::default();
        cfg.rules.insert(
            0,
            EnsembleRule::blend(
                "all_three",
                Conditions::any().with_days(Interval::exactly(3)),
                BlendWeights::new(1.0, 1.0, 2.0),
            ),
        );
        let combiner = EnsembleCombiner::new(cfg).expect("three-way blend is valid");
        let out = combiner.combine(&trip(3, 100.0, 200.0), &OUTPUTS);
        assert_eq!(out.rule, "all_three");
        // (100 + 200 + 2 * 400) / 4
        assert_eq!(out.value, 275.0);
    }

    #[test]
    fn test_validate() {
        assert!(EnsembleConfig::default().validate().is_ok());
        let mut cfg = EnsembleConfig::default();
        cfg.default = BlendWeights::new(0.0, 0.0, 0.0);
        assert!(EnsembleCombiner::new(cfg).is_err());
        let mut cfg = EnsembleConfig::default();
        cfg.rules[0].decision = Decision::Blend {
            weights: BlendWeights::new(-1.0, 2.0, 0.0),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rule_json() {
        let rule: EnsembleRule = serde_json::from_str(
            r#"{"name":"x","when":{"days":{"min":2.0}},"decision":{"kind":"select","source":"knn"}}"#,
        )
        .expect("deserialize");
        assert_eq!(
            rule.decision,
            Decision::Select {
                source: Source::Knn
            }
        );
        assert!(rule.when.matches(&trip(3, 0.0, 0.0)));
    }
}
