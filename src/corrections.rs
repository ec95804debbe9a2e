//! Deterministic post-processing stages.
//!
//! A [`CorrectedPredictor`] wraps any [`Predictor`] and pipes its output
//! through an ordered list of [`Correction`]s. Corrections never add noise:
//! the same trip always gets the same adjustment.
//!
//! ```
//! use reimburse::corrections::{CorrectedPredictor, Correction};
//! use reimburse::data::Trip;
//! use reimburse::traits::Predictor;
//!
//! struct Negative;
//! impl Predictor for Negative {
//!     fn predict(&self, _trip: &Trip) -> f64 {
//!         -12.5
//!     }
//! }
//!
//! let corrected = CorrectedPredictor::new(Negative, vec![Correction::non_negative()]);
//! assert_eq!(corrected.predict(&Trip::new(1, 0.0, 0.0).expect("valid")), 0.0);
//! ```

use crate::data::Trip;
use crate::error::{ReimburseError, Result};
use crate::primitives::round_cents;
use crate::rules::Conditions;
use crate::traits::Predictor;
use serde::{Deserialize, Serialize};

/// One post-processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// Multiply by `factor` for trips matching `when`.
    Scale {
        /// Regime.
        when: Conditions,
        /// Multiplier, `> 0`.
        factor: f64,
    },
    /// Bound the output.
    Clamp {
        /// Lower bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Upper bound.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Multiply by `factor` when the receipt total ends in one of `cents`.
    ReceiptCents {
        /// Cent endings, e.g. `[49, 99]`.
        cents: Vec<u32>,
        /// Multiplier, `> 0`.
        factor: f64,
    },
}

impl Correction {
    /// `Clamp { min: 0 }`.
    #[must_use]
    pub fn non_negative() -> Self {
        Self::Clamp {
            min: Some(0.0),
            max: None,
        }
    }

    /// Applies this stage to `value`.
    #[must_use]
    pub fn apply(&self, trip: &Trip, value: f64) -> f64 {
        match self {
            Self::Scale { when, factor } => {
                if when.matches(trip) {
                    value * factor
                } else {
                    value
                }
            }
            Self::Clamp { min, max } => {
                let v = min.map_or(value, |lo| value.max(lo));
                max.map_or(v, |hi| v.min(hi))
            }
            Self::ReceiptCents { cents, factor } => {
                if cents.contains(&receipt_cents(trip)) {
                    value * factor
                } else {
                    value
                }
            }
        }
    }

    fn validate(&self, idx: usize) -> Result<()> {
        let param = format!("corrections[{idx}]");
        match self {
            Self::Scale { when, factor } => {
                if !(factor.is_finite() && *factor > 0.0) || !when.is_well_formed() {
                    return Err(ReimburseError::hyperparameter(
                        &param,
                        factor,
                        "finite factor > 0 and well-formed conditions",
                    ));
                }
            }
            Self::Clamp { min, max } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(ReimburseError::hyperparameter(
                            &param,
                            format!("[{lo}, {hi}]"),
                            "min <= max",
                        ));
                    }
                }
                if min.iter().chain(max.iter()).any(|b| !b.is_finite()) {
                    return Err(ReimburseError::hyperparameter(&param, "bound", "finite"));
                }
            }
            Self::ReceiptCents { cents, factor } => {
                if !(factor.is_finite() && *factor > 0.0) || cents.iter().any(|&c| c > 99) {
                    return Err(ReimburseError::hyperparameter(
                        &param,
                        factor,
                        "finite factor > 0 and cents in 0..=99",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Cent part of the receipt total, e.g. 49 for 12.49.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn receipt_cents(trip: &Trip) -> u32 {
    ((trip.receipts() * 100.0).round() as u64 % 100) as u32
}

/// Checks every stage.
///
/// # Errors
///
/// Returns [`ReimburseError::InvalidHyperparameter`] for the first bad stage.
pub fn validate_all(corrections: &[Correction]) -> Result<()> {
    corrections
        .iter()
        .enumerate()
        .try_for_each(|(idx, c)| c.validate(idx))
}

/// The default stage list: clamp to non-negative.
#[must_use]
pub fn default_corrections() -> Vec<Correction> {
    vec![Correction::non_negative()]
}

/// A base predictor followed by ordered correction stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedPredictor<P> {
    base: P,
    corrections: Vec<Correction>,
}

impl<P: Predictor> CorrectedPredictor<P> {
    /// Wraps `base`.
    #[must_use]
    pub fn new(base: P, corrections: Vec<Correction>) -> Self {
        Self { base, corrections }
    }

    /// The wrapped predictor.
    #[must_use]
    pub fn base(&self) -> &P {
        &self.base
    }

    /// Correction stages in application order.
    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    /// Runs the stages over an already computed base output.
    #[must_use]
    pub fn correct(&self, trip: &Trip, base_value: f64) -> f64 {
        let value = self
            .corrections
            .iter()
            .fold(base_value, |v, c| c.apply(trip, v));
        if value.is_finite() {
            round_cents(value)
        } else {
            round_cents(base_value)
        }
    }
}

impl<P: Predictor> Predictor for CorrectedPredictor<P> {
    fn predict(&self, trip: &Trip) -> f64 {
        self.correct(trip, self.base.predict(trip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Interval;

    struct Fixed(f64);

    impl Predictor for Fixed {
        fn predict(&self, _trip: &Trip) -> f64 {
            self.0
        }
    }

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    #[test]
    fn test_stages_apply_in_order() {
        let corrections = vec![
            Correction::Scale {
                when: Conditions::any().with_days(Interval::exactly(5)),
                factor: 2.0,
            },
            Correction::Clamp {
                min: None,
                max: Some(150.0),
            },
        ];
        let p = CorrectedPredictor::new(Fixed(100.0), corrections);
        assert_eq!(p.predict(&trip(5, 0.0, 0.0)), 150.0);
        assert_eq!(p.predict(&trip(4, 0.0, 0.0)), 100.0);
    }

    #[test]
    fn test_receipt_cents() {
        let c = Correction::ReceiptCents {
            cents: vec![49, 99],
            factor: 0.5,
        };
        assert_eq!(c.apply(&trip(1, 0.0, 12.49), 100.0), 50.0);
        assert_eq!(c.apply(&trip(1, 0.0, 12.99), 100.0), 50.0);
        assert_eq!(c.apply(&trip(1, 0.0, 12.50), 100.0), 100.0);
        assert_eq!(receipt_cents(&trip(1, 0.0, 1645.99)), 99);
    }

    #[test]
    fn test_deterministic() {
        let p = CorrectedPredictor::new(Fixed(-3.0), default_corrections());
        let t = trip(2, 10.0, 10.0);
        assert_eq!(p.predict(&t), p.predict(&t));
        assert_eq!(p.predict(&t), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(validate_all(&default_corrections()).is_ok());
        assert!(validate_all(&[Correction::Clamp {
            min: Some(5.0),
            max: Some(1.0)
        }])
        .is_err());
        assert!(validate_all(&[Correction::ReceiptCents {
            cents: vec![150],
            factor: 1.0
        }])
        .is_err());
        assert!(validate_all(&[Correction::Scale {
            when: Conditions::any(),
            factor: 0.0
        }])
        .is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&Correction::non_negative()).expect("serialize");
        assert_eq!(json, r#"{"kind":"clamp","min":0.0}"#);
    }
}
