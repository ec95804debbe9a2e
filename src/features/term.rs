//! Individual feature terms.

use super::LOG_FLOOR;
use crate::data::Trip;
use crate::rules::{Conditions, Variable};
use serde::{Deserialize, Serialize};

fn default_scale() -> f64 {
    1.0
}

fn is_unit(scale: &f64) -> bool {
    (*scale - 1.0).abs() < f64::EPSILON
}

/// One factor `var^exponent` of a product term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    /// Quantity being raised.
    pub var: Variable,
    /// Exponent (1..=4).
    pub exponent: i32,
}

/// A single feature term. Every term is a pure function of the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// `var^exponent / scale`.
    Power {
        /// Quantity being raised.
        var: Variable,
        /// Exponent (1..=4).
        exponent: i32,
        /// Divisor bounding the magnitude of the term.
        #[serde(default = "default_scale", skip_serializing_if = "is_unit")]
        scale: f64,
    },
    /// `Π var_i^exponent_i / scale`.
    Product {
        /// Factors, at least two.
        factors: Vec<Factor>,
        /// Divisor bounding the magnitude of the term.
        #[serde(default = "default_scale", skip_serializing_if = "is_unit")]
        scale: f64,
    },
    /// `ln(max(var + 1, LOG_FLOOR))`.
    Log {
        /// Quantity being dampened.
        var: Variable,
    },
    /// `1.0` when the trip matches `when`, else `0.0`.
    Indicator {
        /// Regime name.
        name: String,
        /// Regime definition.
        when: Conditions,
    },
    /// `var` when the trip matches `when`, else `0.0`.
    Gated {
        /// Regime name.
        name: String,
        /// Regime definition.
        when: Conditions,
        /// Quantity passed through inside the regime.
        var: Variable,
    },
}

impl Feature {
    /// `var^exponent`.
    #[must_use]
    pub fn power(var: Variable, exponent: i32) -> Self {
        Self::scaled_power(var, exponent, 1.0)
    }

    /// `var^exponent / scale`.
    #[must_use]
    pub fn scaled_power(var: Variable, exponent: i32, scale: f64) -> Self {
        Self::Power {
            var,
            exponent,
            scale,
        }
    }

    /// Product of `(var, exponent)` factors.
    #[must_use]
    pub fn product(factors: &[(Variable, i32)]) -> Self {
        Self::Product {
            factors: factors
                .iter()
                .map(|&(var, exponent)| Factor { var, exponent })
                .collect(),
            scale: 1.0,
        }
    }

    /// `ln(var + 1)`.
    #[must_use]
    pub fn log(var: Variable) -> Self {
        Self::Log { var }
    }

    /// Binary regime indicator.
    #[must_use]
    pub fn indicator(name: &str, when: Conditions) -> Self {
        Self::Indicator {
            name: name.to_string(),
            when,
        }
    }

    /// Regime indicator multiplied by a continuous quantity.
    #[must_use]
    pub fn gated(name: &str, when: Conditions, var: Variable) -> Self {
        Self::Gated {
            name: name.to_string(),
            when,
            var,
        }
    }

    /// Evaluates the term. Non-finite intermediate results collapse to `0.0`.
    #[must_use]
    pub fn value(&self, trip: &Trip) -> f64 {
        let raw = match self {
            Self::Power {
                var,
                exponent,
                scale,
            } => var.value(trip).powi(*exponent) / scale,
            Self::Product { factors, scale } => {
                factors
                    .iter()
                    .map(|f| f.var.value(trip).powi(f.exponent))
                    .product::<f64>()
                    / scale
            }
            Self::Log { var } => (var.value(trip) + 1.0).max(LOG_FLOOR).ln(),
            Self::Indicator { when, .. } => {
                if when.matches(trip) {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Gated { when, var, .. } => {
                if when.matches(trip) {
                    var.value(trip)
                } else {
                    0.0
                }
            }
        };
        if raw.is_finite() {
            raw
        } else {
            0.0
        }
    }

    /// Display name, e.g. `miles^3/1000000`, `days^2*receipts`, `ln(days+1)`.
    #[must_use]
    pub fn name(&self) -> String {
        fn pow(var: Variable, exponent: i32) -> String {
            if exponent == 1 {
                var.label().to_string()
            } else {
                format!("{}^{exponent}", var.label())
            }
        }
        fn scaled(base: String, scale: f64) -> String {
            if is_unit(&scale) {
                base
            } else {
                format!("{base}/{scale}")
            }
        }

        match self {
            Self::Power {
                var,
                exponent,
                scale,
            } => scaled(pow(*var, *exponent), *scale),
            Self::Product { factors, scale } => scaled(
                factors
                    .iter()
                    .map(|f| pow(f.var, f.exponent))
                    .collect::<Vec<_>>()
                    .join("*"),
                *scale,
            ),
            Self::Log { var } => format!("ln({}+1)", var.label()),
            Self::Indicator { name, .. } => format!("[{name}]"),
            Self::Gated { name, var, .. } => format!("[{name}]*{}", var.label()),
        }
    }

    /// Returns the violated constraint, if any.
    pub(super) fn validate(&self) -> std::result::Result<(), &'static str> {
        let exponent_ok = |e: i32| (1..=4).contains(&e);
        let scale_ok = |s: f64| s.is_finite() && s > 0.0;

        match self {
            Self::Power {
                exponent, scale, ..
            } => {
                if !exponent_ok(*exponent) {
                    return Err("exponent in 1..=4");
                }
                if !scale_ok(*scale) {
                    return Err("scale finite and > 0");
                }
            }
            Self::Product { factors, scale } => {
                if factors.len() < 2 {
                    return Err("at least two factors");
                }
                if !factors.iter().all(|f| exponent_ok(f.exponent)) {
                    return Err("exponent in 1..=4");
                }
                if !scale_ok(*scale) {
                    return Err("scale finite and > 0");
                }
            }
            Self::Log { .. } => {}
            Self::Indicator { when, .. } | Self::Gated { when, .. } => {
                if !when.is_well_formed() {
                    return Err("intervals with min < max");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Interval;

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    #[test]
    fn test_power_and_scale() {
        let t = trip(2, 100.0, 10.0);
        assert_eq!(Feature::power(Variable::Days, 3).value(&t), 8.0);
        let cubic = Feature::scaled_power(Variable::Miles, 3, 1_000_000.0);
        assert!((cubic.value(&t) - 1.0).abs() < 1e-12);
        assert_eq!(cubic.name(), "miles^3/1000000");
    }

    #[test]
    fn test_product() {
        let t = trip(3, 10.0, 5.0);
        let f = Feature::product(&[(Variable::Days, 2), (Variable::Receipts, 1)]);
        assert_eq!(f.value(&t), 45.0);
        assert_eq!(f.name(), "days^2*receipts");
    }

    #[test]
    fn test_log_of_zero_is_zero() {
        let t = trip(1, 0.0, 0.0);
        assert_eq!(Feature::log(Variable::Miles).value(&t), 0.0);
        assert_eq!(Feature::log(Variable::Miles).name(), "ln(miles+1)");
    }

    #[test]
    fn test_indicator_and_gated() {
        let when = Conditions::any().with_days(Interval::exactly(1));
        let ind = Feature::indicator("single_day", when.clone());
        let gated = Feature::gated("single_day", when, Variable::Miles);
        assert_eq!(ind.value(&trip(1, 80.0, 1.0)), 1.0);
        assert_eq!(ind.value(&trip(2, 80.0, 1.0)), 0.0);
        assert_eq!(gated.value(&trip(1, 80.0, 1.0)), 80.0);
        assert_eq!(gated.value(&trip(2, 80.0, 1.0)), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(Feature::power(Variable::Days, 5).validate().is_err());
        assert!(Feature::scaled_power(Variable::Days, 1, 0.0).validate().is_err());
        assert!(Feature::product(&[(Variable::Days, 1)]).validate().is_err());
        let bad = Conditions::any().with_days(Interval::between(3.0, 1.0));
        assert!(Feature::indicator("x", bad).validate().is_err());
        assert!(Feature::log(Variable::Receipts).validate().is_ok());
    }

    #[test]
    fn test_json_tagging() {
        let json = serde_json::to_string(&Feature::power(Variable::Days, 2)).expect("serialize");
        assert_eq!(json, r#"{"kind":"power","var":"days","exponent":2}"#);
        let parsed: Feature =
            serde_json::from_str(r#"{"kind":"log","var":"miles_per_day"}"#).expect("deserialize");
        assert_eq!(parsed, Feature::log(Variable::MilesPerDay));
    }
}
