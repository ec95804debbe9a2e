//! Declarative condition vocabulary shared by every rule table.
//!
//! Feature indicators, lookup position rules, fallback adjustments, ensemble
//! routing and output corrections all describe "which trips does this apply
//! to" with the same [`Conditions`] value, so thresholds live in data rather
//! than in branches scattered across predictors.

use crate::data::Trip;
use serde::{Deserialize, Serialize};

/// A raw or derived trip quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Trip length in days.
    Days,
    /// Miles traveled.
    Miles,
    /// Total receipts.
    Receipts,
    /// Efficiency (miles / days).
    MilesPerDay,
    /// Daily spending (receipts / days).
    ReceiptsPerDay,
    /// Receipts / max(miles, 1).
    ReceiptsPerMile,
}

impl Variable {
    /// Reads this quantity off a trip.
    #[must_use]
    pub fn value(self, trip: &Trip) -> f64 {
        match self {
            Self::Days => trip.days_f64(),
            Self::Miles => trip.miles(),
            Self::Receipts => trip.receipts(),
            Self::MilesPerDay => trip.miles_per_day(),
            Self::ReceiptsPerDay => trip.receipts_per_day(),
            Self::ReceiptsPerMile => trip.receipts_per_mile(),
        }
    }

    /// Short name used in feature labels.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Miles => "miles",
            Self::Receipts => "receipts",
            Self::MilesPerDay => "miles_per_day",
            Self::ReceiptsPerDay => "receipts_per_day",
            Self::ReceiptsPerMile => "receipts_per_mile",
        }
    }
}

/// Half-open interval `[min, max)`; a missing bound is unbounded.
///
/// ```
/// use reimburse::rules::Interval;
///
/// let band = Interval::between(180.0, 220.0);
/// assert!(band.contains(180.0));
/// assert!(!band.contains(220.0));
/// assert!(Interval::at_least(14.0).contains(1e9));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Exclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Interval {
    /// `[min, max)`.
    #[must_use]
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// `[min, ∞)`.
    #[must_use]
    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// `(-∞, max)`.
    #[must_use]
    pub const fn below(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// The single whole number `value` (`[value, value + 1)`).
    #[must_use]
    pub fn exactly(value: u32) -> Self {
        let v = f64::from(value);
        Self::between(v, v + 1.0)
    }

    /// Whether `x` falls inside the interval.
    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        self.min.map_or(true, |lo| x >= lo) && self.max.map_or(true, |hi| x < hi)
    }

    /// True when `min < max` (or either bound is open).
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => lo < hi,
            _ => true,
        }
    }
}

/// Conjunction of interval tests on trip quantities. Unset fields match anything.
///
/// ```
/// use reimburse::data::Trip;
/// use reimburse::rules::{Conditions, Interval};
///
/// let long_overspend = Conditions::any()
///     .with_days(Interval::at_least(7.0))
///     .with_receipts_per_day(Interval::at_least(150.0));
/// let trip = Trip::new(8, 795.0, 1645.99).expect("valid");
/// assert!(long_overspend.matches(&trip));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    /// Trip length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Interval>,
    /// Miles traveled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miles: Option<Interval>,
    /// Total receipts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Interval>,
    /// Efficiency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miles_per_day: Option<Interval>,
    /// Daily spending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts_per_day: Option<Interval>,
}

impl Conditions {
    /// Matches every trip.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restricts trip length.
    #[must_use]
    pub fn with_days(mut self, interval: Interval) -> Self {
        self.days = Some(interval);
        self
    }

    /// Restricts miles traveled.
    #[must_use]
    pub fn with_miles(mut self, interval: Interval) -> Self {
        self.miles = Some(interval);
        self
    }

    /// Restricts total receipts.
    #[must_use]
    pub fn with_receipts(mut self, interval: Interval) -> Self {
        self.receipts = Some(interval);
        self
    }

    /// Restricts efficiency.
    #[must_use]
    pub fn with_miles_per_day(mut self, interval: Interval) -> Self {
        self.miles_per_day = Some(interval);
        self
    }

    /// Restricts daily spending.
    #[must_use]
    pub fn with_receipts_per_day(mut self, interval: Interval) -> Self {
        self.receipts_per_day = Some(interval);
        self
    }

    fn clauses(&self) -> [(Variable, Option<Interval>); 5] {
        [
            (Variable::Days, self.days),
            (Variable::Miles, self.miles),
            (Variable::Receipts, self.receipts),
            (Variable::MilesPerDay, self.miles_per_day),
            (Variable::ReceiptsPerDay, self.receipts_per_day),
        ]
    }

    /// Whether every set clause holds for `trip`.
    #[must_use]
    pub fn matches(&self, trip: &Trip) -> bool {
        self.clauses()
            .iter()
            .all(|(var, interval)| interval.map_or(true, |iv| iv.contains(var.value(trip))))
    }

    /// True when every set interval is well formed.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.clauses()
            .iter()
            .all(|(_, interval)| interval.map_or(true, |iv| iv.is_well_formed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    #[test]
    fn test_interval_bounds() {
        let iv = Interval::between(2.0, 4.0);
        assert!(!iv.contains(1.999));
        assert!(iv.contains(2.0));
        assert!(iv.contains(3.999));
        assert!(!iv.contains(4.0));
        assert!(Interval::default().contains(-1e12));
        assert!(Interval::below(1.0).contains(0.5));
        assert!(!Interval::below(1.0).contains(1.0));
    }

    #[test]
    fn test_interval_exactly() {
        let one = Interval::exactly(1);
        assert!(one.contains(1.0));
        assert!(!one.contains(2.0));
        assert!(!one.contains(0.0));
    }

    #[test]
    fn test_interval_well_formed() {
        assert!(Interval::between(1.0, 2.0).is_well_formed());
        assert!(!Interval::between(2.0, 2.0).is_well_formed());
        assert!(Interval::at_least(5.0).is_well_formed());
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        assert!(Conditions::any().matches(&trip(1, 0.0, 0.0)));
        assert!(Conditions::any().matches(&trip(30, 5000.0, 9000.0)));
    }

    #[test]
    fn test_conditions_conjunction() {
        let single_day_far = Conditions::any()
            .with_days(Interval::exactly(1))
            .with_miles(Interval::at_least(600.0));
        assert!(single_day_far.matches(&trip(1, 1082.0, 1809.49)));
        assert!(!single_day_far.matches(&trip(1, 50.0, 20.0)));
        assert!(!single_day_far.matches(&trip(2, 1082.0, 20.0)));
    }

    #[test]
    fn test_derived_variables() {
        let t = trip(4, 800.0, 400.0);
        assert_eq!(Variable::MilesPerDay.value(&t), 200.0);
        assert_eq!(Variable::ReceiptsPerDay.value(&t), 100.0);
        assert_eq!(Variable::ReceiptsPerMile.value(&t), 0.5);
        assert_eq!(Variable::Days.label(), "days");
    }

    #[test]
    fn test_conditions_json_omits_unset() {
        let c = Conditions::any().with_days(Interval::at_least(7.0));
        let json = serde_json::to_string(&c).expect("serialize");
        assert_eq!(json, r#"{"days":{"min":7.0}}"#);
        let back: Conditions = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, c);
    }
}
