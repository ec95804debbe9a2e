//! Categorical lookup table with in-bucket interpolation.
//!
//! Trips are bucketed by trip length, mileage and receipts
//! ([`BandScheme`]). Each covered bucket keeps `count/avg/min/max/std_dev`
//! of its targets. A prediction for a covered bucket interpolates between
//! the bucket minimum and maximum:
//!
//! ```text
//! position = first matching PositionRule, else (avg - min) / (max - min)
//! value    = min + (max - min) * clamp(position, 0, 1)
//! ```
//!
//! The value is rounded to the cent and kept within the whole-cent amounts
//! inside `[min, max]` ([`BucketStats::value_at`]).
//!
//! Uncovered buckets use a fallback estimate built from the nearest covered
//! day band's per-day rate, the nearest covered receipt band's factor, a
//! mileage multiplier and the matching [`Adjustment`]s. The fallback never
//! fails and is always finite and non-negative.

mod bands;

pub use bands::{BandScheme, Bands, CategoryKey};

use crate::data::{TrainingSet, Trip};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::{ReimburseError, Result};
use crate::primitives::{ceil_cents, floor_cents, round_cents};
use crate::rules::{Conditions, Interval};
use crate::traits::Predictor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate of the targets in one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    /// Number of examples.
    pub count: usize,
    /// Mean target, always within `[min, max]`.
    pub avg: f64,
    /// Smallest target.
    pub min: f64,
    /// Largest target.
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl BucketStats {
    fn from_targets(targets: &[f64]) -> Self {
        let n = targets.len() as f64;
        let min = targets.iter().copied().fold(f64::INFINITY, f64::min);
        let max = targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = targets.iter().sum::<f64>() / n;
        let var = targets.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
        Self {
            count: targets.len(),
            // summation rounding can push the mean a hair outside the range
            avg: mean.clamp(min, max),
            min,
            max,
            std_dev: var.sqrt(),
        }
    }

    /// Centre of mass inside the range; 0.5 for a degenerate range.
    #[must_use]
    pub fn default_position(&self) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            (self.avg - self.min) / span
        } else {
            0.5
        }
    }

    /// Whole-cent value at `position` (clamped to `[0, 1]`) within the range.
    ///
    /// The result stays inside `[min, max]` unless no whole-cent amount
    /// exists there, in which case it is `min` rounded to the cent.
    #[must_use]
    pub fn value_at(&self, position: f64) -> f64 {
        let raw = self.min + (self.max - self.min) * position.clamp(0.0, 1.0);
        let lo = ceil_cents(self.min);
        let hi = floor_cents(self.max);
        if lo <= hi {
            round_cents(raw).clamp(lo, hi)
        } else {
            round_cents(self.min)
        }
    }

    fn is_consistent(&self) -> bool {
        self.count > 0
            && [self.avg, self.min, self.max, self.std_dev]
                .iter()
                .all(|v| v.is_finite())
            && self.min <= self.avg
            && self.avg <= self.max
    }
}

/// One covered category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookupBucket {
    /// Category key.
    pub key: CategoryKey,
    /// Target statistics.
    pub stats: BucketStats,
}

/// Fixed in-bucket position for trips matching `when`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRule {
    /// Rule name, reported in estimates.
    pub name: String,
    /// Regime.
    pub when: Conditions,
    /// Position in `[0, 1]` between bucket min and max.
    pub position: f64,
}

impl PositionRule {
    fn new(name: &str, when: Conditions, position: f64) -> Self {
        Self {
            name: name.to_string(),
            when,
            position,
        }
    }
}

/// Multiplier applied by the fallback estimator to matching trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Adjustment name.
    pub name: String,
    /// Regime.
    pub when: Conditions,
    /// Multiplier, `> 0`.
    pub factor: f64,
}

impl Adjustment {
    fn new(name: &str, when: Conditions, factor: f64) -> Self {
        Self {
            name: name.to_string(),
            when,
            factor,
        }
    }
}

/// Fallback estimator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// One multiplier per mileage band.
    pub mileage_multipliers: Vec<f64>,
    /// Every matching adjustment is applied.
    pub adjustments: Vec<Adjustment>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            mileage_multipliers: vec![0.9, 1.0, 1.05, 1.1, 1.15],
            adjustments: vec![
                Adjustment::new(
                    "five_day_bonus",
                    Conditions::any().with_days(Interval::exactly(5)),
                    1.05,
                ),
                Adjustment::new(
                    "efficiency_sweet_spot",
                    Conditions::any().with_miles_per_day(Interval::between(180.0, 220.0)),
                    1.08,
                ),
                Adjustment::new(
                    "high_daily_spending",
                    Conditions::any().with_receipts_per_day(Interval::at_least(300.0)),
                    0.85,
                ),
                Adjustment::new(
                    "long_trip_overspend",
                    Conditions::any()
                        .with_days(Interval::at_least(8.0))
                        .with_receipts_per_day(Interval::at_least(150.0)),
                    0.9,
                ),
                Adjustment::new(
                    "tiny_receipts",
                    Conditions::any()
                        .with_days(Interval::at_least(2.0))
                        .with_receipts(Interval::below(30.0)),
                    0.95,
                ),
            ],
        }
    }
}

/// Lookup table settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Category bands.
    pub bands: BandScheme,
    /// Ordered position rules; the first match wins.
    pub position_rules: Vec<PositionRule>,
    /// Uncovered-category estimator.
    pub fallback: FallbackConfig,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            bands: BandScheme::default(),
            position_rules: vec![
                PositionRule::new(
                    "long_trip_overspend",
                    Conditions::any()
                        .with_days(Interval::at_least(7.0))
                        .with_receipts_per_day(Interval::at_least(150.0))
                        .with_miles_per_day(Interval::below(150.0)),
                    0.0,
                ),
                PositionRule::new(
                    "efficiency_sweet_spot",
                    Conditions::any().with_miles_per_day(Interval::between(180.0, 220.0)),
                    0.9,
                ),
                PositionRule::new(
                    "five_day_efficient",
                    Conditions::any()
                        .with_days(Interval::exactly(5))
                        .with_miles_per_day(Interval::at_least(100.0)),
                    0.85,
                ),
                PositionRule::new(
                    "high_daily_spending",
                    Conditions::any().with_receipts_per_day(Interval::at_least(300.0)),
                    0.15,
                ),
                PositionRule::new(
                    "low_efficiency",
                    Conditions::any()
                        .with_days(Interval::at_least(3.0))
                        .with_miles_per_day(Interval::below(25.0)),
                    0.2,
                ),
                PositionRule::new(
                    "receipts_optimal",
                    Conditions::any().with_receipts(Interval::between(600.0, 800.0)),
                    0.7,
                ),
            ],
            fallback: FallbackConfig::default(),
        }
    }
}

impl LookupConfig {
    /// Checks bands, rule positions and multipliers.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.bands.validate()?;
        for (idx, rule) in self.position_rules.iter().enumerate() {
            if !(0.0..=1.0).contains(&rule.position) {
                return Err(ReimburseError::hyperparameter(
                    &format!("lookup.position_rules[{idx}].position"),
                    rule.position,
                    "in [0, 1]",
                ));
            }
            if !rule.when.is_well_formed() {
                return Err(ReimburseError::hyperparameter(
                    &format!("lookup.position_rules[{idx}].when"),
                    &rule.name,
                    "intervals with min < max",
                ));
            }
        }
        let multipliers = &self.fallback.mileage_multipliers;
        if multipliers.len() != self.bands.miles.len() {
            return Err(ReimburseError::hyperparameter(
                "lookup.fallback.mileage_multipliers",
                multipliers.len(),
                &format!("one per mileage band ({})", self.bands.miles.len()),
            ));
        }
        if let Some(bad) = multipliers.iter().find(|m| !(m.is_finite() && **m > 0.0)) {
            return Err(ReimburseError::hyperparameter(
                "lookup.fallback.mileage_multipliers",
                bad,
                "finite and > 0",
            ));
        }
        for (idx, adj) in self.fallback.adjustments.iter().enumerate() {
            if !(adj.factor.is_finite() && adj.factor > 0.0) || !adj.when.is_well_formed() {
                return Err(ReimburseError::hyperparameter(
                    &format!("lookup.fallback.adjustments[{idx}]"),
                    adj.factor,
                    "finite factor > 0 and well-formed conditions",
                ));
            }
        }
        Ok(())
    }
}

/// A lookup prediction with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupEstimate {
    /// Estimated amount, rounded to cents.
    pub value: f64,
    /// Category of the trip.
    pub key: CategoryKey,
    /// True when the category had no training examples.
    pub fallback: bool,
    /// Position rule that fired, if any.
    pub rule: Option<String>,
}

/// Per-band aggregates used by the fallback estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BandAggregates {
    /// Mean of `expected / days` per trip-length band.
    day_rates: Vec<Option<f64>>,
    /// Mean target per receipt band.
    receipt_means: Vec<Option<f64>>,
    /// Mean target over all examples.
    global_mean: f64,
}

/// Frozen lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableFields", into = "TableFields")]
pub struct LookupTable {
    config: LookupConfig,
    buckets: BTreeMap<CategoryKey, BucketStats>,
    aggregates: BandAggregates,
}

#[derive(Serialize, Deserialize)]
struct TableFields {
    config: LookupConfig,
    buckets: Vec<LookupBucket>,
    aggregates: BandAggregates,
}

impl From<LookupTable> for TableFields {
    fn from(table: LookupTable) -> Self {
        Self {
            buckets: table
                .buckets
                .into_iter()
                .map(|(key, stats)| LookupBucket { key, stats })
                .collect(),
            config: table.config,
            aggregates: table.aggregates,
        }
    }
}

impl TryFrom<TableFields> for LookupTable {
    type Error = ReimburseError;

    fn try_from(fields: TableFields) -> Result<Self> {
        fields.config.validate()?;
        let bands = &fields.config.bands;
        for bucket in &fields.buckets {
            let key = bucket.key;
            if key.days >= bands.days.len()
                || key.miles >= bands.miles.len()
                || key.receipts >= bands.receipts.len()
            {
                return Err(ReimburseError::Serialization(format!(
                    "bucket {key:?} outside the band scheme"
                )));
            }
            if !bucket.stats.is_consistent() {
                return Err(ReimburseError::Serialization(format!(
                    "bucket {} violates min <= avg <= max",
                    bands.describe(&key)
                )));
            }
        }
        let agg = &fields.aggregates;
        if agg.day_rates.len() != bands.days.len()
            || agg.receipt_means.len() != bands.receipts.len()
            || !agg.global_mean.is_finite()
        {
            return Err(ReimburseError::Serialization(
                "band aggregates do not match the band scheme".to_string(),
            ));
        }
        Ok(Self {
            buckets: fields.buckets.into_iter().map(|b| (b.key, b.stats)).collect(),
            config: fields.config,
            aggregates: fields.aggregates,
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Value at the covered index closest to `idx`; ties go to the lower band.
fn nearest_covered(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i.abs_diff(idx), v)))
        .min_by_key(|&(dist, _)| dist)
        .map(|(_, v)| v)
}

impl LookupTable {
    /// Aggregates `data` into per-category statistics.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`LookupConfig::validate`].
    pub fn train(data: &TrainingSet, config: LookupConfig, sink: &dyn DiagnosticSink) -> Result<Self> {
        config.validate()?;
        let bands = &config.bands;

        let mut groups: BTreeMap<CategoryKey, Vec<f64>> = BTreeMap::new();
        let mut day_groups = vec![Vec::new(); bands.days.len()];
        let mut receipt_groups = vec![Vec::new(); bands.receipts.len()];

        for ex in data {
            let trip = ex.trip();
            let key = bands.categorize(trip);
            groups.entry(key).or_default().push(ex.expected());
            day_groups[key.days].push(ex.expected() / trip.days_f64());
            receipt_groups[key.receipts].push(ex.expected());
        }

        let buckets: BTreeMap<CategoryKey, BucketStats> = groups
            .into_iter()
            .map(|(key, targets)| (key, BucketStats::from_targets(&targets)))
            .collect();

        sink.emit(&DiagnosticEvent::LookupBuilt {
            covered: buckets.len(),
            total: bands.total(),
        });

        let aggregates = BandAggregates {
            day_rates: day_groups.iter().map(|g| mean(g)).collect(),
            receipt_means: receipt_groups.iter().map(|g| mean(g)).collect(),
            global_mean: mean(&data.targets()).unwrap_or(0.0),
        };

        Ok(Self {
            config,
            buckets,
            aggregates,
        })
    }

    /// Settings the table was built with.
    #[must_use]
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Category of `trip`.
    #[must_use]
    pub fn categorize(&self, trip: &Trip) -> CategoryKey {
        self.config.bands.categorize(trip)
    }

    /// Statistics of a covered category.
    #[must_use]
    pub fn bucket(&self, key: &CategoryKey) -> Option<&BucketStats> {
        self.buckets.get(key)
    }

    /// Covered categories in key order.
    pub fn buckets(&self) -> impl Iterator<Item = LookupBucket> + '_ {
        self.buckets
            .iter()
            .map(|(&key, &stats)| LookupBucket { key, stats })
    }

    /// Number of covered categories.
    #[must_use]
    pub fn covered(&self) -> usize {
        self.buckets.len()
    }

    /// Mean target over the training set.
    #[must_use]
    pub fn global_mean(&self) -> f64 {
        self.aggregates.global_mean
    }

    /// Estimate with provenance.
    #[must_use]
    pub fn estimate(&self, trip: &Trip) -> LookupEstimate {
        let key = self.categorize(trip);
        match self.buckets.get(&key) {
            Some(stats) => {
                let rule = self
                    .config
                    .position_rules
                    .iter()
                    .find(|r| r.when.matches(trip));
                let position = rule
                    .map_or_else(|| stats.default_position(), |r| r.position)
                    .clamp(0.0, 1.0);
                let value = stats.value_at(position);
                LookupEstimate {
                    value,
                    key,
                    fallback: false,
                    rule: rule.map(|r| r.name.clone()),
                }
            }
            None => LookupEstimate {
                value: self.fallback(trip, &key),
                key,
                fallback: true,
                rule: None,
            },
        }
    }

    fn fallback(&self, trip: &Trip, key: &CategoryKey) -> f64 {
        let agg = &self.aggregates;
        let global = agg.global_mean;

        let per_day = nearest_covered(&agg.day_rates, key.days).unwrap_or(global);
        let receipt_factor = match nearest_covered(&agg.receipt_means, key.receipts) {
            Some(m) if global.abs() > f64::EPSILON => m / global,
            _ => 1.0,
        };
        let mileage = self
            .config
            .fallback
            .mileage_multipliers
            .get(key.miles)
            .copied()
            .unwrap_or(1.0);
        let rules: f64 = self
            .config
            .fallback
            .adjustments
            .iter()
            .filter(|a| a.when.matches(trip))
            .map(|a| a.factor)
            .product();

        let raw = per_day * trip.days_f64() * receipt_factor * mileage * rules;
        let value = if raw.is_finite() { raw } else { global };
        round_cents(value.max(0.0))
    }
}

impl Predictor for LookupTable {
    fn predict(&self, trip: &Trip) -> f64 {
        self.estimate(trip).value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingExample;
    use crate::diagnostics::{RecordingSink, SilentSink, Verbosity};

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    fn set(rows: &[(i64, f64, f64, f64)]) -> TrainingSet {
        TrainingSet::new(
            rows.iter()
                .map(|&(d, m, r, y)| TrainingExample::new(trip(d, m, r), y).expect("finite"))
                .collect(),
        )
        .expect("non-empty")
    }

    fn table(rows: &[(i64, f64, f64, f64)]) -> LookupTable {
        LookupTable::train(&set(rows), LookupConfig::default(), &SilentSink).expect("train")
    }

    #[test]
    fn test_bucket_stats() {
        let stats = BucketStats::from_targets(&[1.0, 2.0, 3.0, 6.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.avg, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 6.0);
        assert!((stats.std_dev - 3.5_f64.sqrt()).abs() < 1e-12);
        assert!((stats.default_position() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_long_overspend_lands_on_minimum() {
        let t = table(&[
            (8, 700.0, 1600.0, 1400.0),
            (9, 900.0, 1700.0, 1550.0),
            (10, 650.0, 2000.0, 1700.0),
        ]);
        let est = t.estimate(&trip(8, 795.0, 1645.99));
        assert!(!est.fallback);
        assert_eq!(est.rule.as_deref(), Some("long_trip_overspend"));
        assert_eq!(est.value, 1400.0);
    }

    #[test]
    fn test_fractional_cent_minimum_rounds_inward() {
        let t = table(&[(8, 700.0, 1600.0, 1400.004), (9, 900.0, 1700.0, 1550.0)]);
        let est = t.estimate(&trip(8, 795.0, 1645.99));
        assert_eq!(est.rule.as_deref(), Some("long_trip_overspend"));
        assert_eq!(est.value, 1400.01);
        assert_eq!(est.value, round_cents(est.value));
    }

    #[test]
    fn test_value_at_whole_cent_bounds() {
        let stats = BucketStats::from_targets(&[10.004, 20.996]);
        assert_eq!(stats.value_at(0.0), 10.01);
        assert_eq!(stats.value_at(1.0), 20.99);
        assert_eq!(stats.value_at(0.5), 15.5);
        // no whole cent inside [10.001, 10.009]
        let narrow = BucketStats::from_targets(&[10.001, 10.009]);
        assert_eq!(narrow.value_at(1.0), 10.0);
        let single = BucketStats::from_targets(&[644.69]);
        assert_eq!(single.value_at(0.0), 644.69);
    }

    #[test]
    fn test_default_position_is_centre_of_mass() {
        // 2-3 days, 100-299 miles, 100-499 receipts; no position rule matches
        let t = table(&[(2, 150.0, 200.0, 300.0), (3, 160.0, 250.0, 400.0), (2, 170.0, 300.0, 800.0)]);
        let est = t.estimate(&trip(2, 155.0, 210.0));
        assert_eq!(est.rule, None);
        assert_eq!(est.value, 500.0);
    }

    #[test]
    fn test_covered_results_within_range() {
        let t = table(&[
            (5, 1000.0, 700.0, 1800.0),
            (5, 1050.0, 750.0, 1500.0),
            (1, 50.0, 20.0, 110.0),
        ]);
        for q in [trip(5, 1000.0, 700.0), trip(5, 1020.0, 720.0), trip(1, 60.0, 25.0)] {
            let est = t.estimate(&q);
            let stats = t.bucket(&est.key).expect("covered");
            assert!(est.value >= stats.min && est.value <= stats.max);
        }
    }

    #[test]
    fn test_single_example_bucket_returns_its_target() {
        let t = table(&[(1, 50.0, 20.0, 110.37)]);
        assert_eq!(t.predict(&trip(1, 60.0, 30.0)), 110.37);
    }

    #[test]
    fn test_fallback_uncovered_category() {
        let t = table(&[(1, 50.0, 20.0, 100.0), (3, 200.0, 300.0, 450.0)]);
        let est = t.estimate(&trip(20, 5000.0, 9000.0));
        assert!(est.fallback);
        assert!(est.value.is_finite());
        assert!(est.value >= 0.0);

        // 2 days: nearest day band "2-3" rate 150/day, receipt band 0-99
        // nearest covered mean 100 / global 275, miles band 0 (0.9), tiny receipts 0.95
        let est = t.estimate(&trip(2, 10.0, 10.0));
        assert!(est.fallback);
        let expected = round_cents(150.0 * 2.0 * (100.0 / 275.0) * 0.9 * 0.95);
        assert_eq!(est.value, expected);
    }

    #[test]
    fn test_fallback_is_non_negative() {
        let t = table(&[(1, 50.0, 20.0, -100.0), (2, 50.0, 20.0, -50.0)]);
        assert_eq!(t.predict(&trip(14, 2000.0, 2000.0)), 0.0);
    }

    #[test]
    fn test_nearest_covered_prefers_lower_on_tie() {
        let values = [Some(1.0), None, Some(3.0)];
        assert_eq!(nearest_covered(&values, 1), Some(1.0));
        assert_eq!(nearest_covered(&values, 2), Some(3.0));
        assert_eq!(nearest_covered(&[None, None], 0), None);
    }

    #[test]
    fn test_reports_coverage() {
        let sink = RecordingSink::new(Verbosity::Normal);
        let data = set(&[(1, 50.0, 20.0, 100.0), (3, 200.0, 300.0, 450.0)]);
        let t = LookupTable::train(&data, LookupConfig::default(), &sink).expect("train");
        assert_eq!(t.covered(), 2);
        assert_eq!(
            sink.events(),
            vec![DiagnosticEvent::LookupBuilt {
                covered: 2,
                total: 125
            }]
        );
    }

    #[test]
    fn test_config_validation() {
        let mut cfg = LookupConfig::default();
        cfg.fallback.mileage_multipliers.pop();
        assert!(cfg.validate().is_err());

        let mut cfg = LookupConfig::default();
        cfg.position_rules[0].position = 1.5;
        assert!(cfg.validate().is_err());

        assert!(LookupConfig::default().validate().is_ok());
    }

    #[test]
    fn test_serde_roundtrip_and_invariant_check() {
        let t = table(&[(1, 50.0, 20.0, 100.0), (3, 200.0, 300.0, 450.0)]);
        let json = serde_json::to_string(&t).expect("serialize");
        let back: LookupTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, t);

        let mut value: serde_json::Value = serde_json::from_str(&json).expect("json");
        value["buckets"][0]["stats"]["avg"] = serde_json::json!(1e9);
        assert!(serde_json::from_value::<LookupTable>(value).is_err());
    }
}
