//! Similarity metrics between trips.
//!
//! Every metric returns a similarity in `[0, ∞)`, larger meaning closer.
//! Distance-based metrics map a distance `d` to `1 / (1 + d)`.

use crate::data::Trip;
use serde::{Deserialize, Serialize};

/// Per-input weights for [`SimilarityMetric::WeightedManhattan`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputWeights {
    /// Weight on trip length.
    pub days: f64,
    /// Weight on miles.
    pub miles: f64,
    /// Weight on receipts.
    pub receipts: f64,
}

impl Default for InputWeights {
    fn default() -> Self {
        Self {
            days: 0.5,
            miles: 0.3,
            receipts: 0.2,
        }
    }
}

/// Component weights for [`SimilarityMetric::DomainAware`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainWeights {
    /// Weight on the day-match score.
    pub days: f64,
    /// Weight on efficiency (miles/day) ratio similarity.
    pub efficiency: f64,
    /// Weight on daily spending (receipts/day) ratio similarity.
    pub spending: f64,
    /// Added when trip lengths are equal.
    pub exact_day_bonus: f64,
}

impl Default for DomainWeights {
    fn default() -> Self {
        Self {
            days: 0.4,
            efficiency: 0.3,
            spending: 0.3,
            exact_day_bonus: 0.2,
        }
    }
}

/// Per-dimension `[min, max]` of the stored examples, used for min-max scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranges {
    pub(super) lo: [f64; 3],
    pub(super) hi: [f64; 3],
}

impl Ranges {
    pub(super) fn from_trips<'a>(trips: impl IntoIterator<Item = &'a Trip>) -> Self {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for trip in trips {
            for (j, v) in raw(trip).into_iter().enumerate() {
                lo[j] = lo[j].min(v);
                hi[j] = hi[j].max(v);
            }
        }
        Self { lo, hi }
    }

    fn scale(&self, trip: &Trip) -> [f64; 3] {
        let mut out = raw(trip);
        for (j, v) in out.iter_mut().enumerate() {
            let span = self.hi[j] - self.lo[j];
            *v = if span > 0.0 { (*v - self.lo[j]) / span } else { 0.0 };
        }
        out
    }
}

fn raw(trip: &Trip) -> [f64; 3] {
    [trip.days_f64(), trip.miles(), trip.receipts()]
}

/// `min(a, b) / max(a, b)`, or 1 when both are zero.
fn ratio_similarity(a: f64, b: f64) -> f64 {
    let hi = a.max(b);
    if hi <= 0.0 {
        1.0
    } else {
        a.min(b) / hi
    }
}

fn day_score(diff: u32) -> f64 {
    match diff {
        0 => 1.0,
        1 => 0.8,
        2 => 0.5,
        d => 0.5 / (1.0 + f64::from(d)),
    }
}

/// How two trips are compared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Euclidean distance over min-max scaled `(days, miles, receipts)`.
    Euclidean,
    /// `Σ w_i |a_i - b_i| / max(a_i, b_i, 1)` over the raw inputs.
    WeightedManhattan {
        /// Per-input weights.
        #[serde(default)]
        weights: InputWeights,
    },
    /// Day match, efficiency and daily-spending similarity, plus an exact-day bonus.
    DomainAware {
        /// Component weights.
        #[serde(default)]
        weights: DomainWeights,
    },
}

impl SimilarityMetric {
    /// Weighted Manhattan with default weights.
    #[must_use]
    pub fn weighted_manhattan() -> Self {
        Self::WeightedManhattan {
            weights: InputWeights::default(),
        }
    }

    /// Domain-aware similarity with default weights.
    #[must_use]
    pub fn domain_aware() -> Self {
        Self::DomainAware {
            weights: DomainWeights::default(),
        }
    }

    /// Short label for reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::WeightedManhattan { .. } => "weighted_manhattan",
            Self::DomainAware { .. } => "domain_aware",
        }
    }

    /// Similarity of `query` to `stored`; always finite and `>= 0`.
    #[must_use]
    pub fn similarity(&self, ranges: &Ranges, query: &Trip, stored: &Trip) -> f64 {
        let sim = match self {
            Self::Euclidean => {
                let a = ranges.scale(query);
                let b = ranges.scale(stored);
                let d = a
                    .iter()
                    .zip(&b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f64>()
                    .sqrt();
                1.0 / (1.0 + d)
            }
            Self::WeightedManhattan { weights } => {
                let w = [weights.days, weights.miles, weights.receipts];
                let d: f64 = raw(query)
                    .iter()
                    .zip(raw(stored))
                    .zip(w)
                    .map(|((&a, b), w)| w * (a - b).abs() / a.max(b).max(1.0))
                    .sum();
                1.0 / (1.0 + d)
            }
            Self::DomainAware { weights } => {
                let diff = query.days().abs_diff(stored.days());
                let mut s = weights.days * day_score(diff)
                    + weights.efficiency
                        * ratio_similarity(query.miles_per_day(), stored.miles_per_day())
                    + weights.spending
                        * ratio_similarity(query.receipts_per_day(), stored.receipts_per_day());
                if diff == 0 {
                    s += weights.exact_day_bonus;
                }
                s
            }
        };
        if sim.is_finite() {
            sim.max(0.0)
        } else {
            0.0
        }
    }

    /// True when every weight is finite and non-negative.
    #[must_use]
    pub fn has_valid_weights(&self) -> bool {
        let ok = |w: f64| w.is_finite() && w >= 0.0;
        match self {
            Self::Euclidean => true,
            Self::WeightedManhattan { weights } => {
                ok(weights.days) && ok(weights.miles) && ok(weights.receipts)
            }
            Self::DomainAware { weights } => {
                ok(weights.days)
                    && ok(weights.efficiency)
                    && ok(weights.spending)
                    && ok(weights.exact_day_bonus)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    #[test]
    fn test_identical_trips_are_most_similar() {
        let trips = [trip(1, 0.0, 0.0), trip(10, 1000.0, 2000.0)];
        let ranges = Ranges::from_trips(trips.iter());
        let q = trip(5, 500.0, 1000.0);
        let far = trip(1, 0.0, 0.0);
        for metric in [
            SimilarityMetric::Euclidean,
            SimilarityMetric::weighted_manhattan(),
            SimilarityMetric::domain_aware(),
        ] {
            let same = metric.similarity(&ranges, &q, &q);
            let other = metric.similarity(&ranges, &q, &far);
            assert!(same > other, "{}", metric.label());
            assert!(other >= 0.0);
        }
    }

    #[test]
    fn test_euclidean_identity_is_one() {
        let trips = [trip(1, 0.0, 0.0), trip(3, 100.0, 50.0)];
        let ranges = Ranges::from_trips(trips.iter());
        let q = trip(2, 50.0, 25.0);
        assert!((SimilarityMetric::Euclidean.similarity(&ranges, &q, &q) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_span_dimension_is_ignored() {
        let trips = [trip(3, 100.0, 10.0), trip(3, 100.0, 20.0)];
        let ranges = Ranges::from_trips(trips.iter());
        let s = SimilarityMetric::Euclidean.similarity(&ranges, &trip(9, 900.0, 10.0), &trips[0]);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_manhattan_relative_difference() {
        let ranges = Ranges::from_trips([trip(1, 0.0, 0.0)].iter());
        let metric = SimilarityMetric::WeightedManhattan {
            weights: InputWeights {
                days: 0.0,
                miles: 1.0,
                receipts: 0.0,
            },
        };
        // |100 - 50| / 100 = 0.5
        let s = metric.similarity(&ranges, &trip(1, 100.0, 0.0), &trip(1, 50.0, 0.0));
        assert!((s - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_domain_aware_scores() {
        let ranges = Ranges::from_trips([trip(1, 0.0, 0.0)].iter());
        let metric = SimilarityMetric::domain_aware();
        let q = trip(5, 500.0, 500.0);
        // exact day, same ratios: 0.4 + 0.3 + 0.3 + 0.2
        assert!((metric.similarity(&ranges, &q, &q) - 1.2).abs() < 1e-12);
        // one day off, same ratios: 0.4*0.8 + 0.6
        let near = trip(4, 400.0, 400.0);
        assert!((metric.similarity(&ranges, &q, &near) - 0.92).abs() < 1e-12);
        assert_eq!(day_score(3), 0.125);
    }

    #[test]
    fn test_ratio_similarity_zero() {
        assert_eq!(ratio_similarity(0.0, 0.0), 1.0);
        assert_eq!(ratio_similarity(0.0, 5.0), 0.0);
        assert_eq!(ratio_similarity(2.0, 4.0), 0.5);
    }

    #[test]
    fn test_metric_json() {
        let m: SimilarityMetric =
            serde_json::from_str(r#"{"kind":"domain_aware"}"#).expect("deserialize");
        assert_eq!(m, SimilarityMetric::domain_aware());
        let e: SimilarityMetric = serde_json::from_str(r#"{"kind":"euclidean"}"#).expect("deserialize");
        assert_eq!(e, SimilarityMetric::Euclidean);
    }
}
