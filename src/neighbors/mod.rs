//! Instance-based prediction over the stored training examples.
//!
//! [`SimilarityIndex`] keeps every training example verbatim and answers
//! "which stored trips look most like this one" under a [`SimilarityMetric`].
//! [`KnnPredictor`] turns the top-k neighbors into an amount.
//!
//! # Aggregation
//!
//! Neighbors are sorted by similarity, descending, with a stable sort so
//! equal similarities keep training order. The top `k` targets are averaged
//! with weights from [`Weighting`]:
//!
//! ```text
//! Uniform        w_i = 1
//! Similarity     w_i = s_i
//! RankDecay(r)   w_i = s_i * exp(-r * i)
//! ```
//!
//! When all weights are zero the average falls back to uniform.
//!
//! # Example
//!
//! ```
//! use reimburse::data::{TrainingExample, TrainingSet, Trip};
//! use reimburse::neighbors::SimilarityIndex;
//!
//! let data = TrainingSet::new(vec![
//!     TrainingExample::new(Trip::new(1, 10.0, 5.0).expect("valid"), 100.0).expect("finite"),
//!     TrainingExample::new(Trip::new(5, 500.0, 800.0).expect("valid"), 1200.0).expect("finite"),
//! ]).expect("non-empty");
//!
//! let index = SimilarityIndex::new(&data);
//! let amount = index.predict(&Trip::new(1, 12.0, 6.0).expect("valid"), 1);
//! assert_eq!(amount, 100.0);
//! ```

mod metric;

pub use metric::{DomainWeights, InputWeights, Ranges, SimilarityMetric};

use crate::data::{TrainingExample, TrainingSet, Trip};
use crate::error::{ReimburseError, Result};
use crate::primitives::round_cents;
use crate::rules::{Conditions, Interval};
use crate::traits::Predictor;
use serde::{Deserialize, Serialize};

/// A stored example and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    /// Borrowed training example; the index is never mutated.
    pub example: &'a TrainingExample,
    /// Similarity to the query, `>= 0`.
    pub similarity: f64,
}

/// How neighbor targets are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Weighting {
    /// Plain mean.
    Uniform,
    /// Weight by similarity.
    Similarity,
    /// Weight by similarity, decayed exponentially by rank.
    RankDecay {
        /// Decay rate per rank.
        rate: f64,
    },
}

/// How many neighbors to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KSelection {
    /// Always `k`.
    Fixed {
        /// Neighbor count.
        k: usize,
    },
    /// `narrow` if any `narrow_when` matches, else `wide` if any
    /// `widen_when` matches, else `base`.
    Adaptive {
        /// Neighbor count for typical trips.
        base: usize,
        /// Neighbor count for atypical trips.
        wide: usize,
        /// Neighbor count for very large receipts.
        narrow: usize,
        /// Atypical regimes.
        widen_when: Vec<Conditions>,
        /// Regimes where only the closest neighbors are trusted.
        narrow_when: Vec<Conditions>,
    },
}

impl KSelection {
    /// The adaptive default: 5 neighbors, 8 for extreme trip length,
    /// efficiency or spending, 3 for receipts above 2000.
    #[must_use]
    pub fn adaptive() -> Self {
        Self::Adaptive {
            base: 5,
            wide: 8,
            narrow: 3,
            widen_when: vec![
                Conditions::any().with_days(Interval::at_least(12.0)),
                Conditions::any().with_miles_per_day(Interval::at_least(400.0)),
                Conditions::any().with_miles_per_day(Interval::below(20.0)),
                Conditions::any().with_receipts_per_day(Interval::at_least(300.0)),
            ],
            narrow_when: vec![Conditions::any().with_receipts(Interval::at_least(2000.0))],
        }
    }

    /// Neighbor count for `trip`, before clamping to the index size.
    #[must_use]
    pub fn k_for(&self, trip: &Trip) -> usize {
        match self {
            Self::Fixed { k } => *k,
            Self::Adaptive {
                base,
                wide,
                narrow,
                widen_when,
                narrow_when,
            } => {
                if narrow_when.iter().any(|c| c.matches(trip)) {
                    *narrow
                } else if widen_when.iter().any(|c| c.matches(trip)) {
                    *wide
                } else {
                    *base
                }
            }
        }
    }

    fn counts(&self) -> Vec<usize> {
        match self {
            Self::Fixed { k } => vec![*k],
            Self::Adaptive {
                base, wide, narrow, ..
            } => vec![*base, *wide, *narrow],
        }
    }
}

/// A metric and its share of a multi-metric blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedMetric {
    /// Metric used to rank neighbors.
    pub metric: SimilarityMetric,
    /// Blend weight.
    pub weight: f64,
}

/// k-NN prediction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// Metrics whose per-metric predictions are blended by weight.
    pub metrics: Vec<WeightedMetric>,
    /// Neighbor count policy.
    pub k: KSelection,
    /// Target weighting.
    pub weighting: Weighting,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            metrics: vec![
                WeightedMetric {
                    metric: SimilarityMetric::domain_aware(),
                    weight: 0.5,
                },
                WeightedMetric {
                    metric: SimilarityMetric::weighted_manhattan(),
                    weight: 0.3,
                },
                WeightedMetric {
                    metric: SimilarityMetric::Euclidean,
                    weight: 0.2,
                },
            ],
            k: KSelection::adaptive(),
            weighting: Weighting::Similarity,
        }
    }
}

impl KnnConfig {
    /// A single metric with a fixed `k`, weighted by similarity.
    #[must_use]
    pub fn single(metric: SimilarityMetric, k: usize) -> Self {
        Self {
            metrics: vec![WeightedMetric {
                metric,
                weight: 1.0,
            }],
            k: KSelection::Fixed { k },
            weighting: Weighting::Similarity,
        }
    }

    /// Sets the neighbor count policy.
    #[must_use]
    pub fn with_k(mut self, k: KSelection) -> Self {
        self.k = k;
        self
    }

    /// Sets the target weighting.
    #[must_use]
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] for `k = 0`, an empty
    /// or non-positive metric blend, negative weights, a negative decay rate
    /// or malformed adaptive conditions.
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(ReimburseError::hyperparameter(
                "knn.metrics",
                "[]",
                "at least one metric",
            ));
        }
        for (idx, m) in self.metrics.iter().enumerate() {
            if !(m.weight.is_finite() && m.weight >= 0.0) || !m.metric.has_valid_weights() {
                return Err(ReimburseError::hyperparameter(
                    &format!("knn.metrics[{idx}]"),
                    m.weight,
                    "finite, non-negative weights",
                ));
            }
        }
        let total: f64 = self.metrics.iter().map(|m| m.weight).sum();
        if total <= 0.0 {
            return Err(ReimburseError::hyperparameter(
                "knn.metrics",
                total,
                "weights summing to > 0",
            ));
        }
        if let Some(k) = self.k.counts().into_iter().find(|&k| k == 0) {
            return Err(ReimburseError::hyperparameter("knn.k", k, ">= 1"));
        }
        if let KSelection::Adaptive {
            widen_when,
            narrow_when,
            ..
        } = &self.k
        {
            if !widen_when.iter().chain(narrow_when).all(Conditions::is_well_formed) {
                return Err(ReimburseError::hyperparameter(
                    "knn.k",
                    "conditions",
                    "intervals with min < max",
                ));
            }
        }
        if let Weighting::RankDecay { rate } = self.weighting {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(ReimburseError::hyperparameter(
                    "knn.weighting.rate",
                    rate,
                    "finite and >= 0",
                ));
            }
        }
        Ok(())
    }
}

/// Read-only store of training examples with similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrainingExample>", into = "Vec<TrainingExample>")]
pub struct SimilarityIndex {
    examples: Vec<TrainingExample>,
    ranges: Ranges,
}

impl TryFrom<Vec<TrainingExample>> for SimilarityIndex {
    type Error = ReimburseError;

    fn try_from(examples: Vec<TrainingExample>) -> Result<Self> {
        Ok(Self::new(&TrainingSet::new(examples)?))
    }
}

impl From<SimilarityIndex> for Vec<TrainingExample> {
    fn from(index: SimilarityIndex) -> Self {
        index.examples
    }
}

impl SimilarityIndex {
    /// Stores a copy of every example.
    #[must_use]
    pub fn new(data: &TrainingSet) -> Self {
        let examples = data.examples().to_vec();
        let ranges = Ranges::from_trips(examples.iter().map(TrainingExample::trip));
        Self { examples, ranges }
    }

    /// Stored examples in training order.
    #[must_use]
    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    /// Number of stored examples (at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Always false.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Per-dimension ranges used by [`SimilarityMetric::Euclidean`].
    #[must_use]
    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    /// The `k` most similar stored examples, most similar first.
    ///
    /// `k` is clamped to `1..=len`.
    #[must_use]
    pub fn neighbors(&self, trip: &Trip, metric: &SimilarityMetric, k: usize) -> Vec<Neighbor<'_>> {
        let mut all: Vec<Neighbor<'_>> = self
            .examples
            .iter()
            .map(|example| Neighbor {
                example,
                similarity: metric.similarity(&self.ranges, trip, example.trip()),
            })
            .collect();
        // stable: equal similarities keep training order
        all.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        all.truncate(k.clamp(1, self.len()));
        all
    }

    /// Weighted mean of neighbor targets, unrounded.
    #[must_use]
    pub fn aggregate(neighbors: &[Neighbor<'_>], weighting: Weighting) -> f64 {
        let weights: Vec<f64> = neighbors
            .iter()
            .enumerate()
            .map(|(rank, n)| match weighting {
                Weighting::Uniform => 1.0,
                Weighting::Similarity => n.similarity,
                Weighting::RankDecay { rate } => n.similarity * (-rate * rank as f64).exp(),
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total > 0.0 && total.is_finite() {
            neighbors
                .iter()
                .zip(&weights)
                .map(|(n, w)| n.example.expected() * w)
                .sum::<f64>()
                / total
        } else if neighbors.is_empty() {
            0.0
        } else {
            neighbors.iter().map(|n| n.example.expected()).sum::<f64>() / neighbors.len() as f64
        }
    }

    /// Similarity-weighted prediction from the top `k` under the default
    /// metric blend, rounded to cents.
    #[must_use]
    pub fn predict(&self, trip: &Trip, k: usize) -> f64 {
        self.predict_with(trip, &KnnConfig::default().with_k(KSelection::Fixed { k }))
    }

    /// Prediction under an explicit configuration, rounded to cents.
    ///
    /// Each metric produces its own weighted top-k average; those are
    /// blended by metric weight.
    #[must_use]
    pub fn predict_with(&self, trip: &Trip, config: &KnnConfig) -> f64 {
        let k = config.k.k_for(trip);
        let mut blended = 0.0;
        let mut total = 0.0;
        for wm in &config.metrics {
            let neighbors = self.neighbors(trip, &wm.metric, k);
            blended += wm.weight * Self::aggregate(&neighbors, config.weighting);
            total += wm.weight;
        }
        let raw = if total > 0.0 { blended / total } else { 0.0 };
        if raw.is_finite() {
            round_cents(raw)
        } else {
            0.0
        }
    }
}

/// A [`SimilarityIndex`] paired with its prediction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnPredictor {
    index: SimilarityIndex,
    config: KnnConfig,
}

impl KnnPredictor {
    /// Stores `data` and validates `config`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`KnnConfig::validate`].
    pub fn new(data: &TrainingSet, config: KnnConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index: SimilarityIndex::new(data),
            config,
        })
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Prediction settings.
    #[must_use]
    pub fn config(&self) -> &KnnConfig {
        &self.config
    }
}

impl Predictor for KnnPredictor {
    fn predict(&self, trip: &Trip) -> f64 {
        self.index.predict_with(trip, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn sample() -> TrainingSet {
        set(&[
            (1, 50.0, 10.0, 120.0),
            (2, 150.0, 200.0, 350.0),
            (3, 300.0, 400.0, 600.0),
            (5, 900.0, 700.0, 1300.0),
            (8, 600.0, 1600.0, 1500.0),
            (12, 1200.0, 2400.0, 1900.0),
        ])
    }

    #[test]
    fn test_k_equals_n_uniform_is_mean() {
        let data = sample();
        let index = SimilarityIndex::new(&data);
        let mean = data.targets().iter().sum::<f64>() / data.len() as f64;
        for metric in [
            SimilarityMetric::Euclidean,
            SimilarityMetric::weighted_manhattan(),
            SimilarityMetric::domain_aware(),
        ] {
            let config = KnnConfig::single(metric, data.len()).with_weighting(Weighting::Uniform);
            let p = index.predict_with(&trip(4, 420.0, 333.0), &config);
            assert_eq!(p, round_cents(mean));
        }
    }

    #[test]
    fn test_neighbors_sorted_descending() {
        let index = SimilarityIndex::new(&sample());
        let ns = index.neighbors(&trip(3, 280.0, 390.0), &SimilarityMetric::Euclidean, 4);
        assert_eq!(ns.len(), 4);
        assert!(ns.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(ns[0].example.expected(), 600.0);
    }

    #[test]
    fn test_ties_keep_training_order() {
        let data = set(&[
            (2, 100.0, 100.0, 1.0),
            (2, 100.0, 100.0, 2.0),
            (2, 100.0, 100.0, 3.0),
        ]);
        let index = SimilarityIndex::new(&data);
        let ns = index.neighbors(&trip(2, 100.0, 100.0), &SimilarityMetric::domain_aware(), 3);
        let order: Vec<f64> = ns.iter().map(|n| n.example.expected()).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_k_is_clamped() {
        let index = SimilarityIndex::new(&sample());
        let q = trip(1, 1.0, 1.0);
        assert_eq!(index.neighbors(&q, &SimilarityMetric::Euclidean, 0).len(), 1);
        assert_eq!(index.neighbors(&q, &SimilarityMetric::Euclidean, 100).len(), 6);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let data = set(&[(1, 1.0, 1.0, 10.0), (1, 1.0, 1.0, 30.0)]);
        let index = SimilarityIndex::new(&data);
        let mut ns = index.neighbors(&trip(1, 1.0, 1.0), &SimilarityMetric::Euclidean, 2);
        for n in &mut ns {
            n.similarity = 0.0;
        }
        assert_eq!(SimilarityIndex::aggregate(&ns, Weighting::Similarity), 20.0);
    }

    #[test]
    fn test_rank_decay_favors_first() {
        let data = set(&[(1, 1.0, 1.0, 10.0), (1, 1.0, 1.0, 30.0)]);
        let index = SimilarityIndex::new(&data);
        let ns = index.neighbors(&trip(1, 1.0, 1.0), &SimilarityMetric::Euclidean, 2);
        let decayed = SimilarityIndex::aggregate(&ns, Weighting::RankDecay { rate: 1.0 });
        assert!(decayed < 20.0);
        assert!(decayed > 10.0);
    }

    #[test]
    fn test_adaptive_k() {
        let k = KSelection::adaptive();
        assert_eq!(k.k_for(&trip(3, 150.0, 300.0)), 5);
        assert_eq!(k.k_for(&trip(14, 700.0, 1000.0)), 8);
        assert_eq!(k.k_for(&trip(1, 1082.0, 100.0)), 8);
        assert_eq!(k.k_for(&trip(3, 150.0, 2500.0)), 3);
    }

    #[test]
    fn test_predictions_finite_and_rounded() {
        let predictor = KnnPredictor::new(&sample(), KnnConfig::default()).expect("valid");
        for q in [trip(1, 0.0, 0.0), trip(30, 5000.0, 9000.0), trip(5, 200.0, 700.0)] {
            let p = predictor.predict(&q);
            assert!(p.is_finite());
            assert!((p * 100.0 - (p * 100.0).round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_index_is_not_mutated() {
        let data = sample();
        let index = SimilarityIndex::new(&data);
        let _ = index.predict(&trip(2, 10.0, 10.0), 3);
        assert_eq!(index.examples(), data.examples());
    }

    #[test]
    fn test_validate() {
        assert!(KnnConfig::default().validate().is_ok());
        assert!(KnnConfig::single(SimilarityMetric::Euclidean, 0).validate().is_err());
        let mut empty = KnnConfig::default();
        empty.metrics.clear();
        assert!(empty.validate().is_err());
        let decay = KnnConfig::default().with_weighting(Weighting::RankDecay { rate: -1.0 });
        assert!(decay.validate().is_err());
    }

    #[test]
    fn test_serde_rebuilds_ranges() {
        let index = SimilarityIndex::new(&sample());
        let json = serde_json::to_string(&index).expect("serialize");
        let back: SimilarityIndex = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, index);
        assert!(serde_json::from_str::<SimilarityIndex>("[]").is_err());
    }
}
