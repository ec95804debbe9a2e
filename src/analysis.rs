//! Exploratory summaries of a labeled set.
//!
//! These are the tables used to pick band edges and rule thresholds: average
//! reimbursement by trip length, and average reimbursement per day across
//! travel-efficiency (miles per day) buckets.

use crate::data::TrainingSet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Default width of a miles-per-day bucket.
pub const EFFICIENCY_BUCKET_WIDTH: f64 = 25.0;

/// Buckets with fewer cases than this are left out of the profile.
pub const MIN_BUCKET_COUNT: usize = 5;

/// Aggregate for one trip length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TripLengthSummary {
    /// Trip length in days.
    pub days: u32,
    /// Cases of this length.
    pub count: usize,
    /// Mean expected output.
    pub avg_output: f64,
    /// Mean expected output divided by `days`.
    pub avg_per_day: f64,
}

/// Aggregate for one miles-per-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyBucket {
    /// Bucket center, miles per day rounded to the bucket width.
    pub miles_per_day: f64,
    /// Cases in the bucket.
    pub count: usize,
    /// Mean of `expected / days`.
    pub avg_per_day: f64,
}

/// Summaries keyed by trip length, shortest first.
#[must_use]
pub fn by_trip_length(data: &TrainingSet) -> Vec<TripLengthSummary> {
    let mut groups: BTreeMap<u32, (usize, f64)> = BTreeMap::new();
    for ex in data {
        let entry = groups.entry(ex.trip().days()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += ex.expected();
    }

    groups
        .into_iter()
        .map(|(days, (count, total))| {
            let avg_output = total / count as f64;
            TripLengthSummary {
                days,
                count,
                avg_output,
                avg_per_day: avg_output / f64::from(days),
            }
        })
        .collect()
}

/// Average output per day across miles-per-day buckets of `bucket_width`,
/// keeping buckets with at least `min_count` cases, slowest first.
///
/// ```
/// use reimburse::analysis::efficiency_profile;
/// use reimburse::data::TrainingSet;
///
/// let json = r#"[
///   {"input": {"trip_duration_days": 2, "miles_traveled": 190, "total_receipts_amount": 0}, "expected_output": 300},
///   {"input": {"trip_duration_days": 1, "miles_traveled": 110, "total_receipts_amount": 0}, "expected_output": 200}
/// ]"#;
/// let data = TrainingSet::from_json_str(json).expect("valid cases");
/// let profile = efficiency_profile(&data, 25.0, 1);
/// assert_eq!(profile.len(), 1);
/// assert_eq!(profile[0].miles_per_day, 100.0);
/// assert_eq!(profile[0].avg_per_day, 175.0);
/// ```
#[must_use]
pub fn efficiency_profile(
    data: &TrainingSet,
    bucket_width: f64,
    min_count: usize,
) -> Vec<EfficiencyBucket> {
    let mut buckets: BTreeMap<i64, (usize, f64)> = BTreeMap::new();
    for ex in data {
        let trip = ex.trip();
        #[allow(clippy::cast_possible_truncation)]
        let key = (trip.miles_per_day() / bucket_width).round() as i64;
        let entry = buckets.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += ex.expected() / trip.days_f64();
    }

    buckets
        .into_iter()
        .filter(|(_, (count, _))| *count >= min_count)
        .map(|(key, (count, total))| EfficiencyBucket {
            miles_per_day: key as f64 * bucket_width,
            count,
            avg_per_day: total / count as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TrainingExample, Trip};

    fn set(rows: &[(i64, f64, f64)]) -> TrainingSet {
        TrainingSet::new(
            rows.iter()
                .map(|&(d, m, y)| {
                    TrainingExample::new(Trip::new(d, m, 0.0).expect("valid"), y).expect("finite")
                })
                .collect(),
        )
        .expect("non-empty")
    }

    #[test]
    fn test_by_trip_length() {
        let data = set(&[(2, 0.0, 200.0), (1, 0.0, 100.0), (2, 0.0, 300.0)]);
        let summary = by_trip_length(&data);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].days, 1);
        assert_eq!(summary[0].count, 1);
        assert_eq!(summary[1].days, 2);
        assert_eq!(summary[1].count, 2);
        assert_eq!(summary[1].avg_output, 250.0);
        assert_eq!(summary[1].avg_per_day, 125.0);
    }

    #[test]
    fn test_efficiency_profile_drops_sparse_buckets() {
        let mut rows = vec![(1, 180.0, 300.0); 5];
        rows.push((1, 20.0, 90.0));
        let data = set(&rows);

        let profile = efficiency_profile(&data, EFFICIENCY_BUCKET_WIDTH, MIN_BUCKET_COUNT);
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0].miles_per_day, 175.0);
        assert_eq!(profile[0].count, 5);
        assert_eq!(profile[0].avg_per_day, 300.0);

        let all = efficiency_profile(&data, EFFICIENCY_BUCKET_WIDTH, 1);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].miles_per_day, 25.0);
    }
}
