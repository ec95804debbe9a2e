//! Trip inputs and labeled training examples.
//!
//! A [`Trip`] is the validated triple `(days, miles, receipts)`; constructing
//! one is the only place raw prediction inputs are checked, so every
//! predictor downstream can assume `days > 0`, `miles >= 0`, `receipts >= 0`.
//!
//! Training data is read from the public-cases JSON layout:
//!
//! ```text
//! [{"input": {"trip_duration_days": 5, "miles_traveled": 250.0,
//!             "total_receipts_amount": 150.75},
//!   "expected_output": 754.2}, ...]
//! ```

use crate::error::{ReimburseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Validated prediction input.
///
/// # Examples
///
/// ```
/// use reimburse::data::Trip;
///
/// let trip = Trip::new(4, 200.0, 120.0).expect("valid trip");
/// assert_eq!(trip.miles_per_day(), 50.0);
/// assert!(Trip::new(0, 10.0, 10.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TripFields")]
pub struct Trip {
    days: u32,
    miles: f64,
    receipts: f64,
}

#[derive(Deserialize)]
struct TripFields {
    days: i64,
    miles: f64,
    receipts: f64,
}

impl TryFrom<TripFields> for Trip {
    type Error = ReimburseError;

    fn try_from(fields: TripFields) -> Result<Self> {
        Trip::new(fields.days, fields.miles, fields.receipts)
    }
}

impl Trip {
    /// Validates raw inputs and builds a trip.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::Validation`] when `days <= 0`, or when
    /// `miles`/`receipts` are negative or not finite.
    pub fn new(days: i64, miles: f64, receipts: f64) -> Result<Self> {
        if days <= 0 {
            return Err(ReimburseError::validation("days", days, "> 0"));
        }
        let days = u32::try_from(days)
            .map_err(|_| ReimburseError::validation("days", days, "<= 4294967295"))?;
        if !miles.is_finite() || miles < 0.0 {
            return Err(ReimburseError::validation("miles", miles, "finite and >= 0"));
        }
        if !receipts.is_finite() || receipts < 0.0 {
            return Err(ReimburseError::validation(
                "receipts",
                receipts,
                "finite and >= 0",
            ));
        }
        Ok(Self {
            days,
            miles,
            receipts,
        })
    }

    /// Like [`Trip::new`] but accepts `days` as a float, which must be a whole number.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::Validation`] for fractional or out-of-range days
    /// and for the conditions listed on [`Trip::new`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(days: f64, miles: f64, receipts: f64) -> Result<Self> {
        if !days.is_finite() || days.fract() != 0.0 {
            return Err(ReimburseError::validation("days", days, "a whole number > 0"));
        }
        if days <= 0.0 || days > f64::from(u32::MAX) {
            return Err(ReimburseError::validation("days", days, "> 0"));
        }
        Self::new(days as i64, miles, receipts)
    }

    /// Trip length in days.
    #[must_use]
    pub fn days(&self) -> u32 {
        self.days
    }

    /// Trip length as a float.
    #[must_use]
    pub fn days_f64(&self) -> f64 {
        f64::from(self.days)
    }

    /// Miles traveled.
    #[must_use]
    pub fn miles(&self) -> f64 {
        self.miles
    }

    /// Total receipts amount.
    #[must_use]
    pub fn receipts(&self) -> f64 {
        self.receipts
    }

    /// Efficiency: miles per day.
    #[must_use]
    pub fn miles_per_day(&self) -> f64 {
        self.miles / self.days_f64()
    }

    /// Daily spending: receipts per day.
    #[must_use]
    pub fn receipts_per_day(&self) -> f64 {
        self.receipts / self.days_f64()
    }

    /// Receipts per mile, with miles floored at 1.
    #[must_use]
    pub fn receipts_per_mile(&self) -> f64 {
        self.receipts / self.miles.max(1.0)
    }
}

/// A labeled example: a trip and the amount the unknown function returned for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    trip: Trip,
    expected: f64,
}

impl TrainingExample {
    /// Creates a labeled example.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::TrainingData`] if `expected` is not finite.
    pub fn new(trip: Trip, expected: f64) -> Result<Self> {
        if !expected.is_finite() {
            return Err(ReimburseError::training_data(format!(
                "expected output must be finite, got {expected}"
            )));
        }
        Ok(Self { trip, expected })
    }

    /// The example's input.
    #[must_use]
    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    /// The example's target amount.
    #[must_use]
    pub fn expected(&self) -> f64 {
        self.expected
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CaseRecord {
    input: CaseInput,
    expected_output: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CaseInput {
    trip_duration_days: f64,
    miles_traveled: f64,
    total_receipts_amount: f64,
}

/// A non-empty, immutable collection of training examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrainingExample>", into = "Vec<TrainingExample>")]
pub struct TrainingSet {
    examples: Vec<TrainingExample>,
}

impl TryFrom<Vec<TrainingExample>> for TrainingSet {
    type Error = ReimburseError;

    fn try_from(examples: Vec<TrainingExample>) -> Result<Self> {
        Self::new(examples)
    }
}

impl From<TrainingSet> for Vec<TrainingExample> {
    fn from(set: TrainingSet) -> Self {
        set.examples
    }
}

impl TrainingSet {
    /// Wraps a list of examples.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::TrainingData`] if `examples` is empty.
    pub fn new(examples: Vec<TrainingExample>) -> Result<Self> {
        if examples.is_empty() {
            return Err(ReimburseError::training_data("training set is empty"));
        }
        Ok(Self { examples })
    }

    /// Parses the public-cases JSON layout.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::TrainingData`] for malformed JSON, invalid
    /// records (reported with their index) or an empty array.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<CaseRecord> = serde_json::from_str(json)
            .map_err(|e| ReimburseError::training_data(format!("malformed JSON: {e}")))?;

        let examples = records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let input = &record.input;
                Trip::from_f64(
                    input.trip_duration_days,
                    input.miles_traveled,
                    input.total_receipts_amount,
                )
                .and_then(|trip| TrainingExample::new(trip, record.expected_output))
                .map_err(|e| ReimburseError::training_data(format!("record {idx}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(examples)
    }

    /// Reads and parses a public-cases JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file can't be read, otherwise the errors of
    /// [`TrainingSet::from_json_str`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serializes back to the public-cases JSON layout.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if JSON encoding fails.
    pub fn to_json_string(&self) -> Result<String> {
        let records: Vec<CaseRecord> = self
            .examples
            .iter()
            .map(|ex| CaseRecord {
                input: CaseInput {
                    trip_duration_days: ex.trip.days_f64(),
                    miles_traveled: ex.trip.miles,
                    total_receipts_amount: ex.trip.receipts,
                },
                expected_output: ex.expected,
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Builds a new set from the examples at `indices`.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::TrainingData`] if `indices` is empty, or
    /// [`ReimburseError::Other`] if an index is out of range.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let examples = indices
            .iter()
            .map(|&i| {
                self.examples.get(i).copied().ok_or_else(|| {
                    ReimburseError::Other(format!(
                        "index {i} out of bounds (len={})",
                        self.examples.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(examples)
    }

    /// All examples in load order.
    #[must_use]
    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    /// Target values in load order.
    #[must_use]
    pub fn targets(&self) -> Vec<f64> {
        self.examples.iter().map(TrainingExample::expected).collect()
    }

    /// Number of examples (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Iterates over the examples.
    pub fn iter(&self) -> std::slice::Iter<'_, TrainingExample> {
        self.examples.iter()
    }
}

impl<'a> IntoIterator for &'a TrainingSet {
    type Item = &'a TrainingExample;
    type IntoIter = std::slice::Iter<'a, TrainingExample>;

    fn into_iter(self) -> Self::IntoIter {
        self.examples.iter()
    }
}
