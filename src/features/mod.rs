//! Feature engineering: maps a trip to a fixed-length feature vector.
//!
//! The list of terms is data ([`FeatureSet`]), so experiments can add terms
//! without touching the trainer. Extraction always appends a trailing bias
//! term of `1.0`, so a set of `n` features produces vectors of length `n + 1`.
//!
//! # Example
//!
//! ```
//! use reimburse::data::Trip;
//! use reimburse::features::FeatureSet;
//!
//! let features = FeatureSet::default();
//! let trip = Trip::new(5, 250.0, 150.75).expect("valid trip");
//! let v = features.extract(&trip);
//! assert_eq!(v.len(), features.len());
//! assert_eq!(v[v.len() - 1], 1.0);
//! ```

mod term;

pub use term::{Factor, Feature};

use crate::data::Trip;
use crate::error::{ReimburseError, Result};
use crate::primitives::{Matrix, Vector};
use crate::rules::{Conditions, Interval, Variable};
use serde::{Deserialize, Serialize};

/// Floor applied to `x + 1` before taking a logarithm.
pub const LOG_FLOOR: f64 = 1e-6;

/// Divisor applied to the cubic miles and receipts terms.
pub const CUBIC_SCALE: f64 = 1_000_000.0;

/// Ordered list of feature terms; the bias term is implicit and always last.
///
/// Serialized as a plain array of terms; deserializing re-runs validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Feature>", into = "Vec<Feature>")]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl TryFrom<Vec<Feature>> for FeatureSet {
    type Error = ReimburseError;

    fn try_from(features: Vec<Feature>) -> Result<Self> {
        Self::new(features)
    }
}

impl From<FeatureSet> for Vec<Feature> {
    fn from(set: FeatureSet) -> Self {
        set.features
    }
}

impl FeatureSet {
    /// Builds a feature set from explicit terms.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] if a term is invalid
    /// (see [`FeatureSet::validate`]).
    pub fn new(features: Vec<Feature>) -> Result<Self> {
        let set = Self { features };
        set.validate()?;
        Ok(set)
    }

    /// Checks every term: exponents in `1..=4`, positive finite scales and
    /// well-formed indicator conditions.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] naming the first bad term.
    pub fn validate(&self) -> Result<()> {
        for (idx, feature) in self.features.iter().enumerate() {
            feature
                .validate()
                .map_err(|constraint| {
                    ReimburseError::hyperparameter(
                        &format!("features[{idx}]"),
                        feature.name(),
                        constraint,
                    )
                })?;
        }
        Ok(())
    }

    /// Length of extracted vectors, bias included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len() + 1
    }

    /// Never empty: the bias term is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The configured terms, bias excluded.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Human-readable names in vector order, ending with `"bias"`.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.features
            .iter()
            .map(Feature::name)
            .chain(std::iter::once("bias".to_string()))
            .collect()
    }

    /// Extracts the feature vector of a validated trip. Pure and total.
    #[must_use]
    pub fn extract(&self, trip: &Trip) -> Vector<f64> {
        self.features
            .iter()
            .map(|f| f.value(trip))
            .chain(std::iter::once(1.0))
            .collect()
    }

    /// Validates raw inputs then extracts.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::Validation`] for out-of-domain inputs.
    pub fn extract_raw(&self, days: i64, miles: f64, receipts: f64) -> Result<Vector<f64>> {
        Ok(self.extract(&Trip::new(days, miles, receipts)?))
    }

    /// Extracts one row per trip.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::DimensionMismatch`] if a row's width differs
    /// from [`FeatureSet::len`].
    pub fn extract_matrix<'a, I>(&self, trips: I) -> Result<Matrix<f64>>
    where
        I: IntoIterator<Item = &'a Trip>,
    {
        let width = self.len();
        let mut n = 0;
        let mut data = Vec::new();
        for trip in trips {
            let row = self.extract(trip);
            if row.len() != width {
                return Err(ReimburseError::dimension_mismatch("features", width, row.len()));
            }
            data.extend(row.into_vec());
            n += 1;
        }
        Matrix::from_vec(n, width, data)
            .map_err(|_| ReimburseError::dimension_mismatch("features", n * width, 0))
    }
}

impl Default for FeatureSet {
    /// The canonical feature list: linear, quadratic, scaled cubic,
    /// interactions, logs, ratios, regime indicators and gated terms.
    fn default() -> Self {
        use Variable::{Days, Miles, MilesPerDay, Receipts, ReceiptsPerDay, ReceiptsPerMile};

        let single_day = Conditions::any().with_days(Interval::exactly(1));
        let short_trip = Conditions::any().with_days(Interval::between(2.0, 4.0));
        let medium_trip = Conditions::any().with_days(Interval::between(4.0, 7.0));
        let long_trip = Conditions::any().with_days(Interval::at_least(7.0));
        let five_day = Conditions::any().with_days(Interval::exactly(5));
        let sweet_spot = Conditions::any().with_miles_per_day(Interval::between(180.0, 220.0));
        let optimal_receipts = Conditions::any().with_receipts(Interval::between(600.0, 800.0));
        let low_receipts = Conditions::any().with_receipts(Interval::below(50.0));

        let features = vec![
            // linear
            Feature::power(Days, 1),
            Feature::power(Miles, 1),
            Feature::power(Receipts, 1),
            // quadratic
            Feature::power(Days, 2),
            Feature::power(Miles, 2),
            Feature::power(Receipts, 2),
            // cubic
            Feature::power(Days, 3),
            Feature::scaled_power(Miles, 3, CUBIC_SCALE),
            Feature::scaled_power(Receipts, 3, CUBIC_SCALE),
            // interactions
            Feature::product(&[(Days, 1), (Miles, 1)]),
            Feature::product(&[(Days, 1), (Receipts, 1)]),
            Feature::product(&[(Miles, 1), (Receipts, 1)]),
            Feature::product(&[(Days, 2), (Miles, 1)]),
            Feature::product(&[(Days, 2), (Receipts, 1)]),
            // logarithms
            Feature::log(Days),
            Feature::log(Miles),
            Feature::log(Receipts),
            // ratios
            Feature::power(MilesPerDay, 1),
            Feature::power(ReceiptsPerDay, 1),
            Feature::power(ReceiptsPerMile, 1),
            Feature::power(MilesPerDay, 2),
            Feature::power(ReceiptsPerDay, 2),
            Feature::power(ReceiptsPerMile, 2),
            Feature::log(MilesPerDay),
            Feature::log(ReceiptsPerDay),
            Feature::log(ReceiptsPerMile),
            // regimes
            Feature::indicator("single_day", single_day.clone()),
            Feature::indicator("short_trip", short_trip),
            Feature::indicator("medium_trip", medium_trip),
            Feature::indicator("long_trip", long_trip.clone()),
            Feature::indicator("five_day", five_day.clone()),
            Feature::indicator("efficiency_sweet_spot", sweet_spot.clone()),
            Feature::indicator("receipts_optimal", optimal_receipts.clone()),
            Feature::indicator("receipts_low", low_receipts),
            // regime x continuous
            Feature::gated("efficiency_sweet_spot", sweet_spot, Miles),
            Feature::gated("single_day", single_day, Miles),
            Feature::gated("long_trip", long_trip, Receipts),
            Feature::gated("receipts_optimal", optimal_receipts, Receipts),
            Feature::gated("five_day", five_day, Miles),
        ];

        Self { features }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(days: i64, miles: f64, receipts: f64) -> Trip {
        Trip::new(days, miles, receipts).expect("valid trip")
    }

    #[test]
    fn test_default_length_and_bias() {
        let set = FeatureSet::default();
        assert_eq!(set.len(), set.features().len() + 1);
        assert_eq!(set.names().len(), set.len());
        assert_eq!(set.names().last().map(String::as_str), Some("bias"));
        let v = set.extract(&trip(3, 120.0, 80.0));
        assert_eq!(v.len(), set.len());
        assert_eq!(v[set.len() - 1], 1.0);
    }

    #[test]
    fn test_canonical_leading_terms() {
        let set = FeatureSet::default();
        let v = set.extract(&trip(2, 10.0, 100.0));
        assert_eq!(v[0], 2.0);
        assert_eq!(v[1], 10.0);
        assert_eq!(v[2], 100.0);
        assert_eq!(v[3], 4.0);
        assert_eq!(v[6], 8.0);
        // receipts^3 / 1e6
        assert!((v[8] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_extraction_is_bit_identical() {
        let set = FeatureSet::default();
        let t = trip(8, 795.0, 1645.99);
        let a = set.extract(&t);
        let b = set.extract(&t);
        let bits_a: Vec<u64> = a.iter().map(|x| x.to_bits()).collect();
        let bits_b: Vec<u64> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_zero_inputs_are_finite() {
        let set = FeatureSet::default();
        let v = set.extract(&trip(1, 0.0, 0.0));
        assert!(v.is_finite());
    }

    #[test]
    fn test_extreme_inputs_are_finite() {
        let set = FeatureSet::default();
        let v = set.extract(&trip(365, 1.0e5, 1.0e5));
        assert!(v.is_finite());
    }

    #[test]
    fn test_extract_raw_validates() {
        let set = FeatureSet::default();
        assert!(set.extract_raw(0, 10.0, 10.0).is_err());
        assert!(set.extract_raw(1, -1.0, 10.0).is_err());
        assert!(set.extract_raw(1, 10.0, 10.0).is_ok());
    }

    #[test]
    fn test_regime_indicators() {
        let set = FeatureSet::default();
        let names = set.names();
        let idx = |name: &str| names.iter().position(|n| n == name).expect(name);

        let single = set.extract(&trip(1, 50.0, 20.0));
        assert_eq!(single[idx("[single_day]")], 1.0);
        assert_eq!(single[idx("[long_trip]")], 0.0);

        let sweet = set.extract(&trip(5, 1000.0, 700.0));
        assert_eq!(sweet[idx("[efficiency_sweet_spot]")], 1.0);
        assert_eq!(sweet[idx("[receipts_optimal]")], 1.0);
        assert_eq!(sweet[idx("[five_day]*miles")], 1000.0);
    }

    #[test]
    fn test_extract_matrix_shape() {
        let set = FeatureSet::default();
        let trips = [trip(1, 10.0, 5.0), trip(2, 20.0, 6.0), trip(3, 30.0, 7.0)];
        let m = set.extract_matrix(trips.iter()).expect("uniform width");
        assert_eq!(m.shape(), (3, set.len()));
        assert_eq!(m.rows().nth(2), Some(set.extract(&trips[2]).as_slice()));

        let empty = set.extract_matrix(std::iter::empty::<&Trip>()).expect("no rows");
        assert_eq!(empty.shape(), (0, set.len()));
    }

    #[test]
    fn test_new_rejects_bad_exponent() {
        let err = FeatureSet::new(vec![Feature::power(Variable::Days, 0)]).expect_err("exponent 0");
        assert!(err.to_string().contains("features[0]"));
        assert!(FeatureSet::new(vec![Feature::power(Variable::Days, 2)]).is_ok());
    }

    #[test]
    fn test_custom_set_serde_roundtrip() {
        let set = FeatureSet::new(vec![
            Feature::log(Variable::Receipts),
            Feature::product(&[(Variable::Days, 2), (Variable::Receipts, 1)]),
        ])
        .expect("valid");
        let json = serde_json::to_string(&set).expect("serialize");
        let back: FeatureSet = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, set);
        assert_eq!(back.len(), 3);
    }
}
