//! Core traits shared by every predictor.
//!
//! All predictors are built once and are read-only afterwards, so the trait
//! takes `&self` and requires `Send + Sync`: a built predictor can be shared
//! across threads without locking.

use crate::data::Trip;

/// A trained, immutable estimator of the reimbursement amount.
///
/// Implementations receive an already validated [`Trip`] and must return a
/// finite amount rounded to cents.
///
/// # Examples
///
/// ```
/// use reimburse::data::Trip;
/// use reimburse::traits::Predictor;
///
/// struct PerDiem(f64);
///
/// impl Predictor for PerDiem {
///     fn predict(&self, trip: &Trip) -> f64 {
///         self.0 * trip.days_f64()
///     }
/// }
///
/// let trip = Trip::new(3, 0.0, 0.0).expect("valid trip");
/// assert_eq!(PerDiem(100.0).predict(&trip), 300.0);
/// ```
pub trait Predictor: Send + Sync {
    /// Estimated amount for `trip`.
    fn predict(&self, trip: &Trip) -> f64;

    /// Predicts every trip in order.
    fn predict_all(&self, trips: &[Trip]) -> Vec<f64> {
        trips.iter().map(|t| self.predict(t)).collect()
    }
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, trip: &Trip) -> f64 {
        (**self).predict(trip)
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, trip: &Trip) -> f64 {
        (**self).predict(trip)
    }
}
