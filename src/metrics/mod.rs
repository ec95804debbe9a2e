//! Evaluation metrics for reimbursement predictors.
//!
//! Regression metrics (MAE, MSE, RMSE, R²) over prediction vectors, and an
//! [`Evaluation`] summary that scores a [`Predictor`] against a labeled set
//! the way the public test harness does: exact matches within one cent,
//! close matches within one dollar, and
//!
//! ```text
//! score = MAE * 100 + (n - exact) * 0.1      (lower is better)
//! ```

use crate::data::{TrainingSet, Trip};
use crate::primitives::Vector;
use crate::traits::Predictor;
use serde::Serialize;

/// Absolute error below which a prediction counts as exact.
pub const EXACT_TOLERANCE: f64 = 0.01;

/// Absolute error below which a prediction counts as close.
pub const CLOSE_TOLERANCE: f64 = 1.0;

/// Computes the coefficient of determination (R²).
///
/// Returns 0 when the targets have zero variance.
///
/// # Examples
///
/// ```
/// use reimburse::metrics::r_squared;
/// use reimburse::primitives::Vector;
///
/// let y_true = Vector::from_slice(&[3.0, -0.5, 2.0, 7.0]);
/// let y_pred = Vector::from_slice(&[2.5, 0.0, 2.0, 8.0]);
/// assert!(r_squared(&y_pred, &y_true) > 0.9);
/// ```
///
/// # Panics
///
/// Panics if vectors have different lengths.
#[must_use]
pub fn r_squared(y_pred: &Vector<f64>, y_true: &Vector<f64>) -> f64 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");

    let y_mean = y_true.mean();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}

/// Computes the Mean Squared Error (MSE).
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn mse(y_pred: &Vector<f64>, y_true: &Vector<f64>) -> f64 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Computes the Root Mean Squared Error.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn rmse(y_pred: &Vector<f64>, y_true: &Vector<f64>) -> f64 {
    mse(y_pred, y_true).sqrt()
}

/// Computes the Mean Absolute Error (MAE).
///
/// ```
/// use reimburse::metrics::mae;
/// use reimburse::primitives::Vector;
///
/// let y_true = Vector::from_slice(&[1.0, 2.0]);
/// let y_pred = Vector::from_slice(&[2.0, 4.0]);
/// assert_eq!(mae(&y_pred, &y_true), 1.5);
/// ```
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn mae(y_pred: &Vector<f64>, y_true: &Vector<f64>) -> f64 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// One evaluated case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaseError {
    /// Position in the evaluated set.
    pub index: usize,
    /// Input.
    pub trip: Trip,
    /// Labeled amount.
    pub expected: f64,
    /// Predicted amount.
    pub predicted: f64,
    /// `|predicted - expected|`.
    pub error: f64,
}

/// Accuracy summary of a predictor over a labeled set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Cases evaluated.
    pub n: usize,
    /// Cases within [`EXACT_TOLERANCE`].
    pub exact_matches: usize,
    /// Cases within [`CLOSE_TOLERANCE`].
    pub close_matches: usize,
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Largest absolute error.
    pub max_error: f64,
    /// `mae * 100 + (n - exact) * 0.1`; lower is better.
    pub score: f64,
    /// Largest errors, worst first.
    pub worst: Vec<CaseError>,
}

impl Evaluation {
    /// Predicts every example and summarizes the errors, keeping the
    /// `worst_n` largest.
    #[must_use]
    pub fn evaluate<P: Predictor + ?Sized>(predictor: &P, data: &TrainingSet, worst_n: usize) -> Self {
        let trips: Vec<Trip> = data.iter().map(|ex| *ex.trip()).collect();
        let predicted = predictor.predict_all(&trips);
        Self::from_predictions(data, &predicted, worst_n)
    }

    /// Summarizes precomputed predictions aligned with `data`.
    ///
    /// # Panics
    ///
    /// Panics if `predicted` and `data` differ in length.
    #[must_use]
    pub fn from_predictions(data: &TrainingSet, predicted: &[f64], worst_n: usize) -> Self {
        assert_eq!(predicted.len(), data.len(), "one prediction per example");

        let mut cases: Vec<CaseError> = data
            .iter()
            .zip(predicted)
            .enumerate()
            .map(|(index, (ex, &p))| CaseError {
                index,
                trip: *ex.trip(),
                expected: ex.expected(),
                predicted: p,
                error: (p - ex.expected()).abs(),
            })
            .collect();

        let n = cases.len();
        let exact_matches = cases.iter().filter(|c| c.error < EXACT_TOLERANCE).count();
        let close_matches = cases.iter().filter(|c| c.error < CLOSE_TOLERANCE).count();

        let y_pred = Vector::from_slice(predicted);
        let y_true = Vector::from_vec(data.targets());
        let mae = mae(&y_pred, &y_true);
        let rmse = rmse(&y_pred, &y_true);
        let max_error = cases.iter().map(|c| c.error).fold(0.0, f64::max);
        let score = mae * 100.0 + (n - exact_matches) as f64 * 0.1;

        cases.sort_by(|a, b| b.error.total_cmp(&a.error));
        cases.truncate(worst_n);

        Self {
            n,
            exact_matches,
            close_matches,
            mae,
            rmse,
            max_error,
            score,
            worst: cases,
        }
    }

    /// Share of exact matches in percent.
    #[must_use]
    pub fn exact_pct(&self) -> f64 {
        100.0 * self.exact_matches as f64 / self.n as f64
    }

    /// Share of close matches in percent.
    #[must_use]
    pub fn close_pct(&self) -> f64 {
        100.0 * self.close_matches as f64 / self.n as f64
    }
}
