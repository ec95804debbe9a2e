//! Feature standardization.
//!
//! [`Normalizer`] computes per-feature population mean and standard deviation
//! over a feature matrix whose last column is the bias term. The resulting
//! [`NormalizationParams`] are immutable and are the only thing used at
//! prediction time; nothing is ever refitted on prediction inputs.
//!
//! # Example
//!
//! ```
//! use reimburse::preprocessing::Normalizer;
//! use reimburse::primitives::{Matrix, Vector};
//!
//! // two features + bias column
//! let x = Matrix::from_vec(3, 3, vec![
//!     1.0, 10.0, 1.0,
//!     2.0, 10.0, 1.0,
//!     3.0, 10.0, 1.0,
//! ]).expect("valid matrix dimensions");
//!
//! let params = Normalizer::new().fit(&x).expect("fit should succeed");
//! // the constant second feature gets std = 1
//! assert_eq!(params.stds()[1], 1.0);
//!
//! let z = params.apply(&Vector::from_slice(&[2.0, 10.0, 1.0])).expect("same width");
//! assert!(z[0].abs() < 1e-12);
//! assert_eq!(z[2], 1.0);
//! ```

use crate::error::{ReimburseError, Result};
use crate::primitives::{Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Relative tolerance below which a standard deviation counts as zero.
pub const ZERO_VARIANCE_TOLERANCE: f64 = 1e-9;

/// Fits [`NormalizationParams`] from training features.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    /// Stds at or below `tolerance * max(|mean|, 1)` are replaced by 1.
    tolerance: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Creates a normalizer with the default zero-variance tolerance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tolerance: ZERO_VARIANCE_TOLERANCE,
        }
    }

    /// Sets the relative zero-variance tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Computes mean and population std of every column except the last (bias).
    ///
    /// Zero std (up to rounding noise) is replaced by 1, so constant
    /// features pass through as `x - mean = 0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` has no rows or no non-bias columns.
    pub fn fit(&self, x: &Matrix<f64>) -> Result<NormalizationParams> {
        let (n_samples, n_cols) = x.shape();

        if n_samples == 0 {
            return Err(ReimburseError::training_data(
                "cannot normalize zero samples",
            ));
        }
        if n_cols < 2 {
            return Err(ReimburseError::dimension_mismatch("columns (>= 2)", 2, n_cols));
        }

        let n_features = n_cols - 1;
        let n = n_samples as f64;

        let mut means = vec![0.0; n_features];
        for row in x.rows() {
            for (mean_j, &v) in means.iter_mut().zip(row) {
                *mean_j += v;
            }
        }
        for mean_j in &mut means {
            *mean_j /= n;
        }

        let mut stds = vec![0.0; n_features];
        for row in x.rows() {
            for ((std_j, &v), &mean_j) in stds.iter_mut().zip(row).zip(&means) {
                let diff = v - mean_j;
                *std_j += diff * diff;
            }
        }
        for (std_j, &mean_j) in stds.iter_mut().zip(&means) {
            // population std (divide by n, not n-1)
            let std = (*std_j / n).sqrt();
            *std_j = if std.is_finite() && std > self.tolerance * mean_j.abs().max(1.0) {
                std
            } else {
                1.0
            };
        }

        Ok(NormalizationParams { means, stds })
    }
}

/// Frozen per-feature means and standard deviations (bias excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl NormalizationParams {
    /// Builds params from explicit values.
    ///
    /// # Errors
    ///
    /// Returns an error if lengths differ or a std is not finite and positive.
    pub fn new(means: Vec<f64>, stds: Vec<f64>) -> Result<Self> {
        if means.len() != stds.len() {
            return Err(ReimburseError::dimension_mismatch(
                "stds",
                means.len(),
                stds.len(),
            ));
        }
        if let Some(bad) = stds.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(ReimburseError::hyperparameter(
                "std",
                bad,
                "finite and > 0",
            ));
        }
        Ok(Self { means, stds })
    }

    /// Per-feature means.
    #[must_use]
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Per-feature standard deviations (never zero).
    #[must_use]
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    /// Expected vector length, bias included.
    #[must_use]
    pub fn width(&self) -> usize {
        self.means.len() + 1
    }

    /// Number of features with a unit std; every constant feature is among them.
    #[must_use]
    pub fn count_unit_stds(&self) -> usize {
        self.stds.iter().filter(|&&s| s == 1.0).count()
    }

    fn check_width(&self, len: usize) -> Result<()> {
        if len == self.width() {
            Ok(())
        } else {
            Err(ReimburseError::dimension_mismatch(
                "feature vector",
                self.width(),
                len,
            ))
        }
    }

    /// `(x - mean) / std` elementwise; the trailing bias passes through.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector width doesn't match.
    pub fn apply(&self, x: &Vector<f64>) -> Result<Vector<f64>> {
        self.check_width(x.len())?;
        Ok(self.apply_slice(x.as_slice()))
    }

    fn apply_slice(&self, x: &[f64]) -> Vector<f64> {
        let bias = x[self.means.len()];
        x.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .chain(std::iter::once(bias))
            .collect()
    }

    /// Inverse of [`NormalizationParams::apply`]: `z * std + mean`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector width doesn't match.
    pub fn inverse(&self, z: &Vector<f64>) -> Result<Vector<f64>> {
        self.check_width(z.len())?;
        let bias = z[self.means.len()];
        Ok(z.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&m, &s))| v * s + m)
            .chain(std::iter::once(bias))
            .collect())
    }

    /// Applies normalization to every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix width doesn't match.
    pub fn apply_matrix(&self, x: &Matrix<f64>) -> Result<Matrix<f64>> {
        self.check_width(x.n_cols())?;
        let data: Vec<f64> = x
            .rows()
            .flat_map(|row| self.apply_slice(row).into_vec())
            .collect();
        Matrix::from_vec(x.n_rows(), x.n_cols(), data).map_err(Into::into)
    }
}
