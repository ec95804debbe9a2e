//! Matrix type for 2D numeric data.

use super::Vector;
use serde::{Deserialize, Serialize};

/// A 2D matrix of floating-point values (row-major storage).
///
/// # Examples
///
/// ```
/// use reimburse::primitives::Matrix;
///
/// let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("data length matches rows * cols");
/// assert_eq!(m.shape(), (2, 3));
/// assert_eq!(m.rows().nth(1), Some(&[4.0, 5.0, 6.0][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy> Matrix<T> {
    /// Creates a new matrix from a vector of data.
    ///
    /// # Errors
    ///
    /// Returns an error if data length doesn't match rows * cols.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, &'static str> {
        if data.len() != rows * cols {
            return Err("Data length must equal rows * cols");
        }
        Ok(Self { data, rows, cols })
    }

    /// Returns the shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks_exact panics on 0; an empty-width matrix has no row data
        let width = self.cols.max(1);
        self.data.chunks_exact(width).take(self.rows)
    }
}

impl Matrix<f64> {
    /// Matrix-vector multiplication `X v`.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn matvec(&self, vec: &Vector<f64>) -> Result<Vector<f64>, &'static str> {
        if self.cols != vec.len() {
            return Err("Matrix columns must match vector length");
        }

        Ok(self
            .rows()
            .map(|row| row.iter().zip(vec.iter()).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Transposed matrix-vector multiplication `Xᵀ v` without materializing `Xᵀ`.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn transpose_matvec(&self, vec: &Vector<f64>) -> Result<Vector<f64>, &'static str> {
        if self.rows != vec.len() {
            return Err("Matrix rows must match vector length");
        }

        let mut out = vec![0.0; self.cols];
        for (row, &scale) in self.rows().zip(vec.iter()) {
            for (acc, &x) in out.iter_mut().zip(row) {
                *acc += x * scale;
            }
        }
        Ok(Vector::from_vec(out))
    }
}
