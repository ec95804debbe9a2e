//! Core compute primitives (Vector, Matrix) and cent rounding.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;

/// Rounds a currency amount to two decimal places (half away from zero).
///
/// ```
/// use reimburse::primitives::round_cents;
///
/// assert_eq!(round_cents(12.345_1), 12.35);
/// assert_eq!(round_cents(-0.004), -0.0);
/// ```
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Smallest whole-cent amount `>= value`.
#[must_use]
pub fn ceil_cents(value: f64) -> f64 {
    let cents = (value * 100.0).round();
    if cents / 100.0 < value {
        (cents + 1.0) / 100.0
    } else {
        cents / 100.0
    }
}

/// Largest whole-cent amount `<= value`.
#[must_use]
pub fn floor_cents(value: f64) -> f64 {
    let cents = (value * 100.0).round();
    if cents / 100.0 > value {
        (cents - 1.0) / 100.0
    } else {
        cents / 100.0
    }
}
