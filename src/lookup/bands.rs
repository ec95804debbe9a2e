//! Threshold bands and category keys.

use crate::data::Trip;
use crate::error::{ReimburseError, Result};
use serde::{Deserialize, Serialize};

/// Non-overlapping bands defined by ascending edges.
///
/// `n` edges give `n + 1` bands: `(-∞, e0)`, `[e0, e1)`, …, `[e_{n-1}, ∞)`.
///
/// ```
/// use reimburse::lookup::Bands;
///
/// let days = Bands::days();
/// assert_eq!(days.index(1.0), 0);
/// assert_eq!(days.index(3.0), 1);
/// assert_eq!(days.index(14.0), 4);
/// assert_eq!(days.label(2), "4-6");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    /// Ascending lower edges of every band but the first.
    pub edges: Vec<f64>,
    /// One label per band.
    pub labels: Vec<String>,
}

impl Bands {
    /// Builds bands from edges and labels.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] if edges are not
    /// strictly increasing and finite, or there isn't exactly one more label
    /// than edges.
    pub fn new(edges: Vec<f64>, labels: Vec<&str>) -> Result<Self> {
        let bands = Self {
            edges,
            labels: labels.into_iter().map(str::to_string).collect(),
        };
        bands.validate("bands")?;
        Ok(bands)
    }

    /// Trip-length bands: 1 / 2-3 / 4-6 / 7-13 / 14+.
    #[must_use]
    pub fn days() -> Self {
        Self::fixed(&[2.0, 4.0, 7.0, 14.0], &["1", "2-3", "4-6", "7-13", "14+"])
    }

    /// Mileage bands: 0-99 / 100-299 / 300-599 / 600-999 / 1000+.
    #[must_use]
    pub fn miles() -> Self {
        Self::fixed(
            &[100.0, 300.0, 600.0, 1000.0],
            &["0-99", "100-299", "300-599", "600-999", "1000+"],
        )
    }

    /// Receipt bands: 0-99 / 100-499 / 500-999 / 1000-1499 / 1500+.
    #[must_use]
    pub fn receipts() -> Self {
        Self::fixed(
            &[100.0, 500.0, 1000.0, 1500.0],
            &["0-99", "100-499", "500-999", "1000-1499", "1500+"],
        )
    }

    fn fixed(edges: &[f64], labels: &[&str]) -> Self {
        Self {
            edges: edges.to_vec(),
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Number of bands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len() + 1
    }

    /// Never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Band index of `x`.
    #[must_use]
    pub fn index(&self, x: f64) -> usize {
        self.edges.iter().take_while(|&&e| x >= e).count()
    }

    /// Label of band `idx`, or `"?"` when out of range.
    #[must_use]
    pub fn label(&self, idx: usize) -> &str {
        self.labels.get(idx).map_or("?", String::as_str)
    }

    pub(crate) fn validate(&self, param: &str) -> Result<()> {
        if !self.edges.iter().all(|e| e.is_finite())
            || !self.edges.windows(2).all(|w| w[0] < w[1])
        {
            return Err(ReimburseError::hyperparameter(
                &format!("{param}.edges"),
                format!("{:?}", self.edges),
                "finite and strictly increasing",
            ));
        }
        if self.labels.len() != self.len() {
            return Err(ReimburseError::hyperparameter(
                &format!("{param}.labels"),
                self.labels.len(),
                &format!("exactly {} labels", self.len()),
            ));
        }
        Ok(())
    }
}

/// The three band dimensions used to categorize a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandScheme {
    /// Trip-length bands.
    pub days: Bands,
    /// Mileage bands.
    pub miles: Bands,
    /// Receipt bands.
    pub receipts: Bands,
}

impl Default for BandScheme {
    fn default() -> Self {
        Self {
            days: Bands::days(),
            miles: Bands::miles(),
            receipts: Bands::receipts(),
        }
    }
}

impl BandScheme {
    /// Category of `trip`.
    #[must_use]
    pub fn categorize(&self, trip: &Trip) -> CategoryKey {
        CategoryKey {
            days: self.days.index(trip.days_f64()),
            miles: self.miles.index(trip.miles()),
            receipts: self.receipts.index(trip.receipts()),
        }
    }

    /// Number of possible categories.
    #[must_use]
    pub fn total(&self) -> usize {
        self.days.len() * self.miles.len() * self.receipts.len()
    }

    /// Human-readable form of `key`, e.g. `7-13d/600-999mi/$1500+`.
    #[must_use]
    pub fn describe(&self, key: &CategoryKey) -> String {
        format!(
            "{}d/{}mi/${}",
            self.days.label(key.days),
            self.miles.label(key.miles),
            self.receipts.label(key.receipts)
        )
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.days.validate("lookup.bands.days")?;
        self.miles.validate("lookup.bands.miles")?;
        self.receipts.validate("lookup.bands.receipts")
    }
}

/// Band indices of a trip along each dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    /// Trip-length band.
    pub days: usize,
    /// Mileage band.
    pub miles: usize,
    /// Receipt band.
    pub receipts: usize,
}
