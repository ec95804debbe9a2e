//! Held-out validation for engine configurations.
//!
//! This module provides tools for:
//! - Train/test splitting of a [`TrainingSet`]
//! - K-Fold index generation
//! - Cross-validation that builds an [`Engine`] per fold and scores it on
//!   the held-out cases

use crate::config::EngineConfig;
use crate::data::TrainingSet;
use crate::diagnostics::DiagnosticSink;
use crate::engine::Engine;
use crate::error::{ReimburseError, Result};
use crate::metrics::Evaluation;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Results from cross-validation, one evaluation per fold.
#[derive(Debug, Clone)]
pub struct CrossValidationResult {
    /// Held-out evaluation for each fold.
    pub folds: Vec<Evaluation>,
}

impl CrossValidationResult {
    /// Mean held-out MAE across folds.
    #[must_use]
    pub fn mean_mae(&self) -> f64 {
        mean(self.folds.iter().map(|f| f.mae))
    }

    /// Standard deviation of the held-out MAE.
    #[must_use]
    pub fn std_mae(&self) -> f64 {
        if self.folds.is_empty() {
            return 0.0;
        }
        let m = self.mean_mae();
        let variance = self.folds.iter().map(|f| (f.mae - m).powi(2)).sum::<f64>()
            / self.folds.len() as f64;
        variance.sqrt()
    }

    /// Mean held-out score across folds.
    #[must_use]
    pub fn mean_score(&self) -> f64 {
        mean(self.folds.iter().map(|f| f.score))
    }

    /// Held-out exact matches summed over folds.
    #[must_use]
    pub fn exact_matches(&self) -> usize {
        self.folds.iter().map(|f| f.exact_matches).sum()
    }

    /// Held-out cases summed over folds.
    #[must_use]
    pub fn total_cases(&self) -> usize {
        self.folds.iter().map(|f| f.n).sum()
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Builds an engine on each training fold and evaluates it on the matching
/// held-out fold.
///
/// # Example
///
/// ```rust,no_run
/// use reimburse::config::EngineConfig;
/// use reimburse::data::TrainingSet;
/// use reimburse::diagnostics::SilentSink;
/// use reimburse::model_selection::{cross_validate, KFold};
///
/// let data = TrainingSet::load_json("public_cases.json").expect("readable cases");
/// let cv = KFold::new(5).with_random_state(42);
/// let result = cross_validate(&data, &EngineConfig::default(), &cv, &SilentSink)
///     .expect("valid folds");
/// println!("held-out MAE: {:.2} ± {:.2}", result.mean_mae(), result.std_mae());
/// ```
///
/// # Errors
///
/// Returns [`ReimburseError::InvalidHyperparameter`] if the splitter asks for
/// fewer than 2 folds or more folds than examples, and any error from
/// [`Engine::build`].
pub fn cross_validate(
    data: &TrainingSet,
    config: &EngineConfig,
    cv: &KFold,
    sink: &dyn DiagnosticSink,
) -> Result<CrossValidationResult> {
    cv.validate(data.len())?;

    let mut folds = Vec::with_capacity(cv.n_splits());
    for (train_idx, test_idx) in cv.split(data.len()) {
        let train = data.subset(&train_idx)?;
        let test = data.subset(&test_idx)?;
        let engine = Engine::build(&train, config.clone(), sink)?;
        folds.push(Evaluation::evaluate(&engine, &test, 0));
    }

    Ok(CrossValidationResult { folds })
}

/// K-Fold cross-validator.
///
/// Splits indices into K consecutive folds. Each fold is used once as test
/// set while the remaining K-1 folds form the training set.
///
/// ```rust
/// use reimburse::model_selection::KFold;
///
/// let kfold = KFold::new(5);
/// for (train_idx, test_idx) in kfold.split(10) {
///     assert_eq!(train_idx.len(), 8);
///     assert_eq!(test_idx.len(), 2);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl KFold {
    /// Create a new K-Fold cross-validator. `n_splits` must be at least 2.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Enable shuffling before splitting into folds.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducible shuffling. Implies shuffling.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self.shuffle = true;
        self
    }

    /// Number of folds.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Checks that `n_samples` can be split into non-empty folds.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] naming `cv.n_splits`.
    pub fn validate(&self, n_samples: usize) -> Result<()> {
        if self.n_splits < 2 || self.n_splits > n_samples {
            return Err(ReimburseError::hyperparameter(
                "cv.n_splits",
                self.n_splits,
                &format!("between 2 and the number of examples ({n_samples})"),
            ));
        }
        Ok(())
    }

    /// Generate `(train_indices, test_indices)` for each fold.
    ///
    /// The first `n_samples % n_splits` folds get one extra test index.
    #[must_use]
    pub fn split(&self, n_samples: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let indices = if self.shuffle {
            shuffle_indices(n_samples, self.random_state)
        } else {
            (0..n_samples).collect()
        };

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut result = Vec::with_capacity(self.n_splits);
        let mut start = 0;

        for i in 0..self.n_splits {
            let end = start + fold_size + usize::from(i < remainder);

            let test: Vec<usize> = indices[start..end].to_vec();
            let mut train = Vec::with_capacity(n_samples - test.len());
            train.extend_from_slice(&indices[..start]);
            train.extend_from_slice(&indices[end..]);

            result.push((train, test));
            start = end;
        }

        result
    }
}

/// Shuffles indices with optional random seed.
fn shuffle_indices(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n_samples).collect();

    if let Some(seed) = random_state {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    } else {
        let mut rng = rand::thread_rng();
        indices.shuffle(&mut rng);
    }

    indices
}

/// Split a training set into random train and test subsets.
///
/// `test_size` is the held-out proportion, strictly between 0 and 1.
///
/// # Errors
///
/// Returns [`ReimburseError::InvalidHyperparameter`] for a bad `test_size`
/// and [`ReimburseError::TrainingData`] if either side would be empty.
pub fn train_test_split(
    data: &TrainingSet,
    test_size: f64,
    random_state: Option<u64>,
) -> Result<(TrainingSet, TrainingSet)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ReimburseError::hyperparameter(
            "test_size",
            test_size,
            "between 0 and 1",
        ));
    }

    let n_samples = data.len();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_test = (n_samples as f64 * test_size).round() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(ReimburseError::training_data(format!(
            "split would leave an empty side (n_train={n_train}, n_test={n_test})"
        )));
    }

    let indices = shuffle_indices(n_samples, random_state);
    let train = data.subset(&indices[..n_train])?;
    let test = data.subset(&indices[n_train..])?;
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TrainingExample, Trip};
    use crate::diagnostics::SilentSink;
    use crate::neighbors::{KnnConfig, SimilarityMetric};
    use crate::optim::TrainerConfig;

    fn data(n: usize) -> TrainingSet {
        let examples = (0..n)
            .map(|i| {
                let days = (i % 7 + 1) as i64;
                let miles = (i * 37 % 500) as f64;
                let receipts = (i * 53 % 900) as f64;
                let expected = 100.0 * days as f64 + 0.5 * miles + 0.3 * receipts;
                TrainingExample::new(Trip::new(days, miles, receipts).expect("valid"), expected)
                    .expect("finite")
            })
            .collect();
        TrainingSet::new(examples).expect("non-empty")
    }

    #[test]
    fn test_kfold_covers_every_index_once() {
        let splits = KFold::new(3).split(10);
        assert_eq!(splits.len(), 3);
        let sizes: Vec<usize> = splits.iter().map(|(_, t)| t.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut seen: Vec<usize> = splits.iter().flat_map(|(_, t)| t.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for (train, test) in &splits {
            assert_eq!(train.len() + test.len(), 10);
            assert!(test.iter().all(|i| !train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_seeded_shuffle_is_reproducible() {
        let a = KFold::new(4).with_random_state(7).split(20);
        let b = KFold::new(4).with_random_state(7).split(20);
        assert_eq!(a, b);
        let unshuffled = KFold::new(4).split(20);
        assert_ne!(a, unshuffled);
    }

    #[test]
    fn test_kfold_validate() {
        assert!(KFold::new(1).validate(10).is_err());
        assert!(KFold::new(11).validate(10).is_err());
        assert!(KFold::new(10).validate(10).is_ok());
    }

    #[test]
    fn test_train_test_split_sizes() {
        let (train, test) = train_test_split(&data(10), 0.2, Some(42)).expect("split");
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
    }

    #[test]
    fn test_train_test_split_reproducible() {
        let d = data(12);
        let (a, _) = train_test_split(&d, 0.25, Some(1)).expect("split");
        let (b, _) = train_test_split(&d, 0.25, Some(1)).expect("split");
        assert_eq!(a.targets(), b.targets());
    }

    #[test]
    fn test_train_test_split_rejects_bad_sizes() {
        assert!(train_test_split(&data(10), 0.0, None).is_err());
        assert!(train_test_split(&data(10), 1.0, None).is_err());
        assert!(train_test_split(&data(2), 0.1, None).is_err());
    }

    #[test]
    fn test_cross_validate_builds_each_fold() {
        let config = EngineConfig::default()
            .with_trainer(TrainerConfig::default().with_max_iterations(50))
            .with_knn(KnnConfig::single(SimilarityMetric::Euclidean, 3));
        let result =
            cross_validate(&data(30), &config, &KFold::new(3).with_random_state(3), &SilentSink)
                .expect("cross-validate");
        assert_eq!(result.folds.len(), 3);
        assert_eq!(result.total_cases(), 30);
        assert!(result.mean_mae().is_finite());
        assert!(result.std_mae() >= 0.0);
        assert!(result.mean_score() >= 0.0);
        assert!(result.exact_matches() <= 30);
    }

    #[test]
    fn test_cross_validate_rejects_too_many_folds() {
        let err = cross_validate(&data(4), &EngineConfig::default(), &KFold::new(5), &SilentSink)
            .expect_err("5 folds over 4 cases");
        assert!(err.to_string().contains("cv.n_splits"));
    }
}
