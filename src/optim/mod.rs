//! Batch gradient descent for squared-error linear models.
//!
//! [`GradientDescent`] fits coefficients over a normalized design matrix
//! whose last column is the bias. Every iteration uses the full batch, so
//! the result depends only on the inputs and the configuration: there is no
//! sampling and no randomness.
//!
//! # Update Rule
//!
//! ```text
//! lr_t   = lr_0 * decay^t
//! g      = (2/n) Xᵀ (X w - y) + 2 λ w      (λ term skipped for the bias)
//! w_t+1  = w_t - clip(lr_t * g, -c, c)
//! ```
//!
//! The best (lowest-MSE) coefficients seen are tracked; after `patience`
//! iterations without improvement, or on a non-finite loss, training stops
//! and returns them rather than the current iterate.
//!
//! # Example
//!
//! ```
//! use reimburse::diagnostics::SilentSink;
//! use reimburse::optim::{GradientDescent, TrainerConfig};
//! use reimburse::primitives::Matrix;
//!
//! // one standardized feature + bias, y = 2z + 10
//! let x = Matrix::from_vec(4, 2, vec![-1.5, 1.0, -0.5, 1.0, 0.5, 1.0, 1.5, 1.0]).expect("4x2");
//! let y = [7.0, 9.0, 11.0, 13.0];
//!
//! let trainer = GradientDescent::new(TrainerConfig::default().with_l2(0.0));
//! let report = trainer.train(&x, &y, &SilentSink).expect("valid shapes");
//! assert!((report.coefficients[0] - 2.0).abs() < 1e-3);
//! assert!((report.coefficients[1] - 10.0).abs() < 1e-3);
//! ```

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::{ReimburseError, Result};
use crate::primitives::{Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Gradient-descent hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Iteration budget.
    pub max_iterations: usize,
    /// Initial learning rate.
    pub learning_rate: f64,
    /// Per-iteration geometric decay factor, in (0, 1].
    pub decay: f64,
    /// L2 penalty on non-bias coefficients.
    pub l2: f64,
    /// Per-coefficient bound on a single update.
    pub clip: f64,
    /// Iterations without improvement before stopping.
    pub patience: usize,
    /// Minimum MSE decrease that counts as an improvement.
    pub min_improvement: f64,
    /// Emit a progress event every this many iterations (0 disables).
    pub progress_every: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            learning_rate: 0.01,
            decay: 0.9995,
            l2: 0.001,
            clip: 10.0,
            patience: 250,
            min_improvement: 1e-6,
            progress_every: 500,
        }
    }
}

impl TrainerConfig {
    /// Sets the iteration budget.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the initial learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the decay factor.
    #[must_use]
    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Sets the L2 penalty.
    #[must_use]
    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    /// Sets the update clip bound.
    #[must_use]
    pub fn with_clip(mut self, clip: f64) -> Self {
        self.clip = clip;
        self
    }

    /// Sets the early-stopping patience.
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Learning rate used at iteration `t`.
    #[must_use]
    pub fn learning_rate_at(&self, t: usize) -> f64 {
        self.learning_rate * self.decay.powf(t as f64)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ReimburseError::InvalidHyperparameter`] for the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ReimburseError::hyperparameter(
                "trainer.max_iterations",
                self.max_iterations,
                ">= 1",
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ReimburseError::hyperparameter(
                "trainer.learning_rate",
                self.learning_rate,
                "finite and > 0",
            ));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(ReimburseError::hyperparameter(
                "trainer.decay",
                self.decay,
                "in (0, 1]",
            ));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(ReimburseError::hyperparameter(
                "trainer.l2",
                self.l2,
                "finite and >= 0",
            ));
        }
        if !(self.clip.is_finite() && self.clip > 0.0) {
            return Err(ReimburseError::hyperparameter(
                "trainer.clip",
                self.clip,
                "finite and > 0",
            ));
        }
        if self.patience == 0 {
            return Err(ReimburseError::hyperparameter(
                "trainer.patience",
                self.patience,
                ">= 1",
            ));
        }
        if !(self.min_improvement.is_finite() && self.min_improvement >= 0.0) {
            return Err(ReimburseError::hyperparameter(
                "trainer.min_improvement",
                self.min_improvement,
                "finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// Why training stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// Ran the whole iteration budget.
    MaxIterations,
    /// No improvement within the patience window.
    EarlyStopped,
    /// Loss became NaN or infinite; best earlier coefficients were kept.
    NumericalError,
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Best coefficients seen, aligned with the design matrix columns.
    pub coefficients: Vector<f64>,
    /// MSE of `coefficients` on the training data.
    pub best_mse: f64,
    /// Iteration at which `coefficients` were recorded.
    pub best_iteration: usize,
    /// Iterations actually run.
    pub iterations: usize,
    /// Why training stopped.
    pub status: ConvergenceStatus,
}

/// Deterministic batch gradient-descent trainer.
#[derive(Debug, Clone, Default)]
pub struct GradientDescent {
    config: TrainerConfig,
}

impl GradientDescent {
    /// Creates a trainer.
    #[must_use]
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// The trainer's configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fits coefficients minimizing MSE on `(x, y)`.
    ///
    /// The last column of `x` is treated as the bias: it is exempt from L2
    /// and its coefficient starts at `mean(y)`. All other coefficients
    /// start at zero.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, zero samples, or
    /// mismatched shapes. Numeric divergence is never an error.
    pub fn train(
        &self,
        x: &Matrix<f64>,
        y: &[f64],
        sink: &dyn DiagnosticSink,
    ) -> Result<TrainingReport> {
        let cfg = &self.config;
        cfg.validate()?;

        let (n_samples, n_cols) = x.shape();
        if n_samples == 0 {
            return Err(ReimburseError::training_data("cannot train on zero samples"));
        }
        if y.len() != n_samples {
            return Err(ReimburseError::dimension_mismatch(
                "targets",
                n_samples,
                y.len(),
            ));
        }
        if n_cols == 0 {
            return Err(ReimburseError::dimension_mismatch("columns (>= 1)", 1, 0));
        }

        let n = n_samples as f64;
        let bias = n_cols - 1;
        let targets = Vector::from_slice(y);

        let mut w = Vector::zeros(n_cols);
        w[bias] = targets.mean();

        let mut best = w.clone();
        let mut best_mse = f64::INFINITY;
        let mut best_iteration = 0;
        let mut stale = 0;
        let mut iterations = 0;
        let mut status = ConvergenceStatus::MaxIterations;

        for t in 0..cfg.max_iterations {
            iterations = t + 1;
            let residual = Self::residual(x, &w, &targets)?;
            let mse = residual.iter().map(|r| r * r).sum::<f64>() / n;

            if !mse.is_finite() {
                sink.emit(&DiagnosticEvent::NonFiniteLoss { iteration: t });
                status = ConvergenceStatus::NumericalError;
                break;
            }

            if mse < best_mse - cfg.min_improvement {
                best_mse = mse;
                best.clone_from(&w);
                best_iteration = t;
                stale = 0;
            } else {
                stale += 1;
                if stale >= cfg.patience {
                    sink.emit(&DiagnosticEvent::EarlyStopped {
                        iteration: t,
                        best_mse,
                    });
                    status = ConvergenceStatus::EarlyStopped;
                    break;
                }
            }

            let lr = cfg.learning_rate_at(t);
            if cfg.progress_every > 0 && t % cfg.progress_every == 0 {
                sink.emit(&DiagnosticEvent::TrainingProgress {
                    iteration: t,
                    mse,
                    learning_rate: lr,
                });
            }

            let mut grad = x.transpose_matvec(&residual)?;
            for j in 0..n_cols {
                grad[j] *= 2.0 / n;
                if j != bias {
                    grad[j] += 2.0 * cfg.l2 * w[j];
                }
                w[j] -= (lr * grad[j]).clamp(-cfg.clip, cfg.clip);
            }
        }

        // the last update has not been scored yet
        if status == ConvergenceStatus::MaxIterations {
            let residual = Self::residual(x, &w, &targets)?;
            let mse = residual.iter().map(|r| r * r).sum::<f64>() / n;
            if mse.is_finite() && mse < best_mse {
                best_mse = mse;
                best = w;
                best_iteration = iterations;
            }
        }

        sink.emit(&DiagnosticEvent::TrainingFinished {
            iterations,
            best_mse,
        });

        Ok(TrainingReport {
            coefficients: best,
            best_mse,
            best_iteration,
            iterations,
            status,
        })
    }

    fn residual(x: &Matrix<f64>, w: &Vector<f64>, y: &Vector<f64>) -> Result<Vector<f64>> {
        let pred = x.matvec(w)?;
        Ok(pred.iter().zip(y.iter()).map(|(p, t)| p - t).collect())
    }
}
