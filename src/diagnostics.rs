//! Injectable diagnostics for the build phase.
//!
//! Training code never prints directly. It emits typed [`DiagnosticEvent`]s
//! to a [`DiagnosticSink`] chosen by the caller, so a CLI can stream progress
//! to stderr, a library user can stay silent, and tests can record events.
//!
//! # Example
//!
//! ```
//! use reimburse::diagnostics::{DiagnosticEvent, DiagnosticSink, RecordingSink, Verbosity};
//!
//! let sink = RecordingSink::new(Verbosity::Verbose);
//! sink.emit(&DiagnosticEvent::BuildStarted { examples: 3 });
//! assert_eq!(sink.events().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// How much a sink wants to hear. Ordered from least to most chatty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Nothing.
    Quiet,
    /// Phase boundaries and recovered numeric problems.
    #[default]
    Normal,
    /// Also periodic training progress.
    Verbose,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiet => write!(f, "QUIET"),
            Self::Normal => write!(f, "INFO"),
            Self::Verbose => write!(f, "DEBUG"),
        }
    }
}

/// Something worth reporting while building an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// Build phase started.
    BuildStarted {
        /// Number of training examples.
        examples: usize,
    },
    /// Feature matrix extracted and normalized.
    FeaturesExtracted {
        /// Rows.
        rows: usize,
        /// Columns, bias included.
        cols: usize,
        /// Features whose zero variance was replaced by 1.
        constant_features: usize,
    },
    /// Periodic gradient-descent progress.
    TrainingProgress {
        /// Iteration index.
        iteration: usize,
        /// Mean squared error at this iteration.
        mse: f64,
        /// Learning rate used for this iteration.
        learning_rate: f64,
    },
    /// Loss stopped improving for the patience window.
    EarlyStopped {
        /// Iteration at which training stopped.
        iteration: usize,
        /// Best mean squared error seen.
        best_mse: f64,
    },
    /// Loss became NaN or infinite; best coefficients were kept.
    NonFiniteLoss {
        /// Iteration at which it happened.
        iteration: usize,
    },
    /// Gradient descent finished.
    TrainingFinished {
        /// Iterations run.
        iterations: usize,
        /// Best mean squared error.
        best_mse: f64,
    },
    /// Lookup table aggregated.
    LookupBuilt {
        /// Covered categories.
        covered: usize,
        /// Total possible categories.
        total: usize,
    },
    /// Build phase finished.
    BuildFinished,
}

impl DiagnosticEvent {
    /// The least verbose level at which this event is shown.
    #[must_use]
    pub fn level(&self) -> Verbosity {
        match self {
            Self::TrainingProgress { .. } | Self::FeaturesExtracted { .. } => Verbosity::Verbose,
            _ => Verbosity::Normal,
        }
    }
}

impl std::fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildStarted { examples } => {
                write!(f, "building engine from {examples} examples")
            }
            Self::FeaturesExtracted {
                rows,
                cols,
                constant_features,
            } => write!(
                f,
                "feature matrix {rows}x{cols} ({constant_features} constant features)"
            ),
            Self::TrainingProgress {
                iteration,
                mse,
                learning_rate,
            } => write!(
                f,
                "iteration {iteration}: mse = {mse:.4}, lr = {learning_rate:.6}"
            ),
            Self::EarlyStopped {
                iteration,
                best_mse,
            } => write!(
                f,
                "early stop at iteration {iteration}, best mse = {best_mse:.4}"
            ),
            Self::NonFiniteLoss { iteration } => write!(
                f,
                "non-finite loss at iteration {iteration}, keeping best coefficients"
            ),
            Self::TrainingFinished {
                iterations,
                best_mse,
            } => write!(
                f,
                "training finished after {iterations} iterations, best mse = {best_mse:.4}"
            ),
            Self::LookupBuilt { covered, total } => {
                write!(f, "lookup table covers {covered}/{total} categories")
            }
            Self::BuildFinished => write!(f, "engine ready"),
        }
    }
}

/// Receiver of diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    /// Maximum level this sink accepts.
    fn verbosity(&self) -> Verbosity;

    /// Handles an event that passed the verbosity filter.
    fn on_event(&self, event: &DiagnosticEvent);

    /// Filters by verbosity then forwards to [`DiagnosticSink::on_event`].
    fn emit(&self, event: &DiagnosticEvent) {
        if self.verbosity() != Verbosity::Quiet && event.level() <= self.verbosity() {
            self.on_event(event);
        }
    }
}

/// Writes `[LEVEL] message` lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink {
    verbosity: Verbosity,
}

impl StderrSink {
    /// Creates a stderr sink at the given verbosity.
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl DiagnosticSink for StderrSink {
    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn on_event(&self, event: &DiagnosticEvent) {
        eprintln!("[{}] {event}", event.level());
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl DiagnosticSink for SilentSink {
    fn verbosity(&self) -> Verbosity {
        Verbosity::Quiet
    }

    fn on_event(&self, _event: &DiagnosticEvent) {}
}

/// Collects events in memory; used by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    verbosity: Verbosity,
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    /// Creates a recording sink at the given verbosity.
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of recorded events.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .expect("RecordingSink mutex poisoned")
            .clone()
    }

    /// Number of recorded events matching `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&DiagnosticEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn on_event(&self, event: &DiagnosticEvent) {
        self.events
            .lock()
            .expect("RecordingSink mutex poisoned")
            .push(event.clone());
    }
}
