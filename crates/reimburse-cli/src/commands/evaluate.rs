//! Evaluate command implementation

use super::{build_engine, load_cases, load_config, load_engine};
use crate::error::{CliError, Result};
use crate::output;
use reimburse::diagnostics::{StderrSink, Verbosity};
use reimburse::metrics::Evaluation;
use reimburse::model_selection::{cross_validate, CrossValidationResult, KFold};
use std::path::PathBuf;

/// What gets scored.
pub(crate) enum Mode {
    /// A saved engine against the cases.
    Saved(PathBuf),
    /// An engine built on the cases and scored on the same cases.
    InSample,
    /// K-fold held-out scoring.
    CrossValidate { k: usize, seed: u64 },
}

/// Settings shared by every mode.
pub(crate) struct Options {
    pub(crate) config: Option<PathBuf>,
    pub(crate) worst: usize,
    pub(crate) max_mae: Option<f64>,
    pub(crate) verbosity: Verbosity,
    pub(crate) json: bool,
}

/// Run the evaluate command
pub(crate) fn run(data: &std::path::Path, mode: &Mode, options: &Options) -> Result<()> {
    let cases = load_cases(data)?;

    let mae = match mode {
        Mode::Saved(path) => {
            let engine = load_engine(path)?;
            let eval = Evaluation::evaluate(&engine, &cases, options.worst);
            report(&eval, options.json)?;
            eval.mae
        }
        Mode::InSample => {
            let config = load_config(options.config.as_deref())?;
            let engine = build_engine(&cases, config, options.verbosity)?;
            let eval = Evaluation::evaluate(&engine, &cases, options.worst);
            report(&eval, options.json)?;
            eval.mae
        }
        Mode::CrossValidate { k, seed } => {
            let config = load_config(options.config.as_deref())?;
            let cv = KFold::new(*k).with_random_state(*seed);
            let result = cross_validate(&cases, &config, &cv, &StderrSink::new(options.verbosity))?;
            report_folds(&result, options.json)?;
            result.mean_mae()
        }
    };

    if let Some(max) = options.max_mae {
        if mae > max {
            return Err(CliError::EvaluationFailed(format!(
                "MAE {mae:.2} above maximum {max:.2}"
            )));
        }
        if !options.json {
            output::success(&format!("MAE {mae:.2} within {max:.2}"));
        }
    }
    Ok(())
}

fn report(eval: &Evaluation, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(eval).map_err(std::io::Error::from)?);
        return Ok(());
    }

    output::section("Evaluation");
    output::kv("Cases", eval.n);
    output::kv(
        "Exact (±$0.01)",
        format!("{} ({})", eval.exact_matches, output::percent(eval.exact_pct())),
    );
    output::kv(
        "Close (±$1.00)",
        format!("{} ({})", eval.close_matches, output::percent(eval.close_pct())),
    );
    output::kv("MAE", output::money(eval.mae));
    output::kv("RMSE", output::money(eval.rmse));
    output::kv("Max error", output::money(eval.max_error));
    output::kv("Score", format!("{:.2}", eval.score));

    if eval.worst.is_empty() {
        return Ok(());
    }
    output::section("Worst cases");
    for case in &eval.worst {
        println!(
            "  #{:<5} {:>2}d {:>7.1}mi {:>9}  expected {:>9}  got {:>9}  off {}",
            case.index,
            case.trip.days(),
            case.trip.miles(),
            output::money(case.trip.receipts()),
            output::money(case.expected),
            output::money(case.predicted),
            output::money(case.error),
        );
    }
    if eval.exact_matches == 0 {
        output::warning("No exact matches");
    }
    Ok(())
}

fn report_folds(result: &CrossValidationResult, json: bool) -> Result<()> {
    if json {
        let folds = serde_json::to_value(&result.folds).map_err(std::io::Error::from)?;
        let summary = serde_json::json!({
            "folds": folds,
            "mean_mae": result.mean_mae(),
            "std_mae": result.std_mae(),
            "mean_score": result.mean_score(),
        });
        println!("{summary:#}");
        return Ok(());
    }

    output::section("Cross-validation");
    for (i, fold) in result.folds.iter().enumerate() {
        println!(
            "  fold {}: n={:<4} MAE {:>9}  exact {:>4}  score {:.2}",
            i + 1,
            fold.n,
            output::money(fold.mae),
            fold.exact_matches,
            fold.score,
        );
    }
    output::kv(
        "Held-out MAE",
        format!("{} ± {}", output::money(result.mean_mae()), output::money(result.std_mae())),
    );
    output::kv(
        "Held-out exact",
        format!("{}/{}", result.exact_matches(), result.total_cases()),
    );
    output::kv("Mean score", format!("{:.2}", result.mean_score()));
    output::info("Scores are on cases the engine never saw");
    Ok(())
}
