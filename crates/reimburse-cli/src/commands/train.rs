//! Train command implementation

use super::{build_engine, load_cases, load_config};
use crate::error::Result;
use crate::output;
use reimburse::diagnostics::Verbosity;
use reimburse::metrics::Evaluation;
use std::path::Path;

/// Run the train command
pub(crate) fn run(
    data: &Path,
    config: Option<&Path>,
    output_path: &Path,
    verbosity: Verbosity,
    json: bool,
) -> Result<()> {
    let cases = load_cases(data)?;
    let config = load_config(config)?;
    let engine = build_engine(&cases, config, verbosity)?;
    engine.save(output_path)?;

    let fit = Evaluation::evaluate(&engine, &cases, 0);

    if json {
        let summary = serde_json::json!({
            "model": output_path.display().to_string(),
            "examples": cases.len(),
            "polynomial": engine.polynomial().summary(),
            "lookup_buckets": engine.lookup().covered(),
            "training_mae": fit.mae,
            "training_exact": fit.exact_matches,
        });
        println!("{summary:#}");
        return Ok(());
    }

    if verbosity == Verbosity::Quiet {
        return Ok(());
    }

    let summary = engine.polynomial().summary();
    output::section("Engine");
    output::kv("Examples", cases.len());
    output::kv("Features", engine.polynomial().features().len());
    output::kv("Trainer", format!("{:?} after {} iterations", summary.status, summary.iterations));
    output::kv("Best MSE", format!("{:.4}", summary.best_mse));
    output::kv(
        "Lookup buckets",
        format!("{}/{}", engine.lookup().covered(), engine.lookup().config().bands.total()),
    );
    output::kv("Training MAE", output::money(fit.mae));
    output::success(&format!("Saved engine to {}", output_path.display()));
    Ok(())
}
