//! Predict command implementation

use super::{build_engine, load_cases, load_config, load_engine};
use crate::error::Result;
use crate::output;
use reimburse::data::Trip;
use reimburse::diagnostics::Verbosity;
use reimburse::engine::{Engine, Prediction};
use std::path::PathBuf;

/// Where the engine comes from.
pub(crate) enum Source {
    /// A saved engine file.
    Model(PathBuf),
    /// Labeled cases to build from, with an optional config.
    Cases {
        data: PathBuf,
        config: Option<PathBuf>,
    },
}

impl Source {
    fn engine(&self, verbosity: Verbosity) -> Result<Engine> {
        match self {
            Self::Model(path) => load_engine(path),
            Self::Cases { data, config } => {
                let cases = load_cases(data)?;
                let config = load_config(config.as_deref())?;
                // Building prints to stderr; keep it quiet unless asked.
                let build_verbosity = if verbosity == Verbosity::Verbose {
                    Verbosity::Verbose
                } else {
                    Verbosity::Quiet
                };
                build_engine(&cases, config, build_verbosity)
            }
        }
    }
}

/// Run the predict command
///
/// The inputs are validated before the engine is loaded, so bad input fails
/// fast with the invalid-input exit code.
pub(crate) fn run(
    source: &Source,
    days: i64,
    miles: f64,
    receipts: f64,
    explain: bool,
    verbosity: Verbosity,
    json: bool,
) -> Result<()> {
    let trip = Trip::new(days, miles, receipts)?;
    let engine = source.engine(verbosity)?;

    if !explain {
        let value = engine.predict_trip(&trip);
        if json {
            println!("{}", serde_json::json!({ "reimbursement": value }));
        } else {
            println!("{value:.2}");
        }
        return Ok(());
    }

    let prediction = engine.explain(&trip);
    if json {
        println!("{:#}", serde_json::json!(prediction));
    } else {
        print_explanation(&prediction);
    }
    Ok(())
}

fn print_explanation(p: &Prediction) {
    output::section("Trip");
    output::kv("Days", p.trip.days());
    output::kv("Miles", format!("{:.1}", p.trip.miles()));
    output::kv("Receipts", output::money(p.trip.receipts()));

    output::section("Components");
    output::kv("Polynomial", output::money(p.components.polynomial));
    output::kv("k-NN", output::money(p.components.knn));
    let lookup_note = match (&p.lookup_rule, p.lookup_fallback) {
        (_, true) => " (fallback)".to_string(),
        (Some(rule), false) => format!(" ({rule})"),
        (None, false) => String::new(),
    };
    output::kv(
        "Lookup",
        format!("{}{lookup_note}", output::money(p.components.lookup)),
    );
    output::kv("Category", &p.category_label);

    output::section("Result");
    output::kv("Ensemble rule", &p.ensemble_rule);
    output::kv("Ensemble", output::money(p.ensemble_value));
    output::kv("Reimbursement", output::money(p.value));
}
