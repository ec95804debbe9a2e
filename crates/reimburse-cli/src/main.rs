//! reimburse - travel reimbursement engine CLI
//!
//! Usage:
//!   reimburse train public_cases.json -o engine.json     # Build and save an engine
//!   reimburse predict -m engine.json 5 250 150.75         # Predict one trip
//!   reimburse predict -d public_cases.json 5 250 150.75   # Build in memory, then predict
//!   reimburse predict -m engine.json 5 250 150.75 --explain
//!   reimburse evaluate public_cases.json -m engine.json   # Score a saved engine
//!   reimburse evaluate public_cases.json --folds 5        # Held-out k-fold score
//!   reimburse analyze public_cases.json                   # Summaries by length and efficiency

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod error;
mod output;

use commands::{analyze, evaluate, predict, train};

/// reimburse - learn and query a travel reimbursement function
#[derive(Parser)]
#[command(name = "reimburse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (training progress)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an engine from labeled cases and save it
    Train {
        /// Labeled cases (public-cases JSON)
        #[arg(value_name = "CASES")]
        data: PathBuf,

        /// Engine config (JSON); defaults apply to missing fields
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Where to write the engine
        #[arg(short, long, value_name = "FILE", default_value = "engine.json")]
        output: PathBuf,
    },

    /// Predict the reimbursement for one trip
    Predict {
        /// Trip length in days
        #[arg(allow_negative_numbers = true)]
        days: i64,

        /// Miles traveled
        #[arg(allow_negative_numbers = true)]
        miles: f64,

        /// Total receipts amount
        #[arg(allow_negative_numbers = true)]
        receipts: f64,

        /// Saved engine
        #[arg(short, long, value_name = "FILE", required_unless_present = "data", conflicts_with = "data")]
        model: Option<PathBuf>,

        /// Labeled cases to build an engine from instead of loading one
        #[arg(short, long, value_name = "CASES")]
        data: Option<PathBuf>,

        /// Engine config used with --data
        #[arg(short, long, value_name = "FILE", requires = "data")]
        config: Option<PathBuf>,

        /// Show every component output and the deciding rules
        #[arg(long)]
        explain: bool,
    },

    /// Score an engine against labeled cases
    Evaluate {
        /// Labeled cases (public-cases JSON)
        #[arg(value_name = "CASES")]
        data: PathBuf,

        /// Saved engine; if absent an engine is built from CASES
        #[arg(short, long, value_name = "FILE", conflicts_with = "folds")]
        model: Option<PathBuf>,

        /// Engine config used when building
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Run k-fold cross-validation with this many folds
        #[arg(long, value_name = "K")]
        folds: Option<usize>,

        /// Shuffle seed for the folds
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of worst cases to list
        #[arg(long, default_value = "5")]
        worst: usize,

        /// Fail unless MAE is at most this value
        #[arg(long, value_name = "DOLLARS")]
        max_mae: Option<f64>,
    },

    /// Summarize labeled cases by trip length and travel efficiency
    Analyze {
        /// Labeled cases (public-cases JSON)
        #[arg(value_name = "CASES")]
        data: PathBuf,

        /// Width of a miles-per-day bucket
        #[arg(long, default_value = "25")]
        bucket_width: f64,

        /// Minimum cases per reported bucket
        #[arg(long, default_value = "5")]
        min_count: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = commands::verbosity(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Train {
            data,
            config,
            output,
        } => train::run(&data, config.as_deref(), &output, verbosity, cli.json),

        Commands::Predict {
            days,
            miles,
            receipts,
            model,
            data,
            config,
            explain,
        } => {
            let source = match (model, data) {
                (Some(model), _) => predict::Source::Model(model),
                (None, Some(data)) => predict::Source::Cases { data, config },
                (None, None) => unreachable!("clap requires --model or --data"),
            };
            predict::run(&source, days, miles, receipts, explain, verbosity, cli.json)
        }

        Commands::Evaluate {
            data,
            model,
            config,
            folds,
            seed,
            worst,
            max_mae,
        } => {
            let mode = match (model, folds) {
                (Some(model), _) => evaluate::Mode::Saved(model),
                (None, Some(k)) => evaluate::Mode::CrossValidate { k, seed },
                (None, None) => evaluate::Mode::InSample,
            };
            let options = evaluate::Options {
                config,
                worst,
                max_mae,
                verbosity,
                json: cli.json,
            };
            evaluate::run(&data, &mode, &options)
        }

        Commands::Analyze {
            data,
            bucket_width,
            min_count,
        } => analyze::run(&data, bucket_width, min_count, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
