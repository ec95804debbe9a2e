//! Subcommand implementations and the loaders they share.

pub(crate) mod analyze;
pub(crate) mod evaluate;
pub(crate) mod predict;
pub(crate) mod train;

use crate::error::{CliError, Result};
use reimburse::config::EngineConfig;
use reimburse::data::TrainingSet;
use reimburse::diagnostics::{StderrSink, Verbosity};
use reimburse::engine::Engine;
use std::path::Path;

/// Maps the global `--verbose`/`--quiet` flags onto a diagnostics level.
pub(crate) fn verbosity(verbose: bool, quiet: bool) -> Verbosity {
    if quiet {
        Verbosity::Quiet
    } else if verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::FileNotFound(path.to_path_buf()))
    }
}

/// Reads labeled cases.
pub(crate) fn load_cases(path: &Path) -> Result<TrainingSet> {
    ensure_file(path)?;
    Ok(TrainingSet::load_json(path)?)
}

/// Reads a config file, or the defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            ensure_file(path)?;
            Ok(EngineConfig::from_json_file(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Reads a saved engine.
pub(crate) fn load_engine(path: &Path) -> Result<Engine> {
    ensure_file(path)?;
    Ok(Engine::load(path)?)
}

/// Builds an engine, reporting progress on stderr at `verbosity`.
pub(crate) fn build_engine(
    data: &TrainingSet,
    config: EngineConfig,
    verbosity: Verbosity,
) -> Result<Engine> {
    Ok(Engine::build(data, config, &StderrSink::new(verbosity))?)
}
