//! Engines backed by external programs.
//!
//! Equilibrium chemistry, radiative transfer and disk integration are done by
//! codes outside this crate. Each engine here wraps a [`ScriptRunner`] that sends
//! a JSON request to such a program and parses its JSON answer, so any code with
//! a thin wrapper script can be plugged into the interfaces.
use log::debug;
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::chemistry::{AbundanceEngine, ChemistryColumn, SpeciesProfiles};
use crate::interface::prt::{
    ColumnIntensity, PhaseCurveIntegrator, PhaseCurveRequest, SpectrumRequest, SpectrumSolver,
    StellarSpectrum, StellarSpectrumData,
};

pub mod external_script;

pub use external_script::ScriptRunner;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Could not find program '{script}': {error}")]
    ProgramNotFound {
        script: String,
        error: which::Error,
    },
    #[error("Could not serialize the request for {script}: {error}")]
    RequestError {
        script: String,
        error: serde_json::Error,
    },
    #[error("Setting up to call {script} produced the following error: {error}")]
    ScriptRunError {
        script: String,
        error: std::io::Error,
    },
    #[error("Calling {script} with arguments '{args}' returned non-zero exit code {exit_code}")]
    ScriptFailedError {
        script: String,
        args: String,
        exit_code: i32,
    },
    #[error("Could not parse entry {entry_num} from {script}, error was: {error}. (Entry value was: '{entry_str}')")]
    EntryParseError {
        script: String,
        entry_num: usize,
        error: serde_json::Error,
        entry_str: String,
    },
    #[error("{script} returned {actual} entries, expected {expected}")]
    WrongNumberOfEntries {
        script: String,
        expected: usize,
        actual: usize,
    },
    #[error("{0}")]
    Custom(String),
}

impl EngineError {
    pub(crate) fn program_not_found<S: ToString>(script: S, error: which::Error) -> Self {
        Self::ProgramNotFound { script: script.to_string(), error }
    }

    pub(crate) fn script_run_error<S: ToString>(script: S, error: std::io::Error) -> Self {
        Self::ScriptRunError { script: script.to_string(), error }
    }

    pub(crate) fn script_failed_error<S: ToString>(script: S, args: &[String], exit_code: Option<i32>) -> Self {
        // a process killed by a signal has no exit code
        let exit_code = exit_code.unwrap_or(-999);
        Self::ScriptFailedError { script: script.to_string(), args: args.join(" "), exit_code }
    }

    pub(crate) fn entry_parse_error<S: ToString>(script: S, entry_num: usize, error: serde_json::Error, entry_bytes: &[u8]) -> Self {
        let entry_str = String::from_utf8_lossy(entry_bytes).to_string();
        Self::EntryParseError { script: script.to_string(), entry_num, error, entry_str }
    }
}

#[derive(Debug, Serialize)]
struct ChemistryRequest<'a> {
    columns: &'a [ChemistryColumn],
}

/// An [`AbundanceEngine`] calling an external program.
///
/// The program receives `{"columns": [{"co_ratio": [...], "feh_ratio": [...],
/// "temperature": [...], "pressure": [...]}, ...]}` and prints one JSON object
/// mapping species names to abundance profiles per column.
#[derive(Debug, Clone)]
pub struct ScriptAbundanceEngine {
    runner: ScriptRunner,
}

impl ScriptAbundanceEngine {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

impl AbundanceEngine for ScriptAbundanceEngine {
    fn compute_abundances(&self, column: &ChemistryColumn) -> Result<SpeciesProfiles, EngineError> {
        let columns = std::slice::from_ref(column);
        self.runner.call_one(&ChemistryRequest { columns })
    }

    fn compute_batch(&self, columns: &[ChemistryColumn]) -> Result<Vec<SpeciesProfiles>, EngineError> {
        debug!("Sending {} columns to {}", columns.len(), self.runner.script());
        self.runner.call_expecting(&ChemistryRequest { columns }, columns.len())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "request", rename_all = "snake_case")]
enum SolverRequest<'a> {
    Describe,
    Spectra(&'a SpectrumRequest),
}

/// What a solver reports about itself in response to a `describe` request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SolverDescription {
    pub line_species: Vec<String>,
    /// Wavelengths in micron
    pub wavelengths: Vec<f64>,
}

/// A [`SpectrumSolver`] calling an external program.
///
/// The program receives either `{"request": "describe"}`, to which it answers with
/// `{"line_species": [...], "wavelengths": [...]}`, or `{"request": "spectra", ...}`
/// with the fields of a [`SpectrumRequest`], to which it answers with one
/// `[[...], ...]` (angle by wavelength) array per column.
#[derive(Debug)]
pub struct ScriptSpectrumSolver {
    runner: ScriptRunner,
    pressures: Vec<f64>,
    description: OnceCell<SolverDescription>,
}

impl ScriptSpectrumSolver {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner, pressures: vec![], description: OnceCell::new() }
    }

    /// The pressures (in bar) the solver was set up with.
    pub fn pressures(&self) -> &[f64] {
        &self.pressures
    }

    fn description(&self) -> Result<&SolverDescription, EngineError> {
        self.description.get_or_try_init(|| self.runner.call_one(&SolverRequest::Describe))
    }
}

impl SpectrumSolver for ScriptSpectrumSolver {
    fn setup_opa_structure(&mut self, pressures_bar: &[f64]) -> Result<(), EngineError> {
        self.pressures = pressures_bar.to_vec();
        Ok(())
    }

    fn line_species(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.description()?.line_species.clone())
    }

    fn wavelengths_micron(&self) -> Result<Vec<f64>, EngineError> {
        Ok(self.description()?.wavelengths.clone())
    }

    fn compute_spectra(&self, request: &SpectrumRequest) -> Result<Vec<ColumnIntensity>, EngineError> {
        if request.pressure != self.pressures {
            return Err(EngineError::Custom(format!(
                "{} was set up with {} pressure levels, the request has {}",
                self.runner.script(), self.pressures.len(), request.pressure.len()
            )));
        }
        self.runner.call_expecting(&SolverRequest::Spectra(request), request.n_columns())
    }
}

#[derive(Debug, Serialize)]
struct StellarRequest {
    t_star: f64,
}

/// A [`StellarSpectrum`] calling an external program with `{"t_star": ...}`, which
/// answers with `{"wavelength": [...], "intensity": [...]}` (wavelengths in cm).
#[derive(Debug, Clone)]
pub struct ScriptStellarSpectrum {
    runner: ScriptRunner,
}

impl ScriptStellarSpectrum {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

impl StellarSpectrum for ScriptStellarSpectrum {
    fn spectrum(&self, t_star: f64) -> Result<StellarSpectrumData, EngineError> {
        self.runner.call_one(&StellarRequest { t_star })
    }
}

/// A [`PhaseCurveIntegrator`] calling an external program with a [`PhaseCurveRequest`].
/// The program prints one wavelength array per phase.
#[derive(Debug, Clone)]
pub struct ScriptPhaseCurve {
    runner: ScriptRunner,
}

impl ScriptPhaseCurve {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

impl PhaseCurveIntegrator for ScriptPhaseCurve {
    fn phase_curve(&self, request: &PhaseCurveRequest) -> Result<Vec<Vec<f64>>, EngineError> {
        self.runner.call_expecting(request, request.phases.len())
    }
}
