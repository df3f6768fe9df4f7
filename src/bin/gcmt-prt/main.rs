//! Compute equilibrium chemistry, emission spectra and phase curves of one time
//! step of a GCM with external chemistry and radiative transfer programs.
use std::{path::{Path, PathBuf}, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use error_stack::ResultExt;

use gcmt_rs::chemistry::{AbundanceTable, ChemistryOptions};
use gcmt_rs::config::{DatasetArgs, EngineConfig};
use gcmt_rs::engines::{
    ScriptAbundanceEngine, ScriptPhaseCurve, ScriptRunner, ScriptSpectrumSolver, ScriptStellarSpectrum,
};
use gcmt_rs::interface::prt::{phase_curve, MmwProfile, PhaseSpectrumOptions, PrtInterface};
use gcmt_rs::interface::Interface;

fn main() -> ExitCode {
    let clargs = Cli::parse();

    env_logger::Builder::new()
        .filter_level(clargs.verbose.log_level_filter())
        .init();

    let res = match clargs.command {
        PrtActions::Chemistry(args) => run_chemistry(args),
        PrtActions::Spectrum(args) => run_spectrum(args),
        PrtActions::PhaseCurve(args) => run_phase_curve(args),
    };

    if let Err(e) = res {
        eprintln!("An error occurred:\n{e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    BadInput(String),
    #[error("Could not load the GCM data")]
    DataError,
    #[error("Could not read the engine configuration {}", .0.display())]
    EngineConfigError(PathBuf),
    #[error("Could not read {}", .0.display())]
    ReadError(PathBuf),
    #[error("Could not write {}", .0.display())]
    WriteError(PathBuf),
    #[error("Computing the equilibrium chemistry failed")]
    ChemistryError,
    #[error("Computing the spectra failed")]
    SpectrumError,
    #[error("Computing the phase curve failed")]
    PhaseCurveError,
}

fn runner_from_config(path: &Path) -> error_stack::Result<ScriptRunner, CliError> {
    let cfg = EngineConfig::read_from_path(path)
        .change_context_lazy(|| CliError::EngineConfigError(path.to_path_buf()))?;
    Ok(ScriptRunner::from_config(&cfg))
}

fn report_written(path: &Path) {
    println!("{} {}", "Written:".green().bold(), path.display());
}

fn run_chemistry(args: ChemistryCli) -> error_stack::Result<(), CliError> {
    let engine = ScriptAbundanceEngine::new(runner_from_config(&args.engine)?);
    let tools = args.data.load_collection()
        .change_context(CliError::DataError)?;

    let mut interface = Interface::new();
    interface.set_data(&tools, args.data.time, args.data.tag.as_deref(), args.data.regrid_lowres)
        .change_context(CliError::DataError)?;
    let table = interface.chem_from_engine(&engine, &args.chem.to_options())
        .change_context(CliError::ChemistryError)?;

    table.to_json_file(&args.output)
        .change_context_lazy(|| CliError::WriteError(args.output.clone()))?;
    report_written(&args.output);
    Ok(())
}

fn spectrum_options(args: &SpectrumCli) -> error_stack::Result<PhaseSpectrumOptions, CliError> {
    let mut opts = if let Some(path) = &args.options {
        let rdr = std::fs::File::open(path)
            .change_context_lazy(|| CliError::ReadError(path.clone()))?;
        serde_json::from_reader(rdr)
            .change_context_lazy(|| CliError::ReadError(path.clone()))?
    } else {
        let (Some(r_star_cm), Some(t_star), Some(a_cm)) = (args.r_star_cm, args.t_star, args.semimajoraxis_cm) else {
            return Err(CliError::BadInput(
                "--r-star-cm, --t-star and --semimajoraxis-cm are required if no --options file is given".to_string()
            ).into());
        };
        PhaseSpectrumOptions::new(MmwProfile::Uniform(args.mmw), r_star_cm, t_star, a_cm)
    };

    if args.gravity_cgs.is_some() {
        opts.gravity_cgs = args.gravity_cgs;
    }
    if args.no_normalize {
        opts.normalize = false;
    }
    // the output is written by this program
    opts.filename = None;
    Ok(opts)
}

fn run_spectrum(args: SpectrumCli) -> error_stack::Result<(), CliError> {
    let options = spectrum_options(&args)?;
    let solver = ScriptSpectrumSolver::new(runner_from_config(&args.solver)?);
    let stellar = ScriptStellarSpectrum::new(runner_from_config(&args.stellar)?);

    let tools = args.data.load_collection()
        .change_context(CliError::DataError)?;
    let mut prt = PrtInterface::new(solver);
    prt.set_data(&tools, args.data.time, args.data.tag.as_deref(), args.data.regrid_lowres)
        .change_context(CliError::DataError)?;

    match (&args.chemistry_file, &args.chemistry_engine) {
        (Some(path), _) => {
            let table = AbundanceTable::from_json_file(path)
                .change_context_lazy(|| CliError::ReadError(path.clone()))?;
            prt.set_chemistry(table);
        },
        (None, Some(cfg)) => {
            let engine = ScriptAbundanceEngine::new(runner_from_config(cfg)?);
            prt.chem_from_engine(&engine, &args.chem.to_options())
                .change_context(CliError::ChemistryError)?;
        },
        (None, None) => return Err(CliError::BadInput(
            "one of --chemistry-file or --chemistry-engine is required".to_string()
        ).into()),
    }

    let grid = prt.calc_phase_spectrum(&stellar, &options)
        .change_context(CliError::SpectrumError)?;
    grid.to_json_file(&args.output)
        .change_context_lazy(|| CliError::WriteError(args.output.clone()))?;
    report_written(&args.output);
    Ok(())
}

fn run_phase_curve(args: PhaseCurveCli) -> error_stack::Result<(), CliError> {
    let integrator = ScriptPhaseCurve::new(runner_from_config(&args.integrator)?);
    let curve = phase_curve(&integrator, &args.phases, None, Some(&args.spectra))
        .change_context(CliError::PhaseCurveError)?;
    curve.to_csv_file(&args.output)
        .change_context_lazy(|| CliError::WriteError(args.output.clone()))?;
    report_written(&args.output);
    Ok(())
}

// ---------------------- //
// Command line interface //
// ---------------------- //

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: PrtActions,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Debug, Subcommand)]
enum PrtActions {
    /// Compute the equilibrium chemistry of every column and save it as JSON.
    Chemistry(ChemistryCli),

    /// Compute the emission spectra of every column and save them as JSON.
    Spectrum(SpectrumCli),

    /// Integrate previously computed spectra into a phase curve (CSV).
    PhaseCurve(PhaseCurveCli),
}

#[derive(Debug, Args)]
struct ChemArgs {
    /// The variable of the dataset holding the temperature.
    #[clap(long, default_value = "T")]
    temp_key: String,

    /// Global C/O ratio.
    #[clap(long)]
    co_ratio: Option<f64>,

    /// Global metallicity [Fe/H].
    #[clap(long)]
    feh_ratio: Option<f64>,
}

impl ChemArgs {
    fn to_options(&self) -> ChemistryOptions {
        let defaults = ChemistryOptions::default();
        ChemistryOptions {
            temp_key: self.temp_key.clone(),
            co_ratio: self.co_ratio.unwrap_or(defaults.co_ratio),
            feh_ratio: self.feh_ratio.unwrap_or(defaults.feh_ratio),
        }
    }
}

#[derive(Debug, Args)]
struct ChemistryCli {
    #[command(flatten)]
    data: DatasetArgs,

    #[command(flatten)]
    chem: ChemArgs,

    /// JSON file describing how to call the chemistry program.
    #[clap(short, long)]
    engine: PathBuf,

    /// Where to write the abundances.
    output: PathBuf,
}

#[derive(Debug, Args)]
struct SpectrumCli {
    #[command(flatten)]
    data: DatasetArgs,

    #[command(flatten)]
    chem: ChemArgs,

    /// JSON file describing how to call the radiative transfer program.
    #[clap(long)]
    solver: PathBuf,

    /// JSON file describing how to call the stellar spectrum program.
    #[clap(long)]
    stellar: PathBuf,

    /// Abundances previously written by the chemistry subcommand.
    #[clap(long, conflicts_with = "chemistry_engine")]
    chemistry_file: Option<PathBuf>,

    /// JSON file describing how to call the chemistry program.
    #[clap(long)]
    chemistry_engine: Option<PathBuf>,

    /// JSON file with all the options of the calculation. If given, the stellar
    /// and orbital arguments below are not needed.
    #[clap(long)]
    options: Option<PathBuf>,

    /// Mean molecular weight.
    #[clap(long, default_value_t = 2.33)]
    mmw: f64,

    /// Stellar radius in cm.
    #[clap(long)]
    r_star_cm: Option<f64>,

    /// Stellar effective temperature in K.
    #[clap(long)]
    t_star: Option<f64>,

    /// Orbital distance in cm.
    #[clap(long)]
    semimajoraxis_cm: Option<f64>,

    /// Surface gravity in cgs, defaults to the gravity stored with the dataset.
    #[clap(long)]
    gravity_cgs: Option<f64>,

    /// Keep the raw planetary intensities instead of normalizing by the star.
    #[clap(long)]
    no_normalize: bool,

    /// Where to write the spectra.
    output: PathBuf,
}

#[derive(Debug, Args)]
struct PhaseCurveCli {
    /// JSON file describing how to call the phase curve program.
    #[clap(short, long)]
    integrator: PathBuf,

    /// Orbital phases (0 to 1) to compute, comma separated.
    #[clap(short, long, value_delimiter = ',', required = true)]
    phases: Vec<f64>,

    /// Spectra written by the spectrum subcommand.
    spectra: PathBuf,

    /// Where to write the phase curve.
    output: PathBuf,
}
