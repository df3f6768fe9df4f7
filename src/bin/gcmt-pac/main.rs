//! Prepare input files for the PAC photochemical kinetics code from one time step
//! of a GCM: the `.inp` run description and the `.lpt` temperature structure of a
//! pseudo-2D run.
use std::{path::{Path, PathBuf}, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use error_stack::ResultExt;

use gcmt_rs::config::{DatasetArgs, PacConfig};
use gcmt_rs::default_files::default_pac_config_toml;
use gcmt_rs::interface::pac::{PacDim, PacInterface};

fn main() -> ExitCode {
    let clargs = Cli::parse();

    env_logger::Builder::new()
        .filter_level(clargs.verbose.log_level_filter())
        .init();

    let res = match clargs.command {
        PacActions::InputFile(args) => write_input_file(args),
        PacActions::Lpt(args) => write_lpt_file(args),
        PacActions::JetSpeed(args) => print_jet_speed(args),
        PacActions::DefaultConfig => print_default_config(),
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
    #[error("Could not load the GCM data")]
    DataError,
    #[error("Could not read the configuration file {}", .0.display())]
    ConfigError(PathBuf),
    #[error("Could not write the {0} file")]
    WriteError(&'static str),
    #[error("Could not compute the jet speed")]
    JetSpeedError,
    #[error("{0} (this was unexpected)")]
    UnexpectedError(String),
}

fn load_interface(data: &DatasetArgs, dim: PacDim) -> error_stack::Result<PacInterface, CliError> {
    let tools = data.load_collection()
        .change_context(CliError::DataError)?;
    let mut pac = PacInterface::new(dim);
    pac.set_data(&tools, data.time, data.tag.as_deref(), data.regrid_lowres)
        .change_context(CliError::DataError)?;
    Ok(pac)
}

fn read_config(path: Option<&Path>) -> error_stack::Result<PacConfig, CliError> {
    if let Some(p) = path {
        let cfg = PacConfig::read_from_path(p)
            .change_context_lazy(|| CliError::ConfigError(p.to_path_buf()))?;
        Ok(cfg)
    } else {
        Ok(PacConfig::default())
    }
}

fn report_written(path: &Path) {
    println!("{} {}", "Written:".green().bold(), path.display());
}

fn write_input_file(args: InputFileCli) -> error_stack::Result<(), CliError> {
    let mut cfg = read_config(args.config.as_deref())?;
    if args.model_name.is_some() {
        cfg.input_file.model_name = args.model_name;
    }

    let pac = load_interface(&args.data, args.dim)?;
    let path = pac.write_inputfile(&args.destination, &cfg.input_file)
        .change_context(CliError::WriteError("input"))?;
    report_written(&path);
    Ok(())
}

fn write_lpt_file(args: LptCli) -> error_stack::Result<(), CliError> {
    let mut cfg = read_config(args.config.as_deref())?;
    let opts = &mut cfg.lpt;
    if let Some(eps) = args.eps {
        opts.eps = eps;
    }
    if args.jet_speed.is_some() {
        opts.jet_speed = args.jet_speed;
    }
    if args.min_temp.is_some() {
        opts.set_min_temp = args.min_temp;
    }
    if args.model_name.is_some() {
        opts.model_name = args.model_name;
    }

    let pac = load_interface(&args.data, PacDim::Two)?;
    let path = pac.generate_lptfile(&args.destination, &cfg.lpt)
        .change_context(CliError::WriteError("lpt"))?;
    report_written(&path);
    Ok(())
}

fn print_jet_speed(args: JetSpeedCli) -> error_stack::Result<(), CliError> {
    let pac = load_interface(&args.data, PacDim::Two)?;
    let speed = pac.jet_speed(args.eps)
        .change_context(CliError::JetSpeedError)?;
    println!("{speed:.3}");
    Ok(())
}

fn print_default_config() -> error_stack::Result<(), CliError> {
    let s = default_pac_config_toml()
        .map_err(|e| CliError::UnexpectedError(format!("could not serialize the default configuration: {e}")))?;
    print!("{s}");
    Ok(())
}

// ---------------------- //
// Command line interface //
// ---------------------- //

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: PacActions,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Debug, Subcommand)]
enum PacActions {
    /// Write the PAC input file (MODEL.inp) for a 1D or pseudo-2D run.
    InputFile(InputFileCli),

    /// Write the equatorial temperature structure (MODEL.lpt) of a pseudo-2D run.
    Lpt(LptCli),

    /// Print the equatorial jet speed in m/s.
    JetSpeed(JetSpeedCli),

    /// Print a configuration file with every default value filled in.
    DefaultConfig,
}

#[derive(Debug, Args)]
struct InputFileCli {
    #[command(flatten)]
    data: DatasetArgs,

    /// Prepare a 1D ("1D") or pseudo-2D ("2D") run.
    #[clap(short, long, default_value_t = PacDim::Two)]
    dim: PacDim,

    /// A TOML file with the options of the run, see the default-config subcommand.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Name of the model, defaults to the tag of the dataset.
    #[clap(short, long)]
    model_name: Option<String>,

    /// Directory to write the input file to.
    destination: PathBuf,
}

#[derive(Debug, Args)]
struct LptCli {
    #[command(flatten)]
    data: DatasetArgs,

    /// A TOML file with the options of the run. The options below override its [lpt] section.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Jet speed in m/s. If not given (or zero), it is computed from the data.
    #[clap(long)]
    jet_speed: Option<f64>,

    /// Half width in degrees of the equatorial band averaged over.
    #[clap(long)]
    eps: Option<f64>,

    /// Raise temperatures below this value (in K) to it.
    #[clap(long)]
    min_temp: Option<f64>,

    /// Name of the model, defaults to the tag of the dataset.
    #[clap(short, long)]
    model_name: Option<String>,

    /// Directory to write the lpt file to.
    destination: PathBuf,
}

#[derive(Debug, Args)]
struct JetSpeedCli {
    #[command(flatten)]
    data: DatasetArgs,

    /// Half width in degrees of the equatorial band averaged over.
    #[clap(long, default_value_t = 20.0)]
    eps: f64,
}
