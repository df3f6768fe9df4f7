//! Interface to the PAC chemical kinetics code.
//!
//! PAC is run either in 1D or in a pseudo-2D mode, where a 1D column is carried
//! around the planet in solid body rotation with the equatorial jet. Both modes
//! read a main input file ([`input_file`]); the pseudo-2D mode also reads the
//! longitude-pressure-temperature structure from an lpt file ([`lpt`]).
use std::{fmt::Display, path::{Path, PathBuf}, str::FromStr};

use error_stack::ResultExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::collection::DatasetCollection;
use crate::dataset::{DatasetError, GriddedDataset};
use crate::interpolation::InterpolationError;
use crate::utils::is_existing_dir;

use super::jet_speed::extract_jet_speed;
use super::{Interface, InterfaceError};

pub mod input_file;
pub mod lpt;

pub use input_file::{parse_input_file, InputFileOptions, InputFileRecord, ParsedInputFile};
pub use lpt::{build_lpt, LptGrid, LptOptions};

#[derive(Debug, thiserror::Error)]
pub enum PacError {
    #[error("Data is missing. Use set_data() first.")]
    MissingDataset,
    #[error("The given destination directory does not exist: '{}'", .0.display())]
    DestinationMissing(PathBuf),
    #[error("No model name was given and the dataset has no tag")]
    MissingModelName,
    #[error("Could not extract the jet speed from the dataset")]
    JetSpeed,
    #[error("No latitudes within {0} degrees of the equator")]
    EmptyLatitudeBand(f64),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Could not interpolate '{0}' onto the lpt longitudes")]
    Interpolation(String, #[source] InterpolationError),
    #[error("Unexpected array shape: {0}")]
    Shape(String),
    #[error("Could not write file '{}'", .0.display())]
    WriteError(PathBuf),
    #[error("Unknown PAC dimensionality '{0}', expected '1D' or '2D'")]
    UnknownDim(String),
}

/// Which kind of PAC run to prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacDim {
    /// A single 1D column
    #[serde(rename = "1D")]
    One,
    /// Pseudo-2D: a column in solid body rotation along the equator
    #[serde(rename = "2D")]
    Two,
}

impl Display for PacDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacDim::One => write!(f, "1D"),
            PacDim::Two => write!(f, "2D"),
        }
    }
}

impl FromStr for PacDim {
    type Err = PacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "1d" => Ok(PacDim::One),
            "2" | "2d" => Ok(PacDim::Two),
            _ => Err(PacError::UnknownDim(s.to_string())),
        }
    }
}

fn check_destination(destination: &Path) -> Result<(), PacError> {
    if is_existing_dir(destination) {
        Ok(())
    } else {
        Err(PacError::DestinationMissing(destination.to_path_buf()))
    }
}

fn write_file(path: PathBuf, contents: &str) -> error_stack::Result<PathBuf, PacError> {
    std::fs::write(&path, contents)
        .change_context_lazy(|| PacError::WriteError(path.clone()))?;
    info!("File written: {}", path.display());
    Ok(path)
}

/// Prepares the input of a 1D or pseudo-2D PAC run from one time step of a GCM.
#[derive(Debug, Clone)]
pub struct PacInterface {
    base: Interface,
    dim: PacDim,
}

impl PacInterface {
    pub fn new(dim: PacDim) -> Self {
        Self { base: Interface::new(), dim }
    }

    pub fn dim(&self) -> PacDim {
        self.dim
    }

    /// See [`Interface::set_data`].
    pub fn set_data(
        &mut self,
        tools: &DatasetCollection,
        time: f64,
        tag: Option<&str>,
        regrid_lowres: bool,
    ) -> error_stack::Result<&GriddedDataset, InterfaceError> {
        self.base.set_data(tools, time, tag, regrid_lowres)
    }

    /// See [`Interface::set_dataset`].
    pub fn set_dataset(&mut self, ds: GriddedDataset) -> Result<&GriddedDataset, InterfaceError> {
        self.base.set_dataset(ds)
    }

    pub fn dataset(&self) -> Result<&GriddedDataset, PacError> {
        self.base.dataset().map_err(|_| PacError::MissingDataset)
    }

    /// Write `<model>.inp` for this interface's dimensionality into `destination`
    /// and return its path.
    pub fn write_inputfile(&self, destination: &Path, options: &InputFileOptions) -> error_stack::Result<PathBuf, PacError> {
        let ds = self.dataset()?;
        check_destination(destination)?;

        let record = InputFileRecord::resolve(ds, options)?;
        let contents = record.render(self.dim);
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(parsed) = parse_input_file(&contents) {
                debug!("{parsed}");
            }
        }
        write_file(destination.join(record.file_name()), &contents)
    }

    /// The equatorial jet speed in m/s of the current dataset.
    pub fn jet_speed(&self, eps: f64) -> error_stack::Result<f64, PacError> {
        extract_jet_speed(self.dataset()?, eps)
            .change_context(PacError::JetSpeed)
    }

    /// Build the lpt grid of the current dataset, extracting the jet speed if
    /// none (or zero) is given in `options`.
    pub fn lpt_grid(&self, options: &LptOptions) -> error_stack::Result<LptGrid, PacError> {
        let ds = self.dataset()?;
        let jet_speed = match options.given_jet_speed() {
            Some(v) => v,
            None => self.jet_speed(options.eps)?,
        };
        debug!("Using a jet speed of {jet_speed} m/s");
        Ok(build_lpt(ds, jet_speed, options.eps, options.set_min_temp)?)
    }

    /// Write `<model>.lpt` into `destination` and return its path.
    pub fn generate_lptfile(&self, destination: &Path, options: &LptOptions) -> error_stack::Result<PathBuf, PacError> {
        let ds = self.dataset()?;
        check_destination(destination)?;

        let model_name = match (&options.model_name, ds.tag()) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(tag)) => tag.to_string(),
            _ => return Err(PacError::MissingModelName.into()),
        };
        let grid = self.lpt_grid(options)?;
        write_file(destination.join(format!("{model_name}.lpt")), &grid.render())
    }
}
