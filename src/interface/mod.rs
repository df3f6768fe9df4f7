//! Interfaces from GCM datasets to chemistry and radiative transfer codes.
//!
//! Every interface starts from an [`Interface`], which holds the single time
//! step of one model that the outputs are derived from, and optionally the
//! equilibrium chemistry computed on it.
use error_stack::ResultExt;
use itertools::Itertools;
use log::{debug, info};

use crate::chemistry::{compute_abundance_table, AbundanceEngine, AbundanceTable, ChemistryOptions};
use crate::collection::DatasetCollection;
use crate::dataset::GriddedDataset;
use crate::interpolation::Extrapolation;

pub mod jet_speed;
pub mod pac;
pub mod prt;

/// Grid spacing in degrees of the coarse grid used by [`lowres_grid`].
pub const LOWRES_STEP_DEG: f64 = 15.0;

#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("Data is missing. Use set_data() first.")]
    MissingDataset,
    #[error("Could not get the requested model")]
    ModelSelection,
    #[error("Could not select time {0} from the model")]
    TimeSelection(f64),
    #[error("Could not regrid the dataset onto the low resolution grid")]
    Regrid,
    #[error("Dataset should not have a time dimension. Select the timestamp beforehand.")]
    TimeDimensionPresent,
    #[error("Could not compute the equilibrium chemistry")]
    Chemistry,
    #[error("No chemistry is available. Compute or load the abundances first.")]
    NoChemistry,
}

/// The bin centers of a regular longitude/latitude grid with `step` degree bins,
/// spanning -180 to 180 degrees longitude and -90 to 90 degrees latitude.
pub fn bin_centers(step: f64) -> (Vec<f64>, Vec<f64>) {
    let centers = |start: f64, end: f64| {
        let nbins = ((end - start) / step).round() as usize;
        (0..nbins).map(|i| start + step * (i as f64 + 0.5)).collect_vec()
    };
    (centers(-180.0, 180.0), centers(-90.0, 90.0))
}

/// The coarse (15 degree) longitude and latitude grid datasets can be regridded to.
pub fn lowres_grid() -> (Vec<f64>, Vec<f64>) {
    bin_centers(LOWRES_STEP_DEG)
}

/// Select one time step of `ds` and, if `regrid_lowres` is `true`, interpolate it onto
/// [`lowres_grid`]. Grid points outside the model's horizontal domain are NaN.
pub fn select_data(ds: &GriddedDataset, time: f64, regrid_lowres: bool) -> error_stack::Result<GriddedDataset, InterfaceError> {
    let dsi = ds.select_time(time)
        .change_context(InterfaceError::TimeSelection(time))?;

    if regrid_lowres {
        let (lon, lat) = lowres_grid();
        debug!("Regridding to {} longitudes and {} latitudes", lon.len(), lat.len());
        dsi.regrid(&lon, &lat, Extrapolation::Nan)
            .change_context(InterfaceError::Regrid)
    } else {
        Ok(dsi)
    }
}

/// The dataset and chemistry shared by all interfaces.
#[derive(Debug, Clone, Default)]
pub struct Interface {
    dataset: Option<GriddedDataset>,
    chemistry: Option<AbundanceTable>,
}

impl Interface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the time step `time` of the model `tag` (or of the only model) from `tools`
    /// as the data for this interface. Any previously computed chemistry is dropped.
    pub fn set_data(
        &mut self,
        tools: &DatasetCollection,
        time: f64,
        tag: Option<&str>,
        regrid_lowres: bool,
    ) -> error_stack::Result<&GriddedDataset, InterfaceError> {
        let ds = tools.get_one_model(tag)
            .change_context(InterfaceError::ModelSelection)?;
        let dsi = select_data(ds, time, regrid_lowres)?;
        info!("Using time {time} of model '{}'", dsi.tag().unwrap_or("?"));
        Ok(self.replace_dataset(dsi))
    }

    /// Use a dataset which already has a single time step selected.
    pub fn set_dataset(&mut self, ds: GriddedDataset) -> Result<&GriddedDataset, InterfaceError> {
        if ds.has_time_dim() {
            return Err(InterfaceError::TimeDimensionPresent);
        }
        Ok(self.replace_dataset(ds))
    }

    fn replace_dataset(&mut self, ds: GriddedDataset) -> &GriddedDataset {
        self.chemistry = None;
        self.dataset.insert(ds)
    }

    pub fn dataset(&self) -> Result<&GriddedDataset, InterfaceError> {
        self.dataset.as_ref().ok_or(InterfaceError::MissingDataset)
    }

    pub fn chemistry(&self) -> Result<&AbundanceTable, InterfaceError> {
        self.chemistry.as_ref().ok_or(InterfaceError::NoChemistry)
    }

    /// Use a previously computed abundance table (e.g. one read from disk).
    pub fn set_chemistry(&mut self, table: AbundanceTable) {
        self.chemistry = Some(table);
    }

    /// Compute the equilibrium chemistry of every column of the current dataset.
    pub fn chem_from_engine<E: AbundanceEngine + ?Sized>(
        &mut self,
        engine: &E,
        options: &ChemistryOptions,
    ) -> error_stack::Result<&AbundanceTable, InterfaceError> {
        let ds = self.dataset()?;
        let table = compute_abundance_table(ds, engine, options)
            .change_context(InterfaceError::Chemistry)?;
        Ok(self.chemistry.insert(table))
    }
}
