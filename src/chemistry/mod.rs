//! Equilibrium chemistry on the columns of a GCM dataset.
//!
//! The chemistry itself is computed by an [`AbundanceEngine`]; this module only
//! cuts the dataset into columns, collects the engine's answers into an
//! [`AbundanceTable`] and reinterpolates that table onto the pressure grid of
//! a radiative transfer code ([`AbundanceTable::to_prt`]).
use std::{collections::BTreeMap, path::{Path, PathBuf}};

use error_stack::ResultExt;
use itertools::Itertools;
use log::{debug, info};
use ndarray::{s, Array3, Ix3};
use serde::{Deserialize, Serialize};

use crate::dataset::GriddedDataset;
use crate::engines::EngineError;
use crate::interpolation::{interp_axis, Extrapolation, InterpolationError};
use crate::units::PressureUnit;

pub const DEFAULT_CO_RATIO: f64 = 0.55;
pub const DEFAULT_FEH_RATIO: f64 = 0.0;

/// Keys in an abundance table that are not mass fractions and must not be
/// passed to a radiative transfer code as abundances.
pub const NON_ABUNDANCE_KEYS: [&str; 2] = ["nabla_ad", "MMW"];

#[derive(Debug, thiserror::Error)]
pub enum ChemistryError {
    #[error("Dataset should not have a time dimension. Select the timestamp beforehand.")]
    TimeDimensionPresent,
    #[error("Could not get the temperature field '{0}' from the dataset")]
    TemperatureField(String),
    #[error("The abundance engine failed")]
    Engine,
    #[error("The abundance engine returned {actual} columns, expected {expected}")]
    WrongColumnCount { expected: usize, actual: usize },
    #[error("The abundance engine result for column (lon index {ilon}, lat index {ilat}) lacks species '{species}'")]
    IncompleteColumn { ilon: usize, ilat: usize, species: String },
    #[error("The abundance engine returned {actual} levels of '{species}' for column (lon index {ilon}, lat index {ilat}), expected {expected}")]
    ProfileLength { ilon: usize, ilat: usize, species: String, expected: usize, actual: usize },
    #[error("We miss chemistry data for {0}")]
    MissingSpecies(String),
    #[error("Could not interpolate '{0}' onto the requested pressures")]
    Interpolation(String, #[source] InterpolationError),
    #[error("Interpolated '{0}' does not have 3 dimensions")]
    Shape(String),
    #[error("Abundance table entry '{name}' has shape {actual:?}, expected {expected:?} (lon, lat, Z)")]
    TableShape { name: String, expected: (usize, usize, usize), actual: (usize, usize, usize) },
    #[error("Could not read an abundance table from {}", .0.display())]
    ReadError(PathBuf),
    #[error("Could not write the abundance table to {}", .0.display())]
    WriteError(PathBuf),
}

/// One column of inputs for an equilibrium chemistry calculation. All vectors
/// have one value per pressure level; pressures are in bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemistryColumn {
    pub co_ratio: Vec<f64>,
    pub feh_ratio: Vec<f64>,
    pub temperature: Vec<f64>,
    pub pressure: Vec<f64>,
}

impl ChemistryColumn {
    /// A column with globally uniform C/O and metallicity.
    pub fn uniform(co_ratio: f64, feh_ratio: f64, temperature: Vec<f64>, pressure: Vec<f64>) -> Self {
        let n = pressure.len();
        Self {
            co_ratio: vec![co_ratio; n],
            feh_ratio: vec![feh_ratio; n],
            temperature,
            pressure,
        }
    }

    /// A single level column used to ask an engine which species it computes.
    pub fn probe() -> Self {
        Self::uniform(DEFAULT_CO_RATIO, DEFAULT_FEH_RATIO, vec![100.0], vec![0.1])
    }

    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }
}

/// Abundance profiles of one column, keyed by species name.
pub type SpeciesProfiles = BTreeMap<String, Vec<f64>>;

/// An equilibrium chemistry code.
pub trait AbundanceEngine {
    /// Compute the abundance profiles for one column.
    fn compute_abundances(&self, column: &ChemistryColumn) -> Result<SpeciesProfiles, EngineError>;

    /// The species this engine returns. By default, found by running a one-level probe column.
    fn species(&self) -> Result<Vec<String>, EngineError> {
        let profiles = self.compute_abundances(&ChemistryColumn::probe())?;
        Ok(profiles.into_keys().collect())
    }

    /// Compute several columns. The result must have one entry per column, in order.
    fn compute_batch(&self, columns: &[ChemistryColumn]) -> Result<Vec<SpeciesProfiles>, EngineError> {
        columns.iter().map(|c| self.compute_abundances(c)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemistryOptions {
    /// The dataset variable to use as temperature
    pub temp_key: String,
    /// Global C/O ratio
    pub co_ratio: f64,
    /// Global metallicity [Fe/H]
    pub feh_ratio: f64,
}

impl Default for ChemistryOptions {
    fn default() -> Self {
        Self { temp_key: "T".to_string(), co_ratio: DEFAULT_CO_RATIO, feh_ratio: DEFAULT_FEH_RATIO }
    }
}

/// Per grid point abundance profiles, on the pressure levels of the dataset
/// they were computed from.
///
/// All arrays are ordered `(lon, lat, Z)`. `z` is in `p_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbundanceTable {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    #[serde(rename = "Z")]
    pub z: Vec<f64>,
    pub p_unit: PressureUnit,
    #[serde(with = "crate::utils::nan_array")]
    pub temperature: Array3<f64>,
    #[serde(with = "crate::utils::nan_array::map")]
    pub species: BTreeMap<String, Array3<f64>>,
}

impl AbundanceTable {
    pub fn species_names(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(|k| k.as_str())
    }

    pub fn from_json_file(path: &Path) -> error_stack::Result<Self, ChemistryError> {
        let rdr = std::fs::File::open(path)
            .change_context_lazy(|| ChemistryError::ReadError(path.to_path_buf()))?;
        let table: Self = serde_json::from_reader(std::io::BufReader::new(rdr))
            .change_context_lazy(|| ChemistryError::ReadError(path.to_path_buf()))?;
        table.validate()
            .attach_printable_lazy(|| format!("in {}", path.display()))?;
        Ok(table)
    }

    pub fn to_json_file(&self, path: &Path) -> error_stack::Result<(), ChemistryError> {
        let wtr = std::fs::File::create(path)
            .change_context_lazy(|| ChemistryError::WriteError(path.to_path_buf()))?;
        serde_json::to_writer(std::io::BufWriter::new(wtr), self)
            .change_context_lazy(|| ChemistryError::WriteError(path.to_path_buf()))?;
        info!("File written: {}", path.display());
        Ok(())
    }

    /// Check that the temperature and every species array have the shape `(lon, lat, Z)`.
    pub fn validate(&self) -> Result<(), ChemistryError> {
        let expected = (self.lon.len(), self.lat.len(), self.z.len());
        let arrays = std::iter::once(("T", &self.temperature))
            .chain(self.species.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, arr) in arrays {
            if arr.dim() != expected {
                return Err(ChemistryError::TableShape { name: name.to_string(), expected, actual: arr.dim() });
            }
        }
        Ok(())
    }

    /// Prepare the table for a radiative transfer code.
    ///
    /// Every name in `prt_species` is mapped to the table entry named by the part
    /// before its first underscore (e.g. `H2O_main_iso` uses `H2O`), which must exist.
    /// The result contains all table species plus these aliases, interpolated
    /// onto `p_prt_bar` (in bar). Pressures outside the table range are NaN.
    pub fn to_prt<S: AsRef<str>>(&self, prt_species: &[S], p_prt_bar: &[f64]) -> Result<PrtAbundances, ChemistryError> {
        self.validate()?;
        let mut species = self.species.clone();
        for sp_raw in prt_species {
            let sp_raw = sp_raw.as_ref();
            let base = sp_raw.split('_').next().unwrap_or(sp_raw);
            let arr = self.species.get(base)
                .ok_or_else(|| ChemistryError::MissingSpecies(base.to_string()))?;
            species.insert(sp_raw.to_string(), arr.clone());
        }

        let target = p_prt_bar.iter().map(|&p| self.p_unit.from_bar(p)).collect_vec();
        let interp = |name: &str, arr: &Array3<f64>| -> Result<Array3<f64>, ChemistryError> {
            interp_axis(arr.view().into_dyn(), 2, &self.z, &target, Extrapolation::Nan)
                .map_err(|e| ChemistryError::Interpolation(name.to_string(), e))?
                .into_dimensionality::<Ix3>()
                .map_err(|_| ChemistryError::Shape(name.to_string()))
        };

        let temperature = interp("T", &self.temperature)?;
        let mut interpolated = BTreeMap::new();
        for (name, arr) in species.iter() {
            interpolated.insert(name.clone(), interp(name, arr)?);
        }

        Ok(PrtAbundances {
            lon: self.lon.clone(),
            lat: self.lat.clone(),
            pressure_bar: p_prt_bar.to_vec(),
            temperature,
            species: interpolated,
        })
    }
}

/// Temperatures and abundances on a radiative transfer code's pressure grid.
/// Arrays are ordered `(lon, lat, pressure)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrtAbundances {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub pressure_bar: Vec<f64>,
    pub temperature: Array3<f64>,
    pub species: BTreeMap<String, Array3<f64>>,
}

impl PrtAbundances {
    /// The temperature profile and abundance profiles (without [`NON_ABUNDANCE_KEYS`])
    /// of one column.
    pub fn column(&self, ilon: usize, ilat: usize) -> (Vec<f64>, SpeciesProfiles) {
        let temperature = self.temperature.slice(s![ilon, ilat, ..]).to_vec();
        let abundances = self.species.iter()
            .filter(|(k, _)| !NON_ABUNDANCE_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.slice(s![ilon, ilat, ..]).to_vec()))
            .collect();
        (temperature, abundances)
    }
}

/// Run `engine` on every (lon, lat) column of `ds`.
///
/// `ds` must not have a time dimension; this is checked before the engine is
/// called. Columns are sent to the engine longitude-major, i.e. all latitudes
/// of the first longitude come first.
pub fn compute_abundance_table<E: AbundanceEngine + ?Sized>(
    ds: &GriddedDataset,
    engine: &E,
    options: &ChemistryOptions,
) -> error_stack::Result<AbundanceTable, ChemistryError> {
    if ds.has_time_dim() {
        return Err(ChemistryError::TimeDimensionPresent.into());
    }

    let temp = ds.field_zlatlon(&options.temp_key)
        .change_context_lazy(|| ChemistryError::TemperatureField(options.temp_key.clone()))?;
    let pressure = ds.pressures_bar();
    let (nz, nlat, nlon) = temp.dim();

    let species = engine.species().change_context(ChemistryError::Engine)?;
    debug!("Abundance engine provides species: {}", species.iter().join(", "));

    let mut columns = Vec::with_capacity(nlon * nlat);
    for ilon in 0..nlon {
        for ilat in 0..nlat {
            let t = temp.slice(s![.., ilat, ilon]).to_vec();
            columns.push(ChemistryColumn::uniform(options.co_ratio, options.feh_ratio, t, pressure.clone()));
        }
    }

    info!("Computing equilibrium chemistry for {} columns", columns.len());
    let results = engine.compute_batch(&columns).change_context(ChemistryError::Engine)?;
    if results.len() != columns.len() {
        return Err(ChemistryError::WrongColumnCount { expected: columns.len(), actual: results.len() }.into());
    }

    let mut tables: BTreeMap<String, Array3<f64>> = species.iter()
        .map(|sp| (sp.clone(), Array3::zeros((nlon, nlat, nz))))
        .collect();

    for (icol, profiles) in results.iter().enumerate() {
        let (ilon, ilat) = (icol / nlat, icol % nlat);
        for (name, arr) in tables.iter_mut() {
            let profile = profiles.get(name)
                .ok_or_else(|| ChemistryError::IncompleteColumn { ilon, ilat, species: name.clone() })?;
            if profile.len() != nz {
                return Err(ChemistryError::ProfileLength {
                    ilon, ilat, species: name.clone(), expected: nz, actual: profile.len()
                }.into());
            }
            for (iz, &v) in profile.iter().enumerate() {
                arr[[ilon, ilat, iz]] = v;
            }
        }
    }

    let temperature = temp.permuted_axes([2, 1, 0]).as_standard_layout().into_owned();
    Ok(AbundanceTable {
        lon: ds.lon.clone(),
        lat: ds.lat.clone(),
        z: ds.z.clone(),
        p_unit: ds.attrs.p_unit,
        temperature,
        species: tables,
    })
}
