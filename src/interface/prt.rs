//! Interface to a radiative transfer code for emission phase curves.
//!
//! A phase curve is computed in two stages. [`PrtInterface::calc_phase_spectrum`]
//! computes the emergent intensity of every (lon, lat) column at several emission
//! angles; [`phase_curve`] then integrates those intensities over the visible
//! disk for each orbital phase. The radiative transfer itself is done by the
//! [`SpectrumSolver`], [`StellarSpectrum`] and [`PhaseCurveIntegrator`] implementations.
use std::path::{Path, PathBuf};

use error_stack::ResultExt;
use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

use crate::chemistry::{AbundanceEngine, AbundanceTable, ChemistryOptions, SpeciesProfiles};
use crate::collection::DatasetCollection;
use crate::dataset::GriddedDataset;
use crate::engines::EngineError;
use crate::interpolation::{Extrapolation, InterpolationError, LinearInterp};

use super::Interface;

/// Above this many columns, computing the spectra is very slow and a warning is logged.
pub const FINE_GRID_COLUMNS: usize = 300;

/// Intensities of one column, `(emission angle, wavelength)`.
pub type ColumnIntensity = Vec<Vec<f64>>;

#[derive(Debug, thiserror::Error)]
pub enum PrtError {
    #[error("Data is missing. Use set_data() first.")]
    MissingDataset,
    #[error("Could not set the interface data")]
    Interface,
    #[error("The dataset is missing the '{0}' attribute")]
    MissingAttribute(&'static str),
    #[error("No chemistry is available. Compute or load the abundances first.")]
    NoChemistry,
    #[error("Could not prepare the abundances for the radiative transfer")]
    Chemistry,
    #[error("The chemistry {0} coordinates differ from the dataset. Recompute or reload the abundances for this dataset.")]
    ChemistryGridMismatch(&'static str),
    #[error("The spectrum solver failed")]
    Solver,
    #[error("Could not get the stellar spectrum")]
    StellarSpectrum,
    #[error("The phase curve integration failed")]
    PhaseCurve,
    #[error("Could not interpolate the stellar spectrum")]
    Interpolation(#[source] InterpolationError),
    #[error("Unexpected shape: {0}")]
    Shape(String),
    #[error("Please provide a file with the spectrum or a spectrum produced by calc_phase_spectrum")]
    MissingSpectrum,
    #[error("Could not read file '{}'", .0.display())]
    ReadError(PathBuf),
    #[error("Could not write file '{}'", .0.display())]
    WriteError(PathBuf),
}

/// Everything a [`SpectrumSolver`] needs to compute the spectra of a set of columns.
///
/// Per-column entries are ordered with latitude as the outer and longitude as
/// the inner loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumRequest {
    /// Pressures in bar, ascending
    pub pressure: Vec<f64>,
    pub temperature: Vec<Vec<f64>>,
    pub abundances: Vec<SpeciesProfiles>,
    /// Angle in degrees between the column normal and the direction to the star
    pub theta_star: Vec<f64>,
    /// Surface gravity in cgs
    pub gravity: f64,
    /// Mean molecular weight on every pressure level
    pub mmw: Vec<f64>,
    pub t_star: f64,
    /// Stellar radius in cm
    pub r_star: f64,
    /// Orbital distance in cm
    pub semimajoraxis: f64,
    /// Solver specific arguments, passed through unchanged
    pub extra: serde_json::Value,
}

impl SpectrumRequest {
    pub fn n_columns(&self) -> usize {
        self.temperature.len()
    }
}

/// A radiative transfer code able to compute emergent intensities.
pub trait SpectrumSolver {
    /// Set the pressure grid (in bar, ascending) the solver works on.
    fn setup_opa_structure(&mut self, pressures_bar: &[f64]) -> Result<(), EngineError>;

    /// The opacity species the solver needs abundances for.
    fn line_species(&self) -> Result<Vec<String>, EngineError>;

    /// The wavelengths of the computed spectra in micron.
    fn wavelengths_micron(&self) -> Result<Vec<f64>, EngineError>;

    /// Compute one intensity array per column of `request`.
    fn compute_spectra(&self, request: &SpectrumRequest) -> Result<Vec<ColumnIntensity>, EngineError>;
}

/// A stellar spectrum as returned by a [`StellarSpectrum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StellarSpectrumData {
    /// Wavelengths in cm
    pub wavelength: Vec<f64>,
    pub intensity: Vec<f64>,
}

pub trait StellarSpectrum {
    /// The spectrum of a star with effective temperature `t_star` (in K).
    fn spectrum(&self, t_star: f64) -> Result<StellarSpectrumData, EngineError>;
}

/// Spectra of a set of columns to integrate into a phase curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCurveRequest {
    pub phases: Vec<f64>,
    /// One entry per column, latitude as the outer loop
    pub intensity: Vec<ColumnIntensity>,
    /// Longitude of each column
    pub lon: Vec<f64>,
    /// Latitude of each column
    pub lat: Vec<f64>,
}

impl PhaseCurveRequest {
    pub fn from_grid(phases: &[f64], grid: &SpectrumGrid) -> Self {
        let mut intensity = vec![];
        let mut lon = vec![];
        let mut lat = vec![];
        for (ilat, &lat_i) in grid.lat.iter().enumerate() {
            for (ilon, &lon_i) in grid.lon.iter().enumerate() {
                intensity.push(grid.column(ilon, ilat));
                lon.push(lon_i);
                lat.push(lat_i);
            }
        }
        Self { phases: phases.to_vec(), intensity, lon, lat }
    }
}

pub trait PhaseCurveIntegrator {
    /// Integrate over the visible disk, returning one spectrum per phase.
    fn phase_curve(&self, request: &PhaseCurveRequest) -> Result<Vec<Vec<f64>>, EngineError>;
}

/// Mean molecular weight, either one global value or one value per pressure level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MmwProfile {
    Uniform(f64),
    Profile(Vec<f64>),
}

impl MmwProfile {
    fn broadcast(&self, n: usize) -> Result<Vec<f64>, PrtError> {
        match self {
            MmwProfile::Uniform(v) => Ok(vec![*v; n]),
            MmwProfile::Profile(v) if v.len() == n => Ok(v.clone()),
            MmwProfile::Profile(v) => Err(PrtError::Shape(format!(
                "MMW profile has {} levels, the solver uses {n}", v.len()
            ))),
        }
    }
}

fn default_normalize() -> bool {
    true
}

/// Options for [`PrtInterface::calc_phase_spectrum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpectrumOptions {
    pub mmw: MmwProfile,
    /// Stellar radius in cm
    pub r_star_cm: f64,
    /// Stellar effective temperature in K
    pub t_star: f64,
    /// Orbital distance in cm
    pub semimajoraxis_cm: f64,
    /// Surface gravity in cgs, defaults to the gravity of the dataset
    #[serde(default)]
    pub gravity_cgs: Option<f64>,
    /// Scale by (R_p / R_star)^2 and divide by the stellar spectrum
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    /// Where to save the spectra
    #[serde(default)]
    pub filename: Option<PathBuf>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl PhaseSpectrumOptions {
    pub fn new(mmw: MmwProfile, r_star_cm: f64, t_star: f64, semimajoraxis_cm: f64) -> Self {
        Self {
            mmw,
            r_star_cm,
            t_star,
            semimajoraxis_cm,
            gravity_cgs: None,
            normalize: true,
            filename: None,
            extra: serde_json::Value::Null,
        }
    }
}

/// Intensities of every column, `(lon, lat, emission angle, wavelength)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumGrid {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub wavelength_micron: Vec<f64>,
    #[serde(with = "crate::utils::nan_array")]
    pub values: Array4<f64>,
}

impl SpectrumGrid {
    pub fn n_angles(&self) -> usize {
        self.values.dim().2
    }

    /// The `(angle, wavelength)` intensities of one column.
    pub fn column(&self, ilon: usize, ilat: usize) -> ColumnIntensity {
        self.values.slice(ndarray::s![ilon, ilat, .., ..])
            .outer_iter()
            .map(|row| row.to_vec())
            .collect_vec()
    }

    pub fn from_json_file(path: &Path) -> error_stack::Result<Self, PrtError> {
        let rdr = std::fs::File::open(path)
            .change_context_lazy(|| PrtError::ReadError(path.to_path_buf()))?;
        serde_json::from_reader(std::io::BufReader::new(rdr))
            .change_context_lazy(|| PrtError::ReadError(path.to_path_buf()))
    }

    pub fn to_json_file(&self, path: &Path) -> error_stack::Result<(), PrtError> {
        let wtr = std::fs::File::create(path)
            .change_context_lazy(|| PrtError::WriteError(path.to_path_buf()))?;
        serde_json::to_writer(std::io::BufWriter::new(wtr), self)
            .change_context_lazy(|| PrtError::WriteError(path.to_path_buf()))?;
        info!("File written: {}", path.display());
        Ok(())
    }
}

/// Disk-integrated spectra, `(phase, wavelength)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCurve {
    pub phases: Vec<f64>,
    pub wavelength_micron: Vec<f64>,
    pub values: Array2<f64>,
}

impl PhaseCurve {
    /// Write the phase curve as CSV, one row per phase and one column per wavelength.
    pub fn write_csv<W: std::io::Write>(&self, wtr: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(wtr);
        let header = std::iter::once("phase".to_string())
            .chain(self.wavelength_micron.iter().map(|w| format!("{w}um")));
        wtr.write_record(header)?;
        for (phase, row) in self.phases.iter().zip(self.values.outer_iter()) {
            let record = std::iter::once(phase.to_string())
                .chain(row.iter().map(|v| v.to_string()));
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_file(&self, path: &Path) -> error_stack::Result<(), PrtError> {
        let f = std::fs::File::create(path)
            .change_context_lazy(|| PrtError::WriteError(path.to_path_buf()))?;
        self.write_csv(f)
            .change_context_lazy(|| PrtError::WriteError(path.to_path_buf()))?;
        info!("File written: {}", path.display());
        Ok(())
    }
}

/// Angle in degrees between the local vertical at (`lon`, `lat`) and the substellar point.
pub fn theta_star(lon: f64, lat: f64) -> f64 {
    let mu = lon.to_radians().cos() * lat.to_radians().cos();
    mu.clamp(-1.0, 1.0).acos().to_degrees()
}

/// The stellar intensity at `wlen_micron`, holding the edge values outside the stellar wavelength range.
pub fn stellar_intensity_on<St: StellarSpectrum + ?Sized>(
    stellar: &St,
    t_star: f64,
    wlen_micron: &[f64],
) -> error_stack::Result<Vec<f64>, PrtError> {
    let spec = stellar.spectrum(t_star)
        .change_context(PrtError::StellarSpectrum)?;
    if spec.wavelength.len() != spec.intensity.len() {
        return Err(PrtError::Shape(format!(
            "stellar spectrum has {} wavelengths but {} intensities",
            spec.wavelength.len(), spec.intensity.len()
        )).into());
    }
    let interp = LinearInterp::new(&spec.wavelength, Extrapolation::Clamp)
        .map_err(PrtError::Interpolation)?;
    let fp = interp.sort_values(&spec.intensity);
    Ok(wlen_micron.iter().map(|w| interp.eval_sorted(&fp, w * 1e-4)).collect_vec())
}

/// Integrate spectra into a phase curve at `phases`.
///
/// The spectra are either given directly or read from `filename` (as written
/// by [`SpectrumGrid::to_json_file`]); `spectra` takes precedence if both are given.
pub fn phase_curve<P: PhaseCurveIntegrator + ?Sized>(
    integrator: &P,
    phases: &[f64],
    spectra: Option<&SpectrumGrid>,
    filename: Option<&Path>,
) -> error_stack::Result<PhaseCurve, PrtError> {
    let loaded;
    let grid = match (spectra, filename) {
        (Some(grid), _) => grid,
        (None, Some(path)) => {
            loaded = SpectrumGrid::from_json_file(path)?;
            &loaded
        },
        (None, None) => return Err(PrtError::MissingSpectrum.into()),
    };

    let request = PhaseCurveRequest::from_grid(phases, grid);
    let rows = integrator.phase_curve(&request)
        .change_context(PrtError::PhaseCurve)?;

    let nw = grid.wavelength_micron.len();
    if rows.len() != phases.len() || rows.iter().any(|r| r.len() != nw) {
        return Err(PrtError::Shape(format!(
            "expected {} phases with {nw} wavelengths each from the phase curve integration",
            phases.len()
        )).into());
    }
    let values = Array2::from_shape_vec((phases.len(), nw), rows.concat())
        .map_err(|e| PrtError::Shape(e.to_string()))?;

    Ok(PhaseCurve { phases: phases.to_vec(), wavelength_micron: grid.wavelength_micron.clone(), values })
}

/// Computes emission spectra of one time step of a GCM.
pub struct PrtInterface<S> {
    base: Interface,
    solver: S,
    pressures_bar: Option<Vec<f64>>,
}

impl<S: SpectrumSolver> PrtInterface<S> {
    pub fn new(solver: S) -> Self {
        Self { base: Interface::new(), solver, pressures_bar: None }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// The pressure grid of the solver in bar, once data is set.
    pub fn pressures_bar(&self) -> Option<&[f64]> {
        self.pressures_bar.as_deref()
    }

    /// Select the data (see [`Interface::set_data`]) and set up the solver on its pressures.
    ///
    /// `regrid_lowres` is honoured: with `true` the selected time step is first
    /// interpolated onto the 15 degree [`lowres_grid`](super::lowres_grid), and the
    /// spectra are later computed on those 24 x 12 columns.
    pub fn set_data(
        &mut self,
        tools: &DatasetCollection,
        time: f64,
        tag: Option<&str>,
        regrid_lowres: bool,
    ) -> error_stack::Result<&GriddedDataset, PrtError> {
        self.base.set_data(tools, time, tag, regrid_lowres)
            .change_context(PrtError::Interface)?;
        self.setup_solver()?;
        Ok(self.dataset()?)
    }

    /// Use a dataset which already has a single time step selected.
    pub fn set_dataset(&mut self, ds: GriddedDataset) -> error_stack::Result<&GriddedDataset, PrtError> {
        self.base.set_dataset(ds)
            .change_context(PrtError::Interface)?;
        self.setup_solver()?;
        Ok(self.dataset()?)
    }

    fn setup_solver(&mut self) -> error_stack::Result<(), PrtError> {
        let mut pressures = self.dataset()?.pressures_bar();
        pressures.sort_by(f64::total_cmp);
        self.solver.setup_opa_structure(&pressures)
            .change_context(PrtError::Solver)?;
        self.pressures_bar = Some(pressures);
        Ok(())
    }

    pub fn dataset(&self) -> Result<&GriddedDataset, PrtError> {
        self.base.dataset().map_err(|_| PrtError::MissingDataset)
    }

    pub fn chemistry(&self) -> Result<&AbundanceTable, PrtError> {
        self.base.chemistry().map_err(|_| PrtError::NoChemistry)
    }

    pub fn set_chemistry(&mut self, table: AbundanceTable) {
        self.base.set_chemistry(table)
    }

    /// See [`Interface::chem_from_engine`].
    pub fn chem_from_engine<E: AbundanceEngine + ?Sized>(
        &mut self,
        engine: &E,
        options: &ChemistryOptions,
    ) -> error_stack::Result<&AbundanceTable, PrtError> {
        self.base.chem_from_engine(engine, options)
            .change_context(PrtError::Chemistry)
    }

    /// Compute the spectra of every column for a phase curve.
    ///
    /// Requires the planetary radius in the dataset attributes and the chemistry
    /// to be computed. With `options.normalize` the intensities are scaled by
    /// (R_p / R_star)^2 and divided by the stellar spectrum.
    pub fn calc_phase_spectrum<St: StellarSpectrum + ?Sized>(
        &self,
        stellar: &St,
        options: &PhaseSpectrumOptions,
    ) -> error_stack::Result<SpectrumGrid, PrtError> {
        let ds = self.dataset()?;
        let r_p = ds.attrs.r_p.ok_or(PrtError::MissingAttribute("R_p"))?;
        let gravity = match options.gravity_cgs {
            Some(g) => g,
            None => ds.attrs.g.map(|g| g * 100.0).ok_or(PrtError::MissingAttribute("g"))?,
        };
        let chem = self.chemistry()?;
        check_chemistry_grid(ds, chem)?;
        let pressures = self.pressures_bar().ok_or(PrtError::MissingDataset)?;

        let line_species = self.solver.line_species()
            .change_context(PrtError::Solver)?;
        let wlen = self.solver.wavelengths_micron()
            .change_context(PrtError::Solver)?;
        let abus = chem.to_prt(&line_species, pressures)
            .change_context(PrtError::Chemistry)?;

        let (nlon, nlat) = (abus.lon.len(), abus.lat.len());
        let ncol = nlon * nlat;
        if ncol > FINE_GRID_COLUMNS {
            warn!("Calculating a phasecurve on a fine grid takes very long. A resolution of 15 degrees is usually sufficient.");
        }

        let mut request = SpectrumRequest {
            pressure: pressures.to_vec(),
            temperature: Vec::with_capacity(ncol),
            abundances: Vec::with_capacity(ncol),
            theta_star: Vec::with_capacity(ncol),
            gravity,
            mmw: options.mmw.broadcast(pressures.len())?,
            t_star: options.t_star,
            r_star: options.r_star_cm,
            semimajoraxis: options.semimajoraxis_cm,
            extra: options.extra.clone(),
        };
        for (ilat, &lat) in abus.lat.iter().enumerate() {
            for (ilon, &lon) in abus.lon.iter().enumerate() {
                let (temperature, abundances) = abus.column(ilon, ilat);
                request.temperature.push(temperature);
                request.abundances.push(abundances);
                request.theta_star.push(theta_star(lon, lat));
            }
        }

        debug!("Computing spectra of {ncol} columns at {} wavelengths", wlen.len());
        let raw = self.solver.compute_spectra(&request)
            .change_context(PrtError::Solver)?;
        if raw.len() != ncol {
            return Err(PrtError::Shape(format!("solver returned {} columns, expected {ncol}", raw.len())).into());
        }

        let norm = if options.normalize {
            let star = stellar_intensity_on(stellar, options.t_star, &wlen)?;
            let scale = (r_p * 100.0 / options.r_star_cm).powi(2);
            Some((scale, star))
        } else {
            None
        };

        let nmu = raw.first().map(|c| c.len()).unwrap_or(0);
        let mut values = Array4::<f64>::zeros((nlon, nlat, nmu, wlen.len()));
        for (icol, column) in raw.iter().enumerate() {
            let (ilat, ilon) = (icol / nlon, icol % nlon);
            if column.len() != nmu || column.iter().any(|r| r.len() != wlen.len()) {
                return Err(PrtError::Shape(format!(
                    "column {icol} is not {nmu} angles by {} wavelengths", wlen.len()
                )).into());
            }
            for (imu, row) in column.iter().enumerate() {
                for (iw, &v) in row.iter().enumerate() {
                    values[[ilon, ilat, imu, iw]] = match &norm {
                        Some((scale, star)) => v * scale / star[iw],
                        None => v,
                    };
                }
            }
        }

        let grid = SpectrumGrid { lon: abus.lon, lat: abus.lat, wavelength_micron: wlen, values };
        if let Some(path) = &options.filename {
            grid.to_json_file(path)?;
        }
        Ok(grid)
    }

    /// See [`phase_curve`].
    pub fn phase_curve<P: PhaseCurveIntegrator + ?Sized>(
        &self,
        integrator: &P,
        phases: &[f64],
        spectra: Option<&SpectrumGrid>,
        filename: Option<&Path>,
    ) -> error_stack::Result<PhaseCurve, PrtError> {
        phase_curve(integrator, phases, spectra, filename)
    }
}

/// Check that `chem` was computed on the lon, lat and pressure levels of `ds`.
fn check_chemistry_grid(ds: &GriddedDataset, chem: &AbundanceTable) -> Result<(), PrtError> {
    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0))
    }
    if !close(&chem.lon, &ds.lon) {
        return Err(PrtError::ChemistryGridMismatch("lon"));
    }
    if !close(&chem.lat, &ds.lat) {
        return Err(PrtError::ChemistryGridMismatch("lat"));
    }
    let chem_bar = chem.z.iter().map(|&p| chem.p_unit.to_bar(p)).collect_vec();
    if !close(&chem_bar, &ds.pressures_bar()) {
        return Err(PrtError::ChemistryGridMismatch("Z"));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::chemistry::test_utils::StubEngine;
    use crate::dataset::test_utils::{dataset_from_fn, linspace};
    use crate::units::PressureUnit;

    fn interface() -> PrtInterface<StubSolver> {
        let ds = dataset_from_fn(
            vec![0.0, 90.0],
            vec![-30.0, 0.0, 30.0],
            vec![1e5, 1e4, 1e3],
            PressureUnit::Pa,
            |_, _, lon| 1000.0 + lon,
            |_, _, _| 100.0,
        ).select_time(100.0).unwrap();
        let mut iface = PrtInterface::new(StubSolver::default());
        iface.set_dataset(ds).unwrap();
        iface
    }

    fn options() -> PhaseSpectrumOptions {
        // R_p = 7.1e7 m, so (R_p / R_star)^2 = 1
        PhaseSpectrumOptions::new(MmwProfile::Uniform(2.33), 7.1e9, 5000.0, 7e11)
    }

    #[test]
    fn test_solver_setup() {
        let iface = interface();
        assert_eq!(iface.solver().pressures, vec![0.01, 0.1, 1.0]);
        assert_eq!(iface.pressures_bar(), Some([0.01, 0.1, 1.0].as_slice()));
    }

    #[test]
    fn test_set_data_regrid_lowres() {
        let ds = dataset_from_fn(
            linspace(-180.0, 180.0, 37),
            linspace(-90.0, 90.0, 19),
            vec![1e6, 1e5],
            PressureUnit::Pa,
            |_, lat, lon| 1000.0 + lat + lon,
            |_, _, _| 10.0,
        );
        let mut coll = DatasetCollection::new(PressureUnit::Pa);
        coll.add(ds, Some("hj")).unwrap();

        let mut iface = PrtInterface::new(StubSolver::default());
        let sel = iface.set_data(&coll, 100.0, None, true).unwrap();
        assert_eq!((sel.lon.len(), sel.lat.len()), (24, 12));
        assert!(!sel.has_time_dim());
        assert_eq!(iface.solver().pressures, vec![1.0, 10.0]);

        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();
        let grid = iface.calc_phase_spectrum(&StubStar, &options()).unwrap();
        assert_eq!(grid.values.dim(), (24, 12, 2, 2));

        let sel = iface.set_data(&coll, 100.0, None, false).unwrap();
        assert_eq!((sel.lon.len(), sel.lat.len()), (37, 19));
    }

    #[test]
    fn test_chemistry_grid_checked_before_solver() {
        let mut iface = interface();
        let table = iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap().clone();

        let mut shifted = table.clone();
        shifted.lon = vec![0.0, 100.0];
        iface.set_chemistry(shifted);
        let err = iface.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::ChemistryGridMismatch("lon")));

        let mut fewer_lat = table.clone();
        fewer_lat.lat.pop();
        fewer_lat.temperature = fewer_lat.temperature.slice(ndarray::s![.., ..2, ..]).to_owned();
        fewer_lat.species.values_mut().for_each(|a| *a = a.slice(ndarray::s![.., ..2, ..]).to_owned());
        iface.set_chemistry(fewer_lat);
        let err = iface.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::ChemistryGridMismatch("lat")));

        let mut other_levels = table.clone();
        other_levels.z = vec![2e5, 2e4, 2e3];
        iface.set_chemistry(other_levels);
        let err = iface.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::ChemistryGridMismatch("Z")));

        let mut malformed = table.clone();
        malformed.species.insert("H2O".to_string(), ndarray::Array3::zeros((2, 3, 1)));
        iface.set_chemistry(malformed);
        let err = iface.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::Chemistry));
        assert_eq!(iface.solver().calls.get(), 0);

        // the same levels in another unit are accepted
        let mut in_bar = table;
        in_bar.z = vec![1.0, 0.1, 0.01];
        in_bar.p_unit = PressureUnit::Bar;
        iface.set_chemistry(in_bar);
        assert!(iface.calc_phase_spectrum(&StubStar, &options()).is_ok());
        assert_eq!(iface.solver().calls.get(), 1);
    }

    #[test]
    fn test_theta_star() {
        assert!(theta_star(0.0, 0.0).abs() < 1e-12);
        assert!((theta_star(90.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((theta_star(180.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((theta_star(0.0, 60.0) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_spectrum() {
        let mut iface = interface();
        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();
        let grid = iface.calc_phase_spectrum(&StubStar, &options()).unwrap();
        assert_eq!(grid.values.dim(), (2, 3, 2, 2));
        assert_eq!(grid.n_angles(), 2);

        // lon = 90, second angle, 2 micron: 1090 * 2 / 4
        assert!((grid.values[[1, 0, 1, 1]] - 545.0).abs() < 1e-9);
        // lon = 0, first angle, 1 micron: 1000 / 2
        assert!((grid.values[[0, 2, 0, 0]] - 500.0).abs() < 1e-9);

        let request = iface.solver().last_request.borrow().clone().unwrap();
        assert_eq!(request.n_columns(), 6);
        assert_eq!(request.gravity, 1000.0);
        assert_eq!(request.mmw, vec![2.33; 3]);
        // latitude is the outer loop
        assert_eq!(request.temperature[1][0], 1090.0);
        assert!((request.theta_star[1] - 90.0).abs() < 1e-9);
        assert!(request.abundances[0].contains_key("H2O_main_iso"));
        assert!(!request.abundances[0].contains_key("MMW"));
    }

    #[test]
    fn test_unnormalized() {
        let mut iface = interface();
        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();
        let mut opts = options();
        opts.normalize = false;
        opts.gravity_cgs = Some(2500.0);
        let grid = iface.calc_phase_spectrum(&StubStar, &opts).unwrap();
        assert_eq!(grid.values[[1, 0, 1, 1]], 2180.0);
        assert_eq!(iface.solver().last_request.borrow().as_ref().unwrap().gravity, 2500.0);
    }

    #[test]
    fn test_missing_radius_checked_before_solver() {
        let mut iface = interface();
        let mut ds = iface.dataset().unwrap().clone();
        ds.attrs.r_p = None;
        iface.set_dataset(ds).unwrap();
        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();

        let err = iface.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::MissingAttribute("R_p")));
        assert_eq!(iface.solver().calls.get(), 0);
    }

    #[test]
    fn test_missing_chemistry() {
        let iface = interface();
        let err = iface.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::NoChemistry));

        let empty = PrtInterface::new(StubSolver::default());
        let err = empty.calc_phase_spectrum(&StubStar, &options()).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::MissingDataset));
    }

    #[test]
    fn test_mmw_profile_length() {
        let mut iface = interface();
        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();
        let mut opts = options();
        opts.mmw = MmwProfile::Profile(vec![2.3, 2.3]);
        let err = iface.calc_phase_spectrum(&StubStar, &opts).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::Shape(_)));
    }

    #[test]
    fn test_phase_curve() {
        let mut iface = interface();
        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();
        let grid = iface.calc_phase_spectrum(&StubStar, &options()).unwrap();

        let err = iface.phase_curve(&StubIntegrator, &[0.0, 0.5], None, None).unwrap_err();
        assert!(matches!(err.current_context(), PrtError::MissingSpectrum));

        let curve = iface.phase_curve(&StubIntegrator, &[0.0, 0.5], Some(&grid), None).unwrap();
        assert_eq!(curve.values.dim(), (2, 2));
        assert_eq!(curve.values[[0, 0]], 0.0);
        // three columns at 1000 K and three at 1090 K, divided by 2 at 1 micron
        assert!((curve.values[[1, 0]] - 0.5 * (1500.0 + 1635.0)).abs() < 1e-9);

        let mut buf = vec![];
        curve.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().next(), Some("phase,1um,2um"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_phase_curve_from_file() {
        let mut iface = interface();
        iface.chem_from_engine(&StubEngine::default(), &ChemistryOptions::default()).unwrap();
        let path = std::env::temp_dir().join(format!("gcmt-prt-spectra-{}.json", std::process::id()));
        let mut opts = options();
        opts.filename = Some(path.clone());
        let grid = iface.calc_phase_spectrum(&StubStar, &opts).unwrap();

        let from_file = phase_curve(&StubIntegrator, &[1.0], None, Some(&path)).unwrap();
        let direct = phase_curve(&StubIntegrator, &[1.0], Some(&grid), None).unwrap();
        assert_eq!(from_file, direct);
        std::fs::remove_file(&path).unwrap();
    }
}
