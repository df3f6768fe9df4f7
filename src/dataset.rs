use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use ndarray::{Array3, ArrayD, Axis, Ix3};
use serde::{Deserialize, Serialize};

use crate::interpolation::{interp_axis, Extrapolation, InterpolationError};
use crate::units::PressureUnit;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Cannot read dataset file {}: {}", .0.display(), .1)]
    CannotReadFile(PathBuf, std::io::Error),
    #[error("Cannot write dataset file {}: {}", .0.display(), .1)]
    CannotWriteFile(PathBuf, std::io::Error),
    #[error("Error deserializing {}: {}", .0.display(), .1)]
    DeserializationError(PathBuf, serde_json::Error),
    #[error("Error serializing dataset to {}: {}", .0.display(), .1)]
    SerializationError(PathBuf, serde_json::Error),
    #[error("The dataset does not contain the variable '{0}'")]
    MissingVariable(String),
    #[error("The dataset does not contain the attribute '{0}'")]
    MissingAttribute(&'static str),
    #[error("Dataset should not have a time dimension. Select the timestamp beforehand.")]
    TimeDimensionPresent,
    #[error("Time {0} is not present in the dataset")]
    TimeNotFound(f64),
    #[error("The {0} coordinate is empty")]
    EmptyCoordinate(Dim),
    #[error("Variable '{variable}' uses the {dim} dimension, but the dataset has no {dim} coordinate")]
    MissingCoordinate { variable: String, dim: Dim },
    #[error("Variable '{variable}' has {actual} values along {dim}, but the coordinate has {expected}")]
    ShapeMismatch { variable: String, dim: Dim, expected: usize, actual: usize },
    #[error("Variable '{variable}' has {ndims} dimension names for an array with {ndim} axes")]
    RankMismatch { variable: String, ndims: usize, ndim: usize },
    #[error("Variable '{variable}' repeats the {dim} dimension")]
    RepeatedDim { variable: String, dim: Dim },
    #[error("Variable '{variable}' has dimensions ({actual}), expected ({expected})")]
    WrongDims { variable: String, expected: String, actual: String },
    #[error("Could not interpolate variable '{0}'")]
    Interpolation(String, #[source] InterpolationError),
}

/// The named dimensions a gridded field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dim {
    #[serde(rename = "time")]
    Time,
    /// The vertical (pressure) dimension
    #[serde(rename = "Z")]
    Z,
    #[serde(rename = "lat")]
    Lat,
    #[serde(rename = "lon")]
    Lon,
}

impl Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dim::Time => write!(f, "time"),
            Dim::Z => write!(f, "Z"),
            Dim::Lat => write!(f, "lat"),
            Dim::Lon => write!(f, "lon"),
        }
    }
}

/// A single gridded field and the names of its axes, in storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub dims: Vec<Dim>,
    #[serde(with = "crate::utils::nan_array")]
    pub values: ArrayD<f64>,
}

impl Variable {
    pub fn new(dims: Vec<Dim>, values: ArrayD<f64>) -> Self {
        Self { dims, values }
    }

    /// The axis index of `dim` in `values`, if this variable has that dimension.
    pub fn axis_of(&self, dim: Dim) -> Option<usize> {
        self.dims.iter().position(|d| *d == dim)
    }

    pub fn has_dim(&self, dim: Dim) -> bool {
        self.axis_of(dim).is_some()
    }
}

/// Scalar metadata attached to a dataset.
///
/// Only the pressure unit is required; the planetary quantities are optional
/// until an operation needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAttrs {
    pub p_unit: PressureUnit,

    /// Identifier of the model, used as the default output name
    #[serde(default)]
    pub tag: Option<String>,

    /// Planetary radius in m
    #[serde(default, rename = "R_p")]
    pub r_p: Option<f64>,

    /// Surface gravity in m/s^2
    #[serde(default)]
    pub g: Option<f64>,

    /// Reference pressure, in the same unit as the Z coordinate
    #[serde(default)]
    pub p_ref: Option<f64>,

    /// Rotation period in s
    #[serde(default, rename = "P_rot")]
    pub p_rot: Option<f64>,

    /// Orbital period in s
    #[serde(default, rename = "P_orb")]
    pub p_orb: Option<f64>,
}

impl DatasetAttrs {
    pub fn new(p_unit: PressureUnit) -> Self {
        Self { p_unit, tag: None, r_p: None, g: None, p_ref: None, p_rot: None, p_orb: None }
    }
}

/// A collection of gridded fields sharing the `lon`, `lat`, `Z` and (optionally)
/// `time` coordinates of one GCM simulation.
///
/// # Serialized format
///
/// Datasets are stored as JSON. The coordinates are plain arrays, each variable
/// lists its dimension names and an ndarray-serialized array:
///
/// ```json
/// {
///   "lon": [-90.0, 0.0, 90.0],
///   "lat": [-45.0, 0.0, 45.0],
///   "Z": [100.0, 10.0, 1.0],
///   "time": [100.0],
///   "variables": {
///     "T": {"dims": ["time", "Z", "lat", "lon"], "values": {"v": 1, "dim": [1, 3, 3, 3], "data": [...]}}
///   },
///   "attrs": {"p_unit": "bar", "tag": "HD2", "R_p": 7.1e7, "g": 10.0}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedDataset {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    #[serde(rename = "Z")]
    pub z: Vec<f64>,
    #[serde(default)]
    pub time: Option<Vec<f64>>,
    /// The time value this dataset was selected at, once the time dimension is removed.
    #[serde(default)]
    pub selected_time: Option<f64>,
    pub variables: BTreeMap<String, Variable>,
    pub attrs: DatasetAttrs,
}

impl GriddedDataset {
    pub fn new(lon: Vec<f64>, lat: Vec<f64>, z: Vec<f64>, time: Option<Vec<f64>>, attrs: DatasetAttrs) -> Self {
        Self { lon, lat, z, time, selected_time: None, variables: BTreeMap::new(), attrs }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DatasetError> {
        let reader = std::fs::File::open(path)
            .map_err(|e| DatasetError::CannotReadFile(path.to_path_buf(), e))?;
        let ds: Self = serde_json::from_reader(std::io::BufReader::new(reader))
            .map_err(|e| DatasetError::DeserializationError(path.to_path_buf(), e))?;
        ds.validate()?;
        Ok(ds)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), DatasetError> {
        let writer = std::fs::File::create(path)
            .map_err(|e| DatasetError::CannotWriteFile(path.to_path_buf(), e))?;
        serde_json::to_writer(std::io::BufWriter::new(writer), self)
            .map_err(|e| DatasetError::SerializationError(path.to_path_buf(), e))
    }

    pub fn tag(&self) -> Option<&str> {
        self.attrs.tag.as_deref()
    }

    pub fn coord(&self, dim: Dim) -> Option<&[f64]> {
        match dim {
            Dim::Time => self.time.as_deref(),
            Dim::Z => Some(&self.z),
            Dim::Lat => Some(&self.lat),
            Dim::Lon => Some(&self.lon),
        }
    }

    /// True if the dataset still has a time dimension, i.e. no single time step
    /// has been selected.
    pub fn has_time_dim(&self) -> bool {
        self.time.is_some() || self.variables.values().any(|v| v.has_dim(Dim::Time))
    }

    pub fn ensure_no_time_dim(&self) -> Result<(), DatasetError> {
        if self.has_time_dim() {
            Err(DatasetError::TimeDimensionPresent)
        } else {
            Ok(())
        }
    }

    pub fn variable(&self, key: &str) -> Result<&Variable, DatasetError> {
        self.variables.get(key)
            .ok_or_else(|| DatasetError::MissingVariable(key.to_string()))
    }

    /// Add (or replace) a variable, checking that it fits the dataset's coordinates.
    pub fn insert_variable(&mut self, key: &str, var: Variable) -> Result<(), DatasetError> {
        self.check_variable(key, &var)?;
        self.variables.insert(key.to_string(), var);
        Ok(())
    }

    /// The pressure coordinate converted to bar.
    pub fn pressures_bar(&self) -> Vec<f64> {
        self.z.iter().map(|&p| self.attrs.p_unit.to_bar(p)).collect_vec()
    }

    /// Check that every variable is consistent with the coordinates.
    pub fn validate(&self) -> Result<(), DatasetError> {
        for (key, var) in self.variables.iter() {
            self.check_variable(key, var)?;
        }
        Ok(())
    }

    /// Check that this dataset fulfills the minimal requirements to be used
    /// by the interfaces: non-empty coordinates and temperature (`T`) and
    /// zonal wind (`U`) fields that fit them.
    pub fn check_basic(&self) -> Result<(), DatasetError> {
        for dim in [Dim::Lon, Dim::Lat, Dim::Z] {
            if self.coord(dim).map(|c| c.is_empty()).unwrap_or(true) {
                return Err(DatasetError::EmptyCoordinate(dim));
            }
        }
        for key in ["T", "U"] {
            self.variable(key)?;
        }
        self.validate()
    }

    fn check_variable(&self, key: &str, var: &Variable) -> Result<(), DatasetError> {
        if var.dims.len() != var.values.ndim() {
            return Err(DatasetError::RankMismatch {
                variable: key.to_string(),
                ndims: var.dims.len(),
                ndim: var.values.ndim(),
            });
        }

        for (i, dim) in var.dims.iter().enumerate() {
            if var.dims[..i].contains(dim) {
                return Err(DatasetError::RepeatedDim { variable: key.to_string(), dim: *dim });
            }

            let coord = self.coord(*dim)
                .ok_or_else(|| DatasetError::MissingCoordinate { variable: key.to_string(), dim: *dim })?;
            let actual = var.values.len_of(Axis(i));
            if actual != coord.len() {
                return Err(DatasetError::ShapeMismatch {
                    variable: key.to_string(),
                    dim: *dim,
                    expected: coord.len(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Return the field `key` as a 3D array ordered `(Z, lat, lon)`.
    ///
    /// The field must have exactly these three dimensions (in any order); in
    /// particular, a dataset that still has a time dimension is rejected.
    pub fn field_zlatlon(&self, key: &str) -> Result<Array3<f64>, DatasetError> {
        self.ensure_no_time_dim()?;
        let var = self.variable(key)?;

        let wrong_dims = || DatasetError::WrongDims {
            variable: key.to_string(),
            expected: "Z, lat, lon".to_string(),
            actual: var.dims.iter().join(", "),
        };
        if var.dims.len() != 3 {
            return Err(wrong_dims());
        }
        let perm: Vec<usize> = [Dim::Z, Dim::Lat, Dim::Lon].iter()
            .map(|d| var.axis_of(*d).ok_or_else(wrong_dims))
            .try_collect()?;

        let arr = var.values.view()
            .permuted_axes(perm)
            .into_dimensionality::<Ix3>()
            .map_err(|_| wrong_dims())?;
        Ok(arr.to_owned())
    }

    /// Select a single time step, removing the time dimension from every variable.
    ///
    /// The time value must match one of the time coordinates. Selecting the time a
    /// dataset was already reduced to returns an identical copy of it.
    pub fn select_time(&self, time: f64) -> Result<GriddedDataset, DatasetError> {
        let matches = |t: f64| (t - time).abs() <= 1e-9 * time.abs().max(1.0);

        let times = match &self.time {
            Some(times) => times,
            None => {
                return match self.selected_time {
                    Some(t) if matches(t) && !self.has_time_dim() => Ok(self.clone()),
                    _ => Err(DatasetError::TimeNotFound(time)),
                };
            }
        };

        let itime = times.iter()
            .position(|&t| matches(t))
            .ok_or(DatasetError::TimeNotFound(time))?;

        let mut variables = BTreeMap::new();
        for (key, var) in self.variables.iter() {
            let new_var = if let Some(ax) = var.axis_of(Dim::Time) {
                let values = var.values.index_axis(Axis(ax), itime).to_owned();
                let dims = var.dims.iter().copied().filter(|d| *d != Dim::Time).collect_vec();
                Variable::new(dims, values)
            } else {
                var.clone()
            };
            variables.insert(key.clone(), new_var);
        }

        log::debug!("Selected time step {} (index {itime}) from {}", times[itime], self.tag().unwrap_or("untagged dataset"));
        Ok(GriddedDataset {
            lon: self.lon.clone(),
            lat: self.lat.clone(),
            z: self.z.clone(),
            time: None,
            selected_time: Some(times[itime]),
            variables,
            attrs: self.attrs.clone(),
        })
    }

    /// Linearly interpolate every horizontal field onto new longitude and latitude
    /// coordinates. Points outside the original coordinate range follow `extrapolation`.
    pub fn regrid(&self, lon: &[f64], lat: &[f64], extrapolation: Extrapolation) -> Result<GriddedDataset, DatasetError> {
        let mut variables = BTreeMap::new();
        for (key, var) in self.variables.iter() {
            let mut values = var.values.clone();
            for (dim, src, dst) in [(Dim::Lon, &self.lon, lon), (Dim::Lat, &self.lat, lat)] {
                if let Some(ax) = var.axis_of(dim) {
                    values = interp_axis(values.view(), ax, src, dst, extrapolation)
                        .map_err(|e| DatasetError::Interpolation(key.clone(), e))?;
                }
            }
            variables.insert(key.clone(), Variable::new(var.dims.clone(), values));
        }

        Ok(GriddedDataset {
            lon: lon.to_vec(),
            lat: lat.to_vec(),
            z: self.z.clone(),
            time: self.time.clone(),
            selected_time: self.selected_time,
            variables,
            attrs: self.attrs.clone(),
        })
    }

    /// Rescale the pressure coordinate (and reference pressure) from `current` to `goal`.
    ///
    /// `current` overrides whatever unit the attributes claim, which is needed
    /// for files that were written without a reliable unit attribute.
    pub fn convert_pressure(&mut self, current: PressureUnit, goal: PressureUnit) {
        for p in self.z.iter_mut() {
            *p = current.convert(*p, goal);
        }
        self.attrs.p_ref = self.attrs.p_ref.map(|p| current.convert(p, goal));
        self.attrs.p_unit = goal;
    }
}


#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::test_utils::*;
    use super::*;

    fn simple() -> GriddedDataset {
        uniform_dataset(
            vec![-90.0, 0.0, 90.0],
            vec![-45.0, 0.0, 45.0],
            vec![100.0, 10.0, 1.0],
            PressureUnit::Bar,
            300.0,
            10.0,
        )
    }

    #[test]
    fn test_select_time_removes_dim() {
        let ds = simple();
        assert!(ds.has_time_dim());
        let sel = ds.select_time(100.0).unwrap();
        assert!(!sel.has_time_dim());
        assert_eq!(sel.selected_time, Some(100.0));
        assert_eq!(sel.variable("T").unwrap().dims, vec![Dim::Z, Dim::Lat, Dim::Lon]);
        assert_eq!(sel.variable("T").unwrap().values.shape(), &[3, 3, 3]);
    }

    #[test]
    fn test_select_time_idempotent() {
        let sel = simple().select_time(100.0).unwrap();
        let again = sel.select_time(100.0).unwrap();
        assert_eq!(sel, again);
        assert!(matches!(sel.select_time(200.0), Err(DatasetError::TimeNotFound(_))));
    }

    #[test]
    fn test_select_missing_time() {
        assert!(matches!(simple().select_time(5.0), Err(DatasetError::TimeNotFound(t)) if t == 5.0));
    }

    #[test]
    fn test_field_zlatlon() {
        let ds = simple();
        assert!(matches!(ds.field_zlatlon("T"), Err(DatasetError::TimeDimensionPresent)));

        let mut sel = ds.select_time(100.0).unwrap();
        // store a field in a non-canonical order and check it is permuted
        let values = ArrayD::from_shape_fn(IxDyn(&[3, 3, 3]), |ix| (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64);
        sel.insert_variable("X", Variable::new(vec![Dim::Lon, Dim::Z, Dim::Lat], values)).unwrap();
        let x = sel.field_zlatlon("X").unwrap();
        // x[z, lat, lon] == lon*100 + z*10 + lat
        assert_eq!(x[[1, 2, 0]], 12.0);
        assert_eq!(x[[0, 1, 2]], 201.0);
        assert!(matches!(sel.field_zlatlon("nope"), Err(DatasetError::MissingVariable(_))));
    }

    #[test]
    fn test_insert_checks_shape() {
        let mut ds = simple();
        let bad = Variable::new(vec![Dim::Lat, Dim::Lon], ArrayD::zeros(IxDyn(&[2, 3])));
        assert!(matches!(ds.insert_variable("bad", bad), Err(DatasetError::ShapeMismatch { .. })));
        let rep = Variable::new(vec![Dim::Lat, Dim::Lat], ArrayD::zeros(IxDyn(&[3, 3])));
        assert!(matches!(ds.insert_variable("rep", rep), Err(DatasetError::RepeatedDim { .. })));
    }

    #[test]
    fn test_regrid_nan_outside() {
        let ds = dataset_from_fn(
            vec![-90.0, 0.0, 90.0],
            vec![-45.0, 0.0, 45.0],
            vec![1.0],
            PressureUnit::Bar,
            |_, lat, lon| lat + lon,
            |_, _, _| 0.0,
        );
        let rg = ds.regrid(&[-45.0, 100.0], &[22.5], Extrapolation::Nan).unwrap();
        let t = &rg.variable("T").unwrap().values;
        assert_eq!(t.shape(), &[1, 1, 1, 2]);
        assert!((t[[0, 0, 0, 0]] - (-22.5)).abs() < 1e-12);
        assert!(t[[0, 0, 0, 1]].is_nan());
    }

    #[test]
    fn test_convert_pressure() {
        let mut ds = simple();
        ds.attrs.p_ref = Some(1.0);
        ds.convert_pressure(PressureUnit::Bar, PressureUnit::Pa);
        assert_eq!(ds.z, vec![1e7, 1e6, 1e5]);
        assert_eq!(ds.attrs.p_ref, Some(1e5));
        assert_eq!(ds.attrs.p_unit, PressureUnit::Pa);
        assert_eq!(ds.pressures_bar(), vec![100.0, 10.0, 1.0]);
    }

    #[test]
    fn test_json_round_trip() {
        let ds = simple();
        let s = serde_json::to_string(&ds).unwrap();
        let back: GriddedDataset = serde_json::from_str(&s).unwrap();
        assert_eq!(ds, back);
        assert!(back.check_basic().is_ok());
    }

    #[test]
    fn test_json_file_keeps_nan() {
        let mut ds = simple();
        let temp = &mut ds.variables.get_mut("T").unwrap().values;
        let n = temp.len();
        temp.iter_mut().skip(1).step_by(2).for_each(|v| *v = f64::NAN);

        let path = std::env::temp_dir().join(format!("gcmt-dataset-nan-{}.json", std::process::id()));
        ds.to_json_file(&path).unwrap();
        let back = GriddedDataset::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let temp = &back.variable("T").unwrap().values;
        assert_eq!(temp.len(), n);
        assert_eq!(temp.shape(), ds.variable("T").unwrap().values.shape());
        for (i, v) in temp.iter().enumerate() {
            if i % 2 == 1 {
                assert!(v.is_nan());
            } else {
                assert_eq!(*v, 300.0);
            }
        }
        assert_eq!(back.variable("U").unwrap(), ds.variable("U").unwrap());
    }
}
