//! The longitude-pressure-temperature ("lpt") file for pseudo-2D PAC runs.
use itertools::Itertools;
use ndarray::{Array2, Axis, Ix3};
use serde::{Deserialize, Serialize};

use super::PacError;
use crate::dataset::GriddedDataset;
use crate::interface::jet_speed::DEFAULT_EPS_DEG;
use crate::interpolation::{interp_axis, Extrapolation};
use crate::manipulations::weighted_nanmean;
use crate::utils::{format_fixed, format_sci};

/// Number of distinct longitudes in the file; the substellar column is repeated once more at the end.
pub const N_LPT_LON: usize = 180;

/// Spacing in degrees of the lpt longitudes.
pub const LPT_LON_STEP_DEG: f64 = 2.0;

/// Options for the lpt file, as found in the `[lpt]` table of a PAC configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LptOptions {
    /// Half width in degrees of the equatorial band to average over.
    pub eps: f64,
    /// Jet speed in m/s. Extracted from the dataset if absent (or zero).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jet_speed: Option<f64>,
    /// Temperatures below this value (in K) are raised to it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_min_temp: Option<f64>,
    /// Name of the file (without `.lpt`); defaults to the dataset tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl Default for LptOptions {
    fn default() -> Self {
        Self { eps: DEFAULT_EPS_DEG, jet_speed: None, set_min_temp: None, model_name: None }
    }
}

impl LptOptions {
    /// The user supplied jet speed, where zero counts as not supplied.
    pub fn given_jet_speed(&self) -> Option<f64> {
        self.jet_speed.filter(|&v| v != 0.0)
    }
}

/// The equatorial temperature structure written to an lpt file.
#[derive(Debug, Clone, PartialEq)]
pub struct LptGrid {
    /// Jet speed in m/s
    pub jet_speed: f64,
    /// Pressure levels in bar, in the order of the dataset
    pub pressures_bar: Vec<f64>,
    /// Longitude from the substellar point in units of pi, 0 to 2 inclusive
    pub lon_pi: Vec<f64>,
    /// Temperature in K, `(pressure, longitude)`; column 0 is the substellar point
    pub temperature: Array2<f64>,
}

/// The source longitudes in degrees: -180 to 178 in 2 degree steps.
fn sampling_longitudes() -> Vec<f64> {
    (0..N_LPT_LON).map(|i| -180.0 + LPT_LON_STEP_DEG * i as f64).collect_vec()
}

/// Build the lpt grid from the temperature `T` of `ds`.
///
/// Temperatures are interpolated (and linearly extrapolated at the edges) onto
/// 2 degree longitudes, averaged over latitudes within `eps` of the equator with
/// cos(latitude) weights, and rotated so that the first column is the substellar point.
pub fn build_lpt(ds: &GriddedDataset, jet_speed: f64, eps: f64, set_min_temp: Option<f64>) -> Result<LptGrid, PacError> {
    let temp = ds.field_zlatlon("T")?;
    let lon_src = sampling_longitudes();
    let temp = interp_axis(temp.view().into_dyn(), 2, &ds.lon, &lon_src, Extrapolation::Linear)
        .map_err(|e| PacError::Interpolation("T".to_string(), e))?
        .into_dimensionality::<Ix3>()
        .map_err(|e| PacError::Shape(e.to_string()))?;

    let band = ds.lat.iter()
        .enumerate()
        .filter(|(_, &lat)| lat >= -eps && lat <= eps)
        .map(|(i, &lat)| (i, lat.to_radians().cos()))
        .collect_vec();
    if band.is_empty() {
        return Err(PacError::EmptyLatitudeBand(eps));
    }
    let weights = band.iter().map(|(_, w)| *w).collect_vec();

    let nz = ds.z.len();
    let half = N_LPT_LON / 2;
    let temperature = Array2::from_shape_fn((nz, N_LPT_LON), |(iz, i)| {
        let ilon = (i + half) % N_LPT_LON;
        let values = band.iter().map(|&(ilat, _)| temp[[iz, ilat, ilon]]).collect_vec();
        let t = weighted_nanmean(&values, &weights);
        match set_min_temp {
            Some(floor) if t < floor => floor,
            _ => t,
        }
    });

    let lon_pi = (0..=N_LPT_LON).map(|i| LPT_LON_STEP_DEG * i as f64 / 180.0).collect_vec();

    Ok(LptGrid { jet_speed, pressures_bar: ds.pressures_bar(), lon_pi, temperature })
}

impl LptGrid {
    /// The lpt file contents. The file does not end in a newline.
    pub fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("  {}     ! velocity [km/s]\n", format_fixed(self.jet_speed / 1000.0, 3)));
        s.push_str(&format!("  {}       ! number of longitudes\n", self.lon_pi.len()));
        s.push_str(&format!("  {}        ! number of pressures\n", self.pressures_bar.len()));
        s.push_str("! next line lists pressures [bar]\n");
        for p in self.pressures_bar.iter() {
            s.push_str(&format!("     {}", format_sci(*p, 5, true)));
        }
        s.push('\n');
        s.push_str("! longitude[pi]          Tk[K]          ...\n");

        let rows = self.lon_pi.iter()
            .enumerate()
            .map(|(i, lon)| {
                let column = self.temperature.index_axis(Axis(1), i % N_LPT_LON);
                let temps = column.iter()
                    .map(|t| format!("      {:>4}", format_fixed(*t, 2)))
                    .join("");
                format!("     {}     {temps}", format_fixed(*lon, 4))
            })
            .join("\n");
        s.push_str(&rows);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_utils::dataset_from_fn;
    use crate::units::PressureUnit;

    fn hot_dayside() -> GriddedDataset {
        // dayside centered on longitude 0, cooler away from the equator
        dataset_from_fn(
            (0..36).map(|i| -175.0 + 10.0 * i as f64).collect(),
            vec![-45.0, -15.0, 0.0, 15.0, 45.0],
            vec![1e6, 1e4, 1e2],
            PressureUnit::Pa,
            |p, lat, lon| 1000.0 + 500.0 * lon.to_radians().cos() - lat.abs() + p / 1e4,
            |_, _, _| 10.0,
        ).select_time(100.0).unwrap()
    }

    #[test]
    fn test_grid_shape_and_closure() {
        let grid = build_lpt(&hot_dayside(), 5000.0, DEFAULT_EPS_DEG, None).unwrap();
        assert_eq!(grid.temperature.dim(), (3, N_LPT_LON));
        assert_eq!(grid.lon_pi.len(), N_LPT_LON + 1);
        assert_eq!(grid.pressures_bar, vec![10.0, 0.1, 0.001]);

        let text = grid.render();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 6 + N_LPT_LON + 1);
        assert!(!text.ends_with('\n'));

        let first_row = lines[6].split_whitespace().skip(1).collect_vec();
        let last_row = lines[6 + N_LPT_LON].split_whitespace().skip(1).collect_vec();
        assert_eq!(first_row, last_row);
        assert_eq!(lines[6 + N_LPT_LON].split_whitespace().next(), Some("2.0000"));
    }

    #[test]
    fn test_longitudes_increase() {
        let grid = build_lpt(&hot_dayside(), 5000.0, DEFAULT_EPS_DEG, None).unwrap();
        assert_eq!(grid.lon_pi[0], 0.0);
        assert_eq!(grid.lon_pi[N_LPT_LON], 2.0);
        assert!(grid.lon_pi.iter().tuple_windows().all(|(a, b)| b > a));
    }

    #[test]
    fn test_substellar_first() {
        let grid = build_lpt(&hot_dayside(), 5000.0, DEFAULT_EPS_DEG, None).unwrap();
        // the hottest column is the substellar point, the coldest one the antistellar point
        let top = grid.temperature.row(2);
        let (imax, _) = top.iter().enumerate().fold((0, f64::MIN), |acc, (i, &t)| if t > acc.1 { (i, t) } else { acc });
        let (imin, _) = top.iter().enumerate().fold((0, f64::MAX), |acc, (i, &t)| if t < acc.1 { (i, t) } else { acc });
        assert_eq!(imax, 0);
        assert_eq!(imin, N_LPT_LON / 2);
    }

    #[test]
    fn test_min_temp_and_header() {
        let grid = build_lpt(&hot_dayside(), 4321.0, DEFAULT_EPS_DEG, Some(900.0)).unwrap();
        assert!(grid.temperature.iter().all(|&t| t >= 900.0));

        let text = grid.render();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines[0], "  4.321     ! velocity [km/s]");
        assert_eq!(lines[1], "  181       ! number of longitudes");
        assert_eq!(lines[2], "  3        ! number of pressures");
        assert_eq!(lines[4], "     1.00000E+01     1.00000E-01     1.00000E-03");
    }

    #[test]
    fn test_empty_band() {
        assert!(build_lpt(&hot_dayside(), 5000.0, 5.0, None).is_ok());
        let err = build_lpt(&hot_dayside(), 5000.0, -1.0, None).unwrap_err();
        assert!(matches!(err, PacError::EmptyLatitudeBand(_)));
    }

    #[test]
    fn test_zero_jet_speed_not_given() {
        let opts = LptOptions { jet_speed: Some(0.0), ..Default::default() };
        assert_eq!(opts.given_jet_speed(), None);
        let opts = LptOptions { jet_speed: Some(3000.0), ..Default::default() };
        assert_eq!(opts.given_jet_speed(), Some(3000.0));
    }
}
