use error_stack::ResultExt;
use itertools::Itertools;
use log::{debug, warn};

use crate::dataset::GriddedDataset;
use crate::manipulations::{nanmean, weighted_nanmean};

/// Default half width in degrees of the equatorial band the jet is averaged over.
pub const DEFAULT_EPS_DEG: f64 = 20.0;

/// Only pressure levels at or below this depth (in bar) contribute to the jet speed.
pub const MIN_JET_PRESSURE_BAR: f64 = 10.0;

/// Jet speed in m/s used instead of a negative (i.e. westward) result.
pub const NEGATIVE_JET_REPLACEMENT: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum JetSpeedError {
    #[error("Could not get the zonal wind from the dataset")]
    MissingWind,
    #[error("No latitudes within {0} degrees of the equator")]
    EmptyLatitudeBand(f64),
    #[error("No pressure levels at or below the 10 bar level")]
    EmptyPressureRange,
    #[error("The zonal wind has no valid values in the equatorial band")]
    NoValidData,
}

/// Extract the equatorial jet speed (in m/s) from the zonal wind `U` of `ds`.
///
/// The wind is averaged over latitudes within `eps` degrees of the equator weighted
/// by cos(latitude), then over the pressure levels at or deeper than 10 bar, then over
/// longitude. NaNs are skipped at every step. A negative result is replaced by
/// [`NEGATIVE_JET_REPLACEMENT`] with a warning.
pub fn extract_jet_speed(ds: &GriddedDataset, eps: f64) -> error_stack::Result<f64, JetSpeedError> {
    let u = ds.field_zlatlon("U")
        .change_context(JetSpeedError::MissingWind)?;

    let lat_band = ds.lat.iter()
        .enumerate()
        .filter(|(_, &lat)| lat >= -eps && lat <= eps)
        .map(|(i, &lat)| (i, lat.to_radians().cos()))
        .collect_vec();
    if lat_band.is_empty() {
        return Err(JetSpeedError::EmptyLatitudeBand(eps).into());
    }
    let weights = lat_band.iter().map(|(_, w)| *w).collect_vec();

    let levels = ds.pressures_bar()
        .iter()
        .enumerate()
        .filter(|(_, &p)| p >= MIN_JET_PRESSURE_BAR)
        .map(|(i, _)| i)
        .collect_vec();
    if levels.is_empty() {
        return Err(JetSpeedError::EmptyPressureRange.into());
    }
    debug!("Jet speed from {} latitudes and {} pressure levels", lat_band.len(), levels.len());

    let per_lon = (0..ds.lon.len()).map(|ilon| {
        let per_level = levels.iter().map(|&iz| {
            let band = lat_band.iter().map(|&(ilat, _)| u[[iz, ilat, ilon]]).collect_vec();
            weighted_nanmean(&band, &weights)
        });
        nanmean(per_level)
    });
    let jet_speed = nanmean(per_lon);

    if jet_speed.is_nan() {
        return Err(JetSpeedError::NoValidData.into());
    }

    if jet_speed < 0.0 {
        warn!("Zonal wind speed {jet_speed} m/s is negative! Setting wind speed to {NEGATIVE_JET_REPLACEMENT} m/s.");
        return Ok(NEGATIVE_JET_REPLACEMENT);
    }
    Ok(jet_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_utils::{dataset_from_fn, uniform_dataset};
    use crate::units::PressureUnit;

    #[test]
    fn test_uniform_wind() {
        let ds = uniform_dataset(
            vec![-120.0, 0.0, 120.0],
            vec![-30.0, -10.0, 0.0, 10.0, 30.0],
            vec![1.0, 10.0, 100.0],
            PressureUnit::Bar,
            300.0,
            10.0,
        ).select_time(100.0).unwrap();
        assert_eq!(extract_jet_speed(&ds, DEFAULT_EPS_DEG).unwrap(), 10.0);
    }

    #[test]
    fn test_pressure_and_latitude_selection() {
        // only the 10 and 100 bar levels within 20 degrees should count
        let ds = dataset_from_fn(
            vec![0.0, 90.0, 180.0, 270.0],
            vec![-40.0, 0.0, 40.0],
            vec![1e5, 1e6, 1e7],
            PressureUnit::Pa,
            |_, _, _| 1000.0,
            |p, lat, _| if lat.abs() > 20.0 { 1000.0 } else if p < 1e6 { -500.0 } else { p / 1e5 },
        ).select_time(100.0).unwrap();
        let jet = extract_jet_speed(&ds, DEFAULT_EPS_DEG).unwrap();
        assert!((jet - 55.0).abs() < 1e-12);
    }

    #[test]
    fn test_longitude_permutation_invariance() {
        let lon = vec![0.0, 60.0, 120.0, 180.0, 240.0, 300.0];
        let wind = |p: f64, lat: f64, _: f64| 100.0 * lat.to_radians().cos() + p;
        let ds = dataset_from_fn(lon.clone(), vec![-15.0, 0.0, 15.0], vec![10.0, 50.0], PressureUnit::Bar, |_, _, _| 1.0, wind);
        let rev = lon.iter().rev().copied().collect_vec();
        let ds_rev = dataset_from_fn(rev, vec![-15.0, 0.0, 15.0], vec![10.0, 50.0], PressureUnit::Bar, |_, _, _| 1.0, wind);

        let a = extract_jet_speed(&ds.select_time(100.0).unwrap(), DEFAULT_EPS_DEG).unwrap();
        let b = extract_jet_speed(&ds_rev.select_time(100.0).unwrap(), DEFAULT_EPS_DEG).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_negative_jet_replaced() {
        let ds = uniform_dataset(
            vec![0.0, 180.0], vec![0.0], vec![10.0], PressureUnit::Bar, 300.0, -42.0,
        ).select_time(100.0).unwrap();
        assert_eq!(extract_jet_speed(&ds, DEFAULT_EPS_DEG).unwrap(), NEGATIVE_JET_REPLACEMENT);
    }

    #[test]
    fn test_empty_selections() {
        let ds = uniform_dataset(
            vec![0.0, 180.0], vec![-60.0, 60.0], vec![100.0, 1.0], PressureUnit::Bar, 300.0, 5.0,
        ).select_time(100.0).unwrap();
        let err = extract_jet_speed(&ds, DEFAULT_EPS_DEG).unwrap_err();
        assert!(matches!(err.current_context(), JetSpeedError::EmptyLatitudeBand(_)));

        let ds = uniform_dataset(
            vec![0.0, 180.0], vec![0.0], vec![1.0, 0.1], PressureUnit::Bar, 300.0, 5.0,
        ).select_time(100.0).unwrap();
        let err = extract_jet_speed(&ds, DEFAULT_EPS_DEG).unwrap_err();
        assert!(matches!(err.current_context(), JetSpeedError::EmptyPressureRange));
    }

    #[test]
    fn test_time_dim_rejected() {
        let ds = uniform_dataset(vec![0.0], vec![0.0], vec![10.0], PressureUnit::Bar, 300.0, 5.0);
        let err = extract_jet_speed(&ds, DEFAULT_EPS_DEG).unwrap_err();
        assert!(matches!(err.current_context(), JetSpeedError::MissingWind));
    }
}
