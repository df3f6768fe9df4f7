use itertools::Itertools;
use ndarray::{ArrayD, IxDyn};

use crate::dataset::{DatasetError, Dim, GriddedDataset, Variable};

#[derive(Debug, thiserror::Error)]
pub enum ManipulationError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Variable '{variable}' has no {dim} dimension to average over")]
    MissingDim { variable: String, dim: Dim },
    #[error("Area variable '{area}' has the {dim} dimension, which '{variable}' does not have")]
    AreaDimNotInVariable { area: String, variable: String, dim: Dim },
}

/// Mean of the non-NaN values, NaN if there are none.
///
/// Accumulates deviations from the first value, so a constant series averages
/// to exactly that constant.
pub fn nanmean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let valid = values.into_iter().filter(|v| !v.is_nan()).collect_vec();
    let Some(&first) = valid.first() else {
        return f64::NAN;
    };
    let dev: f64 = valid.iter().map(|v| v - first).sum();
    first + dev / valid.len() as f64
}

/// Mean of `values` weighted by `weights`, skipping NaN values (and their weights).
pub fn weighted_nanmean(values: &[f64], weights: &[f64]) -> f64 {
    let valid = values.iter().zip_eq(weights)
        .filter(|(v, _)| !v.is_nan())
        .collect_vec();
    let Some(&(&first, _)) = valid.first() else {
        return f64::NAN;
    };
    let (num, den) = valid.iter()
        .fold((0.0, 0.0), |(num, den), &(v, w)| (num + (v - first) * w, den + w));
    if den == 0.0 { f64::NAN } else { first + num / den }
}

/// Area-weighted horizontal average of the variable `var_key`, using the cell
/// areas in `area_key`.
///
/// Computes `sum(q * A) / sum(A)` over latitude and longitude. Both sums skip NaNs
/// independently. The result keeps every other dimension of `var_key`, in order.
/// The area variable must have both horizontal dimensions and may have any subset
/// of the remaining dimensions of `var_key`.
pub fn horizontal_average(ds: &GriddedDataset, var_key: &str, area_key: &str) -> Result<Variable, ManipulationError> {
    let var = ds.variable(var_key)?;
    let area = ds.variable(area_key)?;

    for dim in [Dim::Lat, Dim::Lon] {
        if !var.has_dim(dim) {
            return Err(ManipulationError::MissingDim { variable: var_key.to_string(), dim });
        }
        if !area.has_dim(dim) {
            return Err(ManipulationError::MissingDim { variable: area_key.to_string(), dim });
        }
    }

    // for each area axis, the variable axis holding the same dimension
    let area_axes: Vec<usize> = area.dims.iter()
        .map(|d| var.axis_of(*d).ok_or_else(|| ManipulationError::AreaDimNotInVariable {
            area: area_key.to_string(),
            variable: var_key.to_string(),
            dim: *d,
        }))
        .try_collect()?;

    let out_axes = var.dims.iter()
        .enumerate()
        .filter(|(_, d)| !matches!(d, Dim::Lat | Dim::Lon))
        .map(|(i, _)| i)
        .collect_vec();
    let out_dims = out_axes.iter().map(|&i| var.dims[i]).collect_vec();
    let out_shape = out_axes.iter().map(|&i| var.values.shape()[i]).collect_vec();

    let mut numerator = ArrayD::<f64>::zeros(IxDyn(&out_shape));
    let mut denominator = ArrayD::<f64>::zeros(IxDyn(&out_shape));
    let mut out_ix = vec![0; out_axes.len()];
    let mut area_ix = vec![0; area_axes.len()];

    for (ix, &q) in var.values.indexed_iter() {
        for (o, &ax) in out_ix.iter_mut().zip(out_axes.iter()) {
            *o = ix[ax];
        }
        for (a, &ax) in area_ix.iter_mut().zip(area_axes.iter()) {
            *a = ix[ax];
        }

        let a = area.values[&area_ix[..]];
        if a.is_nan() {
            continue;
        }
        denominator[&out_ix[..]] += a;
        if !q.is_nan() {
            numerator[&out_ix[..]] += q * a;
        }
    }

    Ok(Variable::new(out_dims, numerator / denominator))
}

/// Compute [`horizontal_average`] and store the result in the dataset as `var_key_out`.
pub fn add_horizontal_average(
    ds: &mut GriddedDataset,
    var_key: &str,
    area_key: &str,
    var_key_out: &str,
) -> Result<(), ManipulationError> {
    let avg = horizontal_average(ds, var_key, area_key)?;
    ds.insert_variable(var_key_out, avg)?;
    Ok(())
}
