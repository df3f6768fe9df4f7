//! Linear interpolation of gridded fields along one coordinate axis.
//!
//! All resampling in this crate (horizontal regridding, the longitude
//! resampling of lpt files and the pressure interpolation onto external
//! radiative-transfer grids) goes through [`interp_axis`], so the behavior
//! outside the source coordinate range is always explicit in the caller.
use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    #[error("Need at least 2 source coordinates to interpolate, got {0}")]
    TooFewPoints(usize),
    #[error("Source coordinate contains a non-finite value")]
    NonFiniteCoordinate,
    #[error("Source coordinate has duplicated value {0}")]
    DuplicateCoordinate(f64),
    #[error("Axis {axis} has length {actual} but the source coordinate has {expected} values")]
    LengthMismatch { axis: usize, expected: usize, actual: usize },
}

/// What to return for target coordinates outside the source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    /// Points outside the range are undefined (NaN).
    Nan,
    /// Continue the first/last segment linearly.
    Linear,
    /// Hold the edge value.
    Clamp,
}

/// A linear interpolator over a fixed set of source coordinates.
///
/// The source coordinates do not need to be sorted; they are sorted once
/// on construction and the values passed to [`LinearInterp::eval_sorted`]
/// must be reordered with [`LinearInterp::sort_values`].
#[derive(Debug, Clone)]
pub struct LinearInterp {
    xs: Vec<f64>,
    order: Vec<usize>,
    extrapolation: Extrapolation,
}

impl LinearInterp {
    pub fn new(src: &[f64], extrapolation: Extrapolation) -> Result<Self, InterpolationError> {
        if src.len() < 2 {
            return Err(InterpolationError::TooFewPoints(src.len()));
        }
        if src.iter().any(|v| !v.is_finite()) {
            return Err(InterpolationError::NonFiniteCoordinate);
        }

        let order = (0..src.len())
            .sorted_by(|&a, &b| src[a].total_cmp(&src[b]))
            .collect_vec();
        let xs = order.iter().map(|&i| src[i]).collect_vec();
        if let Some((a, _)) = xs.iter().tuple_windows().find(|(a, b)| a == b) {
            return Err(InterpolationError::DuplicateCoordinate(*a));
        }

        Ok(Self { xs, order, extrapolation })
    }

    /// Reorder values given in source-coordinate order into ascending-coordinate order.
    pub fn sort_values<'a, I: IntoIterator<Item = &'a f64>>(&self, values: I) -> Vec<f64> {
        let values = values.into_iter().copied().collect_vec();
        self.order.iter().map(|&i| values[i]).collect_vec()
    }

    /// Evaluate at `x` given values already in ascending-coordinate order.
    pub fn eval_sorted(&self, fp: &[f64], x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }

        let n = self.xs.len();
        let outside = x < self.xs[0] || x > self.xs[n - 1];
        if outside {
            match self.extrapolation {
                Extrapolation::Nan => return f64::NAN,
                Extrapolation::Clamp => return if x < self.xs[0] { fp[0] } else { fp[n - 1] },
                Extrapolation::Linear => (),
            }
        }

        let i = self.xs.partition_point(|&v| v <= x);
        let lo = i.saturating_sub(1).min(n - 2);
        let hi = lo + 1;
        let t = (x - self.xs[lo]) / (self.xs[hi] - self.xs[lo]);
        if t == 0.0 {
            fp[lo]
        } else if t == 1.0 {
            fp[hi]
        } else {
            fp[lo] + t * (fp[hi] - fp[lo])
        }
    }
}

/// Interpolate `fp` (given at `xp`) to the single point `x`.
pub fn interp1d(xp: &[f64], fp: &[f64], x: f64, extrapolation: Extrapolation) -> Result<f64, InterpolationError> {
    if xp.len() != fp.len() {
        return Err(InterpolationError::LengthMismatch { axis: 0, expected: xp.len(), actual: fp.len() });
    }
    let interp = LinearInterp::new(xp, extrapolation)?;
    let fp = interp.sort_values(fp);
    Ok(interp.eval_sorted(&fp, x))
}

/// Interpolate every 1D lane of `values` along `axis` from the coordinates `src`
/// onto the coordinates `dst`. The returned array has the same shape as `values`
/// except that `axis` has length `dst.len()`.
pub fn interp_axis(
    values: ArrayViewD<f64>,
    axis: usize,
    src: &[f64],
    dst: &[f64],
    extrapolation: Extrapolation,
) -> Result<ArrayD<f64>, InterpolationError> {
    let actual = values.len_of(Axis(axis));
    if actual != src.len() {
        return Err(InterpolationError::LengthMismatch { axis, expected: src.len(), actual });
    }

    let interp = LinearInterp::new(src, extrapolation)?;
    let mut shape = values.shape().to_vec();
    shape[axis] = dst.len();
    let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));

    for (lane_in, mut lane_out) in values.lanes(Axis(axis)).into_iter().zip(out.lanes_mut(Axis(axis))) {
        let fp = interp.sort_values(lane_in.iter());
        for (o, &x) in lane_out.iter_mut().zip(dst) {
            *o = interp.eval_sorted(&fp, x);
        }
    }

    Ok(out)
}
