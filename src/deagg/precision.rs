/// Bin width inference for a disaggregation result.
///
/// Disaggregation bins lie on a regular grid, but only occupied cells are
/// stored and many of them are sparse. The grid spacing on each axis is
/// recovered from the smallest gap between distinct bin centers.

use crate::model::{Axis, DeaggError, DisaggregationBin, Precision};

/// Decimal digits the inferred widths are rounded to.
const PRECISION_DIGITS: i32 = 5;

/// Infers the (lon, lat, mag) bin widths of one (site, poe50y) result.
///
/// Every axis needs at least two distinct values; a single-value axis has no
/// finite minimal gap and is reported as `DeaggError::DegenerateAxis` rather
/// than defaulted, since a zero width would divide by zero in binning.
pub fn infer_precision(bins: &[DisaggregationBin]) -> Result<Precision, DeaggError> {
    if bins.is_empty() {
        return Err(DeaggError::EmptyResult);
    }

    Ok(Precision {
        lon: axis_precision(Axis::Longitude, bins.iter().map(|b| b.lon))?,
        lat: axis_precision(Axis::Latitude, bins.iter().map(|b| b.lat))?,
        mag: axis_precision(Axis::Magnitude, bins.iter().map(|b| b.mag))?,
    })
}

/// Smallest adjacent gap between the sorted distinct values of one axis,
/// rounded to `PRECISION_DIGITS` decimals.
fn axis_precision(axis: Axis, values: impl Iterator<Item = f64>) -> Result<f64, DeaggError> {
    let mut distinct: Vec<f64> = values.collect();
    if distinct.iter().any(|v| !v.is_finite()) {
        return Err(DeaggError::NonFinite { axis });
    }
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    let min_gap = distinct
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .reduce(f64::min)
        .ok_or(DeaggError::DegenerateAxis { axis, distinct: distinct.len() })?;

    let precision = round_to_digits(min_gap, PRECISION_DIGITS);
    if precision <= 0.0 {
        return Err(DeaggError::ZeroPrecision { axis });
    }
    Ok(precision)
}

fn round_to_digits(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
