//! Area-weighted global means of POP history fields
//!
//! The weighting follows the POP conventions: `TAREA` is the cell area, and a
//! cell counts as ocean when `REGION_MASK > 0`, or when `KMT > 0` if marginal
//! seas are included. Each variable is additionally masked by its own missing
//! values, so fields with different land/ice footprints are averaged over the
//! cells they actually cover.

use crate::config::CarbonFluxConfig;
use crate::dataset::{DataArray, Dataset};
use crate::errors::{PopUtilsError, Result};
use ndarray::{ArrayD, IxDyn, Zip};
use rayon::prelude::*;
use tracing::debug;

/// Horizontal dimensions of the POP tracer grid
pub const SPATIAL_DIMS: [&str; 2] = ["nlat", "nlon"];

/// Computes the global mean (or global integral) of every time-varying
/// `(…, nlat, nlon)` data variable in `dataset`.
///
/// # Arguments
///
/// * `dataset` - POP dataset holding `TAREA` and `REGION_MASK` (or `KMT`)
/// * `normalize` - divide by the summed weights to obtain a mean; otherwise
///   return the area integral, converting carbon fluxes to Pg C/yr
/// * `include_ms` - mask with `KMT > 0` (marginal seas included) instead of
///   `REGION_MASK > 0`
/// * `carbon_flux` - which variables are carbon fluxes and how to convert them
///
/// Variables without a `time` dimension or not ending in `(nlat, nlon)` are
/// passed through unchanged, as are all coordinates except those spanning
/// exactly `(nlat, nlon)`, which are dropped.
///
/// # Errors
///
/// Returns [`PopUtilsError::VariableNotFound`] if the area or mask variable is
/// missing, and [`PopUtilsError::ShapeMismatch`] if their shape differs from
/// the horizontal shape of a reduced variable.
pub fn global_mean(
    dataset: &Dataset,
    normalize: bool,
    include_ms: bool,
    carbon_flux: &CarbonFluxConfig,
) -> Result<Dataset> {
    let compute_vars: Vec<(&String, &DataArray)> = dataset
        .data_vars()
        .filter(|(name, array)| {
            let reducible = array.has_dim("time") && array.trailing_dims_are(&SPATIAL_DIMS);
            if !reducible {
                debug!("'{}' has no (time, …, nlat, nlon) layout, passing through", name);
            }
            reducible
        })
        .collect();

    let mut result = Dataset::new();
    *result.attrs_mut() = dataset.attrs().clone();

    for (name, coord) in dataset.coords() {
        if !coord.dims_are(&SPATIAL_DIMS) {
            result.insert_coord(name, coord.clone());
        }
    }
    for (name, array) in dataset.data_vars() {
        if !compute_vars.iter().any(|(n, _)| *n == name) {
            result.insert_data_var(name, array.clone());
        }
    }

    if compute_vars.is_empty() {
        return Ok(result);
    }

    let mask = surface_mask(dataset, include_ms)?;

    for (name, array) in compute_vars {
        let (sums, weights) = weighted_sums(name, array, &mask)?;
        let converts = !normalize && carbon_flux.is_carbon_flux(name);

        let values = if normalize {
            Zip::from(&sums)
                .and(&weights)
                .map_collect(|&sum, &weight| sum / weight)
        } else if converts {
            sums.mapv(|sum| sum * carbon_flux.conversion_factor)
        } else {
            sums
        };

        let lead_dims = &array.dims()[..array.ndim() - SPATIAL_DIMS.len()];
        let mut reduced = DataArray::new(lead_dims.iter().cloned(), values)?;
        *reduced.attrs_mut() = array.attrs().clone();
        if converts {
            reduced.set_attr("units", carbon_flux.units.clone());
        }

        result.insert_data_var(name, reduced);
    }

    Ok(result)
}

/// `TAREA` on ocean cells, zero elsewhere
fn surface_mask(dataset: &Dataset, include_ms: bool) -> Result<ArrayD<f64>> {
    let area = dataset.require("TAREA")?;
    let mask_name = if include_ms { "KMT" } else { "REGION_MASK" };
    let mask = dataset.require(mask_name)?;

    if area.shape() != mask.shape() {
        return Err(PopUtilsError::ShapeMismatch {
            message: format!(
                "TAREA has shape {:?} but {} has shape {:?}",
                area.shape(),
                mask_name,
                mask.shape()
            ),
        });
    }

    Ok(Zip::from(area.values())
        .and(mask.values())
        .map_collect(|&a, &m| if m > 0.0 && !a.is_nan() { a } else { 0.0 }))
}

/// Per leading index, the sum of value × weight and the sum of weights over
/// the horizontal plane, skipping cells where the value is missing.
fn weighted_sums(
    name: &str,
    array: &DataArray,
    mask: &ArrayD<f64>,
) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
    let split = array.ndim() - SPATIAL_DIMS.len();
    let lead_shape = array.shape()[..split].to_vec();

    if array.shape()[split..] != *mask.shape() {
        return Err(PopUtilsError::ShapeMismatch {
            message: format!(
                "'{}' has horizontal shape {:?} but the surface mask is {:?}",
                name,
                &array.shape()[split..],
                mask.shape()
            ),
        });
    }

    let cells = mask.len();
    let values = array.values().as_standard_layout();
    let mask = mask.as_standard_layout();
    let (values, mask) = values
        .as_slice()
        .zip(mask.as_slice())
        .ok_or_else(|| PopUtilsError::Generic(format!("'{}' is not contiguous", name)))?;

    let (sums, weights): (Vec<f64>, Vec<f64>) = if cells == 0 {
        let slices = lead_shape.iter().product();
        (vec![0.0; slices], vec![0.0; slices])
    } else {
        values
            .par_chunks(cells)
            .map(|plane| {
                plane
                    .iter()
                    .zip(mask)
                    .filter(|(v, _)| !v.is_nan())
                    .fold((0.0, 0.0), |(sum, weight), (&v, &m)| {
                        let product = v * m;
                        let sum = if product.is_nan() { sum } else { sum + product };
                        (sum, weight + m)
                    })
            })
            .unzip()
    };

    Ok((
        ArrayD::from_shape_vec(IxDyn(&lead_shape), sums)?,
        ArrayD::from_shape_vec(IxDyn(&lead_shape), weights)?,
    ))
}
