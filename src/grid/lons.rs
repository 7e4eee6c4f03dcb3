//! Longitude range normalization

use crate::dataset::DataArray;
use crate::errors::{PopUtilsError, Result};
use crate::global_mean::SPATIAL_DIMS;

/// Maps a longitude in `[0, 360)` to `[-180, 180]`; `NaN` stays `NaN`
#[must_use]
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Remaps a `(nlat, nlon)` longitude array from `[0, 360)` to `[-180, 180]`.
///
/// Values up to 180 are kept, larger values have 360 subtracted. The result
/// carries dims `(nlat, nlon)` and no attributes.
///
/// # Errors
///
/// Returns [`PopUtilsError::DimensionNotFound`] if `nlat` or `nlon` is missing
/// and [`PopUtilsError::ShapeMismatch`] if the array is not exactly
/// `(nlat, nlon)`.
pub fn normal_lons(lons: &DataArray) -> Result<DataArray> {
    if let Some(missing) = SPATIAL_DIMS.iter().find(|d| !lons.has_dim(d)) {
        return Err(PopUtilsError::DimensionNotFound {
            var: "lons".to_string(),
            dim: (*missing).to_string(),
        });
    }
    if !lons.dims_are(&SPATIAL_DIMS) {
        return Err(PopUtilsError::ShapeMismatch {
            message: format!("expected dims (nlat, nlon), found {:?}", lons.dims()),
        });
    }

    DataArray::new(SPATIAL_DIMS, lons.values().mapv(normalize_longitude))
}
