//! Cell areas of a regular latitude/longitude grid

use crate::dataset::DataArray;
use crate::errors::{PopUtilsError, Result};
use ndarray::Array2;

/// Earth radius used for cell areas, in km
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Grid spacing of the 1/12° global grid, in degrees
pub const TWELFTH_DEGREE: f64 = 1.0 / 12.0;

/// Sphere radius and grid spacing for [`calc_area_with`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellAreaGrid {
    pub radius_km: f64,
    pub resolution_lat_deg: f64,
    pub resolution_lon_deg: f64,
}

impl Default for CellAreaGrid {
    fn default() -> Self {
        Self {
            radius_km: EARTH_RADIUS_KM,
            resolution_lat_deg: TWELFTH_DEGREE,
            resolution_lon_deg: TWELFTH_DEGREE,
        }
    }
}

impl CellAreaGrid {
    /// Area in km² of one cell whose southern edge sits at `lat` degrees
    #[must_use]
    pub fn cell_area(&self, lat: f64) -> f64 {
        let elevation = (lat + self.resolution_lat_deg / 2.0).to_radians();
        let delta_lat = self.resolution_lat_deg.to_radians();
        let delta_lon = self.resolution_lon_deg.to_radians();

        2.0 * self.radius_km.powi(2) * delta_lon * elevation.cos() * (delta_lat / 2.0).sin()
    }
}

/// Cell areas (km²) of an `ny × nx` slice of the global 1/12° grid.
///
/// Row `j` holds the area for latitude `lats[j]`, repeated across all `nx`
/// columns. The result has dims `(lat, lon)`.
///
/// # Errors
///
/// Returns [`PopUtilsError::ShapeMismatch`] unless `lats` has exactly `ny`
/// entries.
pub fn calc_area(nx: usize, ny: usize, lats: &[f64]) -> Result<DataArray> {
    calc_area_with(&CellAreaGrid::default(), nx, ny, lats)
}

/// [`calc_area`] for an arbitrary radius and resolution
///
/// # Errors
///
/// Returns [`PopUtilsError::ShapeMismatch`] unless `lats` has exactly `ny`
/// entries.
pub fn calc_area_with(grid: &CellAreaGrid, nx: usize, ny: usize, lats: &[f64]) -> Result<DataArray> {
    if lats.len() != ny {
        return Err(PopUtilsError::ShapeMismatch {
            message: format!("{} latitudes given for {} rows", lats.len(), ny),
        });
    }

    let row_areas: Vec<f64> = lats.iter().map(|&lat| grid.cell_area(lat)).collect();
    let area = Array2::from_shape_fn((ny, nx), |(j, _)| row_areas[j]);

    Ok(DataArray::new(["lat", "lon"], area.into_dyn())?.with_attr("units", "km2"))
}
