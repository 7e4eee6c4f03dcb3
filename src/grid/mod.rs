//! Horizontal grid helpers
//!
//! This module groups the closed-form grid transformations used when plotting
//! or integrating POP output:
//! - [`pop`]: re-centering the displaced-pole tracer grid for cyclic plots
//! - [`lons`]: mapping longitudes from `[0, 360)` to `[-180, 180]`
//! - [`area`]: cell areas of a regular latitude/longitude grid

pub mod area;
pub mod lons;
pub mod pop;

pub use area::{calc_area, calc_area_with, CellAreaGrid};
pub use lons::{normal_lons, normalize_longitude};
pub use pop::{adjust_pop_grid, adjust_pop_grid_with, AdjustedGrid, SeamCorrection, SeamCorrections};
