//! pop_utils: post-processing helpers for POP ocean-model output
//!
//! A small library of independent routines used when analysing output from
//! the Parallel Ocean Program (POP) on its displaced-pole grid:
//!
//! - **Global means**: area-weighted means or integrals of `(time, nlat, nlon)`
//!   fields, with carbon fluxes converted to Pg C/yr
//! - **Grid adjustment**: re-centering the POP grid for cyclic plotting
//! - **Longitudes**: mapping `[0, 360)` to `[-180, 180]`
//! - **Cell areas**: per-latitude-band areas of a regular 1/12° grid
//! - **Zonal means**: delegated to the external `za` program through NetCDF files
//!
//! ## Module Organization
//!
//! - [`dataset`]: in-memory labelled arrays and datasets
//! - [`netcdf_io`]: NetCDF-4 read/write of datasets
//! - [`global_mean`]: area-weighted global means
//! - [`grid`]: grid re-centering, longitude normalization and cell areas
//! - [`zonal`]: zonal means through `za`
//! - [`config`]: carbon-flux, grid-preset and `za` settings
//! - [`parallel`]: Rayon thread pool configuration
//! - [`errors`]: Centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pop_utils::prelude::*;
//!
//! let ds = read_dataset("pop.h.nc").unwrap();
//! let means = global_mean(&ds, true, false, &CarbonFluxConfig::default()).unwrap();
//!
//! let config = ZonalAverageConfig::default();
//! if let Some(zonal) = zonal_mean_via_fortran(&ds, "TEMP", Some("gx1v7"), None, &config).unwrap() {
//!     println!("{:?}", zonal.data_var("TEMP"));
//! }
//! # let _ = means;
//! ```

pub mod config;
pub mod dataset;
pub mod errors;
pub mod global_mean;
pub mod grid;
pub mod netcdf_io;
pub mod parallel;
pub mod zonal;

pub use config::*;
pub use dataset::*;
pub use errors::*;
pub use global_mean::global_mean;
pub use grid::*;
pub use netcdf_io::*;
pub use parallel::*;
pub use zonal::*;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{CarbonFluxConfig, ExitStatusPolicy, GridPresets, PopUtilsConfig, ZonalAverageConfig};
    pub use crate::dataset::{AttrValue, DataArray, Dataset};
    pub use crate::errors::{PopUtilsError, Result};
    pub use crate::global_mean::global_mean;
    pub use crate::grid::{adjust_pop_grid, calc_area, normal_lons, CellAreaGrid, SeamCorrections};
    pub use crate::netcdf_io::{read_dataset, write_dataset};
    pub use crate::parallel::ParallelConfig;
    pub use crate::zonal::zonal_mean_via_fortran;
}
