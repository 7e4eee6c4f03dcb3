//! Configuration tables for the POP utilities
//!
//! Constants that analysis code used to pick up from module globals (the list
//! of carbon-flux variables, the known grid files, the location of the
//! zonal-average program) are plain structs here. Every struct has a
//! `Default` carrying the usual values, and [`PopUtilsConfig`] can be loaded
//! from a JSON file with any field omitted.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Seconds per day × days per year × unit scaling applied to carbon fluxes
pub const FLUX_TO_PG_C_PER_YR: f64 = 1e-9 * 86400.0 * 365.0 * 1e-15;

/// Units written on converted carbon-flux variables
pub const PG_C_PER_YR_UNITS: &str = "Pg C yr⁻¹";

/// Which variables are carbon fluxes and how their global sums are converted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonFluxConfig {
    pub variables: Vec<String>,
    pub conversion_factor: f64,
    pub units: String,
}

impl CarbonFluxConfig {
    #[must_use]
    pub fn is_carbon_flux(&self, var: &str) -> bool {
        self.variables.iter().any(|v| v == var)
    }
}

impl Default for CarbonFluxConfig {
    fn default() -> Self {
        Self {
            variables: [
                "FG_CO2",
                "photoC_TOT_zint",
                "photoC_TOT_zint_100m",
                "POC_FLUX_100m",
                "CaCO3_FLUX_100m",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            conversion_factor: FLUX_TO_PG_C_PER_YR,
            units: PG_C_PER_YR_UNITS.to_string(),
        }
    }
}

/// Named grids with a file holding `KMT`, `TLAT`, `TLONG`, `TAREA`, `REGION_MASK`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridPresets(pub BTreeMap<String, PathBuf>);

impl GridPresets {
    #[must_use]
    pub fn get(&self, grid: &str) -> Option<&Path> {
        self.0.get(grid).map(PathBuf::as_path)
    }

    /// Pick the grid file for a zonal-average run.
    ///
    /// A known preset maps to its file. An unknown name logs a warning and,
    /// like an omitted name, falls back to `dataset_file`.
    #[must_use]
    pub fn resolve(&self, grid: Option<&str>, dataset_file: &Path) -> PathBuf {
        match grid {
            Some(name) => match self.get(name) {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!(
                        "no grid file for {}, using dataset file {} for grid vars",
                        name,
                        dataset_file.display()
                    );
                    dataset_file.to_path_buf()
                }
            },
            None => dataset_file.to_path_buf(),
        }
    }
}

impl Default for GridPresets {
    fn default() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert(
            "gx1v7".to_string(),
            PathBuf::from("/glade/derecho/scratch/kristenk/POP_gx1v7.nc"),
        );
        Self(presets)
    }
}

/// How the outcome of the zonal-average program is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatusPolicy {
    /// Anything on stdout means failure; exit status and stderr are ignored
    #[default]
    StdoutOnly,
    /// Also require a zero exit status; stderr is captured and logged
    StdoutAndExitCode,
}

/// Settings for [`crate::zonal::zonal_mean_via_fortran`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonalAverageConfig {
    pub executable: PathBuf,
    pub grid_presets: GridPresets,
    pub exit_status: ExitStatusPolicy,
}

impl Default for ZonalAverageConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("/glade/u/home/klindsay/bin/zon_avg/za"),
            grid_presets: GridPresets::default(),
            exit_status: ExitStatusPolicy::default(),
        }
    }
}

/// All serializable settings in one place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopUtilsConfig {
    pub carbon_flux: CarbonFluxConfig,
    pub zonal_average: ZonalAverageConfig,
}

impl PopUtilsConfig {
    /// Parse a JSON document; omitted fields keep their defaults
    ///
    /// # Errors
    ///
    /// Returns [`crate::PopUtilsError::ConfigError`] on malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
