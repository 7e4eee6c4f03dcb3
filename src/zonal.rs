//! Zonal means through the external `za` program
//!
//! The zonal average itself is computed by a pre-installed Fortran tool. This
//! module hands it the dataset as a NetCDF file, runs it, and reads the result
//! back. Both files live in a scoped temporary directory that is removed when
//! the call returns, whatever the outcome.

use crate::config::{ExitStatusPolicy, ZonalAverageConfig};
use crate::dataset::Dataset;
use crate::errors::Result;
use crate::netcdf_io::{read_dataset, write_dataset};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Command-line arguments for `za`, input file last.
///
/// The same grid file is passed as `-grid_file` and `-kmt_file`; `-O` lets
/// `za` overwrite `output`.
#[must_use]
pub fn build_za_args(
    var: &str,
    rmask_file: Option<&Path>,
    grid_file: &Path,
    output: &Path,
    input: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-v".into(), var.into()];
    if let Some(rmask) = rmask_file {
        args.push("-rmask_file".into());
        args.push(rmask.into());
    }
    args.push("-grid_file".into());
    args.push(grid_file.into());
    args.push("-kmt_file".into());
    args.push(grid_file.into());
    args.push("-O".into());
    args.push("-o".into());
    args.push(output.into());
    args.push(input.into());
    args
}

/// Computes the zonal mean of `var` with the external `za` program.
///
/// # Arguments
///
/// * `dataset` - data to average; must contain the grid variables unless
///   `grid` names a known preset
/// * `var` - variable to average
/// * `grid` - optional grid preset name; unknown names fall back to the
///   dataset itself with a warning
/// * `rmask_file` - optional region-mask file overriding the grid's regions
/// * `config` - executable location, presets and success policy
///
/// Blocks until `za` exits; there is no timeout. Output on `za`'s stdout is
/// taken as failure: the text is logged and `Ok(None)` returned without
/// touching the output file. With [`ExitStatusPolicy::StdoutAndExitCode`] a
/// non-zero exit status is a failure too.
///
/// # Errors
///
/// Returns an error if the dataset cannot be written, `za` cannot be started,
/// or its output file cannot be read after a successful run.
pub fn zonal_mean_via_fortran(
    dataset: &Dataset,
    var: &str,
    grid: Option<&str>,
    rmask_file: Option<&Path>,
    config: &ZonalAverageConfig,
) -> Result<Option<Dataset>> {
    let scratch = tempfile::Builder::new().prefix("zonal_mean_").tempdir()?;
    let input = scratch.path().join("za_in.nc");
    let output = scratch.path().join("za_out.nc");

    write_dataset(dataset, &input)?;
    info!("wrote dataset to {}", input.display());

    let grid_file = config.grid_presets.resolve(grid, &input);
    let args = build_za_args(var, rmask_file, &grid_file, &output, &input);
    debug!("running {} {:?}", config.executable.display(), args);

    let stderr = match config.exit_status {
        ExitStatusPolicy::StdoutOnly => Stdio::inherit(),
        ExitStatusPolicy::StdoutAndExitCode => Stdio::piped(),
    };
    let run = Command::new(&config.executable)
        .args(&args)
        .stdin(Stdio::null())
        .stderr(stderr)
        .output()?;

    if !run.stdout.is_empty() {
        error!("za reported an error:\n{}", String::from_utf8_lossy(&run.stdout));
        return Ok(None);
    }

    if config.exit_status == ExitStatusPolicy::StdoutAndExitCode && !run.status.success() {
        error!(
            "za exited with {}:\n{}",
            run.status,
            String::from_utf8_lossy(&run.stderr)
        );
        return Ok(None);
    }

    info!("za ran successfully, reading netcdf output");
    Ok(Some(read_dataset(&output)?))
}
