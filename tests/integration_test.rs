use ndarray::{array, Array2, Array3};
use netcdf::open;
use pop_utils::{
    config::{ExitStatusPolicy, GridPresets, ZonalAverageConfig},
    dataset::{AttrValue, DataArray, Dataset},
    errors::{PopUtilsError, Result},
    global_mean::global_mean,
    netcdf_io::{read_dataset, write_dataset},
    zonal::{build_za_args, zonal_mean_via_fortran},
    CarbonFluxConfig,
};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

/// Writing an executable script while another test thread forks can make the
/// exec fail with ETXTBSY, so script creation and runs are serialized.
static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_dataset() -> Result<Dataset> {
    let mut ds = Dataset::new();
    ds.attrs_mut().insert("title".to_string(), "zonal test".into());
    ds.attrs_mut().insert("history".to_string(), "created by hand".into());

    ds.insert_coord(
        "time",
        DataArray::from_shape_vec(["time"], &[2], vec![15.5, 45.0])?
            .with_attr("units", "days since 0001-01-01 00:00:00")
            .with_attr("calendar", "noleap"),
    );
    ds.insert_coord(
        "TLAT",
        DataArray::new(["nlat", "nlon"], array![[-30.0, -30.0, -30.0], [30.0, 30.0, 30.0]].into_dyn())?
            .with_attr("units", "degrees_north"),
    );
    ds.insert_data_var(
        "TAREA",
        DataArray::new(["nlat", "nlon"], array![[1.0, 1.0, 2.0], [2.0, 3.0, 3.0]].into_dyn())?,
    );
    ds.insert_data_var(
        "REGION_MASK",
        DataArray::new(["nlat", "nlon"], array![[1.0, 1.0, 0.0], [2.0, 2.0, 2.0]].into_dyn())?
            .with_attr("count", 14_i64),
    );

    let mut temp = Array3::from_shape_fn((2, 2, 3), |(t, j, i)| 10.0 * t as f64 + j as f64 + 0.5 * i as f64);
    temp[[0, 0, 2]] = f64::NAN;
    ds.insert_data_var(
        "TEMP",
        DataArray::new(["time", "nlat", "nlon"], temp.into_dyn())?
            .with_attr("units", "degC")
            .with_attr("scale", 1.5),
    );
    Ok(ds)
}

#[test]
fn test_netcdf_round_trip() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("round_trip.nc");
    let ds = sample_dataset()?;

    write_dataset(&ds, &path)?;
    let back = read_dataset(&path)?;

    assert!(back.is_coord("time"));
    assert!(back.is_coord("TLAT"));
    assert!(back.data_var("TEMP").is_some());
    assert_eq!(back.coord("TLAT"), ds.coord("TLAT"));
    assert_eq!(back.data_var("TAREA"), ds.data_var("TAREA"));
    assert_eq!(back.data_var("REGION_MASK"), ds.data_var("REGION_MASK"));

    let temp = back.data_var("TEMP").unwrap();
    let written = ds.data_var("TEMP").unwrap();
    assert_eq!(temp.dims(), written.dims());
    assert!(temp.values()[[0, 0, 2]].is_nan());
    assert_eq!(temp.values()[[1, 1, 2]], written.values()[[1, 1, 2]]);
    assert_eq!(temp.attr("units"), Some(&AttrValue::from("degC")));
    assert_eq!(temp.attr("scale"), Some(&AttrValue::Double(1.5)));
    assert!(temp.attr("_FillValue").is_none());
    assert!(temp.attr("coordinates").is_none());

    assert_eq!(back.attrs().get("title"), Some(&AttrValue::from("zonal test")));
    let history = back
        .attrs()
        .get("history")
        .and_then(AttrValue::as_str)
        .expect("history should be written");
    assert!(history.contains("written by pop_utils"));
    assert!(history.ends_with("created by hand"));

    Ok(())
}

#[test]
fn test_round_trip_fortran_order_array() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("fortran_order.nc");

    // (nlat, nlon) = (2, 3) laid out column-major, exposed as (nlon, nlat)
    let transposed = Array2::from_shape_fn((2, 3), |(j, i)| (10 * j + i) as f64).reversed_axes();
    assert!(!transposed.is_standard_layout());

    let mut ds = Dataset::new();
    ds.insert_data_var("HT", DataArray::new(["nlon", "nlat"], transposed.into_dyn())?);

    write_dataset(&ds, &path)?;
    let back = read_dataset(&path)?;

    let ht = back.data_var("HT").unwrap();
    assert_eq!(ht.dims(), &["nlon".to_string(), "nlat".to_string()]);
    assert_eq!(ht.shape(), &[3, 2]);
    assert_eq!(ht.values()[[2, 1]], 12.0);
    assert_eq!(back.data_var("HT"), ds.data_var("HT"));
    Ok(())
}

#[test]
fn test_round_trip_keeps_unattached_coordinates() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("unattached.nc");

    let mut ds = sample_dataset()?;
    ds.insert_coord(
        "z_w_edges",
        DataArray::from_shape_vec(["z_w_bound"], &[3], vec![0.0, 1000.0, 2500.0])?
            .with_attr("units", "cm"),
    );

    write_dataset(&ds, &path)?;
    let back = read_dataset(&path)?;

    assert!(back.is_coord("z_w_edges"));
    assert_eq!(back.coord("z_w_edges"), ds.coord("z_w_edges"));
    assert!(back.is_coord("TLAT"));
    assert!(back.attrs().get("coordinates").is_none());

    // the attached coordinate stays on the variable, not the global list
    let file = open(&path)?;
    let listed = file
        .attribute("coordinates")
        .expect("global coordinates attribute")
        .value()?;
    assert!(matches!(listed, netcdf::AttributeValue::Str(ref names) if names == "z_w_edges"));
    Ok(())
}

#[test]
fn test_read_masks_fill_values_from_foreign_file() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("foreign.nc");

    {
        let mut file = netcdf::create(&path)?;
        file.add_dimension("nlat", 2)?;
        file.add_dimension("nlon", 2)?;

        let mut kmt = file.add_variable::<i32>("KMT", &["nlat", "nlon"])?;
        kmt.put_attribute("long_name", "k Index of Deepest Grid Cell on T Grid")?;
        kmt.put(array![[0_i32, 5], [60, 60]].view(), ..)?;

        let mut sst = file.add_variable::<f32>("SST", &["nlat", "nlon"])?;
        sst.put_attribute("_FillValue", 9.96921e36_f32)?;
        sst.put(array![[9.96921e36_f32, 1.5], [2.5, 3.5]].view(), ..)?;
    }

    let ds = read_dataset(&path)?;
    let kmt = ds.data_var("KMT").unwrap();
    assert_eq!(kmt.values()[[1, 0]], 60.0);
    assert!(kmt.attr("long_name").is_some());

    let sst = ds.data_var("SST").unwrap();
    assert!(sst.values()[[0, 0]].is_nan());
    assert_eq!(sst.values()[[1, 1]], 3.5);
    assert!(sst.attr("_FillValue").is_none());

    // the file on disk still opens with plain netcdf
    let file = open(&path)?;
    assert!(file.variable("SST").is_some());
    Ok(())
}

#[test]
fn test_global_mean_from_file() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("pop.h.nc");
    write_dataset(&sample_dataset()?, &path)?;

    let ds = read_dataset(&path)?;
    let result = global_mean(&ds, true, false, &CarbonFluxConfig::default())?;

    // weights: TAREA where REGION_MASK > 0 and TEMP defined
    let expected_t0 = (0.0 * 1.0 + 0.5 * 1.0 + 1.0 * 2.0 + 1.5 * 3.0 + 2.0 * 3.0) / (1.0 + 1.0 + 2.0 + 3.0 + 3.0);
    let temp = result.data_var("TEMP").unwrap();
    assert!((temp.values()[[0]] - expected_t0).abs() < 1e-12);
    assert!(result.coord("TLAT").is_none());
    Ok(())
}

#[test]
fn test_build_za_args_order() {
    let args = build_za_args(
        "TEMP",
        Some(Path::new("/data/rmask.nc")),
        Path::new("/data/grid.nc"),
        Path::new("/tmp/out.nc"),
        Path::new("/tmp/in.nc"),
    );
    let expected: Vec<OsString> = [
        "-v", "TEMP", "-rmask_file", "/data/rmask.nc", "-grid_file", "/data/grid.nc",
        "-kmt_file", "/data/grid.nc", "-O", "-o", "/tmp/out.nc", "/tmp/in.nc",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    assert_eq!(args, expected);

    let without_mask = build_za_args(
        "TEMP",
        None,
        Path::new("/tmp/in.nc"),
        Path::new("/tmp/out.nc"),
        Path::new("/tmp/in.nc"),
    );
    assert_eq!(without_mask.len(), 10);
    assert_eq!(without_mask[2], OsString::from("-grid_file"));
}

#[test]
fn test_zonal_mean_missing_executable() -> Result<()> {
    let config = ZonalAverageConfig {
        executable: PathBuf::from("/nonexistent/zon_avg/za"),
        ..ZonalAverageConfig::default()
    };
    let result = zonal_mean_via_fortran(&sample_dataset()?, "TEMP", None, None, &config);
    assert!(matches!(result, Err(PopUtilsError::IoError(_))));
    Ok(())
}

#[cfg(unix)]
mod fake_za {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Writes an executable shell script that records its arguments next to itself.
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("za");
        let script = format!(
            "#!/bin/sh\necho \"$@\" > \"{}\"\n{}\n",
            dir.join("args.txt").display(),
            body
        );
        fs::write(&path, script).expect("Failed to write fake za");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake za executable");
        path
    }

    /// Copies the input file (last argument) to the `-o` path, printing nothing.
    const COPY_INPUT: &str = r#"out=""
while [ $# -gt 1 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cp "$1" "$out""#;

    /// Complains on stdout and leaves garbage where the output should be.
    const REPORT_ERROR: &str = r#"out=""
while [ $# -gt 1 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "ERROR: variable not found"
echo "not a netcdf file" > "$out""#;

    fn config_for(executable: PathBuf) -> ZonalAverageConfig {
        ZonalAverageConfig {
            executable,
            ..ZonalAverageConfig::default()
        }
    }

    #[test]
    fn test_zonal_mean_success_loads_output() -> Result<()> {
        init_tracing();
        let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let za = write_script(temp_dir.path(), COPY_INPUT);

        let ds = sample_dataset()?;
        let zonal = zonal_mean_via_fortran(&ds, "TEMP", None, None, &config_for(za))?
            .expect("za printed nothing, so a dataset is expected");

        let temp = zonal.data_var("TEMP").unwrap();
        assert_eq!(temp.values()[[1, 0, 1]], ds.data_var("TEMP").unwrap().values()[[1, 0, 1]]);
        assert_eq!(zonal.coord("TLAT"), ds.coord("TLAT"));

        // grid file defaults to the serialized input, which comes last
        let args = fs::read_to_string(temp_dir.path().join("args.txt")).expect("args recorded");
        let words: Vec<&str> = args.split_whitespace().collect();
        assert_eq!(&words[..2], &["-v", "TEMP"]);
        assert_eq!(words[2], "-grid_file");
        assert_eq!(words[3], *words.last().unwrap());
        assert_eq!(words[3], words[5]);
        assert!(!words.contains(&"-rmask_file"));

        // the scratch files are gone once the call returns
        assert!(!Path::new(words[3]).exists());
        Ok(())
    }

    #[test]
    fn test_zonal_mean_uses_grid_preset_and_rmask() -> Result<()> {
        init_tracing();
        let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let za = write_script(temp_dir.path(), COPY_INPUT);

        let mut config = config_for(za);
        config.grid_presets = GridPresets(
            [("gx3v7".to_string(), PathBuf::from("/data/POP_gx3v7.nc"))]
                .into_iter()
                .collect(),
        );

        let rmask = Path::new("/data/REGION_MASK_three_ocean.nc");
        let zonal = zonal_mean_via_fortran(&sample_dataset()?, "TEMP", Some("gx3v7"), Some(rmask), &config)?;
        assert!(zonal.is_some());

        let args = fs::read_to_string(temp_dir.path().join("args.txt")).expect("args recorded");
        let words: Vec<&str> = args.split_whitespace().collect();
        assert_eq!(
            &words[..8],
            &[
                "-v",
                "TEMP",
                "-rmask_file",
                "/data/REGION_MASK_three_ocean.nc",
                "-grid_file",
                "/data/POP_gx3v7.nc",
                "-kmt_file",
                "/data/POP_gx3v7.nc",
            ]
        );
        assert_eq!(words[8], "-O");
        assert_eq!(words[9], "-o");
        Ok(())
    }

    #[test]
    fn test_zonal_mean_unknown_grid_falls_back_to_input() -> Result<()> {
        init_tracing();
        let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let za = write_script(temp_dir.path(), COPY_INPUT);

        let zonal = zonal_mean_via_fortran(&sample_dataset()?, "TEMP", Some("tx9v9"), None, &config_for(za))?;
        assert!(zonal.is_some());

        let args = fs::read_to_string(temp_dir.path().join("args.txt")).expect("args recorded");
        let words: Vec<&str> = args.split_whitespace().collect();
        assert_eq!(words[3], *words.last().unwrap());
        Ok(())
    }

    #[test]
    fn test_zonal_mean_stdout_means_no_result() -> Result<()> {
        init_tracing();
        let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let za = write_script(temp_dir.path(), REPORT_ERROR);

        // reading the garbage output would be an error, so Ok(None) also shows
        // the output file was never opened
        let result = zonal_mean_via_fortran(&sample_dataset()?, "TEMP", None, None, &config_for(za))?;
        assert!(result.is_none());
        Ok(())
    }

    #[test]
    fn test_zonal_mean_exit_status_policy() -> Result<()> {
        init_tracing();
        let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let body = format!("{}\necho 'warning: region mask ignored' >&2\nexit 3", COPY_INPUT);
        let za = write_script(temp_dir.path(), &body);

        let mut config = config_for(za);
        let lenient = zonal_mean_via_fortran(&sample_dataset()?, "TEMP", None, None, &config)?;
        assert!(lenient.is_some());

        config.exit_status = ExitStatusPolicy::StdoutAndExitCode;
        let strict = zonal_mean_via_fortran(&sample_dataset()?, "TEMP", None, None, &config)?;
        assert!(strict.is_none());
        Ok(())
    }
}
