//! NetCDF I/O for in-memory datasets
//!
//! This module loads a NetCDF file into a [`Dataset`] and writes a [`Dataset`]
//! back out as NetCDF-4, preserving dimension names, values and attributes.
//! It is the exchange format used with the external zonal-average program.

use crate::dataset::{AttrValue, Attributes, DataArray, Dataset};
use crate::errors::Result;
use chrono::Utc;
use ndarray::{ArrayD, IxDyn};
use netcdf::{create, open, AttributeValue, FileMut};
use std::collections::BTreeSet;
use std::{fs, path::Path};
use tracing::debug;

/// Attributes consumed on read and regenerated on write
const FILL_VALUE: &str = "_FillValue";
const MISSING_VALUE: &str = "missing_value";
const COORDINATES: &str = "coordinates";

/// Reads every numeric variable of a NetCDF file into memory.
///
/// Values are converted to `f64`. Cells equal to the variable's `_FillValue`
/// or `missing_value` become `NaN`, and those attributes are dropped.
/// Variables named after their only dimension, and variables listed in any
/// `coordinates` attribute (on a variable or global), are loaded as
/// coordinates. Non-numeric variables are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = open(path.as_ref())?;
    let mut dataset = Dataset::new();
    let mut coordinate_names = BTreeSet::new();
    let mut loaded = Vec::new();

    for var in file.variables() {
        let name = var.name().to_string();
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let mut attrs = Attributes::new();
        for attr in var.attributes() {
            match convert_attribute(attr.value()?) {
                Some(value) => {
                    attrs.insert(attr.name().to_string(), value);
                }
                None => debug!("skipped unsupported attribute '{}' on '{}'", attr.name(), name),
            }
        }

        let mut data = match var.get_values::<f64, _>(..) {
            Ok(data) => data,
            Err(e) => {
                debug!("skipped non-numeric variable '{}': {}", name, e);
                continue;
            }
        };

        for key in [FILL_VALUE, MISSING_VALUE] {
            if let Some(fill) = attrs.remove(key).and_then(|v| v.as_f64()) {
                data.iter_mut()
                    .filter(|x| **x == fill)
                    .for_each(|x| *x = f64::NAN);
            }
        }

        if let Some(AttrValue::Str(listed)) = attrs.remove(COORDINATES) {
            coordinate_names.extend(listed.split_whitespace().map(str::to_string));
        }

        let values = ArrayD::from_shape_vec(IxDyn(&shape), data)?;
        let is_dimension_coord = dims.len() == 1 && dims[0] == name;
        let mut array = DataArray::new(dims, values)?;
        *array.attrs_mut() = attrs;
        loaded.push((name, array, is_dimension_coord));
    }

    for attr in file.attributes() {
        match convert_attribute(attr.value()?) {
            Some(AttrValue::Str(listed)) if attr.name() == COORDINATES => {
                coordinate_names.extend(listed.split_whitespace().map(str::to_string));
            }
            Some(value) => {
                dataset.attrs_mut().insert(attr.name().to_string(), value);
            }
            None => {}
        }
    }

    for (name, array, is_dimension_coord) in loaded {
        if is_dimension_coord || coordinate_names.contains(&name) {
            dataset.insert_coord(&name, array);
        } else {
            dataset.insert_data_var(&name, array);
        }
    }

    Ok(dataset)
}

/// Writes a dataset to a new NetCDF-4 file, replacing any existing file.
///
/// Data variables get a `coordinates` attribute naming the non-dimension
/// coordinates they span. Coordinates that no data variable spans are listed
/// in a global `coordinates` attribute instead, so [`read_dataset`] restores
/// the same split. A `history` line with the current UTC time is prepended.
///
/// # Errors
///
/// Returns an error if dimensions disagree between variables or if the file
/// cannot be written.
pub fn write_dataset<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        fs::remove_file(path)?;
    }

    let mut file = create(path)?;

    for (dim_name, dim_len) in dataset.dim_sizes()? {
        file.add_dimension(&dim_name, dim_len)?;
    }

    for (name, array) in dataset.coords() {
        write_variable(&mut file, name, array, None)?;
    }

    let mut unattached: BTreeSet<&str> = dataset
        .coords()
        .filter(|(coord_name, coord)| !coord.dims_are(&[coord_name.as_str()]))
        .map(|(coord_name, _)| coord_name.as_str())
        .collect();

    for (name, array) in dataset.data_vars() {
        let spanned: Vec<&str> = dataset
            .coords()
            .filter(|(coord_name, coord)| {
                !coord.dims_are(&[coord_name.as_str()])
                    && coord.dims().iter().all(|d| array.has_dim(d))
            })
            .map(|(coord_name, _)| coord_name.as_str())
            .collect();
        for coord_name in &spanned {
            unattached.remove(coord_name);
        }
        let coordinates = if spanned.is_empty() {
            None
        } else {
            Some(spanned.join(" "))
        };
        write_variable(&mut file, name, array, coordinates)?;
    }

    for (name, value) in dataset
        .attrs()
        .iter()
        .filter(|(k, _)| *k != "history" && *k != COORDINATES)
    {
        file.add_attribute(name, to_netcdf_attribute(value))?;
    }

    if !unattached.is_empty() {
        let listed: Vec<&str> = unattached.into_iter().collect();
        file.add_attribute(COORDINATES, listed.join(" "))?;
    }

    let stamp = format!("{}: written by pop_utils", Utc::now().to_rfc3339());
    let history = match dataset.attrs().get("history").and_then(AttrValue::as_str) {
        Some(previous) => format!("{}\n{}", stamp, previous),
        None => stamp,
    };
    file.add_attribute("history", history)?;

    Ok(())
}

fn write_variable(
    file: &mut FileMut,
    name: &str,
    array: &DataArray,
    coordinates: Option<String>,
) -> Result<()> {
    let dim_refs: Vec<&str> = array.dims().iter().map(String::as_str).collect();
    let mut var = file.add_variable::<f64>(name, &dim_refs)?;

    if array.values().iter().any(|x| x.is_nan()) {
        var.put_attribute(FILL_VALUE, f64::NAN)?;
    }

    // put() needs contiguous C-order data
    let values = array.values().as_standard_layout();
    if array.ndim() == 0 {
        var.put(values.view(), &[] as &[usize])?;
    } else {
        var.put(values.view(), ..)?;
    }

    for (attr_name, value) in array.attrs() {
        if attr_name == FILL_VALUE || attr_name == MISSING_VALUE {
            continue;
        }
        var.put_attribute(attr_name, to_netcdf_attribute(value))?;
    }

    if let Some(coordinates) = coordinates {
        if array.attr(COORDINATES).is_none() {
            var.put_attribute(COORDINATES, coordinates)?;
        }
    }

    Ok(())
}

fn convert_attribute(value: AttributeValue) -> Option<AttrValue> {
    let converted = match value {
        AttributeValue::Str(v) => AttrValue::Str(v),
        AttributeValue::Strs(v) => AttrValue::Strs(v),
        AttributeValue::Double(v) => AttrValue::Double(v),
        AttributeValue::Doubles(v) => AttrValue::Doubles(v),
        AttributeValue::Float(v) => AttrValue::Double(f64::from(v)),
        AttributeValue::Floats(v) => AttrValue::Doubles(v.into_iter().map(f64::from).collect()),
        AttributeValue::Longlong(v) => AttrValue::Int(v),
        AttributeValue::Longlongs(v) => AttrValue::Ints(v),
        AttributeValue::Int(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Ints(v) => AttrValue::Ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Short(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Shorts(v) => AttrValue::Ints(v.into_iter().map(i64::from).collect()),
        _ => return None,
    };
    Some(converted)
}

fn to_netcdf_attribute(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Str(v) => AttributeValue::Str(v.clone()),
        AttrValue::Strs(v) => AttributeValue::Strs(v.clone()),
        AttrValue::Double(v) => AttributeValue::Double(*v),
        AttrValue::Doubles(v) => AttributeValue::Doubles(v.clone()),
        AttrValue::Int(v) => AttributeValue::Longlong(*v),
        AttrValue::Ints(v) => AttributeValue::Longlongs(v.clone()),
    }
}
