//! In-memory gridded datasets
//!
//! A [`Dataset`] maps variable names to labelled arrays ([`DataArray`]), split
//! into data variables and coordinates the way POP history files are usually
//! interpreted. Values are held as `f64`; missing values are `NaN`.

use crate::errors::{PopUtilsError, Result};
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;

/// A single attribute value attached to a variable or a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Strs(Vec<String>),
    Double(f64),
    Doubles(Vec<f64>),
    Int(i64),
    Ints(Vec<i64>),
}

impl AttrValue {
    /// Borrow the value as text if it is a single string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar numeric view of the value
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Ordered attribute map
pub type Attributes = BTreeMap<String, AttrValue>;

/// A labelled n-dimensional array with attributes
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    dims: Vec<String>,
    values: ArrayD<f64>,
    attrs: Attributes,
}

impl DataArray {
    /// Create an array, checking that one name is given per axis
    ///
    /// # Errors
    ///
    /// Returns [`PopUtilsError::ShapeMismatch`] if the number of dimension
    /// names differs from the number of axes in `values`.
    pub fn new<I, S>(dims: I, values: ArrayD<f64>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != values.ndim() {
            return Err(PopUtilsError::ShapeMismatch {
                message: format!(
                    "{} dimension names given for an array with {} axes",
                    dims.len(),
                    values.ndim()
                ),
            });
        }
        Ok(Self {
            dims,
            values,
            attrs: Attributes::new(),
        })
    }

    /// Create an array from a flat, row-major vector
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not fill `shape` exactly or the
    /// dimension names do not match the shape.
    pub fn from_shape_vec<I, S>(dims: I, shape: &[usize], data: Vec<f64>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Self::new(dims, values)
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    #[must_use]
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    #[must_use]
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    #[must_use]
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }

    /// Whether `dim` labels any axis of this array
    #[must_use]
    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    /// Whether the array's dimensions are exactly `dims`, in order
    #[must_use]
    pub fn dims_are(&self, dims: &[&str]) -> bool {
        self.dims.len() == dims.len() && self.dims.iter().zip(dims).all(|(a, b)| a == b)
    }

    /// Whether the last `dims.len()` dimensions are exactly `dims`
    #[must_use]
    pub fn trailing_dims_are(&self, dims: &[&str]) -> bool {
        self.dims.len() >= dims.len()
            && self.dims[self.dims.len() - dims.len()..]
                .iter()
                .zip(dims)
                .all(|(a, b)| a == b)
    }

    /// Length of the named dimension
    #[must_use]
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .map(|axis| self.values.shape()[axis])
    }

    /// Split into dimension names, values and attributes
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, ArrayD<f64>, Attributes) {
        (self.dims, self.values, self.attrs)
    }
}

/// A collection of named data variables and coordinates plus global attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    data_vars: BTreeMap<String, DataArray>,
    coords: BTreeMap<String, DataArray>,
    attrs: Attributes,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a data variable, replacing any variable or coordinate of the same name
    pub fn insert_data_var(&mut self, name: &str, array: DataArray) -> Option<DataArray> {
        let previous = self.coords.remove(name);
        self.data_vars.insert(name.to_string(), array).or(previous)
    }

    /// Insert a coordinate, replacing any variable or coordinate of the same name
    pub fn insert_coord(&mut self, name: &str, array: DataArray) -> Option<DataArray> {
        let previous = self.data_vars.remove(name);
        self.coords.insert(name.to_string(), array).or(previous)
    }

    /// Look a name up among data variables first, then coordinates
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataArray> {
        self.data_vars.get(name).or_else(|| self.coords.get(name))
    }

    /// Like [`Dataset::get`], but a missing name is an error
    ///
    /// # Errors
    ///
    /// Returns [`PopUtilsError::VariableNotFound`] when `name` is absent.
    pub fn require(&self, name: &str) -> Result<&DataArray> {
        self.get(name).ok_or_else(|| PopUtilsError::VariableNotFound {
            var: name.to_string(),
        })
    }

    #[must_use]
    pub fn data_var(&self, name: &str) -> Option<&DataArray> {
        self.data_vars.get(name)
    }

    #[must_use]
    pub fn coord(&self, name: &str) -> Option<&DataArray> {
        self.coords.get(name)
    }

    pub fn data_vars(&self) -> impl Iterator<Item = (&String, &DataArray)> {
        self.data_vars.iter()
    }

    pub fn coords(&self) -> impl Iterator<Item = (&String, &DataArray)> {
        self.coords.iter()
    }

    #[must_use]
    pub fn is_coord(&self, name: &str) -> bool {
        self.coords.contains_key(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.data_vars.contains_key(name) || self.coords.contains_key(name)
    }

    /// Remove a variable or coordinate
    pub fn remove(&mut self, name: &str) -> Option<DataArray> {
        self.data_vars
            .remove(name)
            .or_else(|| self.coords.remove(name))
    }

    /// Total number of data variables and coordinates
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_vars.len() + self.coords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_vars.is_empty() && self.coords.is_empty()
    }

    #[must_use]
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    /// Dimension names and lengths in order of first appearance
    ///
    /// # Errors
    ///
    /// Returns [`PopUtilsError::ShapeMismatch`] if two variables disagree on
    /// the length of a shared dimension.
    pub fn dim_sizes(&self) -> Result<Vec<(String, usize)>> {
        let mut sizes: Vec<(String, usize)> = Vec::new();
        for (name, array) in self.coords.iter().chain(self.data_vars.iter()) {
            for (dim, &len) in array.dims().iter().zip(array.shape()) {
                match sizes.iter().find(|(d, _)| d == dim) {
                    Some((_, known)) if *known != len => {
                        return Err(PopUtilsError::ShapeMismatch {
                            message: format!(
                                "dimension '{}' has length {} in '{}' but {} elsewhere",
                                dim, len, name, known
                            ),
                        });
                    }
                    Some(_) => {}
                    None => sizes.push((dim.clone(), len)),
                }
            }
        }
        Ok(sizes)
    }
}
