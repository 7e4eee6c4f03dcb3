//! Centralized error handling for pop_utils
//!
//! All fallible operations in the crate return [`Result`], whose error type
//! wraps the NetCDF, I/O, array-shape and configuration failures that can
//! occur while post-processing POP output.

use std::fmt;

/// Main error type for pop_utils operations
#[derive(Debug)]
pub enum PopUtilsError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors, including failure to launch the zonal-average program
    IoError(std::io::Error),

    /// Variable not found in a dataset
    VariableNotFound { var: String },

    /// Dimension not found in variable
    DimensionNotFound { var: String, dim: String },

    /// Arrays that must line up do not
    ShapeMismatch { message: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Configuration file could not be parsed
    ConfigError(serde_json::Error),

    /// Generic error
    Generic(String),
}

impl fmt::Display for PopUtilsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopUtilsError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            PopUtilsError::IoError(e) => write!(f, "I/O error: {}", e),
            PopUtilsError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in dataset", var)
            }
            PopUtilsError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found in variable '{}'", dim, var)
            }
            PopUtilsError::ShapeMismatch { message } => write!(f, "Shape mismatch: {}", message),
            PopUtilsError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            PopUtilsError::ArrayError(e) => write!(f, "Array error: {}", e),
            PopUtilsError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            PopUtilsError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PopUtilsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PopUtilsError::NetCDFError(e) => Some(e),
            PopUtilsError::IoError(e) => Some(e),
            PopUtilsError::ArrayError(e) => Some(e),
            PopUtilsError::ConfigError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for PopUtilsError {
    fn from(error: netcdf::Error) -> Self {
        PopUtilsError::NetCDFError(error)
    }
}

impl From<std::io::Error> for PopUtilsError {
    fn from(error: std::io::Error) -> Self {
        PopUtilsError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for PopUtilsError {
    fn from(error: ndarray::ShapeError) -> Self {
        PopUtilsError::ArrayError(error)
    }
}

impl From<serde_json::Error> for PopUtilsError {
    fn from(error: serde_json::Error) -> Self {
        PopUtilsError::ConfigError(error)
    }
}

impl From<String> for PopUtilsError {
    fn from(error: String) -> Self {
        PopUtilsError::Generic(error)
    }
}

impl From<&str> for PopUtilsError {
    fn from(error: &str) -> Self {
        PopUtilsError::Generic(error.to_string())
    }
}

/// Result type alias for pop_utils operations
pub type Result<T> = std::result::Result<T, PopUtilsError>;
