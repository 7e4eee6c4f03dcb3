//! Cyclic re-centering of the POP displaced-pole grid
//!
//! The POP tracer grid stores longitudes that jump by 360° somewhere inside
//! each row. Plotting libraries want a monotone band with a closing seam
//! column, which is what [`adjust_pop_grid`] produces.

use crate::errors::{PopUtilsError, Result};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

/// Offset applied to the first longitude column so it never equals the seam
/// column exactly; cartopy mishandles identical cyclic coordinates.
pub const SEAM_EPSILON: f64 = 1e-8;

/// Known discontinuity in the first column of a specific grid, keyed by width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeamCorrection {
    /// Number of longitude columns identifying the grid
    pub width: usize,
    /// First row (from the south) whose seam longitudes need patching
    pub start_row: usize,
    /// Rows at the northern edge left alone when patching the first column
    pub trailing_rows_skipped: usize,
}

/// nominal 1° POP grid (gx1v6, gx1v7)
pub const GX1_SEAM_CORRECTION: SeamCorrection = SeamCorrection {
    width: 320,
    start_row: 367,
    trailing_rows_skipped: 3,
};

/// Lookup table of seam corrections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeamCorrections(Vec<SeamCorrection>);

impl SeamCorrections {
    #[must_use]
    pub fn new(corrections: Vec<SeamCorrection>) -> Self {
        Self(corrections)
    }

    /// A table that never patches anything
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn for_width(&self, width: usize) -> Option<&SeamCorrection> {
        self.0.iter().find(|c| c.width == width)
    }
}

impl Default for SeamCorrections {
    fn default() -> Self {
        Self(vec![GX1_SEAM_CORRECTION])
    }
}

/// Output of [`adjust_pop_grid`]; every array has one more column than the input
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedGrid<T> {
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    pub field: Array2<T>,
}

/// Re-centers `tlon`, `tlat` and `field` (all `(nj, ni)`) for cyclic plotting,
/// using the default seam-correction table.
///
/// # Errors
///
/// Returns [`PopUtilsError::ShapeMismatch`] if the inputs differ in shape or
/// the grid is empty.
pub fn adjust_pop_grid<T: Clone>(
    tlon: ArrayView2<f64>,
    tlat: ArrayView2<f64>,
    field: ArrayView2<T>,
) -> Result<AdjustedGrid<T>> {
    adjust_pop_grid_with(tlon, tlat, field, &SeamCorrections::default())
}

/// Like [`adjust_pop_grid`], with an explicit seam-correction table.
///
/// Longitudes at or east of the smallest value in the first column are moved
/// down by 360°, the row is doubled and a window of `ni` columns starting at
/// `ni / 2 - 1` is taken, then everything is shifted back by 360° and the
/// first column is repeated (+360°) at the end. Latitudes and the field get
/// the same windowing without any longitude arithmetic.
///
/// # Errors
///
/// Returns [`PopUtilsError::ShapeMismatch`] if the inputs differ in shape or
/// the grid is empty.
pub fn adjust_pop_grid_with<T: Clone>(
    tlon: ArrayView2<f64>,
    tlat: ArrayView2<f64>,
    field: ArrayView2<T>,
    corrections: &SeamCorrections,
) -> Result<AdjustedGrid<T>> {
    let (nj, ni) = tlon.dim();
    if tlat.dim() != (nj, ni) || field.dim() != (nj, ni) {
        return Err(PopUtilsError::ShapeMismatch {
            message: format!(
                "tlon is {:?}, tlat is {:?}, field is {:?}",
                tlon.dim(),
                tlat.dim(),
                field.dim()
            ),
        });
    }
    if nj == 0 || ni == 0 {
        return Err(PopUtilsError::ShapeMismatch {
            message: format!("empty grid {:?}", (nj, ni)),
        });
    }

    let x_left = (ni / 2).saturating_sub(1);
    let x_right = x_left + ni;
    let correction = corrections.for_width(ni);

    let first_column_min = tlon.column(0).iter().copied().fold(f64::INFINITY, f64::min);
    let shifted = tlon.mapv(|x| if x >= first_column_min { x - 360.0 } else { x });
    let doubled = concatenate(Axis(1), &[shifted.view(), (&shifted + 360.0).view()])?;
    let mut lon = doubled.slice(s![.., x_left..x_right]).to_owned();

    if let Some(c) = correction {
        let end = nj.saturating_sub(c.trailing_rows_skipped);
        if c.start_row < end {
            lon.slice_mut(s![c.start_row..end, 0])
                .mapv_inplace(|x| x + 360.0);
        }
    }
    lon -= 360.0;

    let seam = lon.slice(s![.., 0..1]).mapv(|x| x + 360.0);
    let mut lon = concatenate(Axis(1), &[lon.view(), seam.view()])?;

    if let Some(c) = correction {
        if c.start_row < nj {
            lon.slice_mut(s![c.start_row.., ni])
                .mapv_inplace(|x| x - 360.0);
        }
    }

    lon.column_mut(0).mapv_inplace(|x| x - SEAM_EPSILON);

    Ok(AdjustedGrid {
        lon,
        lat: cyclic_window(tlat, x_left, x_right)?,
        field: cyclic_window(field, x_left, x_right)?,
    })
}

/// Doubles `a` along columns, keeps `x_left..x_right` and appends the first kept column.
fn cyclic_window<T: Clone>(a: ArrayView2<T>, x_left: usize, x_right: usize) -> Result<Array2<T>> {
    let doubled = concatenate(Axis(1), &[a, a])?;
    let window = doubled.slice(s![.., x_left..x_right]);
    Ok(concatenate(Axis(1), &[window, window.slice(s![.., 0..1])])?)
}
