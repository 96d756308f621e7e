//! Grid storage and element-wise kernels
//!
//! Maps store their value and inverse-variance grids as `DMatrix<f64>` and their quality
//! masks as `DMatrix<u32>`. All element-wise work goes through [`build`], which walks the
//! column-major storage by linear index and switches to rayon once a grid is large enough
//! for the split to pay off. Serial and parallel paths produce identical results.

use nalgebra::{DMatrix, Scalar};
use rayon::prelude::*;

use crate::error::MapError;

/// Floating-point grid (values, inverse variances)
pub type Grid = DMatrix<f64>;

/// Quality bitmask grid, 0 = good
pub type MaskGrid = DMatrix<u32>;

/// Element count above which kernels run on the rayon pool
pub const PARALLEL_THRESHOLD: usize = 16_384;

/// Build a `rows x cols` grid from a function of the linear (column-major) index
///
/// Use together with linear indexing (`grid[i]`) of same-shaped inputs.
pub fn build<R, F>(rows: usize, cols: usize, f: F) -> DMatrix<R>
where
    R: Scalar + Send,
    F: Fn(usize) -> R + Sync + Send,
{
    let len = rows * cols;
    let data: Vec<R> = if len >= PARALLEL_THRESHOLD {
        (0..len).into_par_iter().map(f).collect()
    } else {
        (0..len).map(f).collect()
    };
    DMatrix::from_vec(rows, cols, data)
}

/// Apply `f` to every element of `a`
pub fn map<T, R, F>(a: &DMatrix<T>, f: F) -> DMatrix<R>
where
    T: Scalar + Copy + Sync,
    R: Scalar + Send,
    F: Fn(T) -> R + Sync + Send,
{
    let (rows, cols) = a.shape();
    build(rows, cols, |i| f(a[i]))
}

/// Combine two grids element by element
///
/// # Errors
/// Returns `MapError::ShapeMismatch` if `a` and `b` differ in shape
pub fn zip_map<T, U, R, F>(
    context: &'static str,
    a: &DMatrix<T>,
    b: &DMatrix<U>,
    f: F,
) -> Result<DMatrix<R>, MapError>
where
    T: Scalar + Copy + Sync,
    U: Scalar + Copy + Sync,
    R: Scalar + Send,
    F: Fn(T, U) -> R + Sync + Send,
{
    MapError::check_shape(context, a.shape(), b.shape())?;
    let (rows, cols) = a.shape();
    Ok(build(rows, cols, |i| f(a[i], b[i])))
}

/// Build a grid from nested rows (row-major input)
///
/// # Errors
/// Returns `MapError::ShapeMismatch` if the rows are ragged
pub fn from_rows<T>(rows: &[Vec<T>]) -> Result<DMatrix<T>, MapError>
where
    T: Scalar + Copy,
{
    let ncols = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * ncols);
    for row in rows {
        MapError::check_shape("row lengths", (1, ncols), (1, row.len()))?;
        flat.extend_from_slice(row);
    }
    Ok(DMatrix::from_row_slice(rows.len(), ncols, &flat))
}

/// Copy a grid into nested rows (row-major output)
pub fn to_rows<T>(grid: &DMatrix<T>) -> Vec<Vec<T>>
where
    T: Scalar + Copy,
{
    grid.row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}
