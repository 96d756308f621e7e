//! Inverse-variance propagation
//!
//! Maps carry their uncertainty as an inverse-variance grid (`ivar = 1 / sigma^2`). The
//! functions here propagate it through the map operators. Two sentinels are in play and
//! must not be confused:
//!
//! | ivar | variance | meaning |
//! |---|---|---|
//! | `0` | infinite | no constraint on the measurement |
//! | `+inf` | zero | exact value (e.g. a constant) |
//!
//! Both follow from IEEE arithmetic (`1/0 = inf`, `1/inf = 0`), so the formulas below are
//! applied without branching on them. `add_ivar(inf, x) == x` and `add_ivar(0, x) == 0`.
//!
//! A missing (`None`) ivar means "no uncertainty information" and is treated as an
//! all-zero grid.
//!
//! Nothing here panics or errors on degenerate numbers; only shape mismatches are errors.

use std::borrow::Cow;

use crate::error::MapError;
use crate::grid::{self, Grid};

/// Inverse variance of an exactly known quantity (zero variance)
pub const INFINITE_IVAR: f64 = f64::INFINITY;

/// Inverse variance of an unconstrained quantity (infinite variance)
pub const NO_INFORMATION_IVAR: f64 = 0.0;

fn zeros_like(shape: (usize, usize)) -> Grid {
    Grid::from_element(shape.0, shape.1, NO_INFORMATION_IVAR)
}

/// Pair up two optional ivar grids, standing in zeros for a missing one
fn pair<'a>(
    ivar1: Option<&'a Grid>,
    ivar2: Option<&'a Grid>,
    shape: (usize, usize),
) -> Option<(Cow<'a, Grid>, Cow<'a, Grid>)> {
    match (ivar1, ivar2) {
        (None, None) => None,
        (Some(a), Some(b)) => Some((Cow::Borrowed(a), Cow::Borrowed(b))),
        (Some(a), None) => Some((Cow::Borrowed(a), Cow::Owned(zeros_like(shape)))),
        (None, Some(b)) => Some((Cow::Owned(zeros_like(shape)), Cow::Borrowed(b))),
    }
}

/// Inverse variance of a sum or difference
///
/// Variances add: `ivar = 1 / (1/ivar1 + 1/ivar2)`. Entries where either input is zero
/// (infinite variance) come out as zero. NaN results are replaced by zero.
///
/// # Arguments
///
/// * `ivar1` - Inverse variance of the first operand, or `None`
/// * `ivar2` - Inverse variance of the second operand, or `None`
///
/// # Returns
///
/// `None` if both inputs are `None`, otherwise the combined grid
///
/// # Errors
///
/// Returns `MapError::ShapeMismatch` if the two grids differ in shape
pub fn add_ivar(ivar1: Option<&Grid>, ivar2: Option<&Grid>) -> Result<Option<Grid>, MapError> {
    let shape = ivar1.or(ivar2).map_or((0, 0), Grid::shape);
    let Some((a, b)) = pair(ivar1, ivar2, shape) else {
        return Ok(None);
    };

    let out = grid::zip_map("ivar1/ivar2", a.as_ref(), b.as_ref(), |x, y| {
        let ivar = 1.0 / (1.0 / x + 1.0 / y);
        if ivar.is_nan() {
            NO_INFORMATION_IVAR
        } else {
            ivar
        }
    })?;
    Ok(Some(out))
}

/// Inverse variance of a product or quotient
///
/// Relative standard deviations of the operands are summed and scaled by the result:
///
/// ```text
/// sigma12 = |value12| * (sigma1 / |value1| + sigma2 / |value2|)
/// ivar12  = 1 / sigma12^2
/// ```
///
/// The same expression serves `a * b` and `a / b`; only `value12` differs. IEEE rules
/// apply throughout: a zero operand value gives an infinite relative term, which yields
/// NaN where `value12` is also zero and zero ivar otherwise.
///
/// # Arguments
///
/// * `ivar1`, `ivar2` - Operand inverse variances, or `None`
/// * `value1`, `value2` - Operand values
/// * `value12` - The already computed product or quotient
///
/// # Returns
///
/// `None` if both ivars are `None`, otherwise the propagated grid
///
/// # Errors
///
/// Returns `MapError::ShapeMismatch` if any grid differs in shape from `value1`
pub fn mul_ivar(
    ivar1: Option<&Grid>,
    ivar2: Option<&Grid>,
    value1: &Grid,
    value2: &Grid,
    value12: &Grid,
) -> Result<Option<Grid>, MapError> {
    let shape = value1.shape();
    MapError::check_shape("value1/value2", shape, value2.shape())?;
    MapError::check_shape("value1/value12", shape, value12.shape())?;
    for ivar in [ivar1, ivar2].into_iter().flatten() {
        MapError::check_shape("value/ivar", shape, ivar.shape())?;
    }

    let Some((a, b)) = pair(ivar1, ivar2, shape) else {
        return Ok(None);
    };
    let (a, b) = (a.as_ref(), b.as_ref());

    let out = grid::build(shape.0, shape.1, |i| {
        let sig1 = 1.0 / a[i].sqrt();
        let sig2 = 1.0 / b[i].sqrt();
        let sig12 = value12[i].abs() * (sig1 / value1[i].abs() + sig2 / value2[i].abs());
        1.0 / (sig12 * sig12)
    });
    Ok(Some(out))
}

/// Inverse variance of `value ** power`
///
/// ```text
/// sigma_out = value^power * power * sigma * value
/// ivar_out  = 1 / sigma_out^2
/// ```
///
/// `power == 0` produces a constant, so every entry is [`INFINITE_IVAR`] regardless of
/// the input. Negative bases with fractional powers give NaN; zero bases with negative
/// powers give NaN or infinity, per IEEE rules.
///
/// # Arguments
///
/// * `ivar` - Inverse variance of the base, or `None`
/// * `value` - Base values
/// * `power` - Scalar exponent
///
/// # Returns
///
/// All zeros (no information) when `ivar` is `None`, otherwise the propagated grid
///
/// # Errors
///
/// Returns `MapError::ShapeMismatch` if `ivar` and `value` differ in shape
pub fn pow_ivar(ivar: Option<&Grid>, value: &Grid, power: f64) -> Result<Grid, MapError> {
    let shape = value.shape();
    let Some(ivar) = ivar else {
        return Ok(zeros_like(shape));
    };
    MapError::check_shape("value/ivar", shape, ivar.shape())?;

    Ok(pow_ivar_same_shape(ivar, value, power))
}

/// [`pow_ivar`] for grids already known to share a shape
pub(crate) fn pow_ivar_same_shape(ivar: &Grid, value: &Grid, power: f64) -> Grid {
    let (rows, cols) = value.shape();
    if power == 0.0 {
        return Grid::from_element(rows, cols, INFINITE_IVAR);
    }

    grid::build(rows, cols, |i| {
        let v = value[i];
        let sig = (1.0 / ivar[i]).sqrt();
        let sig_out = v.powf(power) * power * sig * v;
        1.0 / (sig_out * sig_out)
    })
}

/// Standard deviation from inverse variance (`inf` where ivar is zero)
pub fn ivar_to_sigma(ivar: &Grid) -> Grid {
    grid::map(ivar, |x| 1.0 / x.sqrt())
}

/// Inverse variance from standard deviation (`inf` where sigma is zero)
pub fn sigma_to_ivar(sigma: &Grid) -> Grid {
    grid::map(sigma, |s| 1.0 / (s * s))
}
