//! Unit propagation through map operators
//!
//! Additive operators need commensurate units; multiplicative operators compose the
//! units algebraically whatever their dimensions. Incompatible additive operands are not
//! an error: the numeric result is still useful, it just loses its unit.

use std::fmt;

use tracing::{debug, warn};

use crate::core_types::Unit;

/// Binary map operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    /// Operator symbol (`+`, `-`, `*`, `/`)
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    /// Parse an operator symbol
    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    /// True for `+` and `-`
    #[must_use]
    pub const fn is_additive(self) -> bool {
        matches!(self, Operator::Add | Operator::Sub)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Unit of `unit1 <op> unit2`
///
/// - `+`, `-`: `unit1` if the units are equivalent, otherwise a warning and `None`.
///   Operand values are assumed to already be expressed in the same unit; no conversion
///   is applied here.
/// - `*`, `/`: the algebraic product or quotient.
#[must_use]
pub fn propagate(unit1: &Unit, unit2: &Unit, op: Operator) -> Option<Unit> {
    match op {
        Operator::Add | Operator::Sub => {
            if !unit1.is_equivalent(unit2) {
                warn!(
                    "Units '{}' and '{}' are not compatible for '{}'; result has no unit",
                    unit1, unit2, op
                );
                return None;
            }
            if unit1 != unit2 {
                debug!(
                    "Units '{}' and '{}' differ in scale; values assumed pre-aligned",
                    unit1, unit2
                );
            }
            Some(unit1.clone())
        }
        Operator::Mul | Operator::Div => {
            let unit = if op == Operator::Mul {
                unit1.checked_mul(unit2)
            } else {
                unit1.checked_div(unit2)
            };
            if unit.is_none() {
                warn!(
                    "Exponent overflow combining '{}' {} '{}'; result has no unit",
                    unit1, op, unit2
                );
            }
            unit
        }
    }
}

/// Unit propagation when either operand may have lost its unit
///
/// A missing unit on either side yields a missing result.
#[must_use]
pub fn propagate_optional(
    unit1: Option<&Unit>,
    unit2: Option<&Unit>,
    op: Operator,
) -> Option<Unit> {
    match (unit1, unit2) {
        (Some(u1), Some(u2)) => propagate(u1, u2, op),
        _ => None,
    }
}
