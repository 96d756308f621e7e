//! Quality-mask combination
//!
//! A mask entry is a bitfield of quality flags where 0 means "good". Binary map operators
//! combine the operand masks with a bitwise AND: a result pixel carries a flag only when
//! both operands carry it, and is good as soon as either operand is good.

use crate::error::MapError;
use crate::grid::{self, MaskGrid};

/// DAP per-spaxel quality flags (bit positions in the mask word)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskFlag {
    /// No coverage in this spaxel
    NoCov,
    /// Low coverage in this spaxel
    LowCov,
    /// Major contributing fiber is dead
    DeadFiber,
    /// Foreground star
    ForeStar,
    /// Spaxel was not fit
    NoValue,
    /// Value is deemed unreliable
    Unreliable,
    /// Mathematical error in computing value
    MathError,
    /// Attempted fit failed
    FitFailed,
    /// Fitted value is too near a boundary
    NearBound,
    /// Appropriate correction not available
    NoCorrection,
    /// Multi-component velocity features present
    MultiComp,
    /// Do not use this spaxel for science
    DoNotUse,
}

impl MaskFlag {
    /// Every defined flag, lowest bit first
    pub const ALL: [MaskFlag; 12] = [
        MaskFlag::NoCov,
        MaskFlag::LowCov,
        MaskFlag::DeadFiber,
        MaskFlag::ForeStar,
        MaskFlag::NoValue,
        MaskFlag::Unreliable,
        MaskFlag::MathError,
        MaskFlag::FitFailed,
        MaskFlag::NearBound,
        MaskFlag::NoCorrection,
        MaskFlag::MultiComp,
        MaskFlag::DoNotUse,
    ];

    /// Bit position in the mask word
    #[must_use]
    pub const fn bit(self) -> u32 {
        match self {
            MaskFlag::NoCov => 0,
            MaskFlag::LowCov => 1,
            MaskFlag::DeadFiber => 2,
            MaskFlag::ForeStar => 3,
            MaskFlag::NoValue => 4,
            MaskFlag::Unreliable => 5,
            MaskFlag::MathError => 6,
            MaskFlag::FitFailed => 7,
            MaskFlag::NearBound => 8,
            MaskFlag::NoCorrection => 9,
            MaskFlag::MultiComp => 10,
            MaskFlag::DoNotUse => 30,
        }
    }

    /// Mask word with only this flag set
    #[must_use]
    pub const fn value(self) -> u32 {
        1 << self.bit()
    }

    /// Upper-case flag name as it appears in the survey datamodel
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MaskFlag::NoCov => "NOCOV",
            MaskFlag::LowCov => "LOWCOV",
            MaskFlag::DeadFiber => "DEADFIBER",
            MaskFlag::ForeStar => "FORESTAR",
            MaskFlag::NoValue => "NOVALUE",
            MaskFlag::Unreliable => "UNRELIABLE",
            MaskFlag::MathError => "MATHERROR",
            MaskFlag::FitFailed => "FITFAILED",
            MaskFlag::NearBound => "NEARBOUND",
            MaskFlag::NoCorrection => "NOCORRECTION",
            MaskFlag::MultiComp => "MULTICOMP",
            MaskFlag::DoNotUse => "DONOTUSE",
        }
    }

    /// True if `word` has this flag set
    #[must_use]
    pub const fn is_set(self, word: u32) -> bool {
        word & self.value() != 0
    }

    /// Flags set in `word`, lowest bit first
    #[must_use]
    pub fn decode(word: u32) -> Vec<MaskFlag> {
        MaskFlag::ALL
            .iter()
            .copied()
            .filter(|flag| flag.is_set(word))
            .collect()
    }
}

/// Combine two masks for a binary operator (bitwise AND)
///
/// # Errors
///
/// Returns `MapError::ShapeMismatch` if the masks differ in shape
pub fn combine(mask1: &MaskGrid, mask2: &MaskGrid) -> Result<MaskGrid, MapError> {
    grid::zip_map("mask1/mask2", mask1, mask2, |a, b| a & b)
}

/// Per-pixel "good" flags (`mask == 0`)
pub fn is_good(mask: &MaskGrid) -> nalgebra::DMatrix<bool> {
    grid::map(mask, |m| m == 0)
}

/// Number of pixels with any flag set
pub fn count_flagged(mask: &MaskGrid) -> usize {
    mask.iter().filter(|&&m| m != 0).count()
}

/// Per-pixel test for a single flag
pub fn has_flag(mask: &MaskGrid, flag: MaskFlag) -> nalgebra::DMatrix<bool> {
    grid::map(mask, |m| flag.is_set(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_is_bitwise_and() {
        let a = grid::from_rows(&[vec![0, 1], vec![3, 1 << 30]]).unwrap();
        let b = grid::from_rows(&[vec![5, 1], vec![1, 0]]).unwrap();
        let c = combine(&a, &b).unwrap();
        assert_eq!(grid::to_rows(&c), vec![vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn test_combine_shape_mismatch() {
        let a = MaskGrid::zeros(2, 2);
        let b = MaskGrid::zeros(2, 1);
        assert!(combine(&a, &b).is_err());
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(MaskFlag::NoCov.value(), 1);
        assert_eq!(MaskFlag::DoNotUse.value(), 1 << 30);
        let word = MaskFlag::NoValue.value() | MaskFlag::DoNotUse.value();
        assert_eq!(
            MaskFlag::decode(word),
            vec![MaskFlag::NoValue, MaskFlag::DoNotUse]
        );
        assert_eq!(MaskFlag::DoNotUse.name(), "DONOTUSE");
    }

    #[test]
    fn test_good_and_flagged() {
        let m = grid::from_rows(&[vec![0, MaskFlag::Unreliable.value()], vec![0, 0]]).unwrap();
        assert_eq!(count_flagged(&m), 1);
        let good = is_good(&m);
        assert!(good[(0, 0)]);
        assert!(!good[(0, 1)]);
        let unreliable = has_flag(&m, MaskFlag::Unreliable);
        assert!(unreliable[(0, 1)]);
        assert!(!unreliable[(1, 1)]);
    }
}
