//! Exact rational exponents for unit algebra
//!
//! Unit exponents must compare exactly (`km^(1/2) * km^(1/2) == km`), which rules out
//! storing them as floats. [`Rational`] keeps a reduced numerator/denominator pair with a
//! strictly positive denominator, so structural equality is numeric equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Largest denominator tried when converting a float exponent
pub const MAX_DENOMINATOR: i64 = 100;

/// Reduced fraction `num / den` with `den > 0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRational")]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Normalise sign and common factors; numerator stays within `-i64::MAX..=i64::MAX`
fn reduce(num: i128, den: i128) -> Option<Rational> {
    if den == 0 {
        return None;
    }
    let sign = if den < 0 { -1 } else { 1 };
    let g = gcd(num, den).max(1);
    let num = i64::try_from(sign * num / g).ok()?;
    let den = i64::try_from(sign * den / g).ok()?;
    (num != i64::MIN).then_some(Rational { num, den })
}

/// Serialized form, checked on the way in
#[derive(Deserialize)]
struct RawRational {
    num: i64,
    den: i64,
}

impl TryFrom<RawRational> for Rational {
    type Error = String;

    fn try_from(raw: RawRational) -> Result<Self, Self::Error> {
        Rational::checked_new(raw.num, raw.den)
            .ok_or_else(|| format!("invalid exponent {}/{}", raw.num, raw.den))
    }
}

impl Rational {
    /// Zero exponent
    pub const ZERO: Rational = Rational { num: 0, den: 1 };

    /// Unit exponent
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Create a reduced fraction
    ///
    /// # Panics
    /// If `den == 0` or the reduced fraction does not fit in `i64`
    #[must_use]
    #[track_caller]
    pub fn new(num: i64, den: i64) -> Self {
        match Self::checked_new(num, den) {
            Some(r) => r,
            None => panic!("Rational::new: invalid fraction {num}/{den}"),
        }
    }

    /// Reduced fraction, or `None` if `den == 0` or the result is out of range
    #[must_use]
    pub fn checked_new(num: i64, den: i64) -> Option<Self> {
        reduce(i128::from(num), i128::from(den))
    }

    /// `self + rhs`, or `None` on overflow
    #[must_use]
    pub fn checked_add(self, rhs: Rational) -> Option<Self> {
        let (a, b) = (i128::from(self.num), i128::from(self.den));
        let (c, d) = (i128::from(rhs.num), i128::from(rhs.den));
        reduce(a * d + c * b, b * d)
    }

    /// `self * rhs`, or `None` on overflow
    #[must_use]
    pub fn checked_mul(self, rhs: Rational) -> Option<Self> {
        reduce(
            i128::from(self.num) * i128::from(rhs.num),
            i128::from(self.den) * i128::from(rhs.den),
        )
    }

    /// Whole-number exponent
    #[must_use]
    pub const fn integer(n: i64) -> Self {
        Rational { num: n, den: 1 }
    }

    /// Closest fraction to `x` with denominator up to [`MAX_DENOMINATOR`]
    ///
    /// Returns `None` for non-finite input or when no such fraction lies within `1e-9`
    /// of `x`.
    #[must_use]
    pub fn from_f64(x: f64) -> Option<Self> {
        if !x.is_finite() || x.abs() > 1e9 {
            return None;
        }
        (1..=MAX_DENOMINATOR).find_map(|den| {
            let num = (x * den as f64).round();
            ((num / den as f64 - x).abs() < 1e-9).then(|| Rational::new(num as i64, den))
        })
    }

    /// Numerator (carries the sign)
    #[must_use]
    pub const fn numer(self) -> i64 {
        self.num
    }

    /// Denominator (always positive)
    #[must_use]
    pub const fn denom(self) -> i64 {
        self.den
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.num == 0
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.den == 1
    }

    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Rational::integer(n)
    }
}

impl Add for Rational {
    type Output = Rational;
    fn add(self, rhs: Rational) -> Rational {
        match self.checked_add(rhs) {
            Some(r) => r,
            None => panic!("Rational overflow in {self} + {rhs}"),
        }
    }
}

impl Sub for Rational {
    type Output = Rational;
    fn sub(self, rhs: Rational) -> Rational {
        self + (-rhs)
    }
}

impl Mul for Rational {
    type Output = Rational;
    fn mul(self, rhs: Rational) -> Rational {
        match self.checked_mul(rhs) {
            Some(r) => r,
            None => panic!("Rational overflow in {self} * {rhs}"),
        }
    }
}

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            den: self.den,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "({}/{})", self.num, self.den)
        }
    }
}
