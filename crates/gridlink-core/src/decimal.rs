/*!
 * Decimal value codec.
 *
 * Every measurement value extracted from a device model is converted into a
 * [`Decimal`] rounded to three significant digits with round-half-to-even.
 * Rounding is applied to the exact binary value of the float, so the outcome
 * for ties depends on the IEEE-754 representation of the input
 * (`12.25` rounds to `12.2`, while `12.35_f32` is slightly above the tie and
 * rounds to `12.4`).
 */
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Number of significant digits kept for measurement values
pub const MEASUREMENT_PRECISION: usize = 3;

/// Largest supported precision; keeps the unscaled value inside an `i64`
const MAX_PRECISION: usize = 18;

/// A decimal number `unscaled * 10^-scale`.
///
/// Equality compares the representation, so `2.00` and `2` are different
/// values, the same way the precision of a rounded measurement is preserved
/// when it is sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: i64,
    scale: i32,
}

impl Decimal {
    /// Decimal zero
    pub const ZERO: Decimal = Decimal {
        unscaled: 0,
        scale: 0,
    };

    /// Create a decimal from its unscaled value and scale
    pub fn new(unscaled: i64, scale: i32) -> Self {
        Self { unscaled, scale }
    }

    /// Round a measurement value to three significant digits.
    ///
    /// Returns `None` for NaN and infinite input.
    pub fn round_sig3(value: f64) -> Option<Self> {
        Self::round_to_precision(value, MEASUREMENT_PRECISION)
    }

    /// Round a single-precision measurement value to three significant digits.
    pub fn from_f32(value: f32) -> Option<Self> {
        Self::round_sig3(f64::from(value))
    }

    /// Round `value` to `precision` significant digits using round-half-to-even.
    ///
    /// Values whose exact decimal expansion already fits in `precision`
    /// digits are returned unchanged. Integral values keep a scale of zero.
    pub fn round_to_precision(value: f64, precision: usize) -> Option<Self> {
        if !value.is_finite() || precision == 0 || precision > MAX_PRECISION {
            return None;
        }
        if value == 0.0 {
            return Some(Self::ZERO);
        }

        let sign = if value.is_sign_negative() { -1 } else { 1 };
        let (mut digits, mut last_exponent) = exact_digits(value.abs())?;

        while digits.len() > 1 && digits.last() == Some(&0) && last_exponent < 0 {
            digits.pop();
            last_exponent += 1;
        }
        if last_exponent > 0 {
            digits.extend(std::iter::repeat(0).take(last_exponent as usize));
            last_exponent = 0;
        }

        if digits.len() <= precision {
            return Some(Self {
                unscaled: sign * fold_digits(&digits),
                scale: -last_exponent,
            });
        }

        let (kept, dropped) = digits.split_at(precision);
        let mut unscaled = fold_digits(kept);
        let round_up = match dropped[0].cmp(&5) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => dropped[1..].iter().any(|d| *d != 0) || unscaled % 2 == 1,
        };
        if round_up {
            unscaled += 1;
        }

        let mut scale = -last_exponent - dropped.len() as i32;
        if unscaled == 10_i64.pow(precision as u32) {
            unscaled /= 10;
            scale -= 1;
        }

        Some(Self {
            unscaled: sign * unscaled,
            scale,
        })
    }

    /// The unscaled value
    pub fn unscaled(&self) -> i64 {
        self.unscaled
    }

    /// The scale (number of digits right of the decimal point, may be negative)
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Number of significant digits in the unscaled value
    pub fn precision(&self) -> usize {
        if self.unscaled == 0 {
            1
        } else {
            self.unscaled.unsigned_abs().to_string().len()
        }
    }

    /// Nearest `f64` to this decimal
    pub fn to_f64(&self) -> f64 {
        format!("{}e{}", self.unscaled, -self.scale)
            .parse()
            .unwrap_or(f64::NAN)
    }
}

/// Exact significant digits of a finite, positive float and the decimal
/// exponent of the last digit.
fn exact_digits(value: f64) -> Option<(Vec<u8>, i32)> {
    let repr = format!("{:.*e}", exact_precision(value), value);
    let (mantissa, exponent) = repr.split_once('e')?;
    let exponent: i32 = exponent.parse().ok()?;
    let digits: Vec<u8> = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();
    let last_exponent = exponent - (digits.len() as i32 - 1);
    Some((digits, last_exponent))
}

/// Digits after the leading one needed to print a finite, positive float exactly.
///
/// `value = m * 2^e` with `m` odd ends `-e` places right of the decimal point
/// when `e < 0`, and is an integer otherwise.
fn exact_precision(value: f64) -> usize {
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1_u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1_u64 << 52), biased - 1075)
    };
    if mantissa == 0 {
        return 0;
    }

    let exponent = exponent + mantissa.trailing_zeros() as i32;
    let leading = value.log10().floor() as i32;
    // one spare digit covers log10 landing just below a power of ten
    (leading - exponent.min(0)).max(0) as usize + 1
}

fn fold_digits(digits: &[u8]) -> i64 {
    digits
        .iter()
        .fold(0_i64, |acc, d| acc * 10 + i64::from(*d))
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let digits = self.unscaled.unsigned_abs().to_string();

        if self.scale <= 0 {
            let zeros = "0".repeat(self.scale.unsigned_abs() as usize);
            if self.unscaled == 0 {
                return write!(f, "0");
            }
            return write!(f, "{}{}{}", sign, digits, zeros);
        }

        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Serialization(format!("Invalid decimal: {}", s));

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty()
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let unscaled: i64 = digits.parse().map_err(|_| invalid())?;
        Ok(Self {
            unscaled: if negative { -unscaled } else { unscaled },
            scale: frac_part.len() as i32,
        })
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rounded(value: f64) -> String {
        Decimal::round_sig3(value).unwrap().to_string()
    }

    #[test]
    fn test_rounding_table() {
        let table: &[(f64, &str)] = &[
            (12.345, "12.3"),
            (12.25, "12.2"),
            (12.75, "12.8"),
            (0.125, "0.125"),
            (0.1, "0.100"),
            (1.999, "2.00"),
            (9.995, "9.99"),
            (230.0, "230"),
            (231.4, "231"),
            (1234.5, "1230"),
            (999.5, "1000"),
            (-12.25, "-12.2"),
            (-0.0456789, "-0.0457"),
            (0.0, "0"),
            (50.0, "50"),
        ];

        for (input, expected) in table {
            assert_eq!(rounded(*input), *expected, "rounding {}", input);
        }
    }

    #[test]
    fn test_f32_representation_decides_ties() {
        // 12.35_f32 is 12.350000381..., above the tie
        assert_eq!(Decimal::from_f32(12.35).unwrap().to_string(), "12.4");
        // 12.35_f64 is 12.349999999..., below the tie
        assert_eq!(rounded(12.35), "12.3");
        // 0.5 steps are exact in binary, so half-even applies
        assert_eq!(Decimal::from_f32(2.125).unwrap().to_string(), "2.12");
        assert_eq!(Decimal::from_f32(2.375).unwrap().to_string(), "2.38");
    }

    #[test]
    fn test_precision_is_kept_after_rounding() {
        let d = Decimal::round_sig3(1.999).unwrap();
        assert_eq!(d.unscaled(), 200);
        assert_eq!(d.scale(), 2);
        assert_eq!(d.precision(), 3);

        let d = Decimal::round_sig3(999.5).unwrap();
        assert_eq!(d.unscaled(), 100);
        assert_eq!(d.scale(), -1);
    }

    #[test]
    fn test_non_finite_input() {
        assert!(Decimal::round_sig3(f64::NAN).is_none());
        assert!(Decimal::round_sig3(f64::INFINITY).is_none());
        assert!(Decimal::round_sig3(f64::NEG_INFINITY).is_none());
    }

    #[test]
    fn test_extreme_magnitudes() {
        assert_eq!(Decimal::from_f32(f32::MAX).unwrap().to_f64(), 3.40e38);
        let tiny = Decimal::from_f32(f32::MIN_POSITIVE).unwrap();
        assert_eq!(tiny.precision(), 3);
        assert_eq!(tiny.to_f64(), 1.18e-38);
    }

    #[test]
    fn test_exact_expansion() {
        let (digits, _) = exact_digits(0.1).unwrap();
        let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
        assert!(text.starts_with("1000000000000000055511151231257827021181583404541015625"));
        assert_eq!(exact_precision(0.5), 1);
        assert_eq!(exact_precision(1e22), 23);

        let tiny = Decimal::round_sig3(f64::from_bits(1)).unwrap();
        assert_eq!((tiny.unscaled(), tiny.scale()), (494, 326));
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(Decimal::round_sig3(12.345).unwrap().to_f64(), 12.3);
        assert_eq!(Decimal::new(-457, 4).to_f64(), -0.0457);
    }

    #[test]
    fn test_parse_and_serde() {
        let d: Decimal = "12.30".parse().unwrap();
        assert_eq!(d, Decimal::new(1230, 2));
        assert_eq!("-0.05".parse::<Decimal>().unwrap(), Decimal::new(-5, 2));
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());

        let json = serde_json::to_string(&Decimal::round_sig3(0.1).unwrap()).unwrap();
        assert_eq!(json, "\"0.100\"");
        let back: Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Decimal::new(100, 3));
    }
}
