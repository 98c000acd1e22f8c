//! USGS-style rounding of rated values.
//!
//! A rounding specification is a string of 10 digits. Digits 1-9 give the
//! number of significant digits to keep for values in the magnitude brackets
//! `<0.01, [0.01,0.1), [0.1,1), [1,10), [10,100), [100,1e3), [1e3,1e4),
//! [1e4,1e5), >=1e5`. Digit 10 is the maximum number of decimal places
//! regardless of magnitude.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rounding specification applied when no other is configured
pub const DEFAULT_ROUNDING_SPEC: &str = "4444444444";

/// Rounds values according to a 10-digit USGS rounding specification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsgsRounder {
    digits: [u8; 10],
}

impl Default for UsgsRounder {
    fn default() -> Self {
        Self { digits: [4; 10] }
    }
}

impl UsgsRounder {
    pub fn new(spec: &str) -> Result<Self> {
        let bytes = spec.as_bytes();
        if bytes.len() != 10 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(Error::Rounding(format!(
                "Expected a 10-digit rounding specification, got '{}'",
                spec
            )));
        }
        let mut digits = [0u8; 10];
        for (digit, byte) in digits.iter_mut().zip(bytes) {
            *digit = byte - b'0';
        }
        Ok(Self { digits })
    }

    /// The specification as its 10-digit string
    pub fn spec(&self) -> String {
        self.digits.iter().map(|d| char::from(b'0' + d)).collect()
    }

    pub fn max_decimal_places(&self) -> u8 {
        self.digits[9]
    }

    /// Round values, returning numbers
    pub fn round_f(&self, values: &[f64]) -> Vec<f64> {
        self.round_s(values, true)
            .iter()
            .zip(values)
            .map(|(s, v)| s.parse().unwrap_or(*v))
            .collect()
    }

    /// Round a single value
    pub fn round_value(&self, value: f64) -> f64 {
        self.round_f(&[value])[0]
    }

    /// Round values, returning their formatted text
    ///
    /// Ties are resolved to the even neighbor when `round_half_even` is set and
    /// away from zero otherwise.
    pub fn round_s(&self, values: &[f64], round_half_even: bool) -> Vec<String> {
        values
            .iter()
            .map(|v| self.round_one(*v, round_half_even))
            .collect()
    }

    fn round_one(&self, value: f64, round_half_even: bool) -> String {
        if !value.is_finite() {
            return value.to_string();
        }
        let max_dec_places = self.max_decimal_places() as usize;
        if value == 0.0 {
            return strip_zeros(format!("{:.*}", max_dec_places, 0.0));
        }
        let magnitude = value.abs().log10().floor() as i32;
        let index = (magnitude.clamp(-3, 5) + 3) as usize;
        let mut sig_digits = self.digits[index] as i32;
        if magnitude < 0 {
            sig_digits = (max_dec_places as i32).min(sig_digits + magnitude + 1);
        }
        let factor = 10f64.powi(magnitude - sig_digits + 1);
        let scaled = value / factor;
        let sign = scaled.signum();
        let mut integer = scaled.trunc();
        let fraction = (scaled - integer).abs();
        if (fraction - 0.5).abs() < 1.0e-8 {
            if !(round_half_even && integer % 2.0 == 0.0) {
                integer += sign;
            }
        } else {
            integer = (scaled + 0.5 * sign).trunc();
        }
        let rounded = integer * factor;
        // no "-0.0" for small negatives that round away
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        strip_zeros(format!("{:.*}", max_dec_places, rounded))
    }
}

/// Drop trailing zeros, always leaving one digit after the decimal point
fn strip_zeros(text: String) -> String {
    if !text.contains('.') {
        return format!("{}.0", text);
    }
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for UsgsRounder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec())
    }
}

impl FromStr for UsgsRounder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for UsgsRounder {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<UsgsRounder> for String {
    fn from(rounder: UsgsRounder) -> Self {
        rounder.spec()
    }
}
