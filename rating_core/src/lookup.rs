//! Lookup methods used to interpolate, extrapolate, or select rating values.
//!
//! Every independent axis carries a [`LookupPolicy`]: one method for values
//! inside the table's range and one for each side outside of it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interpolation, extrapolation, and selection policies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LookupMethod {
    Null,
    Error,
    Linear,
    Logarithmic,
    LinLog,
    LogLin,
    Previous,
    Next,
    Nearest,
    Lower,
    Higher,
    Closest,
}

/// All methods in ordinal order
pub const ALL_METHODS: [LookupMethod; 12] = [
    LookupMethod::Null,
    LookupMethod::Error,
    LookupMethod::Linear,
    LookupMethod::Logarithmic,
    LookupMethod::LinLog,
    LookupMethod::LogLin,
    LookupMethod::Previous,
    LookupMethod::Next,
    LookupMethod::Nearest,
    LookupMethod::Lower,
    LookupMethod::Higher,
    LookupMethod::Closest,
];

static DESCRIPTIONS: [&str; 12] = [
    "Return null if between values or outside range",
    "Raise an error if between values or outside range",
    "Linear interpolation or extrapolation of independent and dependent values",
    "Logarithmic interpolation or extrapolation of independent and dependent values",
    "Linear interpolation/extrapolation of independent values, logarithmic of dependent values",
    "Logarithmic interpolation/extrapolation of independent values, linear of dependent values",
    "Return the value that is lower in position",
    "Return the value that is higher in position",
    "Return the value that is nearest in position",
    "Return the value that is lower in magnitude",
    "Return the value that is higher in magnitude",
    "Return the value that is closest in magnitude",
];

impl LookupMethod {
    /// Canonical upper-case name
    pub fn name(self) -> &'static str {
        match self {
            LookupMethod::Null => "NULL",
            LookupMethod::Error => "ERROR",
            LookupMethod::Linear => "LINEAR",
            LookupMethod::Logarithmic => "LOGARITHMIC",
            LookupMethod::LinLog => "LINLOG",
            LookupMethod::LogLin => "LOGLIN",
            LookupMethod::Previous => "PREVIOUS",
            LookupMethod::Next => "NEXT",
            LookupMethod::Nearest => "NEAREST",
            LookupMethod::Lower => "LOWER",
            LookupMethod::Higher => "HIGHER",
            LookupMethod::Closest => "CLOSEST",
        }
    }

    /// 1-based ordinal (NULL = 1 ... CLOSEST = 12)
    pub fn ordinal(self) -> u8 {
        self.index() as u8 + 1
    }

    fn index(self) -> usize {
        ALL_METHODS
            .iter()
            .position(|m| *m == self)
            .unwrap_or_default()
    }

    pub fn description(self) -> &'static str {
        DESCRIPTIONS[self.index()]
    }

    /// Look up a method by name, ignoring case
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim();
        ALL_METHODS
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::Template(format!("Unknown lookup method '{}'", name)))
    }

    /// Look up a method by its 1-based ordinal
    pub fn from_ordinal(ordinal: u8) -> Result<Self> {
        match ordinal {
            1..=12 => Ok(ALL_METHODS[ordinal as usize - 1]),
            _ => Err(Error::Template(format!(
                "Lookup method ordinal must be 1..=12, got {}",
                ordinal
            ))),
        }
    }

    /// LINEAR, LOGARITHMIC, LINLOG, or LOGLIN
    pub fn is_interpolation(self) -> bool {
        matches!(
            self,
            LookupMethod::Linear
                | LookupMethod::Logarithmic
                | LookupMethod::LinLog
                | LookupMethod::LogLin
        )
    }

    /// PREVIOUS, NEXT, NEAREST, LOWER, HIGHER, or CLOSEST
    pub fn is_selection(self) -> bool {
        matches!(
            self,
            LookupMethod::Previous
                | LookupMethod::Next
                | LookupMethod::Nearest
                | LookupMethod::Lower
                | LookupMethod::Higher
                | LookupMethod::Closest
        )
    }

    /// Whether the method works in log space on the (x, y) roles
    pub(crate) fn log_axes(self) -> (bool, bool) {
        match self {
            LookupMethod::Logarithmic => (true, true),
            LookupMethod::LinLog => (false, true),
            LookupMethod::LogLin => (true, false),
            _ => (false, false),
        }
    }

    /// The same method with the x and y roles exchanged, used by reverse rating
    pub fn swap_roles(self) -> Self {
        match self {
            LookupMethod::LinLog => LookupMethod::LogLin,
            LookupMethod::LogLin => LookupMethod::LinLog,
            other => other,
        }
    }
}

impl fmt::Display for LookupMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LookupMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().parse::<u8>() {
            Ok(ordinal) => Self::from_ordinal(ordinal),
            Err(_) => Self::from_name(s),
        }
    }
}

/// The (in-range, below-range, above-range) method triple for one axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPolicy {
    pub in_range: LookupMethod,
    pub out_range_low: LookupMethod,
    pub out_range_high: LookupMethod,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            in_range: LookupMethod::Linear,
            out_range_low: LookupMethod::Nearest,
            out_range_high: LookupMethod::Nearest,
        }
    }
}

impl LookupPolicy {
    pub fn new(
        in_range: LookupMethod,
        out_range_low: LookupMethod,
        out_range_high: LookupMethod,
    ) -> Self {
        Self {
            in_range,
            out_range_low,
            out_range_high,
        }
    }

    /// Parse three method names or ordinals
    pub fn parse<S: AsRef<str>>(methods: &[S]) -> Result<Self> {
        if methods.len() != 3 {
            return Err(Error::Template(format!(
                "Expected 3 lookup methods (in-range, out-range-low, out-range-high), got {}",
                methods.len()
            )));
        }
        Ok(Self::new(
            methods[0].as_ref().parse()?,
            methods[1].as_ref().parse()?,
            methods[2].as_ref().parse()?,
        ))
    }

    /// The policy used when independent and dependent roles are exchanged
    pub fn reversed(self) -> Self {
        Self::new(
            self.in_range.swap_roles(),
            self.out_range_low.swap_roles(),
            self.out_range_high.swap_roles(),
        )
    }

    pub fn names(&self) -> [&'static str; 3] {
        [
            self.in_range.name(),
            self.out_range_low.name(),
            self.out_range_high.name(),
        ]
    }
}
