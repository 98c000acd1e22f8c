//! Unit conversion collaborator and the built-in unit catalog.
//!
//! Rating sets only need two things from a unit system: converting a value
//! between two units and listing the units compatible with a given one. Any
//! implementation of [`UnitConverter`] can be plugged into a rating set; the
//! [`UnitCatalog`] below covers the quantities common in hydrologic ratings.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

/// Unit conversion service consumed by rating sets
pub trait UnitConverter: Send + Sync {
    /// Convert `value` expressed in `from` into `to`
    fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64>;

    /// All units convertible to and from `unit` (including itself)
    fn compatible_units(&self, unit: &str) -> Result<BTreeSet<String>>;
}

/// Physical dimension of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Dimension {
    Length,
    Area,
    Volume,
    Flow,
    Count,
    Temperature,
    Ratio,
}

/// Linear map onto the dimension's base unit: `base = value * factor + offset`
#[derive(Clone, Debug)]
struct UnitDef {
    dimension: Dimension,
    factor: f64,
    offset: f64,
}

const FT: f64 = 0.3048;
const ACRE_FT: f64 = 1233.48183754752;

/// Cached built-in unit table, built once and reused
static BUILTIN_UNITS: Lazy<HashMap<&'static str, UnitDef>> = Lazy::new(build_builtin_units);

fn build_builtin_units() -> HashMap<&'static str, UnitDef> {
    let mut units = HashMap::new();
    let mut add = |name: &'static str, dimension: Dimension, factor: f64, offset: f64| {
        units.insert(
            name,
            UnitDef {
                dimension,
                factor,
                offset,
            },
        );
    };

    // Length (base: m)
    add("m", Dimension::Length, 1.0, 0.0);
    add("cm", Dimension::Length, 0.01, 0.0);
    add("mm", Dimension::Length, 0.001, 0.0);
    add("km", Dimension::Length, 1000.0, 0.0);
    add("ft", Dimension::Length, FT, 0.0);
    add("in", Dimension::Length, FT / 12.0, 0.0);
    add("mi", Dimension::Length, FT * 5280.0, 0.0);

    // Area (base: m2)
    add("m2", Dimension::Area, 1.0, 0.0);
    add("km2", Dimension::Area, 1.0e6, 0.0);
    add("ha", Dimension::Area, 1.0e4, 0.0);
    add("ft2", Dimension::Area, FT * FT, 0.0);
    add("acre", Dimension::Area, 43560.0 * FT * FT, 0.0);
    add("mi2", Dimension::Area, (FT * 5280.0) * (FT * 5280.0), 0.0);

    // Volume (base: m3)
    add("m3", Dimension::Volume, 1.0, 0.0);
    add("1000 m3", Dimension::Volume, 1.0e3, 0.0);
    add("mcm", Dimension::Volume, 1.0e6, 0.0);
    add("ft3", Dimension::Volume, FT * FT * FT, 0.0);
    add("ac-ft", Dimension::Volume, ACRE_FT, 0.0);
    add("kaf", Dimension::Volume, ACRE_FT * 1.0e3, 0.0);
    add("gal", Dimension::Volume, 0.003785411784, 0.0);

    // Flow (base: m3/s)
    add("cms", Dimension::Flow, 1.0, 0.0);
    add("cfs", Dimension::Flow, FT * FT * FT, 0.0);
    add("kcfs", Dimension::Flow, FT * FT * FT * 1.0e3, 0.0);
    add("gpm", Dimension::Flow, 0.003785411784 / 60.0, 0.0);
    add("mgd", Dimension::Flow, 0.003785411784 * 1.0e6 / 86400.0, 0.0);

    // Count
    add("unit", Dimension::Count, 1.0, 0.0);

    // Temperature (base: C)
    add("C", Dimension::Temperature, 1.0, 0.0);
    add("F", Dimension::Temperature, 5.0 / 9.0, -32.0 * 5.0 / 9.0);
    add("K", Dimension::Temperature, 1.0, -273.15);

    // Ratio
    add("%", Dimension::Ratio, 0.01, 0.0);
    add("n/a", Dimension::Ratio, 1.0, 0.0);

    units
}

/// Unit aliases accepted on input
static ALIASES: &[(&str, &str)] = &[
    ("feet", "ft"),
    ("meters", "m"),
    ("m3/s", "cms"),
    ("ft3/s", "cfs"),
    ("acre-ft", "ac-ft"),
    ("acft", "ac-ft"),
    ("deg C", "C"),
    ("deg F", "F"),
];

/// The built-in unit table
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitCatalog;

impl UnitCatalog {
    fn lookup(&self, unit: &str) -> Result<(&'static str, &'static UnitDef)> {
        let name = ALIASES
            .iter()
            .find(|(alias, _)| *alias == unit)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(unit);
        BUILTIN_UNITS
            .get_key_value(name)
            .map(|(k, v)| (*k, v))
            .ok_or_else(|| Error::Unit(format!("Unknown unit '{}'", unit)))
    }
}

impl UnitConverter for UnitCatalog {
    fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64> {
        if from == to {
            return Ok(value);
        }
        let (from_name, from_def) = self.lookup(from)?;
        let (to_name, to_def) = self.lookup(to)?;
        if from_def.dimension != to_def.dimension {
            return Err(Error::Unit(format!(
                "Cannot convert from '{}' ({:?}) to '{}' ({:?})",
                from_name, from_def.dimension, to_name, to_def.dimension
            )));
        }
        let base = value * from_def.factor + from_def.offset;
        Ok((base - to_def.offset) / to_def.factor)
    }

    fn compatible_units(&self, unit: &str) -> Result<BTreeSet<String>> {
        let (_, def) = self.lookup(unit)?;
        Ok(BUILTIN_UNITS
            .iter()
            .filter(|(_, other)| other.dimension == def.dimension)
            .map(|(name, _)| name.to_string())
            .collect())
    }
}

/// Split a units identifier such as `unit,ft,ft;cfs` into its parts
pub fn split_units(units: &str) -> Vec<String> {
    units
        .split([';', ','])
        .map(|u| u.trim().to_string())
        .collect()
}
