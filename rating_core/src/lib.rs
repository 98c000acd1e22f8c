#![forbid(unsafe_code)]

//! Core model and algorithms for rating hydrologic measurements.
//!
//! This crate provides:
//! - Rating templates and specifications (identity, lookup policies, rounding)
//! - N-dimensional table lookup with per-axis interpolation policies
//! - Time-versioned rating sets with unit and vertical datum conversion
//! - Exchange XML reading and writing, and lazy point loading

pub mod error;
pub mod xml;
pub mod lookup;
pub mod rounding;
pub mod units;
pub mod datum;
pub mod template;
pub mod specification;
pub mod table;
pub mod points;
pub mod table_rating;
pub mod registry;
pub mod rating_set;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use lookup::{LookupMethod, LookupPolicy};
pub use rounding::UsgsRounder;
pub use units::{UnitCatalog, UnitConverter};
pub use datum::VerticalDatumInfo;
pub use template::RatingTemplate;
pub use specification::{Location, RatingSpecification};
pub use table::{interpolate_or_select, RatingNode, RatingTable};
pub use points::{CsvPointStore, PointSource};
pub use table_rating::{parse_time, TableRating};
pub use registry::ParserRegistry;
pub use rating_set::{RateInput, RateOptions, RateOutput, RatingSet};
pub use config::Config;
