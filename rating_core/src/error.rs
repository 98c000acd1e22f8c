//! Error types for the rating_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rating_core operations
///
/// `NaN` results produced by a `NULL` lookup policy are successful ratings,
/// never errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Low-level XML reader error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration file validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed template or specification identifier
    #[error("Invalid identifier: {0}")]
    Identifier(String),

    /// Invalid rating template contents
    #[error("Rating template error: {0}")]
    Template(String),

    /// Invalid rating specification contents
    #[error("Rating specification error: {0}")]
    Specification(String),

    /// Structurally invalid rating table (ragged, non-monotonic, duplicate keys)
    #[error("Rating table error: {0}")]
    Table(String),

    /// A required XML element or attribute is absent or empty
    #[error("Missing <{element}> in {context}")]
    MissingElement { element: String, context: String },

    /// XML that parses but does not describe a valid rating document
    #[error("Invalid rating XML: {0}")]
    InvalidXml(String),

    /// An ERROR lookup method was triggered
    #[error("Lookup policy error: {0}")]
    Policy(String),

    /// Invalid rounding specification
    #[error("Rounding error: {0}")]
    Rounding(String),

    /// Caller misuse: arity, missing units, no applicable ratings
    #[error("Rating error: {0}")]
    Rating(String),

    /// Unit conversion failure reported by the unit collaborator
    #[error("Unit error: {0}")]
    Unit(String),

    /// Vertical datum conversion could not be performed
    #[error("Vertical datum error: {0}")]
    VerticalDatum(String),

    /// Lazy point loading failed
    #[error("Point source error: {0}")]
    PointSource(String),
}

impl Error {
    pub(crate) fn missing(element: &str, context: &str) -> Self {
        Error::MissingElement {
            element: element.to_string(),
            context: context.to_string(),
        }
    }
}
