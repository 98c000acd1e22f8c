//! Rating parsers keyed by XML tag.
//!
//! A registry is built once by the application and handed to whatever loads
//! rating documents. The parser is picked from the element's tag before any
//! parsing starts.

use crate::specification::RatingSpecification;
use crate::table_rating::TableRating;
use crate::xml::XmlElement;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a rating from its element and resolved specification
pub type RatingParser = fn(&XmlElement, Arc<RatingSpecification>) -> Result<TableRating>;

pub const SIMPLE_RATING_TAG: &str = "simple-rating";

/// Maps rating element tags to parsers
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, RatingParser>,
}

impl ParserRegistry {
    /// A registry with no parsers
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register (or replace) the parser for a tag
    pub fn register(&mut self, tag: &str, parser: RatingParser) -> &mut Self {
        if self.parsers.insert(tag.to_string(), parser).is_some() {
            tracing::debug!("Replaced rating parser for <{}>", tag);
        }
        self
    }

    pub fn parser(&self, tag: &str) -> Option<RatingParser> {
        self.parsers.get(tag).copied()
    }

    pub fn handles(&self, tag: &str) -> bool {
        self.parsers.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Parse a rating element with the parser registered for its tag
    pub fn parse(
        &self,
        elem: &XmlElement,
        specification: Arc<RatingSpecification>,
    ) -> Result<TableRating> {
        let parser = self.parser(&elem.name).ok_or_else(|| {
            Error::InvalidXml(format!(
                "No rating parser registered for <{}> (known: {})",
                elem.name,
                self.tags().join(", ")
            ))
        })?;
        parser(elem, specification)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SIMPLE_RATING_TAG, parse_simple_rating);
        registry
    }
}

/// `<simple-rating>` holding a table; expression ratings are not supported
fn parse_simple_rating(
    elem: &XmlElement,
    specification: Arc<RatingSpecification>,
) -> Result<TableRating> {
    if elem.child("formula").is_some() {
        return Err(Error::InvalidXml(format!(
            "<{}> for '{}' has a <formula>; expression ratings are not supported",
            elem.name,
            specification.id()
        )));
    }
    TableRating::from_element(elem, specification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn spec() -> Arc<RatingSpecification> {
        Arc::new(RatingSpecification::parse("KEYS.Elev;Stor.Linear.Production").unwrap())
    }

    #[test]
    fn test_default_registers_simple_rating() {
        let registry = ParserRegistry::default();
        assert!(registry.handles("simple-rating"));
        assert_eq!(registry.tags(), vec!["simple-rating"]);
        assert!(ParserRegistry::empty().tags().is_empty());
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let elem = parse_document("<virtual-rating/>").unwrap();
        let result = ParserRegistry::default().parse(&elem, spec());
        assert!(matches!(result, Err(Error::InvalidXml(_))));
    }

    #[test]
    fn test_formula_is_rejected() {
        let xml = r#"<simple-rating>
  <rating-spec-id>KEYS.Elev;Stor.Linear.Production</rating-spec-id>
  <units-id>ft;ac-ft</units-id>
  <effective-date>2009-01-14T06:00:00Z</effective-date>
  <formula>i1 * 2</formula>
</simple-rating>"#;
        let result = ParserRegistry::default().parse(&parse_document(xml).unwrap(), spec());
        assert!(matches!(result, Err(Error::InvalidXml(_))));
    }

    #[test]
    fn test_custom_parser() {
        fn lazy_only(elem: &XmlElement, spec: Arc<RatingSpecification>) -> Result<TableRating> {
            let time = crate::table_rating::parse_time(elem.require_text("effective-date")?)?;
            TableRating::new(spec, time, "ft;ac-ft", None)
        }
        let mut registry = ParserRegistry::empty();
        registry.register("lazy-rating", lazy_only);
        let elem = parse_document("<lazy-rating><effective-date>2020-01-01</effective-date></lazy-rating>")
            .unwrap();
        let rating = registry.parse(&elem, spec()).unwrap();
        assert!(!rating.has_rating_points());
    }
}
