//! A single calibrated rating: a lookup table effective from one time.

use crate::datum::VerticalDatumInfo;
use crate::lookup::LookupPolicy;
use crate::points::PointSource;
use crate::specification::RatingSpecification;
use crate::table::RatingTable;
use crate::units::split_units;
use crate::xml::{parse_f64, XmlElement};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Parse a timestamp from rating XML or the command line
///
/// Accepts RFC 3339, a date-time without offset (read as UTC), or a bare date.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::InvalidXml(format!("Invalid date/time '{}'", text)))
}

/// A table rating for one specification and effective time
pub struct TableRating {
    specification: Arc<RatingSpecification>,
    effective_time: DateTime<Utc>,
    pub create_time: Option<DateTime<Utc>>,
    pub transition_start_time: Option<DateTime<Utc>>,
    pub active: bool,
    pub description: Option<String>,
    units: Vec<String>,
    vertical_datum_info: Option<VerticalDatumInfo>,
    table: OnceCell<RatingTable>,
    source: Option<Arc<dyn PointSource>>,
}

impl TableRating {
    /// Create a rating in the given native units (`ind_1,...;dep`)
    ///
    /// Without a table the rating is a lazy placeholder that loads its
    /// points from a [`PointSource`] on first use.
    pub fn new(
        specification: Arc<RatingSpecification>,
        effective_time: DateTime<Utc>,
        units: &str,
        table: Option<RatingTable>,
    ) -> Result<Self> {
        let units = split_units(units);
        let axis_count = specification.axis_count();
        if units.len() != axis_count + 1 || units.iter().any(String::is_empty) {
            return Err(Error::Rating(format!(
                "Expected {} units for '{}', got {:?}",
                axis_count + 1,
                specification.id(),
                units
            )));
        }
        let table = match table {
            Some(table) => {
                check_axis_count(&table, &specification)?;
                OnceCell::with_value(table)
            }
            None => OnceCell::new(),
        };
        Ok(Self {
            specification,
            effective_time,
            create_time: None,
            transition_start_time: None,
            active: true,
            description: None,
            units,
            vertical_datum_info: None,
            table,
            source: None,
        })
    }

    /// Parse a `<simple-rating>` element whose rating points form a table
    pub fn from_element(
        elem: &XmlElement,
        specification: Arc<RatingSpecification>,
    ) -> Result<Self> {
        let spec_id = elem.require_text("rating-spec-id")?;
        if spec_id != specification.id() {
            return Err(Error::Specification(format!(
                "Rating is for '{}', not '{}'",
                spec_id,
                specification.id()
            )));
        }
        if let (Some(office), Some(spec_office)) = (
            elem.attr("office-id").filter(|o| !o.is_empty()),
            specification.office(),
        ) {
            if office != spec_office {
                return Err(Error::Specification(format!(
                    "Rating office {} doesn't match specification office {}",
                    office, spec_office
                )));
            }
        }

        let axis_count = specification.axis_count();
        let effective_time = parse_time(elem.require_text("effective-date")?)?;
        let units = elem.require_text("units-id")?;
        let table = parse_rating_points(elem, axis_count)?;

        let mut rating = Self::new(specification, effective_time, units, table)?;
        rating.create_time = elem.child_text("create-date").map(parse_time).transpose()?;
        rating.transition_start_time = elem
            .child_text("transition-start-date")
            .map(parse_time)
            .transpose()?;
        rating.active = elem.child_bool("active")?.unwrap_or(true);
        rating.description = elem.child_text("description").map(str::to_string);
        rating.vertical_datum_info = elem
            .child("vertical-datum-info")
            .map(VerticalDatumInfo::from_element)
            .transpose()?;
        Ok(rating)
    }

    /// Build the `<simple-rating>` element read by [`Self::from_element`]
    ///
    /// A lazy rating with a point source is loaded first so its points are
    /// written; one without a source is written without points.
    pub fn to_element(&self) -> Result<XmlElement> {
        let mut elem = XmlElement::new("simple-rating");
        if let Some(office) = self.specification.office() {
            elem = elem.with_attr("office-id", office);
        }
        elem.push_text_child("rating-spec-id", self.specification.id());
        if let Some(info) = &self.vertical_datum_info {
            elem.push_child(info.to_element());
        }
        let (dep_unit, ind_units) = self.units.split_last().ok_or_else(|| {
            Error::Rating(format!("Rating for '{}' has no units", self.specification.id()))
        })?;
        elem.push_text_child("units-id", format!("{};{}", ind_units.join(","), dep_unit))
            .push_text_child("effective-date", format_time(self.effective_time));
        if let Some(time) = self.create_time {
            elem.push_text_child("create-date", format_time(time));
        }
        if let Some(time) = self.transition_start_time {
            elem.push_text_child("transition-start-date", format_time(time));
        }
        elem.push_text_child("active", self.active);
        if let Some(description) = &self.description {
            elem.push_text_child("description", description);
        }

        let table = match (self.table.get(), &self.source) {
            (Some(table), _) => Some(table),
            (None, Some(_)) => Some(self.table()?),
            (None, None) => None,
        };
        if let Some(table) = table {
            for block in rating_points_elements(table) {
                elem.push_child(block);
            }
        }
        Ok(elem)
    }

    pub fn specification(&self) -> &Arc<RatingSpecification> {
        &self.specification
    }

    pub fn specification_id(&self) -> String {
        self.specification.id()
    }

    pub fn effective_time(&self) -> DateTime<Utc> {
        self.effective_time
    }

    /// Native units of each axis followed by the dependent parameter
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Vertical datum info carried by the rating element itself
    pub fn vertical_datum_info(&self) -> Option<&VerticalDatumInfo> {
        self.vertical_datum_info.as_ref()
    }

    pub fn set_vertical_datum_info(&mut self, info: Option<VerticalDatumInfo>) {
        self.vertical_datum_info = info;
    }

    pub fn lookup(&self) -> &[LookupPolicy] {
        self.specification.lookup()
    }

    /// Whether the points are present (given up front or already loaded)
    pub fn has_rating_points(&self) -> bool {
        self.table.get().is_some()
    }

    /// Where to load points from when the rating has none
    pub fn set_point_source(&mut self, source: Arc<dyn PointSource>) {
        self.source = Some(source);
    }

    /// The lookup table, loading it from the point source on first use
    pub fn table(&self) -> Result<&RatingTable> {
        self.table.get_or_try_init(|| {
            let source = self.source.as_ref().ok_or_else(|| {
                Error::Rating(format!(
                    "Rating {} effective {} has no points and no point source",
                    self.specification.id(),
                    self.effective_time.to_rfc3339()
                ))
            })?;
            tracing::debug!(
                "Loading points for {} effective {}",
                self.specification.id(),
                self.effective_time.to_rfc3339()
            );
            let table = source.fetch_points(&self.specification.id(), self.effective_time)?;
            check_axis_count(&table, &self.specification)?;
            Ok(table)
        })
    }

    /// Rate one value-set in native units
    pub fn rate_value(&self, values: &[f64]) -> Result<f64> {
        self.table()?.rate(values, self.lookup())
    }

    /// Rate value-sets in native units
    pub fn rate_values(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let table = self.table()?;
        rows.iter()
            .map(|row| table.rate(row, self.lookup()))
            .collect()
    }

    /// Reverse rate one dependent value in native units (single axis only)
    pub fn reverse_rate_value(&self, dep: f64) -> Result<f64> {
        self.reverse_rate_values(&[dep]).map(|values| values[0])
    }

    /// Reverse rate dependent values in native units (single axis only)
    pub fn reverse_rate_values(&self, deps: &[f64]) -> Result<Vec<f64>> {
        if self.specification.axis_count() != 1 {
            return Err(Error::Rating(format!(
                "Cannot reverse rate '{}' with {} independent parameters",
                self.specification.id(),
                self.specification.axis_count()
            )));
        }
        let table = self.table()?;
        let lookup = &self.lookup()[0];
        deps.iter()
            .map(|dep| table.reverse_rate(*dep, lookup))
            .collect()
    }
}

fn check_axis_count(table: &RatingTable, specification: &RatingSpecification) -> Result<()> {
    if table.axis_count() != specification.axis_count() {
        return Err(Error::Table(format!(
            "Table has {} axes but '{}' has {} independent parameters",
            table.axis_count(),
            specification.id(),
            specification.axis_count()
        )));
    }
    Ok(())
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// One `<rating-points>` block per combination of outer-axis values
fn rating_points_elements(table: &RatingTable) -> Vec<XmlElement> {
    let outer = table.axis_count() - 1;
    let mut blocks: Vec<(Vec<f64>, XmlElement)> = Vec::new();
    for row in table.points() {
        let (prefix, point) = row.split_at(outer);
        let starts_block = blocks.last().map_or(true, |(last, _)| last.as_slice() != prefix);
        if starts_block {
            let mut block = XmlElement::new("rating-points");
            for (j, value) in prefix.iter().enumerate() {
                block.push_child(
                    XmlElement::new("other-ind")
                        .with_attr("position", (j + 1).to_string())
                        .with_attr("value", value.to_string()),
                );
            }
            blocks.push((prefix.to_vec(), block));
        }
        if let Some((_, block)) = blocks.last_mut() {
            let mut point_elem = XmlElement::new("point");
            point_elem
                .push_text_child("ind", point[0])
                .push_text_child("dep", point[1]);
            block.push_child(point_elem);
        }
    }
    blocks.into_iter().map(|(_, block)| block).collect()
}

/// Read `<rating-points>` blocks into a table; `None` when there are none
fn parse_rating_points(elem: &XmlElement, axis_count: usize) -> Result<Option<RatingTable>> {
    let blocks: Vec<_> = elem.children_named("rating-points").collect();
    if blocks.is_empty() {
        return Ok(None);
    }
    let mut rows = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        let others: Vec<_> = block.children_named("other-ind").collect();
        if others.len() != axis_count - 1 {
            return Err(Error::InvalidXml(format!(
                "Expected {} <other-ind> elements on <rating-points> element {}, got {}",
                axis_count - 1,
                i + 1,
                others.len()
            )));
        }
        let mut prefix = Vec::with_capacity(axis_count - 1);
        for (j, other) in others.iter().enumerate() {
            let position = other.attr("position").and_then(|p| p.parse::<usize>().ok());
            if position != Some(j + 1) {
                return Err(Error::InvalidXml(format!(
                    "<other-ind> {} on <rating-points> element {} is out of order (position {:?})",
                    j + 1,
                    i + 1,
                    other.attr("position")
                )));
            }
            let value = other
                .attr("value")
                .ok_or_else(|| Error::missing("value attribute", "<other-ind>"))?;
            prefix.push(parse_f64(value, "<other-ind> value")?);
        }
        for point in block.children_named("point") {
            let mut row = prefix.clone();
            row.push(parse_f64(point.require_text("ind")?, "<point>/<ind>")?);
            row.push(parse_f64(point.require_text("dep")?, "<point>/<dep>")?);
            rows.push(row);
        }
    }
    RatingTable::from_points(axis_count, &rows).map(Some)
}

impl fmt::Debug for TableRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRating")
            .field("specification", &self.specification.id())
            .field("effective_time", &self.effective_time)
            .field("create_time", &self.create_time)
            .field("active", &self.active)
            .field("units", &self.units)
            .field("has_rating_points", &self.has_rating_points())
            .field("has_point_source", &self.source.is_some())
            .finish()
    }
}
