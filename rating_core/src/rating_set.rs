//! Time-versioned collections of ratings sharing one specification.
//!
//! A [`RatingSet`] picks the rating(s) in effect at each value's time,
//! converts caller units and vertical datum into each rating's native ones,
//! rates, and converts the result back.

use crate::datum::{normalize_datum, VerticalDatumInfo};
use crate::lookup::{LookupMethod, LookupPolicy};
use crate::points::PointSource;
use crate::registry::ParserRegistry;
use crate::specification::RatingSpecification;
use crate::table::{bracket, interpolate_or_select, selects_lower, Bracket, Domain};
use crate::table_rating::TableRating;
use crate::template::{is_elevation, RatingTemplate};
use crate::units::{split_units, UnitCatalog, UnitConverter};
use crate::xml::{parse_document, write_document, XmlElement};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Policy for choosing among effective times: the latest rating not after the
/// value time, the first rating before it, the last rating after it
pub fn default_time_lookup() -> LookupPolicy {
    LookupPolicy::new(
        LookupMethod::Previous,
        LookupMethod::Next,
        LookupMethod::Previous,
    )
}

/// Shapes of values accepted by [`RatingSet::rate`] and [`RatingSet::reverse_rate`]
#[derive(Clone, Debug, PartialEq)]
pub enum RateInput {
    /// One value for a single-axis rating
    Scalar(f64),
    /// One value-set with a value per axis; for reverse rating, a list of
    /// dependent values
    Values(Vec<f64>),
    /// Many value-sets
    Batch(Vec<Vec<f64>>),
    /// Many value-sets, each with its own time
    Series {
        times: Vec<DateTime<Utc>>,
        rows: Vec<Vec<f64>>,
    },
}

/// Rated values, shaped after the input
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RateOutput {
    Scalar(f64),
    Values(Vec<f64>),
    Series {
        times: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    },
}

/// Per-call rating options; unset fields fall back to the set's defaults
#[derive(Clone, Debug, Default)]
pub struct RateOptions {
    /// Units of the input and output values, e.g. `ft;ac-ft`
    pub units: Option<String>,
    pub vertical_datum: Option<String>,
    /// Evaluation time for inputs without times
    pub time: Option<DateTime<Utc>>,
    /// Ignore ratings effective or created after this time
    pub rating_time: Option<DateTime<Utc>>,
    pub round: bool,
}

impl RateOptions {
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn with_vertical_datum(mut self, datum: &str) -> Self {
        self.vertical_datum = Some(datum.to_string());
        self
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn as_of(mut self, rating_time: DateTime<Utc>) -> Self {
        self.rating_time = Some(rating_time);
        self
    }

    pub fn rounded(mut self, round: bool) -> Self {
        self.round = round;
        self
    }
}

/// Caller-to-native conversion of one parameter for one rating
#[derive(Debug)]
struct Conversion {
    caller_unit: String,
    native_unit: String,
    /// Added after unit conversion to move from the caller's datum to the native one
    shift: f64,
}

impl Conversion {
    fn to_native(&self, converter: &dyn UnitConverter, value: f64) -> Result<f64> {
        Ok(converter.convert(value, &self.caller_unit, &self.native_unit)? + self.shift)
    }

    fn from_native(&self, converter: &dyn UnitConverter, value: f64) -> Result<f64> {
        converter.convert(value - self.shift, &self.native_unit, &self.caller_unit)
    }
}

/// Ratings applicable to one call and how to convert values for each
struct Prepared<'a> {
    ratings: Vec<&'a TableRating>,
    effective_times: Vec<f64>,
    conversions: Vec<Vec<Conversion>>,
}

/// Ratings for one specification, ordered by effective time
pub struct RatingSet {
    specification: Arc<RatingSpecification>,
    ratings: BTreeMap<DateTime<Utc>, TableRating>,
    vertical_datum_info: Option<VerticalDatumInfo>,
    default_data_time: Option<DateTime<Utc>>,
    default_data_units: Option<String>,
    default_vertical_datum: Option<String>,
    time_lookup: LookupPolicy,
    converter: Arc<dyn UnitConverter>,
}

impl RatingSet {
    pub fn new(specification: Arc<RatingSpecification>) -> Self {
        Self {
            vertical_datum_info: specification.location().vertical_datum_info.clone(),
            specification,
            ratings: BTreeMap::new(),
            default_data_time: None,
            default_data_units: None,
            default_vertical_datum: None,
            time_lookup: default_time_lookup(),
            converter: Arc::new(UnitCatalog),
        }
    }

    /// Build a set from ratings of one specification
    pub fn from_ratings(
        specification: Arc<RatingSpecification>,
        ratings: impl IntoIterator<Item = TableRating>,
    ) -> Result<Self> {
        let mut set = Self::new(specification);
        for rating in ratings {
            set.add_rating(rating)?;
        }
        set.adopt_rating_datum_info();
        Ok(set)
    }

    /// Load the first specification's ratings from a `<ratings>` document
    ///
    /// Templates and specifications may appear anywhere in the document.
    /// Ratings of other specifications are skipped.
    pub fn from_xml(xml: &str, registry: &ParserRegistry) -> Result<Self> {
        let root = parse_document(xml)?;
        if root.name != "ratings" {
            return Err(Error::InvalidXml(format!(
                "Expected root of <ratings>, got <{}>",
                root.name
            )));
        }

        let mut templates: HashMap<String, RatingTemplate> = HashMap::new();
        for elem in root.children_named("rating-template") {
            let template = RatingTemplate::from_element(elem)?;
            templates.insert(template.id(), template);
        }
        let mut specifications: HashMap<String, Arc<RatingSpecification>> = HashMap::new();
        for elem in root.children_named("rating-spec") {
            let template_id = RatingSpecification::parse(elem.require_text("rating-spec-id")?)?
                .template()
                .id();
            let specification =
                RatingSpecification::from_element(elem, templates.get(&template_id))?;
            specifications.insert(specification.id(), Arc::new(specification));
        }

        let mut set: Option<RatingSet> = None;
        let mut skipped = 0;
        for elem in root
            .children
            .iter()
            .filter(|c| c.name != "rating-template" && c.name != "rating-spec")
        {
            let spec_id = elem.require_text("rating-spec-id")?;
            if let Some(set) = &set {
                if set.specification.id() != spec_id {
                    warn!(
                        "Skipping <{}> for {} in rating set for {}",
                        elem.name,
                        spec_id,
                        set.specification.id()
                    );
                    skipped += 1;
                    continue;
                }
            }
            let specification = match specifications.get(spec_id) {
                Some(specification) => Arc::clone(specification),
                None => {
                    let specification = Arc::new(RatingSpecification::parse(spec_id)?);
                    specifications.insert(spec_id.to_string(), Arc::clone(&specification));
                    specification
                }
            };
            let rating = registry.parse(elem, Arc::clone(&specification))?;
            set.get_or_insert_with(|| RatingSet::new(specification))
                .add_rating(rating)?;
        }

        let mut set =
            set.ok_or_else(|| Error::InvalidXml("No ratings in <ratings> document".into()))?;
        set.adopt_rating_datum_info();
        info!(
            "Loaded rating set {} with {} ratings ({} active, {} skipped)",
            set.specification.id(),
            set.len(),
            set.active_ratings().count(),
            skipped
        );
        Ok(set)
    }

    /// Write the set as a `<ratings>` document readable by [`Self::from_xml`]
    ///
    /// The template is included when it has an office. Lazy ratings with a
    /// point source are loaded so their points are written.
    pub fn to_xml(&self) -> Result<String> {
        let mut root = XmlElement::new("ratings");
        if self.template().office.is_some() {
            root.push_child(self.template().to_element()?);
        }
        root.push_child(self.specification.to_element()?);
        for rating in self.ratings.values() {
            root.push_child(rating.to_element()?);
        }
        debug!(
            "Writing rating set {} with {} ratings",
            self.specification.id(),
            self.len()
        );
        write_document(&root)
    }

    /// Take vertical datum info from the ratings when the location has none
    fn adopt_rating_datum_info(&mut self) {
        if self.vertical_datum_info.is_some() {
            return;
        }
        let from_active = self
            .active_ratings()
            .find_map(TableRating::vertical_datum_info);
        let from_any = || self.ratings.values().find_map(TableRating::vertical_datum_info);
        self.vertical_datum_info = from_active.or_else(from_any).cloned();
    }

    /// Add a rating; its specification must match and its effective time be new
    pub fn add_rating(&mut self, rating: TableRating) -> Result<()> {
        if rating.specification_id() != self.specification.id() {
            return Err(Error::Rating(format!(
                "Cannot add a {} rating to the rating set for {}",
                rating.specification_id(),
                self.specification.id()
            )));
        }
        let effective_time = rating.effective_time();
        if self.ratings.contains_key(&effective_time) {
            return Err(Error::Rating(format!(
                "Cannot have more than one {} rating with effective date {}",
                self.specification.id(),
                effective_time.to_rfc3339()
            )));
        }
        self.ratings.insert(effective_time, rating);
        Ok(())
    }

    pub fn specification(&self) -> &RatingSpecification {
        &self.specification
    }

    pub fn template(&self) -> &RatingTemplate {
        self.specification.template()
    }

    pub fn axis_count(&self) -> usize {
        self.specification.axis_count()
    }

    /// All ratings, ordered by effective time
    pub fn ratings(&self) -> impl Iterator<Item = &TableRating> {
        self.ratings.values()
    }

    /// Active ratings, ordered by effective time
    pub fn active_ratings(&self) -> impl DoubleEndedIterator<Item = &TableRating> {
        self.ratings.values().filter(|r| r.active)
    }

    pub fn rating(&self, effective_time: DateTime<Utc>) -> Option<&TableRating> {
        self.ratings.get(&effective_time)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Native units of the latest active rating
    pub fn rating_units(&self) -> Option<&[String]> {
        self.active_ratings().next_back().map(TableRating::units)
    }

    pub fn vertical_datum_info(&self) -> Option<&VerticalDatumInfo> {
        self.vertical_datum_info.as_ref()
    }

    pub fn set_vertical_datum_info(&mut self, info: Option<VerticalDatumInfo>) {
        self.vertical_datum_info = info;
    }

    pub fn default_data_time(&self) -> Option<DateTime<Utc>> {
        self.default_data_time
    }

    pub fn set_default_data_time(&mut self, time: Option<DateTime<Utc>>) {
        self.default_data_time = time;
    }

    pub fn default_data_units(&self) -> Option<&str> {
        self.default_data_units.as_deref()
    }

    pub fn set_default_data_units(&mut self, units: Option<&str>) -> Result<()> {
        if let Some(units) = units {
            self.split_caller_units(units)?;
        }
        self.default_data_units = units.map(str::to_string);
        Ok(())
    }

    pub fn default_vertical_datum(&self) -> Option<&str> {
        self.default_vertical_datum.as_deref()
    }

    /// Datum assumed for elevation values when a call names none
    pub fn set_default_vertical_datum(&mut self, datum: Option<&str>) -> Result<()> {
        self.default_vertical_datum = match datum {
            None => None,
            Some(datum) => {
                if self.vertical_datum_info.is_none() {
                    return Err(Error::VerticalDatum(format!(
                        "Location {} doesn't have vertical datum info",
                        self.specification.location().name
                    )));
                }
                Some(normalize_datum(datum)?)
            }
        };
        Ok(())
    }

    pub fn time_lookup(&self) -> LookupPolicy {
        self.time_lookup
    }

    /// Policy for choosing among effective times
    pub fn set_time_lookup(&mut self, policy: LookupPolicy) {
        self.time_lookup = policy;
    }

    pub fn set_unit_converter(&mut self, converter: Arc<dyn UnitConverter>) {
        self.converter = converter;
    }

    pub fn with_unit_converter(mut self, converter: Arc<dyn UnitConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Attach a point source to every rating that has no points
    pub fn set_point_source(&mut self, source: Arc<dyn PointSource>) {
        for rating in self.ratings.values_mut() {
            if !rating.has_rating_points() {
                rating.set_point_source(Arc::clone(&source));
            }
        }
    }

    /// Rate values of any accepted shape
    pub fn rate(&self, input: RateInput, options: &RateOptions) -> Result<RateOutput> {
        Ok(match input {
            RateInput::Scalar(value) => {
                RateOutput::Scalar(self.rate_values(&[vec![value]], None, options)?[0])
            }
            RateInput::Values(values) => {
                RateOutput::Scalar(self.rate_values(&[values], None, options)?[0])
            }
            RateInput::Batch(rows) => RateOutput::Values(self.rate_values(&rows, None, options)?),
            RateInput::Series { times, rows } => {
                let values = self.rate_series(&times, &rows, options)?;
                RateOutput::Series { times, values }
            }
        })
    }

    /// Rate value-sets, each holding one value per axis
    ///
    /// Without `times` every value-set is rated at the options' time, the
    /// default data time, or now.
    pub fn rate_values(
        &self,
        rows: &[Vec<f64>],
        times: Option<&[DateTime<Utc>]>,
        options: &RateOptions,
    ) -> Result<Vec<f64>> {
        let axis_count = self.axis_count();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != axis_count) {
            return Err(Error::Rating(format!(
                "Expected {} values in value-set {}, got {}",
                axis_count,
                i + 1,
                row.len()
            )));
        }
        let times = self.value_times(rows.len(), times, options)?;
        let prepared = self.prepare(options)?;
        let converter = self.converter.as_ref();

        let mut rated: Vec<f64> = Vec::with_capacity(rows.len());
        for (i, (row, time)) in rows.iter().zip(&times).enumerate() {
            if i > 0 && *time == times[i - 1] && *row == rows[i - 1] {
                rated.push(rated[i - 1]);
                continue;
            }
            let value = self.evaluate(&prepared, *time, |index| {
                let conversions = &prepared.conversions[index];
                let native = row
                    .iter()
                    .zip(conversions)
                    .map(|(value, conversion)| conversion.to_native(converter, *value))
                    .collect::<Result<Vec<f64>>>()?;
                let dep = prepared.ratings[index].rate_value(&native)?;
                conversions[axis_count].from_native(converter, dep)
            })?;
            rated.push(value);
        }

        if options.round {
            rated = self.specification.dep_rounding().round_f(&rated);
        }
        Ok(rated)
    }

    /// Rate value-sets that each carry their own time
    pub fn rate_series(
        &self,
        times: &[DateTime<Utc>],
        rows: &[Vec<f64>],
        options: &RateOptions,
    ) -> Result<Vec<f64>> {
        self.rate_values(rows, Some(times), options)
    }

    /// Reverse rate values of any accepted shape (single-axis sets only)
    ///
    /// `Values` is a list of dependent values rated one by one. Each value-set
    /// of a `Batch` or `Series` holds the one dependent value to reverse rate.
    pub fn reverse_rate(&self, input: RateInput, options: &RateOptions) -> Result<RateOutput> {
        Ok(match input {
            RateInput::Scalar(value) => {
                RateOutput::Scalar(self.reverse_rate_values(&[value], None, options)?[0])
            }
            RateInput::Values(values) => {
                RateOutput::Values(self.reverse_rate_values(&values, None, options)?)
            }
            RateInput::Batch(rows) => {
                RateOutput::Values(self.reverse_rate_values(&single_column(&rows)?, None, options)?)
            }
            RateInput::Series { times, rows } => {
                let deps = single_column(&rows)?;
                let values = self.reverse_rate_values(&deps, Some(&times), options)?;
                RateOutput::Series { times, values }
            }
        })
    }

    /// Find the independent values that rate to `deps`
    pub fn reverse_rate_values(
        &self,
        deps: &[f64],
        times: Option<&[DateTime<Utc>]>,
        options: &RateOptions,
    ) -> Result<Vec<f64>> {
        if self.axis_count() != 1 {
            return Err(Error::Rating(format!(
                "Cannot reverse rate {} with {} independent parameters",
                self.specification.id(),
                self.axis_count()
            )));
        }
        let times = self.value_times(deps.len(), times, options)?;
        let prepared = self.prepare(options)?;
        let converter = self.converter.as_ref();

        let mut rated: Vec<f64> = Vec::with_capacity(deps.len());
        for (i, (dep, time)) in deps.iter().zip(&times).enumerate() {
            if i > 0 && *time == times[i - 1] && *dep == deps[i - 1] {
                rated.push(rated[i - 1]);
                continue;
            }
            let value = self.evaluate(&prepared, *time, |index| {
                let conversions = &prepared.conversions[index];
                let native = conversions[1].to_native(converter, *dep)?;
                let ind = prepared.ratings[index].reverse_rate_value(native)?;
                conversions[0].from_native(converter, ind)
            })?;
            rated.push(value);
        }

        if options.round {
            rated = self.specification.ind_rounding()[0].round_f(&rated);
        }
        Ok(rated)
    }

    fn value_times(
        &self,
        count: usize,
        times: Option<&[DateTime<Utc>]>,
        options: &RateOptions,
    ) -> Result<Vec<DateTime<Utc>>> {
        match times {
            Some(times) if times.len() != count => Err(Error::Rating(format!(
                "Expected {} value times, got {}",
                count,
                times.len()
            ))),
            Some(times) => Ok(times.to_vec()),
            None => {
                let time = options
                    .time
                    .or(self.default_data_time)
                    .unwrap_or_else(Utc::now);
                Ok(vec![time; count])
            }
        }
    }

    fn split_caller_units(&self, units: &str) -> Result<Vec<String>> {
        let units = split_units(units);
        if units.len() != self.axis_count() + 1 {
            return Err(Error::Rating(format!(
                "Expected {} units for {}, got {}",
                self.axis_count() + 1,
                self.specification.id(),
                units.len()
            )));
        }
        Ok(units)
    }

    /// Resolve units, datum, and applicable ratings before any lookup
    fn prepare(&self, options: &RateOptions) -> Result<Prepared<'_>> {
        let units = options
            .units
            .as_deref()
            .or(self.default_data_units.as_deref())
            .ok_or_else(|| {
                Error::Rating(format!(
                    "No data units specified for {} and the rating set has no defaults",
                    self.specification.id()
                ))
            })?;
        let units = self.split_caller_units(units)?;
        let datum = options
            .vertical_datum
            .as_deref()
            .map(normalize_datum)
            .transpose()?
            .or_else(|| self.default_vertical_datum.clone());

        let ratings: Vec<&TableRating> = self
            .active_ratings()
            .filter(|rating| match options.rating_time {
                None => true,
                Some(cutoff) => {
                    rating.effective_time() <= cutoff
                        && rating.create_time.map_or(true, |created| created <= cutoff)
                }
            })
            .collect();
        if ratings.is_empty() {
            return Err(Error::Rating(match options.rating_time {
                Some(cutoff) => format!(
                    "Rating time {} excludes all active ratings of {}",
                    cutoff.to_rfc3339(),
                    self.specification.id()
                ),
                None => format!("Rating set {} has no active ratings", self.specification.id()),
            }));
        }

        let mut parameters = self.template().ind_params();
        parameters.push(self.template().dep_param());
        let mut conversions = Vec::with_capacity(ratings.len());
        for rating in &ratings {
            let mut per_parameter = Vec::with_capacity(parameters.len());
            for ((param, caller_unit), native_unit) in
                parameters.iter().zip(&units).zip(rating.units())
            {
                // fails fast on incompatible units
                self.converter.convert(0.0, caller_unit, native_unit)?;
                let shift = match datum.as_deref() {
                    Some(datum) if is_elevation(param) => self.datum_shift(datum, native_unit)?,
                    _ => 0.0,
                };
                per_parameter.push(Conversion {
                    caller_unit: caller_unit.clone(),
                    native_unit: native_unit.clone(),
                    shift,
                });
            }
            conversions.push(per_parameter);
        }

        Ok(Prepared {
            effective_times: ratings.iter().map(|r| timestamp(r.effective_time())).collect(),
            ratings,
            conversions,
        })
    }

    /// Offset from `datum` to the native datum, in `native_unit`
    fn datum_shift(&self, datum: &str, native_unit: &str) -> Result<f64> {
        let info = self.vertical_datum_info.as_ref().ok_or_else(|| {
            Error::VerticalDatum(format!(
                "Cannot convert to {}: {} has no vertical datum info",
                datum,
                self.specification.location().name
            ))
        })?;
        let offset = info.offset(datum, &info.native_datum).ok_or_else(|| {
            Error::VerticalDatum(format!(
                "No offset from {} to native datum {} at {}",
                datum,
                info.native_datum,
                self.specification.location().name
            ))
        })?;
        if offset == 0.0 {
            return Ok(0.0);
        }
        debug!(datum, native = %info.native_datum, offset, "shifting elevations");
        self.converter.convert(offset, &info.unit, native_unit)
    }

    /// Select the rating(s) for `time` and combine their results
    fn evaluate<F>(&self, prepared: &Prepared<'_>, time: DateTime<Utc>, rate_with: F) -> Result<f64>
    where
        F: Fn(usize) -> Result<f64>,
    {
        let x = timestamp(time);
        let keys = &prepared.effective_times;
        let Some(Bracket { lo, hi, method }) =
            bracket(keys, x, &self.time_lookup, Domain::EffectiveTime)?
        else {
            return Ok(f64::NAN);
        };
        if lo == hi {
            return rate_with(lo);
        }
        if method.is_selection() {
            return rate_with(if selects_lower(x, keys[lo], keys[hi], method) {
                lo
            } else {
                hi
            });
        }
        let lo_value = rate_with(lo)?;
        let hi_value = rate_with(hi)?;
        interpolate_or_select(x, keys[lo], keys[hi], lo_value, hi_value, method)
    }
}

fn timestamp(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

fn single_column(rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::Rating(format!(
                "Expected 1 dependent value in value-set {}, got {}",
                i + 1,
                row.len()
            ))),
        })
        .collect()
}

impl fmt::Debug for RatingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatingSet")
            .field("specification", &self.specification.id())
            .field("ratings", &self.ratings.values().collect::<Vec<_>>())
            .field("vertical_datum_info", &self.vertical_datum_info)
            .field("default_data_time", &self.default_data_time)
            .field("default_data_units", &self.default_data_units)
            .field("default_vertical_datum", &self.default_vertical_datum)
            .field("time_lookup", &self.time_lookup)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RatingTable;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SPEC_ID: &str = "KEYS.Elev;Stor.Linear.Production";

    fn time(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn rating(spec: &Arc<RatingSpecification>, year: i32, scale: f64) -> TableRating {
        let table = RatingTable::from_points(
            1,
            &[vec![0.0, 0.0], vec![10.0, 10.0 * scale], vec![20.0, 30.0 * scale]],
        )
        .unwrap();
        TableRating::new(Arc::clone(spec), time(year), "ft;ac-ft", Some(table)).unwrap()
    }

    fn two_rating_set() -> RatingSet {
        let spec = Arc::new(RatingSpecification::parse(SPEC_ID).unwrap());
        let ratings = vec![rating(&spec, 2000, 1.0), rating(&spec, 2010, 2.0)];
        let mut set = RatingSet::from_ratings(spec, ratings).unwrap();
        set.set_default_data_units(Some("ft;ac-ft")).unwrap();
        set
    }

    #[test]
    fn test_time_selection_defaults() {
        let set = two_rating_set();
        let rate_at = |year| {
            set.rate_values(&[vec![5.0]], None, &RateOptions::default().at(time(year)))
                .unwrap()[0]
        };
        assert_eq!(rate_at(1990), 5.0);
        assert_eq!(rate_at(2000), 5.0);
        assert_eq!(rate_at(2005), 5.0);
        assert_eq!(rate_at(2010), 10.0);
        assert_eq!(rate_at(2020), 10.0);
    }

    #[test]
    fn test_time_interpolation() {
        crate::logging::init_test();
        let mut set = two_rating_set();
        set.set_time_lookup(LookupPolicy::new(
            LookupMethod::Linear,
            LookupMethod::Error,
            LookupMethod::Previous,
        ));
        let midpoint = time(2000) + (time(2010) - time(2000)) / 2;
        let rated = set
            .rate_values(&[vec![5.0]], Some(&[midpoint]), &RateOptions::default())
            .unwrap();
        assert!((rated[0] - 7.5).abs() < 1e-9);
        assert!(set
            .rate_values(&[vec![5.0]], Some(&[time(1990)]), &RateOptions::default())
            .is_err());
    }

    #[test]
    fn test_rating_time_cutoff() {
        let set = two_rating_set();
        let options = RateOptions::default().at(time(2020)).as_of(time(2005));
        assert_eq!(set.rate_values(&[vec![5.0]], None, &options).unwrap(), vec![5.0]);
        let too_early = RateOptions::default().as_of(time(1990));
        assert!(matches!(
            set.rate_values(&[vec![5.0]], None, &too_early),
            Err(Error::Rating(_))
        ));
    }

    #[test]
    fn test_rating_time_honors_create_time() {
        let spec = Arc::new(RatingSpecification::parse(SPEC_ID).unwrap());
        let mut late = rating(&spec, 2010, 2.0);
        late.create_time = Some(time(2015));
        let set = RatingSet::from_ratings(spec.clone(), vec![rating(&spec, 2000, 1.0), late]).unwrap();
        let options = RateOptions::default()
            .with_units("ft;ac-ft")
            .at(time(2012))
            .as_of(time(2012));
        assert_eq!(set.rate_values(&[vec![5.0]], None, &options).unwrap(), vec![5.0]);
    }

    #[test]
    fn test_inactive_ratings_are_ignored() {
        let spec = Arc::new(RatingSpecification::parse(SPEC_ID).unwrap());
        let mut inactive = rating(&spec, 2010, 2.0);
        inactive.active = false;
        let set = RatingSet::from_ratings(spec.clone(), vec![rating(&spec, 2000, 1.0), inactive]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.active_ratings().count(), 1);
        let options = RateOptions::default().with_units("ft;ac-ft").at(time(2020));
        assert_eq!(set.rate_values(&[vec![5.0]], None, &options).unwrap(), vec![5.0]);
    }

    #[test]
    fn test_fails_fast_on_bad_input() {
        let mut set = two_rating_set();
        let options = RateOptions::default();
        assert!(set.rate_values(&[vec![1.0, 2.0]], None, &options).is_err());
        assert!(set
            .rate_values(&[vec![1.0]], None, &RateOptions::default().with_units("ft"))
            .is_err());
        assert!(set
            .rate_values(&[vec![1.0]], None, &RateOptions::default().with_units("ft;cfs"))
            .is_err());
        assert!(set
            .rate_values(&[vec![1.0], vec![2.0]], Some(&[time(2000)]), &options)
            .is_err());
        set.set_default_data_units(None).unwrap();
        assert!(set.rate_values(&[vec![1.0]], None, &options).is_err());
    }

    #[test]
    fn test_duplicate_effective_times_are_rejected() {
        let spec = Arc::new(RatingSpecification::parse(SPEC_ID).unwrap());
        let result = RatingSet::from_ratings(
            spec.clone(),
            vec![rating(&spec, 2000, 1.0), rating(&spec, 2000, 2.0)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unit_conversion_round_trip() {
        let set = two_rating_set();
        let options = RateOptions::default().with_units("m;m3").at(time(2005));
        let rated = set.rate_values(&[vec![5.0 * 0.3048]], None, &options).unwrap();
        assert!((rated[0] - 5.0 * 1233.48183754752).abs() < 1e-6);
        let back = set.reverse_rate_values(&rated, None, &options).unwrap();
        assert!((back[0] - 5.0 * 0.3048).abs() < 1e-9);
    }

    #[test]
    fn test_input_shapes() {
        let set = two_rating_set();
        let options = RateOptions::default().at(time(2005));
        assert_eq!(set.rate(RateInput::Scalar(5.0), &options).unwrap(), RateOutput::Scalar(5.0));
        assert_eq!(
            set.rate(RateInput::Values(vec![5.0]), &options).unwrap(),
            RateOutput::Scalar(5.0)
        );
        assert_eq!(
            set.rate(RateInput::Batch(vec![vec![5.0], vec![15.0]]), &options).unwrap(),
            RateOutput::Values(vec![5.0, 20.0])
        );
        let times = vec![time(2005), time(2015)];
        assert_eq!(
            set.rate(
                RateInput::Series {
                    times: times.clone(),
                    rows: vec![vec![5.0], vec![5.0]],
                },
                &options
            )
            .unwrap(),
            RateOutput::Series {
                times,
                values: vec![5.0, 10.0]
            }
        );
        assert_eq!(
            set.reverse_rate(RateInput::Batch(vec![vec![5.0], vec![20.0]]), &options)
                .unwrap(),
            RateOutput::Values(vec![5.0, 15.0])
        );
        assert_eq!(
            set.reverse_rate(RateInput::Values(vec![5.0, 20.0]), &options)
                .unwrap(),
            RateOutput::Values(vec![5.0, 15.0])
        );
        assert!(set
            .reverse_rate(RateInput::Batch(vec![vec![5.0, 20.0]]), &options)
            .is_err());
    }

    #[test]
    fn test_rating_units_skip_inactive_ratings() {
        let spec = Arc::new(RatingSpecification::parse(SPEC_ID).unwrap());
        let table = RatingTable::from_points(1, &[vec![0.0, 0.0], vec![3.0, 12.0]]).unwrap();
        let mut metric = TableRating::new(Arc::clone(&spec), time(2010), "m;m3", Some(table)).unwrap();
        metric.active = false;
        let set = RatingSet::from_ratings(spec.clone(), vec![rating(&spec, 2000, 1.0), metric]).unwrap();
        assert_eq!(set.rating_units().unwrap(), ["ft", "ac-ft"]);
    }

    /// Knows only feet and yards, and counts its conversions
    struct YardConverter {
        calls: AtomicUsize,
    }

    impl UnitConverter for YardConverter {
        fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (from, to) {
                _ if from == to => Ok(value),
                ("yd", "ft") => Ok(value * 3.0),
                ("ft", "yd") => Ok(value / 3.0),
                _ => Err(Error::Unit(format!("Cannot convert {} to {}", from, to))),
            }
        }

        fn compatible_units(&self, unit: &str) -> Result<BTreeSet<String>> {
            Ok(["ft", "yd"]
                .iter()
                .filter(|_| unit == "ft" || unit == "yd")
                .map(|u| u.to_string())
                .collect())
        }
    }

    #[test]
    fn test_custom_unit_converter() {
        let mut set = two_rating_set();
        let converter = Arc::new(YardConverter {
            calls: AtomicUsize::new(0),
        });
        set.set_unit_converter(converter.clone());

        let options = RateOptions::default().with_units("yd;ac-ft").at(time(2005));
        assert_eq!(set.rate_values(&[vec![5.0]], None, &options).unwrap(), vec![20.0]);
        assert_eq!(set.reverse_rate_values(&[20.0], None, &options).unwrap(), vec![5.0]);
        assert!(converter.calls.load(Ordering::SeqCst) > 0);

        let metric = RateOptions::default().with_units("m;ac-ft").at(time(2005));
        assert!(matches!(
            set.rate_values(&[vec![5.0]], None, &metric),
            Err(Error::Unit(_))
        ));
    }

    #[test]
    fn test_to_xml_reads_back() {
        let spec = Arc::new({
            let mut spec = RatingSpecification::parse(SPEC_ID).unwrap();
            spec.set_office("SWT").unwrap();
            spec
        });
        let mut inactive = rating(&spec, 2010, 2.0);
        inactive.active = false;
        let set = RatingSet::from_ratings(spec.clone(), vec![rating(&spec, 2000, 1.0), inactive]).unwrap();

        let again = RatingSet::from_xml(&set.to_xml().unwrap(), &ParserRegistry::default()).unwrap();
        assert_eq!(again.specification(), set.specification());
        assert_eq!(again.len(), 2);
        assert_eq!(again.active_ratings().count(), 1);
        for (a, b) in again.ratings().zip(set.ratings()) {
            assert_eq!(a.effective_time(), b.effective_time());
            assert_eq!(a.table().unwrap(), b.table().unwrap());
        }
    }

    #[test]
    fn test_rounding_uses_specification() {
        let spec = Arc::new({
            let mut spec = RatingSpecification::parse(SPEC_ID).unwrap();
            spec.set_rounding(vec!["2222222222".parse().unwrap(), "2222222222".parse().unwrap()])
                .unwrap();
            spec
        });
        let set = RatingSet::from_ratings(spec.clone(), vec![rating(&spec, 2000, 1.0)]).unwrap();
        let options = RateOptions::default().with_units("ft;ac-ft").rounded(true);
        assert_eq!(set.rate_values(&[vec![12.34]], None, &options).unwrap(), vec![15.0]);
        assert_eq!(set.reverse_rate_values(&[14.68], None, &options).unwrap(), vec![12.0]);
    }

    #[test]
    fn test_datum_requires_info() {
        let mut set = two_rating_set();
        assert!(set.set_default_vertical_datum(Some("NAVD-88")).is_err());
        let options = RateOptions::default().with_vertical_datum("NAVD-88");
        assert!(matches!(
            set.rate_values(&[vec![5.0]], None, &options),
            Err(Error::VerticalDatum(_))
        ));
    }
}
