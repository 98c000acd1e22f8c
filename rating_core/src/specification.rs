//! Rating specifications: the time-invariant identity of a rating set.
//!
//! A specification identifier has the form
//! `<location>.<ind_1>,...,<ind_k>;<dep>.<template_version>.<spec_version>`.

use crate::datum::VerticalDatumInfo;
use crate::lookup::LookupPolicy;
use crate::rounding::UsgsRounder;
use crate::template::RatingTemplate;
use crate::xml::XmlElement;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location reference carried by a specification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub office: Option<String>,
    pub vertical_datum_info: Option<VerticalDatumInfo>,
}

impl Location {
    pub fn new(name: &str) -> Result<Self> {
        if name.trim().is_empty() || name.contains(['.', ';', ',']) {
            return Err(Error::Identifier(format!("Invalid location name '{}'", name)));
        }
        Ok(Self {
            name: name.to_string(),
            office: None,
            vertical_datum_info: None,
        })
    }
}

/// Lifecycle flags of a specification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationFlags {
    pub active: bool,
    pub auto_update: bool,
    pub auto_activate: bool,
    pub auto_migrate_extension: bool,
}

impl Default for SpecificationFlags {
    fn default() -> Self {
        Self {
            active: true,
            auto_update: false,
            auto_activate: false,
            auto_migrate_extension: false,
        }
    }
}

/// Binds a template to a location with lookup overrides and rounding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingSpecification {
    location: Location,
    template: RatingTemplate,
    version: String,
    lookup: Vec<LookupPolicy>,
    ind_rounding: Vec<UsgsRounder>,
    dep_rounding: UsgsRounder,
    pub flags: SpecificationFlags,
    pub source_agency: Option<String>,
    pub description: Option<String>,
}

impl RatingSpecification {
    /// Parse a specification identifier
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split('.').collect();
        if parts.len() != 4 {
            return Err(Error::Identifier(format!(
                "Specification must be of format \
                 <location>.<ind-params>;<dep-param>.<template-version>.<spec-version>, got '{}'",
                id
            )));
        }
        if parts[3].is_empty() {
            return Err(Error::Identifier(format!(
                "Specification '{}' has an empty version",
                id
            )));
        }
        let location = Location::new(parts[0])?;
        let template = RatingTemplate::parse(&format!("{}.{}", parts[1], parts[2]))?;
        Ok(Self::from_parts(location, template, parts[3]))
    }

    /// Build a specification from a location and template; per-axis policies
    /// start as the template's
    pub fn from_parts(location: Location, template: RatingTemplate, version: &str) -> Self {
        let axis_count = template.ind_param_count();
        Self {
            location,
            lookup: template.lookup(),
            template,
            version: version.to_string(),
            ind_rounding: vec![UsgsRounder::default(); axis_count],
            dep_rounding: UsgsRounder::default(),
            flags: SpecificationFlags::default(),
            source_agency: None,
            description: None,
        }
    }

    pub fn id(&self) -> String {
        format!("{}.{}.{}", self.location.name, self.template.id(), self.version)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn template(&self) -> &RatingTemplate {
        &self.template
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn axis_count(&self) -> usize {
        self.template.ind_param_count()
    }

    pub fn office(&self) -> Option<&str> {
        self.location
            .office
            .as_deref()
            .or(self.template.office.as_deref())
    }

    /// Set the office on both the location and the template
    pub fn set_office(&mut self, office: &str) -> Result<()> {
        for (what, existing) in [
            ("template", &self.template.office),
            ("location", &self.location.office),
        ] {
            if let Some(existing) = existing {
                if existing != office {
                    return Err(Error::Specification(format!(
                        "Rating specification for office {} cannot use {} for office {}",
                        office, what, existing
                    )));
                }
            }
        }
        self.template.office = Some(office.to_string());
        self.location.office = Some(office.to_string());
        Ok(())
    }

    /// Replace the location, keeping offices consistent
    pub fn set_location(&mut self, location: Location) -> Result<()> {
        if location.name != self.location.name {
            return Err(Error::Specification(format!(
                "Location '{}' doesn't match specification location '{}'",
                location.name, self.location.name
            )));
        }
        check_offices(location.office.as_deref(), self.template.office.as_deref())?;
        self.location = location;
        Ok(())
    }

    /// Replace the template; its identity must match, its policies are adopted
    pub fn set_template(&mut self, template: RatingTemplate) -> Result<()> {
        if template.id() != self.template.id() {
            return Err(Error::Specification(format!(
                "Template '{}' doesn't match specification template '{}'",
                template.id(),
                self.template.id()
            )));
        }
        check_offices(self.location.office.as_deref(), template.office.as_deref())?;
        self.lookup = template.lookup();
        self.template = template;
        Ok(())
    }

    pub fn set_vertical_datum_info(&mut self, info: Option<VerticalDatumInfo>) {
        self.location.vertical_datum_info = info;
    }

    /// Effective per-axis policies
    pub fn lookup(&self) -> &[LookupPolicy] {
        &self.lookup
    }

    pub fn set_lookup(&mut self, lookup: Vec<LookupPolicy>) -> Result<()> {
        if lookup.len() != self.axis_count() {
            return Err(Error::Specification(format!(
                "Expected {} lookup policies for '{}', got {}",
                self.axis_count(),
                self.id(),
                lookup.len()
            )));
        }
        self.lookup = lookup;
        Ok(())
    }

    pub fn set_uniform_lookup(&mut self, policy: LookupPolicy) {
        self.lookup = vec![policy; self.axis_count()];
    }

    pub fn ind_rounding(&self) -> &[UsgsRounder] {
        &self.ind_rounding
    }

    pub fn dep_rounding(&self) -> &UsgsRounder {
        &self.dep_rounding
    }

    /// Set rounding for each axis followed by the dependent parameter
    pub fn set_rounding(&mut self, mut rounding: Vec<UsgsRounder>) -> Result<()> {
        if rounding.len() != self.axis_count() + 1 {
            return Err(Error::Specification(format!(
                "Expected {} rounding specifications (one per axis plus dependent), got {}",
                self.axis_count() + 1,
                rounding.len()
            )));
        }
        self.dep_rounding = rounding.pop().unwrap_or_default();
        self.ind_rounding = rounding;
        Ok(())
    }

    /// Parse a `<rating-spec office-id="...">` element
    ///
    /// `template` is used in place of the identifier-derived template when it
    /// has the same identity (a `<rating-template>` from the same document).
    pub fn from_element(elem: &XmlElement, template: Option<&RatingTemplate>) -> Result<Self> {
        if elem.name != "rating-spec" {
            return Err(Error::InvalidXml(format!(
                "Expected <rating-spec>, got <{}>",
                elem.name
            )));
        }
        let id = elem.require_text("rating-spec-id")?;
        let mut spec = Self::parse(id)?;

        if let Some(template_id) = elem.child_text("template-id") {
            if template_id != spec.template.id() {
                return Err(Error::Specification(format!(
                    "<template-id> '{}' doesn't match <rating-spec-id> '{}'",
                    template_id, id
                )));
            }
        }
        if let Some(location_id) = elem.child_text("location-id") {
            if location_id != spec.location.name {
                return Err(Error::Specification(format!(
                    "<location-id> '{}' doesn't match <rating-spec-id> '{}'",
                    location_id, id
                )));
            }
        }
        if let Some(version) = elem.child_text("version") {
            if version != spec.version {
                return Err(Error::Specification(format!(
                    "<version> '{}' doesn't match <rating-spec-id> '{}'",
                    version, id
                )));
            }
        }
        if let Some(template) = template {
            spec.set_template(template.clone())?;
        }
        if let Some(office) = elem.attr("office-id").filter(|o| !o.is_empty()) {
            spec.set_office(office)?;
        }

        let methods = [
            elem.child_text("in-range-method"),
            elem.child_text("out-range-low-method"),
            elem.child_text("out-range-high-method"),
        ];
        match methods {
            [Some(a), Some(b), Some(c)] => {
                spec.set_uniform_lookup(LookupPolicy::parse(&[a, b, c])?)
            }
            [None, None, None] => {}
            _ => {
                return Err(Error::Specification(format!(
                    "<rating-spec> '{}' must give all three lookup methods or none",
                    id
                )))
            }
        }

        let defaults = SpecificationFlags::default();
        spec.flags = SpecificationFlags {
            active: elem.child_bool("active")?.unwrap_or(defaults.active),
            auto_update: elem.child_bool("auto-update")?.unwrap_or(defaults.auto_update),
            auto_activate: elem
                .child_bool("auto-activate")?
                .unwrap_or(defaults.auto_activate),
            auto_migrate_extension: elem
                .child_bool("auto-migrate-extension")?
                .unwrap_or(defaults.auto_migrate_extension),
        };

        if let Some(specs_elem) = elem.child("ind-rounding-specs") {
            let mut rounding = vec![UsgsRounder::default(); spec.axis_count()];
            for rounding_elem in specs_elem.children_named("ind-rounding-spec") {
                let position: usize = rounding_elem
                    .attr("position")
                    .and_then(|p| p.parse().ok())
                    .filter(|p| (1..=spec.axis_count()).contains(p))
                    .ok_or_else(|| {
                        Error::Specification(format!(
                            "<ind-rounding-spec> needs a position between 1 and {}",
                            spec.axis_count()
                        ))
                    })?;
                let text = rounding_elem
                    .text()
                    .ok_or_else(|| Error::missing("ind-rounding-spec", "<ind-rounding-specs>"))?;
                rounding[position - 1] = text.parse()?;
            }
            spec.ind_rounding = rounding;
        }
        if let Some(dep) = elem.child_text("dep-rounding-spec") {
            spec.dep_rounding = dep.parse()?;
        }
        spec.source_agency = elem.child_text("source-agency").map(str::to_string);
        spec.description = elem.child_text("description").map(str::to_string);
        Ok(spec)
    }

    /// Build the `<rating-spec>` element read by [`Self::from_element`]
    ///
    /// Lookup methods are written when every axis shares one policy. Mixed
    /// policies can only be carried by the template, so they must match it.
    pub fn to_element(&self) -> Result<XmlElement> {
        let mut elem = XmlElement::new("rating-spec");
        if let Some(office) = self.office() {
            elem = elem.with_attr("office-id", office);
        }
        elem.push_text_child("rating-spec-id", self.id())
            .push_text_child("template-id", self.template.id())
            .push_text_child("location-id", &self.location.name)
            .push_text_child("version", &self.version);
        if let Some(agency) = &self.source_agency {
            elem.push_text_child("source-agency", agency);
        }

        match self.lookup.split_first() {
            Some((first, rest)) if rest.iter().all(|p| p == first) => {
                let [in_range, out_range_low, out_range_high] = first.names();
                elem.push_text_child("in-range-method", in_range)
                    .push_text_child("out-range-low-method", out_range_low)
                    .push_text_child("out-range-high-method", out_range_high);
            }
            _ if self.lookup == self.template.lookup() => {}
            _ => {
                return Err(Error::Specification(format!(
                    "Lookup policies of '{}' differ per axis and from its template",
                    self.id()
                )))
            }
        }

        elem.push_text_child("active", self.flags.active)
            .push_text_child("auto-update", self.flags.auto_update)
            .push_text_child("auto-activate", self.flags.auto_activate)
            .push_text_child("auto-migrate-extension", self.flags.auto_migrate_extension);

        let mut rounding = XmlElement::new("ind-rounding-specs");
        for (i, rounder) in self.ind_rounding.iter().enumerate() {
            let mut rounding_elem =
                XmlElement::new("ind-rounding-spec").with_attr("position", (i + 1).to_string());
            rounding_elem.text = rounder.spec();
            rounding.push_child(rounding_elem);
        }
        elem.push_child(rounding);
        elem.push_text_child("dep-rounding-spec", self.dep_rounding.spec());
        if let Some(description) = &self.description {
            elem.push_text_child("description", description);
        }
        Ok(elem)
    }
}

fn check_offices(location: Option<&str>, template: Option<&str>) -> Result<()> {
    match (location, template) {
        (Some(l), Some(t)) if l != t => Err(Error::Specification(format!(
            "Rating specification for office {} cannot use template from office {}",
            l, t
        ))),
        _ => Ok(()),
    }
}

impl fmt::Display for RatingSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupMethod;
    use crate::xml::parse_document;

    const SPEC_ID: &str = "KEYS.Elev;Stor.Linear.Production";

    #[test]
    fn test_parse_identifier() {
        let spec = RatingSpecification::parse(SPEC_ID).unwrap();
        assert_eq!(spec.location().name, "KEYS");
        assert_eq!(spec.template().id(), "Elev;Stor.Linear");
        assert_eq!(spec.version(), "Production");
        assert_eq!(spec.id(), SPEC_ID);
        assert_eq!(spec.ind_rounding().len(), 1);
        assert!(spec.flags.active);
    }

    #[test]
    fn test_malformed_identifiers() {
        assert!(RatingSpecification::parse("KEYS.Elev;Stor.Linear").is_err());
        assert!(RatingSpecification::parse("KEYS.Elev;Stor.Linear.").is_err());
        assert!(RatingSpecification::parse("KEYS.Elev-Stor.Linear.Production").is_err());
        assert!(RatingSpecification::parse(".Elev;Stor.Linear.Production").is_err());
    }

    #[test]
    fn test_office_consistency() {
        let mut spec = RatingSpecification::parse(SPEC_ID).unwrap();
        spec.set_office("SWT").unwrap();
        assert_eq!(spec.office(), Some("SWT"));
        assert!(spec.set_office("NWO").is_err());

        let mut template = RatingTemplate::parse("Elev;Stor.Linear").unwrap();
        template.office = Some("NWO".into());
        assert!(spec.set_template(template).is_err());
    }

    #[test]
    fn test_rounding_arity() {
        let mut spec = RatingSpecification::parse(SPEC_ID).unwrap();
        assert!(spec.set_rounding(vec![UsgsRounder::default()]).is_err());
        let dep: UsgsRounder = "2222233332".parse().unwrap();
        spec.set_rounding(vec![UsgsRounder::default(), dep.clone()]).unwrap();
        assert_eq!(spec.dep_rounding(), &dep);
    }

    #[test]
    fn test_from_element() {
        let xml = r#"<rating-spec office-id="SWT">
  <rating-spec-id>KEYS.Elev;Stor.Linear.Production</rating-spec-id>
  <template-id>Elev;Stor.Linear</template-id>
  <location-id>KEYS</location-id>
  <version>Production</version>
  <source-agency>USACE</source-agency>
  <in-range-method>LINEAR</in-range-method>
  <out-range-low-method>ERROR</out-range-low-method>
  <out-range-high-method>NULL</out-range-high-method>
  <active>true</active>
  <auto-update>true</auto-update>
  <auto-activate>false</auto-activate>
  <auto-migrate-extension>true</auto-migrate-extension>
  <ind-rounding-specs>
    <ind-rounding-spec position="1">2223456782</ind-rounding-spec>
  </ind-rounding-specs>
  <dep-rounding-spec>2222233332</dep-rounding-spec>
  <description>Keystone storage</description>
</rating-spec>"#;
        let spec = RatingSpecification::from_element(&parse_document(xml).unwrap(), None).unwrap();
        assert_eq!(spec.office(), Some("SWT"));
        assert_eq!(spec.source_agency.as_deref(), Some("USACE"));
        assert_eq!(spec.lookup()[0].out_range_low, LookupMethod::Error);
        assert_eq!(spec.lookup()[0].out_range_high, LookupMethod::Null);
        assert!(spec.flags.auto_update);
        assert!(!spec.flags.auto_activate);
        assert!(spec.flags.auto_migrate_extension);
        assert_eq!(spec.ind_rounding()[0].spec(), "2223456782");
        assert_eq!(spec.dep_rounding().spec(), "2222233332");
    }

    #[test]
    fn test_to_element_reads_back() {
        let mut spec = RatingSpecification::parse("BRDG.Count,Opening;Flow.Standard.Production").unwrap();
        spec.set_office("SWT").unwrap();
        spec.set_uniform_lookup(LookupPolicy::new(
            LookupMethod::Previous,
            LookupMethod::Error,
            LookupMethod::Nearest,
        ));
        spec.set_rounding(vec!["2223456782".parse().unwrap(), UsgsRounder::default(), "2222233332".parse().unwrap()])
            .unwrap();
        spec.flags.auto_update = true;
        spec.source_agency = Some("USACE".to_string());
        spec.description = Some("Gated spillway".to_string());

        let elem = spec.to_element().unwrap();
        let again = RatingSpecification::from_element(&elem, None).unwrap();
        assert_eq!(again, spec);
    }

    #[test]
    fn test_to_element_needs_template_for_mixed_lookup() {
        let mut spec = RatingSpecification::parse("BRDG.Count,Opening;Flow.Standard.Production").unwrap();
        let linear = LookupPolicy::new(LookupMethod::Linear, LookupMethod::Null, LookupMethod::Null);
        spec.set_lookup(vec![linear, LookupPolicy::default()]).unwrap();
        assert!(matches!(spec.to_element(), Err(Error::Specification(_))));

        let mut template = spec.template().clone();
        template.set_lookup(vec![linear, LookupPolicy::default()]).unwrap();
        spec.set_template(template).unwrap();
        let elem = spec.to_element().unwrap();
        assert!(elem.child("in-range-method").is_none());
    }

    #[test]
    fn test_from_element_rejects_bad_booleans() {
        let xml = r#"<rating-spec office-id="SWT">
  <rating-spec-id>KEYS.Elev;Stor.Linear.Production</rating-spec-id>
  <active>yes</active>
</rating-spec>"#;
        assert!(RatingSpecification::from_element(&parse_document(xml).unwrap(), None).is_err());
    }
}
