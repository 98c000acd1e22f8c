//! Rating templates: parameter identities and per-axis lookup policies.
//!
//! A template identifier has the form `<ind_1>,...,<ind_k>;<dep>.<version>`.
//! The order of the independent parameters defines the axis order of every
//! rating table built on the template.

use crate::lookup::LookupPolicy;
use crate::xml::XmlElement;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Check that a parameter identity can be embedded in an identifier
pub(crate) fn validate_parameter(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Identifier("Parameter name cannot be empty".into()));
    }
    if name.contains(['.', ',', ';']) {
        return Err(Error::Identifier(format!(
            "Parameter name '{}' cannot contain '.', ',' or ';'",
            name
        )));
    }
    Ok(())
}

/// Whether a parameter is an elevation (base parameter `Elev`)
pub fn is_elevation(param: &str) -> bool {
    param.split('-').next() == Some("Elev")
}

/// An independent parameter and its lookup policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndParameter {
    pub name: String,
    pub lookup: LookupPolicy,
}

/// Template shared by all ratings of the same parameters and version
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingTemplate {
    ind_params: Vec<IndParameter>,
    dep_param: String,
    version: String,
    pub office: Option<String>,
    pub description: Option<String>,
}

impl RatingTemplate {
    /// Parse a template identifier, giving every axis the default policy
    pub fn parse(id: &str) -> Result<Self> {
        let (params, version) = id.split_once('.').ok_or_else(|| {
            Error::Identifier(format!(
                "Template must be of format <ind-params>;<dep-param>.<version>, got '{}'",
                id
            ))
        })?;
        if version.is_empty() || version.contains('.') {
            return Err(Error::Identifier(format!(
                "Template '{}' must have exactly one non-empty version",
                id
            )));
        }
        let (ind, dep) = params.split_once(';').ok_or_else(|| {
            Error::Identifier(format!(
                "Template must be of format <ind-params>;<dep-param>.<version>, got '{}'",
                id
            ))
        })?;
        if dep.contains(';') {
            return Err(Error::Identifier(format!(
                "Template '{}' has more than one ';'",
                id
            )));
        }
        let mut ind_params = Vec::new();
        for name in ind.split(',') {
            validate_parameter(name)?;
            ind_params.push(IndParameter {
                name: name.to_string(),
                lookup: LookupPolicy::default(),
            });
        }
        validate_parameter(dep)?;
        Ok(Self {
            ind_params,
            dep_param: dep.to_string(),
            version: version.to_string(),
            office: None,
            description: None,
        })
    }

    /// Parse an identifier and apply one policy per axis
    pub fn with_lookup(id: &str, lookup: Vec<LookupPolicy>) -> Result<Self> {
        let mut template = Self::parse(id)?;
        template.set_lookup(lookup)?;
        Ok(template)
    }

    /// The template identifier
    pub fn id(&self) -> String {
        format!("{};{}.{}", self.parameters_id(), self.dep_param, self.version)
    }

    /// The `<ind-params>;<dep-param>` part of the identifier
    pub fn parameters_id(&self) -> String {
        let ind: Vec<&str> = self.ind_params.iter().map(|p| p.name.as_str()).collect();
        format!("{};{}", ind.join(","), self.dep_param)
    }

    pub fn ind_param_count(&self) -> usize {
        self.ind_params.len()
    }

    pub fn ind_params(&self) -> Vec<&str> {
        self.ind_params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn dep_param(&self) -> &str {
        &self.dep_param
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn lookup(&self) -> Vec<LookupPolicy> {
        self.ind_params.iter().map(|p| p.lookup).collect()
    }

    /// Replace the per-axis policies; the list must have one entry per axis
    pub fn set_lookup(&mut self, lookup: Vec<LookupPolicy>) -> Result<()> {
        if lookup.len() != self.ind_params.len() {
            return Err(Error::Template(format!(
                "Expected {} lookup policies for '{}', got {}",
                self.ind_params.len(),
                self.id(),
                lookup.len()
            )));
        }
        for (param, policy) in self.ind_params.iter_mut().zip(lookup) {
            param.lookup = policy;
        }
        Ok(())
    }

    /// Apply one policy to every axis
    pub fn set_uniform_lookup(&mut self, policy: LookupPolicy) {
        if self.ind_params.len() > 1 {
            tracing::debug!(
                "Reusing lookup {:?} for {} independent parameters of '{}'",
                policy.names(),
                self.ind_params.len(),
                self.id()
            );
        }
        for param in &mut self.ind_params {
            param.lookup = policy;
        }
    }

    /// Parse a `<rating-template office-id="...">` element
    pub fn from_element(elem: &XmlElement) -> Result<Self> {
        if elem.name != "rating-template" {
            return Err(Error::InvalidXml(format!(
                "Expected <rating-template>, got <{}>",
                elem.name
            )));
        }
        let office = elem
            .attr("office-id")
            .filter(|o| !o.is_empty())
            .ok_or_else(|| Error::missing("office-id attribute", "<rating-template>"))?;
        let parameters = elem.require_text("parameters-id")?;
        let version = elem.require_text("version")?;
        let mut template = Self::parse(&format!("{}.{}", parameters, version))?;

        let dep_param = elem.child_text("dep-parameter");
        if dep_param != Some(template.dep_param()) {
            return Err(Error::Template(format!(
                "<dep-parameter> of {:?} doesn't match <parameters-id> dependent parameter '{}'",
                dep_param,
                template.dep_param()
            )));
        }

        let specs: Vec<_> = elem.children_named("ind-parameter-specs").collect();
        if specs.len() != 1 {
            return Err(Error::Template(format!(
                "Expected 1 <ind-parameter-specs> element, got {}",
                specs.len()
            )));
        }
        let spec_elems: Vec<_> = specs[0].children_named("ind-parameter-spec").collect();
        if spec_elems.len() != template.ind_param_count() {
            return Err(Error::Template(format!(
                "Expected {} <ind-parameter-spec> elements, got {}",
                template.ind_param_count(),
                spec_elems.len()
            )));
        }
        let mut lookup = Vec::with_capacity(spec_elems.len());
        for (i, spec_elem) in spec_elems.iter().enumerate() {
            let expected = (i + 1).to_string();
            if spec_elem.attr("position") != Some(expected.as_str()) {
                return Err(Error::Template(format!(
                    "Expected position=\"{}\" on <ind-parameter-spec>[{}], got {:?}",
                    expected,
                    i,
                    spec_elem.attr("position")
                )));
            }
            let param = spec_elem.child_text("parameter");
            if param != Some(template.ind_params[i].name.as_str()) {
                return Err(Error::Template(format!(
                    "Expected <parameter> of '{}' on <ind-parameter-spec>[{}], got {:?}",
                    template.ind_params[i].name, i, param
                )));
            }
            lookup.push(LookupPolicy::parse(&[
                spec_elem.require_text("in-range-method")?,
                spec_elem.require_text("out-range-low-method")?,
                spec_elem.require_text("out-range-high-method")?,
            ])?);
        }
        template.set_lookup(lookup)?;
        template.office = Some(office.to_string());
        template.description = elem.child_text("description").map(str::to_string);
        Ok(template)
    }

    /// Build the `<rating-template>` element read by [`Self::from_element`]
    ///
    /// The exchange format requires an office, so a template without one
    /// cannot be written.
    pub fn to_element(&self) -> Result<XmlElement> {
        let office = self
            .office
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| Error::Template(format!("Template '{}' has no office", self.id())))?;
        let mut elem = XmlElement::new("rating-template").with_attr("office-id", office);
        elem.push_text_child("parameters-id", self.parameters_id())
            .push_text_child("version", &self.version);

        let mut specs = XmlElement::new("ind-parameter-specs");
        for (i, param) in self.ind_params.iter().enumerate() {
            let [in_range, out_range_low, out_range_high] = param.lookup.names();
            let mut spec = XmlElement::new("ind-parameter-spec").with_attr("position", (i + 1).to_string());
            spec.push_text_child("parameter", &param.name)
                .push_text_child("in-range-method", in_range)
                .push_text_child("out-range-low-method", out_range_low)
                .push_text_child("out-range-high-method", out_range_high);
            specs.push_child(spec);
        }
        elem.push_child(specs);
        elem.push_text_child("dep-parameter", &self.dep_param);
        if let Some(description) = &self.description {
            elem.push_text_child("description", description);
        }
        Ok(elem)
    }
}

impl fmt::Display for RatingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupMethod;
    use crate::xml::parse_document;

    #[test]
    fn test_parse_identifier() {
        let template =
            RatingTemplate::parse("Count-Sluice_Gates,Opening-Sluice_Gates,Elev;Flow-Sluice_Gates.Standard")
                .unwrap();
        assert_eq!(template.ind_param_count(), 3);
        assert_eq!(template.ind_params()[2], "Elev");
        assert_eq!(template.dep_param(), "Flow-Sluice_Gates");
        assert_eq!(template.version(), "Standard");
        assert_eq!(
            template.id(),
            "Count-Sluice_Gates,Opening-Sluice_Gates,Elev;Flow-Sluice_Gates.Standard"
        );
        for policy in template.lookup() {
            assert_eq!(policy, LookupPolicy::default());
        }
    }

    #[test]
    fn test_malformed_identifiers() {
        assert!(RatingTemplate::parse("Elev;Stor").is_err());
        assert!(RatingTemplate::parse("Elev;Stor.").is_err());
        assert!(RatingTemplate::parse("Elev,Stor.Linear").is_err());
        assert!(RatingTemplate::parse("Elev;Stor.Linear.Extra").is_err());
        assert!(RatingTemplate::parse("Elev,;Stor.Linear").is_err());
    }

    #[test]
    fn test_lookup_arity_is_checked() {
        let mut template = RatingTemplate::parse("Elev,Opening;Flow.Standard").unwrap();
        assert!(template.set_lookup(vec![LookupPolicy::default()]).is_err());
        let policy = LookupPolicy::new(LookupMethod::Linear, LookupMethod::Error, LookupMethod::Null);
        template.set_uniform_lookup(policy);
        assert!(template.lookup().iter().all(|p| *p == policy));
    }

    #[test]
    fn test_is_elevation() {
        assert!(is_elevation("Elev"));
        assert!(is_elevation("Elev-Pool"));
        assert!(!is_elevation("Elevation"));
        assert!(!is_elevation("Stage"));
    }

    #[test]
    fn test_from_element() {
        let xml = r#"<rating-template office-id="SWT">
  <parameters-id>Elev;Stor</parameters-id>
  <version>Standard</version>
  <ind-parameter-specs>
    <ind-parameter-spec position="1">
      <parameter>Elev</parameter>
      <in-range-method>LINEAR</in-range-method>
      <out-range-low-method>ERROR</out-range-low-method>
      <out-range-high-method>LINEAR</out-range-high-method>
    </ind-parameter-spec>
  </ind-parameter-specs>
  <dep-parameter>Stor</dep-parameter>
  <description>Storage</description>
</rating-template>"#;
        let template = RatingTemplate::from_element(&parse_document(xml).unwrap()).unwrap();
        assert_eq!(template.id(), "Elev;Stor.Standard");
        assert_eq!(template.office.as_deref(), Some("SWT"));
        assert_eq!(template.description.as_deref(), Some("Storage"));
        assert_eq!(template.lookup()[0].out_range_low, LookupMethod::Error);
    }

    #[test]
    fn test_to_element_reads_back() {
        let policy = LookupPolicy::new(LookupMethod::Logarithmic, LookupMethod::Error, LookupMethod::Nearest);
        let mut template =
            RatingTemplate::with_lookup("Opening,Elev;Flow.Standard", vec![policy, LookupPolicy::default()])
                .unwrap();
        assert!(template.to_element().is_err());

        template.office = Some("SWT".to_string());
        let again = RatingTemplate::from_element(&template.to_element().unwrap()).unwrap();
        assert_eq!(again, template);
    }

    #[test]
    fn test_from_element_rejects_mismatched_dep_parameter() {
        let xml = r#"<rating-template office-id="SWT">
  <parameters-id>Elev;Stor</parameters-id>
  <version>Standard</version>
  <ind-parameter-specs/>
  <dep-parameter>Flow</dep-parameter>
</rating-template>"#;
        assert!(RatingTemplate::from_element(&parse_document(xml).unwrap()).is_err());
    }
}
