//! Vertical datum information for elevation parameters.
//!
//! A location's vertical datum info names its native datum and the offsets
//! from that datum to others. Adding an offset to a native elevation gives
//! the elevation in the target datum.

use crate::xml::{parse_f64, XmlElement};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const NGVD29: &str = "NGVD-29";
pub const NAVD88: &str = "NAVD-88";
pub const OTHER_DATUM: &str = "OTHER";

/// Normalize a vertical datum name (`NGVD29` → `NGVD-29`, `navd88` → `NAVD-88`,
/// `LOCAL` → `OTHER`)
pub fn normalize_datum(name: &str) -> Result<String> {
    let squeezed: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_ascii_uppercase();
    match squeezed.as_str() {
        "NGVD29" | "NGVD1929" => Ok(NGVD29.to_string()),
        "NAVD88" | "NAVD1988" => Ok(NAVD88.to_string()),
        "OTHER" | "LOCAL" => Ok(OTHER_DATUM.to_string()),
        _ => Err(Error::VerticalDatum(format!(
            "Expected {}, {}, or {}, got '{}'",
            NGVD29, NAVD88, OTHER_DATUM, name
        ))),
    }
}

/// Offset from the native datum to another datum
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatumOffset {
    pub to_datum: String,
    pub value: f64,
    pub estimate: bool,
}

/// Native datum, optional elevation, and known offsets for one location
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerticalDatumInfo {
    pub location: Option<String>,
    pub native_datum: String,
    /// Unit of `elevation` and all offsets
    pub unit: String,
    pub elevation: Option<f64>,
    pub offsets: Vec<DatumOffset>,
}

impl VerticalDatumInfo {
    pub fn new(native_datum: &str, unit: &str) -> Result<Self> {
        Ok(Self {
            location: None,
            native_datum: normalize_datum(native_datum)?,
            unit: unit.to_string(),
            elevation: None,
            offsets: Vec::new(),
        })
    }

    pub fn with_offset(mut self, to_datum: &str, value: f64) -> Result<Self> {
        self.offsets.push(DatumOffset {
            to_datum: normalize_datum(to_datum)?,
            value,
            estimate: false,
        });
        Ok(self)
    }

    /// Parse a `<vertical-datum-info unit="...">` element
    pub fn from_element(elem: &XmlElement) -> Result<Self> {
        let unit = elem
            .attr("unit")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::missing("unit attribute", "<vertical-datum-info>"))?;
        let mut info = Self::new(elem.require_text("native-datum")?, unit)?;
        info.location = elem.child_text("location").map(str::to_string);
        info.elevation = elem
            .child_text("elevation")
            .map(|t| parse_f64(t, "<elevation>"))
            .transpose()?;
        for offset_elem in elem.children_named("offset") {
            let to_datum = normalize_datum(offset_elem.require_text("to-datum")?)?;
            let value = parse_f64(offset_elem.require_text("value")?, "<offset>/<value>")?;
            info.offsets.push(DatumOffset {
                to_datum,
                value,
                estimate: offset_elem.attr("estimate") == Some("true"),
            });
        }
        Ok(info)
    }

    /// Build the `<vertical-datum-info>` element read by [`Self::from_element`]
    pub fn to_element(&self) -> XmlElement {
        let mut elem = XmlElement::new("vertical-datum-info").with_attr("unit", self.unit.as_str());
        if let Some(location) = &self.location {
            elem.push_text_child("location", location);
        }
        elem.push_text_child("native-datum", &self.native_datum);
        if let Some(elevation) = self.elevation {
            elem.push_text_child("elevation", elevation);
        }
        for offset in &self.offsets {
            let mut offset_elem = XmlElement::new("offset");
            if offset.estimate {
                offset_elem = offset_elem.with_attr("estimate", "true");
            }
            offset_elem
                .push_text_child("to-datum", &offset.to_datum)
                .push_text_child("value", offset.value);
            elem.push_child(offset_elem);
        }
        elem
    }

    /// Signed offset to add to a `from` elevation to express it in `to`
    ///
    /// Identical datums yield zero; `None` means no offset is known.
    pub fn offset(&self, from: &str, to: &str) -> Option<f64> {
        let from = normalize_datum(from).ok()?;
        let to = normalize_datum(to).ok()?;
        if from == to {
            return Some(0.0);
        }
        let from_native = if from == self.native_datum {
            0.0
        } else {
            -self.offset_from_native(&from)?
        };
        let native_to = if to == self.native_datum {
            0.0
        } else {
            self.offset_from_native(&to)?
        };
        Some(from_native + native_to)
    }

    /// Offset from the native datum to `target`
    pub fn offset_to(&self, target: &str) -> Option<f64> {
        self.offset(&self.native_datum, target)
    }

    fn offset_from_native(&self, datum: &str) -> Option<f64> {
        self.offsets
            .iter()
            .find(|o| o.to_datum == datum)
            .map(|o| o.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    const VDI_XML: &str = r#"<vertical-datum-info office="SWT" unit="ft">
  <location>KEYS</location>
  <native-datum>NGVD-29</native-datum>
  <elevation>615.2</elevation>
  <offset estimate="true">
    <to-datum>NAVD-88</to-datum>
    <value>0.3855</value>
  </offset>
</vertical-datum-info>"#;

    #[test]
    fn test_parse_vertical_datum_info() {
        let info = VerticalDatumInfo::from_element(&parse_document(VDI_XML).unwrap()).unwrap();
        assert_eq!(info.native_datum, NGVD29);
        assert_eq!(info.unit, "ft");
        assert_eq!(info.elevation, Some(615.2));
        assert_eq!(info.offsets.len(), 1);
        assert!(info.offsets[0].estimate);
    }

    #[test]
    fn test_offsets_are_signed() {
        let info = VerticalDatumInfo::from_element(&parse_document(VDI_XML).unwrap()).unwrap();
        assert_eq!(info.offset_to("NAVD88"), Some(0.3855));
        assert_eq!(info.offset("NAVD-88", "NGVD-29"), Some(-0.3855));
        assert_eq!(info.offset("NAVD-88", "navd-88"), Some(0.0));
        assert_eq!(info.offset_to("OTHER"), None);
    }

    #[test]
    fn test_normalize_datum() {
        assert_eq!(normalize_datum("ngvd29").unwrap(), NGVD29);
        assert_eq!(normalize_datum("NAVD-88").unwrap(), NAVD88);
        assert_eq!(normalize_datum("Local").unwrap(), OTHER_DATUM);
        assert!(normalize_datum("WGS84").is_err());
    }

    #[test]
    fn test_element_reads_back() {
        let info = VerticalDatumInfo::from_element(&parse_document(VDI_XML).unwrap()).unwrap();
        let again = VerticalDatumInfo::from_element(&info.to_element()).unwrap();
        assert_eq!(again, info);
    }

    #[test]
    fn test_missing_unit_is_rejected() {
        let xml = "<vertical-datum-info><native-datum>NGVD-29</native-datum></vertical-datum-info>";
        assert!(VerticalDatumInfo::from_element(&parse_document(xml).unwrap()).is_err());
    }
}
