//! District records and the attribute vocabulary of the district feature layer.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DataError, Result};

/// Attribute names published by the district feature layer.
///
/// Lookups against attribute maps are case-insensitive, so the same names
/// work for the feature service (`DISTRICT`, `ST_NM`) and for a census CSV
/// export whose headers were lowercased.
pub mod fields {
    pub const DISTRICT: &str = "DISTRICT";
    pub const TOTAL_POPULATION: &str = "total_population";
    pub const STATE: &str = "ST_NM";
    pub const CENSUS_CODE: &str = "censuscode";
    pub const FEMALES: &str = "females";
    pub const MALES: &str = "males";
    pub const HOUSEHOLDS: &str = "number_of_households";
    pub const DENSITY: &str = "population_per_sq__km_";
    pub const KIND: &str = "type";

    /// Fields needed to identify a feature, nothing more.
    pub const IDENTIFIERS: [&str; 1] = [CENSUS_CODE];

    pub const ALL: [&str; 9] = [
        DISTRICT,
        TOTAL_POPULATION,
        STATE,
        CENSUS_CODE,
        FEMALES,
        MALES,
        HOUSEHOLDS,
        DENSITY,
        KIND,
    ];
}

/// Unique census identifier of a district.
///
/// Codes arrive as JSON numbers from some layers and as text from others, so
/// they are kept in their decimal text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CensusCode(String);

impl CensusCode {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.len() == code.len() {
            Self(code)
        } else {
            Self(trimmed.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read a code from an attribute value. Integral floats (`101.0`) are
    /// normalised to `101`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Some(Self(v.to_string()))
                } else if let Some(v) = n.as_i64() {
                    Some(Self(v.to_string()))
                } else {
                    n.as_f64().map(|v| {
                        if v.fract() == 0.0 {
                            Self(format!("{v:.0}"))
                        } else {
                            Self(v.to_string())
                        }
                    })
                }
            }
            Value::String(s) if !s.trim().is_empty() => Some(Self::new(s.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for CensusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CensusCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CensusCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for CensusCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<u64> for CensusCode {
    fn from(code: u64) -> Self {
        Self(code.to_string())
    }
}

/// One district as published by the data source. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    pub census_code: CensusCode,
    pub district_name: String,
    pub state_name: String,
    /// `None` means unknown; ranking treats it as zero.
    pub population: Option<u64>,
    pub males: Option<u64>,
    pub females: Option<u64>,
    pub households: Option<u64>,
    pub density_per_sq_km: Option<f64>,
    pub kind: Option<String>,
}

impl DistrictRecord {
    /// Minimal constructor, mostly useful for tests and fixtures.
    pub fn new(
        census_code: impl Into<CensusCode>,
        district_name: impl Into<String>,
        state_name: impl Into<String>,
        population: Option<u64>,
    ) -> Self {
        Self {
            census_code: census_code.into(),
            district_name: district_name.into(),
            state_name: state_name.into(),
            population,
            males: None,
            females: None,
            households: None,
            density_per_sq_km: None,
            kind: None,
        }
    }

    /// Build a record from a feature's attribute map.
    ///
    /// The code, district name and state name are required; everything else
    /// degrades to `None` when missing or unparsable.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Self> {
        let census_code = attribute(attributes, fields::CENSUS_CODE)
            .and_then(CensusCode::from_value)
            .ok_or_else(|| DataError::InvalidRecord(format!("missing {}", fields::CENSUS_CODE)))?;
        let district_name = attribute(attributes, fields::DISTRICT)
            .and_then(text)
            .ok_or_else(|| {
                DataError::InvalidRecord(format!("{census_code}: missing {}", fields::DISTRICT))
            })?;
        let state_name = attribute(attributes, fields::STATE)
            .and_then(text)
            .ok_or_else(|| {
                DataError::InvalidRecord(format!("{census_code}: missing {}", fields::STATE))
            })?;

        Ok(Self {
            census_code,
            district_name,
            state_name,
            population: attribute(attributes, fields::TOTAL_POPULATION).and_then(count),
            males: attribute(attributes, fields::MALES).and_then(count),
            females: attribute(attributes, fields::FEMALES).and_then(count),
            households: attribute(attributes, fields::HOUSEHOLDS).and_then(count),
            density_per_sq_km: attribute(attributes, fields::DENSITY).and_then(float),
            kind: attribute(attributes, fields::KIND).and_then(text),
        })
    }

    /// Population used for ordering: unknown counts as zero.
    pub fn population_or_zero(&self) -> u64 {
        self.population.unwrap_or(0)
    }
}

/// Case-insensitive attribute lookup.
pub fn attribute<'a>(attributes: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    attributes.get(name).or_else(|| {
        attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u64)),
        Value::String(_) => float(value).filter(|v| *v >= 0.0).map(|v| v.round() as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_from_feature_layer_attributes() {
        let record = DistrictRecord::from_attributes(&attrs(json!({
            "DISTRICT": "Pune",
            "ST_NM": "Maharashtra",
            "censuscode": 521,
            "total_population": 9429408,
            "males": 4924105,
            "females": 4505303,
            "number_of_households": 2138250,
            "population_per_sq__km_": 603.0,
            "type": "DISTRICT"
        })))
        .unwrap();

        assert_eq!(record.census_code.as_str(), "521");
        assert_eq!(record.district_name, "Pune");
        assert_eq!(record.state_name, "Maharashtra");
        assert_eq!(record.population, Some(9429408));
        assert_eq!(record.households, Some(2138250));
        assert_eq!(record.density_per_sq_km, Some(603.0));
        assert_eq!(record.kind.as_deref(), Some("DISTRICT"));
    }

    #[test]
    fn test_lowercased_csv_headers_and_text_numbers() {
        let record = DistrictRecord::from_attributes(&attrs(json!({
            "district": " Puri ",
            "st_nm": "Odisha",
            "censuscode": "392",
            "total_population": "1,698,730",
            "males": ""
        })))
        .unwrap();

        assert_eq!(record.district_name, "Puri");
        assert_eq!(record.population, Some(1_698_730));
        assert_eq!(record.males, None);
    }

    #[test]
    fn test_integral_float_codes_are_normalised() {
        assert_eq!(
            CensusCode::from_value(&json!(101.0)),
            Some(CensusCode::from("101"))
        );
        assert_eq!(CensusCode::from_value(&json!("  ")), None);
        assert_eq!(CensusCode::from_value(&Value::Null), None);
    }

    #[test]
    fn test_missing_required_fields_are_rejected() {
        let err = DistrictRecord::from_attributes(&attrs(json!({
            "censuscode": 7,
            "DISTRICT": "Nowhere"
        })))
        .unwrap_err();
        assert!(matches!(err, DataError::InvalidRecord(msg) if msg.contains("ST_NM")));

        assert!(DistrictRecord::from_attributes(&attrs(json!({ "DISTRICT": "x" }))).is_err());
    }

    #[test]
    fn test_negative_population_is_unknown() {
        let record = DistrictRecord::from_attributes(&attrs(json!({
            "censuscode": "1",
            "DISTRICT": "A",
            "ST_NM": "B",
            "total_population": -5
        })))
        .unwrap();
        assert_eq!(record.population, None);
        assert_eq!(record.population_or_zero(), 0);
    }
}
