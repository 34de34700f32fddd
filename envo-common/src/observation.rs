//! Observation domain model
//!
//! A candidate observation is a single crowd-submitted measurement: a category,
//! a scalar summary value, a location, optional structured detail fields and the
//! trust tier of whoever submitted it. It is immutable while being validated.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Environmental measurement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Category {
    Air,
    Water,
    Soil,
    Noise,
    Biodiversity,
    Waste,
    Weather,
    Radiation,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Air => "air",
            Category::Water => "water",
            Category::Soil => "soil",
            Category::Noise => "noise",
            Category::Biodiversity => "biodiversity",
            Category::Waste => "waste",
            Category::Weather => "weather",
            Category::Radiation => "radiation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "air" | "aqi" => Ok(Category::Air),
            "water" => Ok(Category::Water),
            "soil" => Ok(Category::Soil),
            "noise" => Ok(Category::Noise),
            "biodiversity" | "bio" => Ok(Category::Biodiversity),
            "waste" => Ok(Category::Waste),
            "weather" => Ok(Category::Weather),
            "radiation" | "uv" => Ok(Category::Radiation),
            other => Err(Error::InvalidInput(format!(
                "Unknown observation category: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Submitter trust tier
///
/// Standard submitters are anonymous members of the public; expert submitters
/// are vetted and have anomalies escalated to review instead of rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    #[default]
    Standard,
    Expert,
}

impl TrustTier {
    pub fn from_expert_flag(is_expert: bool) -> Self {
        if is_expert {
            TrustTier::Expert
        } else {
            TrustTier::Standard
        }
    }

    pub fn is_expert(&self) -> bool {
        matches!(self, TrustTier::Expert)
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustTier::Standard => f.write_str("standard"),
            TrustTier::Expert => f.write_str("expert"),
        }
    }
}

/// Value of one structured detail field (numeric, free text, or null)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// True for JSON null and blank strings; such fields count as not provided
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(_) => false,
        }
    }

    /// Finite numeric interpretation of this field, if it has one
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Missing => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Missing => f.write_str("null"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Normalize a detail field name for lookup against standards
///
/// Lower-cases and maps every non-alphanumeric character to `_`, so
/// `"PM2.5"`, `"pm2 5"` and `"pm2_5"` all become `"pm2_5"`.
pub fn normalize_field_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Candidate observation submitted for validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub category: Category,
    /// Primary summary value (e.g. AQI for air)
    pub value: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Structured detail fields, checked in name order
    #[serde(default)]
    pub details: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub trust_tier: TrustTier,
}

impl Observation {
    pub fn new(category: Category, value: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            category,
            value,
            latitude,
            longitude,
            details: BTreeMap::new(),
            trust_tier: TrustTier::Standard,
        }
    }

    pub fn with_detail(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.details.insert(name.into(), value.into());
        self
    }

    pub fn with_tier(mut self, tier: TrustTier) -> Self {
        self.trust_tier = tier;
        self
    }

    /// Look up a detail field by normalized name
    pub fn detail(&self, normalized: &str) -> Option<&FieldValue> {
        self.details
            .iter()
            .find(|(name, _)| normalize_field_name(name) == normalized)
            .map(|(_, value)| value)
    }

    /// Numeric detail value by normalized name, falling back to the summary value
    pub fn detail_or_value(&self, normalized: &str) -> f64 {
        self.detail(normalized)
            .and_then(FieldValue::as_number)
            .unwrap_or(self.value)
    }

    /// Feature row used by the outlier ensemble: [value, latitude, longitude]
    pub fn feature_row(&self) -> [f64; 3] {
        [self.value, self.latitude, self.longitude]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_case_insensitive_and_aliases() {
        assert_eq!("AIR".parse::<Category>().unwrap(), Category::Air);
        assert_eq!(" Water ".parse::<Category>().unwrap(), Category::Water);
        assert_eq!("aqi".parse::<Category>().unwrap(), Category::Air);
        assert_eq!("bio".parse::<Category>().unwrap(), Category::Biodiversity);
        assert_eq!("uv".parse::<Category>().unwrap(), Category::Radiation);
        assert!("plasma".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_roundtrip_lowercase() {
        let json = serde_json::to_string(&Category::Biodiversity).unwrap();
        assert_eq!(json, "\"biodiversity\"");
        let parsed: Category = serde_json::from_str("\"Soil\"").unwrap();
        assert_eq!(parsed, Category::Soil);
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("PM2.5"), "pm2_5");
        assert_eq!(normalize_field_name("Dissolved Oxygen"), "dissolved_oxygen");
        assert_eq!(normalize_field_name("uv-index"), "uv_index");
        assert_eq!(normalize_field_name("aqi"), "aqi");
    }

    #[test]
    fn test_field_value_untagged_deserialize() {
        let details: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"aqi": 45, "ph": "7.2", "note": null}"#).unwrap();
        assert_eq!(details["aqi"], FieldValue::Number(45.0));
        assert_eq!(details["ph"].as_number(), Some(7.2));
        assert!(details["note"].is_missing());
    }

    #[test]
    fn test_field_value_rejects_non_finite_and_text() {
        assert_eq!(FieldValue::from("abc").as_number(), None);
        assert_eq!(FieldValue::from("NaN").as_number(), None);
        assert_eq!(FieldValue::from("inf").as_number(), None);
        assert!(FieldValue::from("   ").is_missing());
    }

    #[test]
    fn test_detail_lookup_uses_normalized_names() {
        let obs = Observation::new(Category::Soil, 30.0, 27.0, 71.0).with_detail("Moisture", 72.0);
        assert_eq!(obs.detail_or_value("moisture"), 72.0);
        assert_eq!(obs.detail_or_value("ph"), 30.0);
    }

    #[test]
    fn test_trust_tier_default_and_flag() {
        let obs: Observation = serde_json::from_str(
            r#"{"category":"air","value":10,"latitude":1,"longitude":2}"#,
        )
        .unwrap();
        assert_eq!(obs.trust_tier, TrustTier::Standard);
        assert!(TrustTier::from_expert_flag(true).is_expert());
        assert!(obs.details.is_empty());
    }
}
