//! Range Validator
//!
//! Checks structured detail fields against the Category Standards Table.
//! Pure function: no I/O, no side effects. The first failing field ends the
//! check, and fields are visited in name order so results are reproducible.

use crate::standards::CategoryStandards;
use envo_common::observation::normalize_field_name;
use envo_common::{Category, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Per-field entry in the range report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRangeResult {
    /// Allowed range as "min-max"
    pub range: String,
    pub valid: bool,
}

/// Why a range check failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeViolation {
    /// Field could not be read as a finite number
    InvalidNumeric { field: String, raw: String },
    /// Field parsed but lies outside the physical range
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeViolation::InvalidNumeric { field, raw } => {
                write!(f, "Invalid numeric value for {}: {}", field, raw)
            }
            RangeViolation::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "Value {} for {} is out of scientific range ({}-{})",
                value, field, min, max
            ),
        }
    }
}

/// Outcome of a range check
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCheck {
    /// Fields checked up to and including the first failure
    pub report: BTreeMap<String, FieldRangeResult>,
    pub violation: Option<RangeViolation>,
}

impl RangeCheck {
    fn pass(report: BTreeMap<String, FieldRangeResult>) -> Self {
        Self {
            report,
            violation: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.violation.is_none()
    }

    pub fn message(&self) -> String {
        match &self.violation {
            Some(violation) => violation.to_string(),
            None if self.report.is_empty() => "No standardized fields to check".to_string(),
            None => "Ranges valid".to_string(),
        }
    }
}

/// Check detail fields of one observation against the standards table
pub fn validate_ranges(
    standards: &CategoryStandards,
    category: Category,
    details: &BTreeMap<String, FieldValue>,
) -> RangeCheck {
    let mut report = BTreeMap::new();

    if details.is_empty() {
        return RangeCheck::pass(report);
    }
    if standards.bounds_for(category).is_none() {
        debug!(category = %category, "No standards for category, skipping range check");
        return RangeCheck::pass(report);
    }

    for (field, raw) in details {
        let Some(bound) = standards.bound(category, &normalize_field_name(field)) else {
            continue;
        };
        if raw.is_missing() {
            continue;
        }

        let Some(value) = raw.as_number() else {
            return RangeCheck {
                report,
                violation: Some(RangeViolation::InvalidNumeric {
                    field: field.clone(),
                    raw: raw.to_string(),
                }),
            };
        };

        let valid = bound.contains(value);
        report.insert(
            field.clone(),
            FieldRangeResult {
                range: bound.to_string(),
                valid,
            },
        );

        if !valid {
            return RangeCheck {
                report,
                violation: Some(RangeViolation::OutOfRange {
                    field: field.clone(),
                    value,
                    min: bound.min,
                    max: bound.max,
                }),
            };
        }
    }

    RangeCheck::pass(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_fields_pass_with_report() {
        let standards = CategoryStandards::builtin();
        let check = validate_ranges(
            &standards,
            Category::Air,
            &details(&[("aqi", 45.0.into()), ("pm10", "80".into())]),
        );
        assert!(check.passed());
        assert_eq!(check.report.len(), 2);
        assert_eq!(check.report["aqi"].range, "0-500");
        assert!(check.report["pm10"].valid);
        assert_eq!(check.message(), "Ranges valid");
    }

    #[test]
    fn test_out_of_range_names_field_value_and_bound() {
        let standards = CategoryStandards::builtin();
        let check = validate_ranges(&standards, Category::Water, &details(&[("pH", 15.0.into())]));
        assert!(!check.passed());
        assert_eq!(
            check.violation,
            Some(RangeViolation::OutOfRange {
                field: "pH".to_string(),
                value: 15.0,
                min: 0.0,
                max: 14.0
            })
        );
        assert!(check.message().contains("out of scientific range (0-14)"));
        assert!(!check.report["pH"].valid);
    }

    #[test]
    fn test_unparsable_value_fails_immediately() {
        let standards = CategoryStandards::builtin();
        let check = validate_ranges(&standards, Category::Noise, &details(&[("db", "loud".into())]));
        assert_eq!(
            check.violation,
            Some(RangeViolation::InvalidNumeric {
                field: "db".to_string(),
                raw: "loud".to_string()
            })
        );
        assert!(check.message().starts_with("Invalid numeric value for db"));
    }

    #[test]
    fn test_first_failure_short_circuits_in_name_order() {
        let standards = CategoryStandards::builtin();
        // "aqi" sorts before "pm10": only the aqi failure is reported
        let check = validate_ranges(
            &standards,
            Category::Air,
            &details(&[("pm10", 900.0.into()), ("aqi", 700.0.into())]),
        );
        match check.violation {
            Some(RangeViolation::OutOfRange { ref field, .. }) => assert_eq!(field, "aqi"),
            other => panic!("unexpected violation: {:?}", other),
        }
        assert!(!check.report.contains_key("pm10"));
    }

    #[test]
    fn test_trivial_pass_cases() {
        let standards = CategoryStandards::builtin();
        assert!(validate_ranges(&standards, Category::Air, &BTreeMap::new()).passed());
        assert!(validate_ranges(
            &standards,
            Category::Biodiversity,
            &details(&[("species_count", "many".into())])
        )
        .passed());
        // Unknown fields and null values are ignored
        let check = validate_ranges(
            &standards,
            Category::Air,
            &details(&[("colour", "grey".into()), ("aqi", FieldValue::Missing)]),
        );
        assert!(check.passed());
        assert!(check.report.is_empty());
    }

    #[test]
    fn test_punctuated_field_names_match() {
        let standards = CategoryStandards::builtin();
        let check = validate_ranges(&standards, Category::Air, &details(&[("PM2.5", 501.0.into())]));
        assert!(!check.passed());
    }
}
