//! Category Standards Table
//!
//! Physically possible ranges per category and detail field, based on WHO and
//! EPA reference ranges. These are plausibility bounds, not health thresholds:
//! water pH 0-14 is accepted even though 6.5-8.5 is the healthy band.
//!
//! The table is built once at startup (built-in bounds plus optional TOML
//! overrides) and is read-only afterwards.

use envo_common::observation::normalize_field_name;
use envo_common::{Category, Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Inclusive physical range for one field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldBound {
    pub min: f64,
    pub max: f64,
}

impl FieldBound {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl fmt::Display for FieldBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

const BUILTIN: &[(Category, &[(&str, FieldBound)])] = &[
    (
        Category::Air,
        &[
            ("aqi", FieldBound::new(0.0, 500.0)),
            ("pm2_5", FieldBound::new(0.0, 500.0)),
            ("pm10", FieldBound::new(0.0, 600.0)),
            ("co", FieldBound::new(0.0, 50.0)),
            ("o3", FieldBound::new(0.0, 500.0)),
        ],
    ),
    (
        Category::Water,
        &[
            ("ph", FieldBound::new(0.0, 14.0)),
            ("dissolved_oxygen", FieldBound::new(0.0, 20.0)), // mg/L
            ("turbidity", FieldBound::new(0.0, 1000.0)),      // NTU
        ],
    ),
    (
        Category::Soil,
        &[
            ("ph", FieldBound::new(0.0, 14.0)),
            ("moisture", FieldBound::new(0.0, 100.0)), // %
        ],
    ),
    (Category::Noise, &[("db", FieldBound::new(0.0, 140.0))]),
    (
        Category::Weather,
        &[
            ("temperature", FieldBound::new(-90.0, 60.0)), // °C, recorded extremes
            ("humidity", FieldBound::new(0.0, 100.0)),
        ],
    ),
    (Category::Radiation, &[("uv_index", FieldBound::new(0.0, 20.0))]),
];

/// Per-category field bounds
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStandards {
    table: HashMap<Category, BTreeMap<String, FieldBound>>,
}

impl Default for CategoryStandards {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryStandards {
    /// Built-in WHO/EPA plausibility bounds
    pub fn builtin() -> Self {
        let table = BUILTIN
            .iter()
            .map(|(category, fields)| {
                let bounds = fields
                    .iter()
                    .map(|(name, bound)| (name.to_string(), *bound))
                    .collect();
                (*category, bounds)
            })
            .collect();
        Self { table }
    }

    /// Built-in bounds with operator overrides applied
    ///
    /// Overrides are keyed by category name then field name, each a `[min, max]`
    /// pair. Unknown categories and inverted or non-finite bounds are rejected.
    pub fn with_overrides(overrides: &BTreeMap<String, BTreeMap<String, [f64; 2]>>) -> Result<Self> {
        let mut standards = Self::builtin();
        for (category_name, fields) in overrides {
            let category: Category = category_name.parse().map_err(|_| {
                Error::Config(format!("Unknown category in standards: {}", category_name))
            })?;
            let bounds = standards.table.entry(category).or_default();
            for (field, [min, max]) in fields {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(Error::Config(format!(
                        "Invalid bound for {}.{}: [{}, {}]",
                        category, field, min, max
                    )));
                }
                bounds.insert(normalize_field_name(field), FieldBound::new(*min, *max));
            }
        }
        Ok(standards)
    }

    /// All bounds for a category, `None` when the category has no standards
    pub fn bounds_for(&self, category: Category) -> Option<&BTreeMap<String, FieldBound>> {
        self.table.get(&category).filter(|bounds| !bounds.is_empty())
    }

    /// Bound for one normalized field name
    pub fn bound(&self, category: Category, normalized_field: &str) -> Option<FieldBound> {
        self.table.get(&category)?.get(normalized_field).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bounds() {
        let standards = CategoryStandards::builtin();
        assert_eq!(standards.bound(Category::Air, "aqi"), Some(FieldBound::new(0.0, 500.0)));
        assert_eq!(standards.bound(Category::Noise, "db"), Some(FieldBound::new(0.0, 140.0)));
        assert!(standards.bound(Category::Air, "ph").is_none());
        assert!(standards.bounds_for(Category::Biodiversity).is_none());
        assert!(standards.bounds_for(Category::Waste).is_none());
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "air".to_string(),
            BTreeMap::from([("AQI".to_string(), [0.0, 999.0])]),
        );
        overrides.insert(
            "waste".to_string(),
            BTreeMap::from([("fill_level".to_string(), [0.0, 100.0])]),
        );

        let standards = CategoryStandards::with_overrides(&overrides).unwrap();
        assert_eq!(standards.bound(Category::Air, "aqi"), Some(FieldBound::new(0.0, 999.0)));
        assert_eq!(standards.bound(Category::Air, "pm10"), Some(FieldBound::new(0.0, 600.0)));
        assert_eq!(
            standards.bound(Category::Waste, "fill_level"),
            Some(FieldBound::new(0.0, 100.0))
        );
    }

    #[test]
    fn test_overrides_reject_bad_input() {
        let unknown = BTreeMap::from([("lava".to_string(), BTreeMap::new())]);
        assert!(CategoryStandards::with_overrides(&unknown).is_err());

        let inverted = BTreeMap::from([(
            "noise".to_string(),
            BTreeMap::from([("db".to_string(), [140.0, 0.0])]),
        )]);
        assert!(CategoryStandards::with_overrides(&inverted).is_err());
    }

    #[test]
    fn test_bound_display() {
        assert_eq!(FieldBound::new(0.0, 500.0).to_string(), "0-500");
        assert_eq!(FieldBound::new(0.0, 14.0).to_string(), "0-14");
    }
}
