//! Geospatial Plausibility Checker
//!
//! Order of checks:
//! 1. Coordinate sanity (null island, WGS84 domain) - always fatal
//! 2. Category/region inconsistency rules - always fatal
//! 3. Land lookup through the geocode collaborator
//! 4. Service-area fallback when the collaborator is unreachable
//!
//! Only step 3 performs I/O. Collaborator failures never reject a submission.

use crate::types::{CollaboratorError, LandLookup};
use envo_common::geo::{self, BoundingBox};
use envo_common::{Category, Observation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for the land lookup
pub const DEFAULT_GEOCODE_TIMEOUT: Duration = Duration::from_secs(3);

/// Named desert boxes used by the soil moisture rule
pub const DESERTS: [BoundingBox; 3] = [
    BoundingBox::new("Thar Desert", 24.0, 30.0, 69.0, 76.0),
    BoundingBox::new("Sahara Desert", 15.0, 31.0, -17.0, 34.0),
    BoundingBox::new("Mojave Desert", 34.0, 37.5, -118.5, -114.0),
];

/// Hard category/region inconsistency rule
///
/// Rejects when `field` (or the summary value when the field is absent)
/// exceeds `max` inside any of `regions`.
#[derive(Debug, Clone, Copy)]
pub struct RegionRule {
    pub category: Category,
    pub field: &'static str,
    pub max: f64,
    pub regions: &'static [BoundingBox],
}

pub const REGION_RULES: [RegionRule; 1] = [RegionRule {
    category: Category::Soil,
    field: "moisture",
    max: 60.0,
    regions: &DESERTS,
}];

/// Geospatial verdict recorded in evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoVerdict {
    pub passed: bool,
    pub message: String,
    /// Place description from the geocoder or the matching service area
    #[serde(default)]
    pub location: Option<String>,
    /// False when the decision fell back to offline data
    pub verified: bool,
}

impl GeoVerdict {
    fn reject(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            location: None,
            verified: true,
        }
    }
}

pub struct GeospatialChecker {
    lookup: Option<Arc<dyn LandLookup>>,
    timeout: Duration,
}

impl GeospatialChecker {
    pub fn new(lookup: Arc<dyn LandLookup>) -> Self {
        Self {
            lookup: Some(lookup),
            timeout: DEFAULT_GEOCODE_TIMEOUT,
        }
    }

    /// Checker without a geocoder: always uses the service-area fallback
    pub fn offline() -> Self {
        Self {
            lookup: None,
            timeout: DEFAULT_GEOCODE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rejections decidable without I/O
    ///
    /// Returns `Some(verdict)` only for fatal findings.
    pub fn static_rejection(&self, observation: &Observation) -> Option<GeoVerdict> {
        let (lat, long) = (observation.latitude, observation.longitude);

        if geo::is_null_island(lat, long) {
            return Some(GeoVerdict::reject(
                "Coordinates (0, 0) indicate no location was provided",
            ));
        }
        if !geo::is_valid_coordinate(lat, long) {
            return Some(GeoVerdict::reject(format!(
                "Coordinates ({}, {}) are outside the valid latitude/longitude range",
                lat, long
            )));
        }

        for rule in REGION_RULES.iter().filter(|r| r.category == observation.category) {
            let value = observation.detail_or_value(rule.field);
            if value <= rule.max {
                continue;
            }
            if let Some(region) = rule.regions.iter().find(|r| r.contains(lat, long)) {
                return Some(GeoVerdict::reject(format!(
                    "{} {} of {} is implausible inside the {}",
                    observation.category, rule.field, value, region.name
                )));
            }
        }

        None
    }

    /// Full plausibility check (may perform one outbound lookup)
    pub async fn check(&self, observation: &Observation) -> GeoVerdict {
        if let Some(rejection) = self.static_rejection(observation) {
            return rejection;
        }

        let (lat, long) = (observation.latitude, observation.longitude);
        let Some(lookup) = &self.lookup else {
            return Self::fallback(lat, long, "no geocoder configured");
        };

        let result = match tokio::time::timeout(self.timeout, lookup.lookup(lat, long)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(format!(
                "{} lookup exceeded {:?}",
                lookup.name(),
                self.timeout
            ))),
        };

        match result {
            Ok(info) if info.on_land => {
                debug!(location = %info.description, "Location resolved to land");
                GeoVerdict {
                    passed: true,
                    message: format!("Location verified: {}", info.description),
                    location: Some(info.description),
                    verified: true,
                }
            }
            Ok(info) if observation.category == Category::Water => GeoVerdict {
                passed: true,
                message: format!("Water sample over open water: {}", info.description),
                location: Some(info.description),
                verified: true,
            },
            Ok(info) => GeoVerdict {
                passed: false,
                message: format!(
                    "Location does not resolve to land ({}) for a {} observation",
                    info.description, observation.category
                ),
                location: Some(info.description),
                verified: true,
            },
            Err(e) => {
                warn!(error = %e, "Land lookup unavailable, using service-area fallback");
                Self::fallback(lat, long, &e.to_string())
            }
        }
    }

    fn fallback(lat: f64, long: f64, cause: &str) -> GeoVerdict {
        match geo::service_area_for(lat, long) {
            Some(area) => GeoVerdict {
                passed: true,
                message: format!("Within {} service area ({})", area.name, cause),
                location: Some(area.name.to_string()),
                verified: false,
            },
            None => GeoVerdict {
                passed: true,
                message: format!("Plausible but unverifiable ({})", cause),
                location: None,
                verified: false,
            },
        }
    }
}
