//! Live Reference Cross-Validator
//!
//! Compares a submitted value with the nearest independent reference
//! measurement. Only categories with a registered provider are checked;
//! everything else passes with no reference value.

use crate::types::{CollaboratorError, ReferenceMetadata, ReferenceProvider, ReferenceQuery};
use envo_common::{Category, Observation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_RADIUS_KM: f64 = 25.0;
pub const DEFAULT_MAX_RESULTS: usize = 300;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum tolerated |submitted - reference| per category
pub fn default_threshold(category: Category) -> Option<f64> {
    match category {
        Category::Air => Some(100.0),
        Category::Biodiversity => Some(50.0),
        _ => None,
    }
}

/// Cross-reference outcome recorded in evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCheck {
    /// False only for a reference conflict
    pub accepted: bool,
    pub message: String,
    pub reference_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReferenceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

impl CrossCheck {
    fn no_reference(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
            reference_value: None,
            metadata: None,
            delta: None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        !self.accepted
    }
}

/// Registry of reference providers with per-category thresholds
pub struct CrossValidator {
    providers: HashMap<Category, Arc<dyn ReferenceProvider>>,
    thresholds: HashMap<Category, f64>,
    radius_km: f64,
    max_results: usize,
    timeout: Duration,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossValidator {
    /// Empty registry: every category passes with no reference
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            thresholds: HashMap::new(),
            radius_km: DEFAULT_RADIUS_KM,
            max_results: DEFAULT_MAX_RESULTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Register a provider using the category's default threshold
    ///
    /// Categories without a default threshold fall back to 100.
    pub fn with_provider(self, category: Category, provider: Arc<dyn ReferenceProvider>) -> Self {
        let threshold = default_threshold(category).unwrap_or(100.0);
        self.with_provider_threshold(category, provider, threshold)
    }

    pub fn with_provider_threshold(
        mut self,
        category: Category,
        provider: Arc<dyn ReferenceProvider>,
        threshold: f64,
    ) -> Self {
        self.providers.insert(category, provider);
        self.thresholds.insert(category, threshold);
        self
    }

    pub fn with_search(mut self, radius_km: f64, max_results: usize) -> Self {
        self.radius_km = radius_km;
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value compared against the reference
    ///
    /// The `aqi` detail when present and numeric, otherwise the summary value.
    pub fn submitted_value(observation: &Observation) -> f64 {
        observation.detail_or_value("aqi")
    }

    pub async fn check(&self, observation: &Observation) -> CrossCheck {
        let category = observation.category;
        let Some(provider) = self.providers.get(&category) else {
            return CrossCheck::no_reference(format!("No reference provider for {}", category));
        };

        let query = ReferenceQuery {
            category,
            latitude: observation.latitude,
            longitude: observation.longitude,
            radius_km: self.radius_km,
            max_results: self.max_results,
        };

        let fetched = match tokio::time::timeout(self.timeout, provider.fetch(&query)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(format!(
                "{} did not answer within {:?}",
                provider.name(),
                self.timeout
            ))),
        };

        let reading = match fetched {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                debug!(provider = provider.name(), "No reference data near location");
                return CrossCheck::no_reference(format!(
                    "No {} reference data within {} km",
                    provider.name(),
                    self.radius_km
                ));
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Reference provider unavailable");
                return CrossCheck::no_reference(format!("Reference unavailable: {}", e));
            }
        };

        let Some(reference) = reading.value else {
            return CrossCheck {
                metadata: Some(reading.metadata),
                ..CrossCheck::no_reference(format!("{} returned no comparable value", provider.name()))
            };
        };

        let submitted = Self::submitted_value(observation);
        let delta = (submitted - reference).abs();
        let threshold = self.thresholds.get(&category).copied().unwrap_or(100.0);
        let accepted = delta <= threshold;

        let message = if accepted {
            format!(
                "Consistent with {} reference {} (delta {:.1})",
                provider.name(),
                reference,
                delta
            )
        } else {
            format!(
                "Submitted {} conflicts with {} reference {} (delta {:.1} exceeds {})",
                submitted,
                provider.name(),
                reference,
                delta,
                threshold
            )
        };
        debug!(submitted, reference, delta, accepted, "Cross-reference compared");

        CrossCheck {
            accepted,
            message,
            reference_value: Some(reference),
            metadata: Some(reading.metadata),
            delta: Some(delta),
        }
    }
}
