//! Collaborator Contracts for the Validation Pipeline
//!
//! The pipeline consumes external services only through the narrow traits in
//! this module. Every collaborator may fail; callers translate failures into
//! conservative "pass, unverifiable" outcomes instead of propagating them.
//!
//! # Collaborators
//! 1. [`LandLookup`] - reverse geocoding (is this point on land?)
//! 2. [`ReferenceProvider`] - independent reference measurement near a point
//! 3. [`NewsFeed`] - recent news summaries for a category and location
//! 4. [`JustificationSource`] - judges whether news explains an anomaly

use envo_common::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Collaborator failure
///
/// Every variant is non-fatal to the pipeline: it is absorbed by the calling
/// step and recorded in the evidence.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Remote service answered with an error status
    #[error("API error: {0}")]
    Api(String),

    /// Failed to parse the response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Collaborator not configured or not applicable
    #[error("Collaborator not available: {0}")]
    NotAvailable(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollaboratorError::Timeout(err.to_string())
        } else if err.is_decode() {
            CollaboratorError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            CollaboratorError::Api(format!("HTTP {}", status))
        } else {
            CollaboratorError::Network(err.to_string())
        }
    }
}

// ============================================================================
// Land / Geocode Lookup
// ============================================================================

/// Result of a reverse geocode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandInfo {
    /// True when the point resolves to a populated land area
    pub on_land: bool,
    /// Human-readable place description ("Chennai, India")
    pub description: String,
}

#[async_trait::async_trait]
pub trait LandLookup: Send + Sync {
    /// Provider name for provenance tracking
    fn name(&self) -> &'static str;

    async fn lookup(&self, lat: f64, long: f64) -> Result<LandInfo, CollaboratorError>;
}

// ============================================================================
// Reference Data Provider
// ============================================================================

/// Query for the nearest independent reference measurement
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceQuery {
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in kilometres
    pub radius_km: f64,
    /// Upper bound on records fetched from the provider
    pub max_results: usize,
}

/// Provenance of a reference value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    /// Provider name ("Open-Meteo", "GBIF")
    pub provider: String,
    /// Distance from the submitted point to the reference point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Number of sightings behind a density reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sightings: Option<u64>,
    /// Provider-specific extras (pm10, grid time, species list...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Reference measurement returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceReading {
    /// Comparable reference value; `None` when the provider had metadata but no value
    pub value: Option<f64>,
    pub metadata: ReferenceMetadata,
}

#[async_trait::async_trait]
pub trait ReferenceProvider: Send + Sync {
    /// Provider name for provenance tracking
    fn name(&self) -> &'static str;

    /// Fetch the nearest reference; `Ok(None)` means the provider has no data
    async fn fetch(&self, query: &ReferenceQuery) -> Result<Option<ReferenceReading>, CollaboratorError>;
}

// ============================================================================
// News and Justification
// ============================================================================

/// Short news item used as justification evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSummary {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait::async_trait]
pub trait NewsFeed: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recent news relevant to a category near a location
    async fn recent_news(
        &self,
        category: Category,
        lat: f64,
        long: f64,
    ) -> Result<Vec<NewsSummary>, CollaboratorError>;
}

/// Input to a justification judgement
#[derive(Debug, Clone, PartialEq)]
pub struct JustificationRequest {
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
    pub news: Vec<NewsSummary>,
}

/// Whether a known real-world event explains an anomalous value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justification {
    pub justified: bool,
    pub reason: String,
    #[serde(default)]
    pub event_type: Option<String>,
}

impl Justification {
    pub fn justified(reason: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            justified: true,
            reason: reason.into(),
            event_type: Some(event_type.into()),
        }
    }

    pub fn not_justified(reason: impl Into<String>) -> Self {
        Self {
            justified: false,
            reason: reason.into(),
            event_type: None,
        }
    }
}

#[async_trait::async_trait]
pub trait JustificationSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn justify(&self, request: &JustificationRequest) -> Result<Justification, CollaboratorError>;
}
