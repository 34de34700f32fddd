//! GBIF occurrence-search client
//!
//! Biodiversity reference: number of distinct species recorded within the
//! search radius. The search box is derived from the radius, then results
//! are filtered by great-circle distance.

use super::{check_status, http_client};
use crate::types::{
    CollaboratorError, ReferenceMetadata, ReferenceProvider, ReferenceQuery, ReferenceReading,
};
use envo_common::geo::{degree_extent, haversine_km};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

pub const GBIF_BASE_URL: &str = "https://api.gbif.org";

/// GBIF caps a single search page at 300 records
const GBIF_PAGE_LIMIT: usize = 300;

/// Species names kept in metadata
const SPECIES_SAMPLE: usize = 10;

#[derive(Debug, Deserialize)]
struct OccurrenceSearch {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    results: Vec<Occurrence>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Occurrence {
    species: Option<String>,
    scientific_name: Option<String>,
    decimal_latitude: Option<f64>,
    decimal_longitude: Option<f64>,
}

pub struct GbifClient {
    client: reqwest::Client,
    base_url: String,
}

impl GbifClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

fn reading(query: &ReferenceQuery, search: OccurrenceSearch) -> Option<ReferenceReading> {
    let mut species = BTreeSet::new();
    let mut nearest: Option<f64> = None;
    let mut within = 0u64;

    for occurrence in &search.results {
        let (Some(lat), Some(long)) = (occurrence.decimal_latitude, occurrence.decimal_longitude) else {
            continue;
        };
        let distance = haversine_km(query.latitude, query.longitude, lat, long);
        if distance > query.radius_km {
            continue;
        }
        within += 1;
        nearest = Some(nearest.map_or(distance, |d: f64| d.min(distance)));
        if let Some(name) = occurrence.species.as_ref().or(occurrence.scientific_name.as_ref()) {
            species.insert(name.clone());
        }
    }

    if within == 0 {
        return None;
    }

    let mut details = BTreeMap::new();
    details.insert("occurrences_in_radius".to_string(), serde_json::json!(within));
    details.insert(
        "species_sample".to_string(),
        serde_json::json!(species.iter().take(SPECIES_SAMPLE).collect::<Vec<_>>()),
    );

    Some(ReferenceReading {
        value: Some(species.len() as f64),
        metadata: ReferenceMetadata {
            provider: "GBIF".to_string(),
            distance_km: nearest,
            sightings: Some(search.count),
            details,
        },
    })
}

#[async_trait::async_trait]
impl ReferenceProvider for GbifClient {
    fn name(&self) -> &'static str {
        "GBIF"
    }

    async fn fetch(&self, query: &ReferenceQuery) -> Result<Option<ReferenceReading>, CollaboratorError> {
        let (d_lat, d_long) = degree_extent(query.latitude, query.radius_km);
        let limit = query.max_results.clamp(1, GBIF_PAGE_LIMIT);
        let url = format!("{}/v1/occurrence/search", self.base_url);
        debug!(lat = query.latitude, long = query.longitude, limit, "Searching GBIF occurrences");

        let response = self
            .client
            .get(&url)
            .query(&[
                (
                    "decimalLatitude",
                    format!("{},{}", query.latitude - d_lat, query.latitude + d_lat),
                ),
                (
                    "decimalLongitude",
                    format!("{},{}", query.longitude - d_long, query.longitude + d_long),
                ),
                ("hasCoordinate", "true".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let response = check_status(self.name(), response).await?;

        let search: OccurrenceSearch = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;
        Ok(reading(query, search))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envo_common::Category;

    fn query() -> ReferenceQuery {
        ReferenceQuery {
            category: Category::Biodiversity,
            latitude: 12.97,
            longitude: 77.59,
            radius_km: 25.0,
            max_results: 300,
        }
    }

    #[test]
    fn test_distinct_species_within_radius() {
        let search: OccurrenceSearch = serde_json::from_str(
            r#"{"count": 1520, "results": [
                {"species": "Corvus splendens", "decimalLatitude": 12.98, "decimalLongitude": 77.60},
                {"species": "Corvus splendens", "decimalLatitude": 12.95, "decimalLongitude": 77.58},
                {"scientificName": "Milvus migrans", "decimalLatitude": 13.00, "decimalLongitude": 77.55},
                {"species": "Far away", "decimalLatitude": 14.50, "decimalLongitude": 77.59},
                {"species": "No coordinates"}
            ]}"#,
        )
        .unwrap();

        let reading = reading(&query(), search).unwrap();
        assert_eq!(reading.value, Some(2.0));
        assert_eq!(reading.metadata.sightings, Some(1520));
        assert_eq!(reading.metadata.details["occurrences_in_radius"], serde_json::json!(3));
        assert!(reading.metadata.distance_km.unwrap() < 2.0);
    }

    #[test]
    fn test_no_occurrences_is_no_data() {
        let search: OccurrenceSearch = serde_json::from_str(r#"{"count": 0, "results": []}"#).unwrap();
        assert!(reading(&query(), search).is_none());
    }
}
