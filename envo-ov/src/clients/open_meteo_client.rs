//! Open-Meteo air-quality client
//!
//! Reference value is the current US AQI at the model grid cell nearest to
//! the submitted point. PM values ride along as metadata.

use super::{check_status, http_client};
use crate::types::{
    CollaboratorError, ReferenceMetadata, ReferenceProvider, ReferenceQuery, ReferenceReading,
};
use envo_common::geo::haversine_km;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const OPEN_METEO_BASE_URL: &str = "https://air-quality-api.open-meteo.com";

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    current: Option<CurrentAirQuality>,
}

#[derive(Debug, Deserialize)]
struct CurrentAirQuality {
    time: Option<String>,
    us_aqi: Option<f64>,
    pm10: Option<f64>,
    pm2_5: Option<f64>,
}

pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

fn reading(query: &ReferenceQuery, response: AirQualityResponse) -> Option<ReferenceReading> {
    let current = response.current?;

    let distance_km = match (response.latitude, response.longitude) {
        (Some(lat), Some(long)) => Some(haversine_km(query.latitude, query.longitude, lat, long)),
        _ => None,
    };

    let mut details = BTreeMap::new();
    if let Some(pm10) = current.pm10 {
        details.insert("pm10".to_string(), serde_json::json!(pm10));
    }
    if let Some(pm2_5) = current.pm2_5 {
        details.insert("pm2_5".to_string(), serde_json::json!(pm2_5));
    }
    if let Some(time) = current.time {
        details.insert("time".to_string(), serde_json::json!(time));
    }

    Some(ReferenceReading {
        value: current.us_aqi,
        metadata: ReferenceMetadata {
            provider: "Open-Meteo".to_string(),
            distance_km,
            sightings: None,
            details,
        },
    })
}

#[async_trait::async_trait]
impl ReferenceProvider for OpenMeteoClient {
    fn name(&self) -> &'static str {
        "Open-Meteo"
    }

    async fn fetch(&self, query: &ReferenceQuery) -> Result<Option<ReferenceReading>, CollaboratorError> {
        let url = format!("{}/v1/air-quality", self.base_url);
        debug!(lat = query.latitude, long = query.longitude, "Fetching Open-Meteo air quality");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", query.latitude.to_string()),
                ("longitude", query.longitude.to_string()),
                ("current", "us_aqi,pm10,pm2_5".to_string()),
            ])
            .send()
            .await?;
        let response = check_status(self.name(), response).await?;

        let body: AirQualityResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let reading = reading(query, body);
        if let Some(distance) = reading.as_ref().and_then(|r| r.metadata.distance_km) {
            if distance > query.radius_km {
                debug!(distance, radius = query.radius_km, "Nearest grid cell outside search radius");
                return Ok(None);
            }
        }
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envo_common::Category;

    fn query() -> ReferenceQuery {
        ReferenceQuery {
            category: Category::Air,
            latitude: 28.61,
            longitude: 77.21,
            radius_km: 25.0,
            max_results: 300,
        }
    }

    #[test]
    fn test_current_aqi_becomes_reference() {
        let body: AirQualityResponse = serde_json::from_str(
            r#"{"latitude": 28.6, "longitude": 77.2,
                "current": {"time": "2024-11-05T10:00", "us_aqi": 182, "pm10": 210.5, "pm2_5": 98.1}}"#,
        )
        .unwrap();
        let reading = reading(&query(), body).unwrap();
        assert_eq!(reading.value, Some(182.0));
        assert_eq!(reading.metadata.provider, "Open-Meteo");
        assert!(reading.metadata.distance_km.unwrap() < 2.0);
        assert_eq!(reading.metadata.details["pm10"], serde_json::json!(210.5));
    }

    #[test]
    fn test_missing_current_block_is_no_data() {
        let body: AirQualityResponse = serde_json::from_str(r#"{"latitude": 28.6}"#).unwrap();
        assert!(reading(&query(), body).is_none());
    }

    #[test]
    fn test_null_aqi_keeps_metadata_without_value() {
        let body: AirQualityResponse =
            serde_json::from_str(r#"{"current": {"us_aqi": null, "pm10": 40.0}}"#).unwrap();
        let reading = reading(&query(), body).unwrap();
        assert!(reading.value.is_none());
        assert!(reading.metadata.distance_km.is_none());
    }
}
