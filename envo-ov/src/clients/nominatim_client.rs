//! Nominatim reverse-geocoding client
//!
//! Usage policy allows at most 1 request/second per application, enforced
//! with a `governor` rate limiter shared by all requests from this client.

use super::{check_status, http_client};
use crate::types::{CollaboratorError, LandInfo, LandLookup};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Place description used when the geocoder finds nothing at a point
const OPEN_WATER: &str = "open water";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    // Set for seas, bays and large lakes
    water: Option<String>,
    body_of_water: Option<String>,
}

pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl NominatimClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let quota = Quota::per_second(NonZeroU32::MIN);
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(quota),
        })
    }
}

fn land_info(response: ReverseResponse) -> LandInfo {
    if response.error.is_some() {
        return LandInfo {
            on_land: false,
            description: OPEN_WATER.to_string(),
        };
    }

    let address = response.address.unwrap_or_default();
    if let Some(water) = address.water.or(address.body_of_water) {
        return LandInfo {
            on_land: false,
            description: water,
        };
    }

    let place = address
        .city
        .or(address.town)
        .or(address.village)
        .or(address.county)
        .or(address.state);
    let description = match (place, address.country) {
        (Some(place), Some(country)) => format!("{}, {}", place, country),
        (Some(place), None) => place,
        (None, Some(country)) => country,
        (None, None) => response
            .display_name
            .unwrap_or_else(|| "unnamed land area".to_string()),
    };

    LandInfo {
        on_land: true,
        description,
    }
}

#[async_trait::async_trait]
impl LandLookup for NominatimClient {
    fn name(&self) -> &'static str {
        "Nominatim"
    }

    async fn lookup(&self, lat: f64, long: f64) -> Result<LandInfo, CollaboratorError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/reverse", self.base_url);
        debug!(lat, long, url = %url, "Reverse geocoding");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", long.to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await?;
        let response = check_status(self.name(), response).await?;

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;
        Ok(land_info(body))
    }
}
