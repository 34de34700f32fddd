//! HTTP clients for external collaborators
//!
//! Each client implements one trait from [`crate::types`]. Response parsing
//! is split from the request so it can be tested against captured payloads.

pub mod gbif_client;
pub mod news_client;
pub mod nominatim_client;
pub mod open_meteo_client;

pub use gbif_client::GbifClient;
pub use news_client::NewsApiClient;
pub use nominatim_client::NominatimClient;
pub use open_meteo_client::OpenMeteoClient;

use crate::types::CollaboratorError;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("envo-ov/", env!("CARGO_PKG_VERSION"));

/// Shared client builder: user agent plus request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::Network(e.to_string()))
}

/// Map a non-success status to an API error, consuming the body for context
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(CollaboratorError::Api(format!(
        "{} returned HTTP {}: {}",
        provider, status, snippet
    )))
}
