//! Configuration for envo-ov
//!
//! Bootstrap configuration comes from a TOML file (see
//! [`envo_common::config::ConfigResolver`] for how the path is chosen) with
//! built-in defaults for every field. Secrets resolve ENV → TOML.

use crate::ensemble::EnsembleConfig;
use crate::standards::CategoryStandards;
use crate::validators::cross_reference::{DEFAULT_MAX_RESULTS, DEFAULT_RADIUS_KM};
use envo_common::config::LoggingConfig;
use envo_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 5731;

/// Environment variable holding the news API key
pub const NEWS_API_KEY_ENV: &str = "ENVO_NEWS_API_KEY";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_nominatim_url() -> String {
    crate::clients::nominatim_client::NOMINATIM_BASE_URL.to_string()
}

fn default_open_meteo_url() -> String {
    crate::clients::open_meteo_client::OPEN_METEO_BASE_URL.to_string()
}

fn default_gbif_url() -> String {
    crate::clients::gbif_client::GBIF_BASE_URL.to_string()
}

fn default_news_url() -> String {
    crate::clients::news_client::NEWS_API_BASE_URL.to_string()
}

fn default_geocode_timeout_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// `[providers]` section: external collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// When false, every collaborator is skipped (offline mode)
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,

    #[serde(default = "default_open_meteo_url")]
    pub open_meteo_url: String,

    #[serde(default = "default_gbif_url")]
    pub gbif_url: String,

    #[serde(default = "default_news_url")]
    pub news_url: String,

    /// NewsAPI key (overridden by ENVO_NEWS_API_KEY)
    #[serde(default)]
    pub news_api_key: Option<String>,

    #[serde(default = "default_geocode_timeout_secs")]
    pub geocode_timeout_secs: u64,

    /// Timeout for reference, news and justification calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_radius_km")]
    pub radius_km: f64,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nominatim_url: default_nominatim_url(),
            open_meteo_url: default_open_meteo_url(),
            gbif_url: default_gbif_url(),
            news_url: default_news_url(),
            news_api_key: None,
            geocode_timeout_secs: default_geocode_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            radius_km: default_radius_km(),
            max_results: default_max_results(),
        }
    }
}

impl ProvidersConfig {
    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocode_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Complete envo-ov TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub ensemble: EnsembleConfig,

    /// `[standards.<category>]` tables of `field = [min, max]`
    #[serde(default)]
    pub standards: BTreeMap<String, BTreeMap<String, [f64; 2]>>,
}

impl ServiceConfig {
    /// Built-in standards with the configured overrides applied
    pub fn category_standards(&self) -> Result<CategoryStandards> {
        CategoryStandards::with_overrides(&self.standards)
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the news API key
///
/// **Priority:** ENV → TOML. `None` disables news corroboration.
pub fn resolve_news_api_key(config: &ProvidersConfig) -> Option<String> {
    let env_key = std::env::var(NEWS_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = config.news_api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "News API key found in multiple sources: environment, TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("News API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("News API key loaded from TOML config");
        return Some(key);
    }

    warn!(
        "News API key not configured ({} or [providers] news_api_key); expert anomalies will be escalated without news corroboration",
        NEWS_API_KEY_ENV
    );
    None
}
