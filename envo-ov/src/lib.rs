//! envo-ov library interface
//!
//! Observation validation service: range, geospatial and reference checks,
//! a three-model outlier ensemble, and trust-tiered acceptance.

pub mod api;
pub mod clients;
pub mod config;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod justification;
pub mod standards;
pub mod store;
pub mod types;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use envo_common::Category;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::clients::{GbifClient, NewsApiClient, NominatimClient, OpenMeteoClient};
use crate::config::{resolve_news_api_key, ServiceConfig};
use crate::engine::DecisionEngine;
use crate::ensemble::OutlierEnsemble;
use crate::store::ObservationStore;
use crate::validators::{CrossValidator, GeospatialChecker};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    /// Shared with the engine; retrain swaps the snapshot both see
    pub ensemble: OutlierEnsemble,
    pub store: Arc<dyn ObservationStore>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        engine: DecisionEngine,
        ensemble: OutlierEnsemble,
        store: Arc<dyn ObservationStore>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            ensemble,
            store,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Wire the decision engine from configuration
///
/// With providers disabled the engine runs offline: static geography only,
/// no reference data, keyword justification without news.
pub fn build_engine(
    config: &ServiceConfig,
    ensemble: &OutlierEnsemble,
) -> anyhow::Result<DecisionEngine> {
    let standards = Arc::new(config.category_standards()?);
    let providers = &config.providers;
    let builder = DecisionEngine::builder(Arc::new(ensemble.clone()))
        .standards(standards)
        .collaborator_timeout(providers.request_timeout());

    if !providers.enabled {
        info!("External providers disabled, running offline");
        return Ok(builder.build());
    }

    let timeout = providers.request_timeout();
    let nominatim = NominatimClient::new(&providers.nominatim_url, providers.geocode_timeout())?;
    let geospatial =
        GeospatialChecker::new(Arc::new(nominatim)).with_timeout(providers.geocode_timeout());

    let cross_validator = CrossValidator::new()
        .with_provider(
            Category::Air,
            Arc::new(OpenMeteoClient::new(&providers.open_meteo_url, timeout)?),
        )
        .with_provider(
            Category::Biodiversity,
            Arc::new(GbifClient::new(&providers.gbif_url, timeout)?),
        )
        .with_search(providers.radius_km, providers.max_results)
        .with_timeout(timeout);

    let mut builder = builder.geospatial(geospatial).cross_validator(cross_validator);

    match resolve_news_api_key(providers) {
        Some(key) => {
            let news = NewsApiClient::new(&providers.news_url, key, timeout)?;
            builder = builder.news_feed(Arc::new(news));
        }
        None => info!("No news API key configured, expert justification uses keywords only"),
    }

    Ok(builder.build())
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::observation_routes())
        .merge(api::ml_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
