//! Observation submission, listing and human review

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use envo_common::{Category, FieldValue, Observation, TrustTier};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::engine::ValidationStatus;
use crate::error::{ApiError, ApiResult};
use crate::store::{ListQuery, StoredObservation};
use crate::AppState;

/// Largest page returned by the listing endpoint
const MAX_PAGE: usize = 1000;

/// POST /api/observe request body
#[derive(Debug, Deserialize)]
pub struct ObservationRequest {
    #[serde(rename = "type")]
    pub category: String,
    pub value: f64,
    pub lat: f64,
    pub long: f64,
    #[serde(default)]
    pub details: Option<BTreeMap<String, FieldValue>>,
    #[serde(default)]
    pub is_expert: bool,
    #[serde(default)]
    pub location_name: Option<String>,
}

impl ObservationRequest {
    pub fn into_observation(self) -> ApiResult<(Observation, Option<String>)> {
        let category: Category = self.category.parse()?;
        if !self.value.is_finite() {
            return Err(ApiError::BadRequest("value must be a finite number".to_string()));
        }
        let observation = Observation {
            category,
            value: self.value,
            latitude: self.lat,
            longitude: self.long,
            details: self.details.unwrap_or_default(),
            trust_tier: TrustTier::from_expert_flag(self.is_expert),
        };
        Ok((observation, self.location_name))
    }
}

/// POST /api/observe
///
/// Validates the submission, stores it, and returns the stored record.
pub async fn submit_observation(
    State(state): State<AppState>,
    Json(request): Json<ObservationRequest>,
) -> ApiResult<(StatusCode, Json<StoredObservation>)> {
    let (observation, location_name) = request.into_observation()?;

    let outcome = state.engine.evaluate(&observation).await;
    let stored = state
        .store
        .insert(StoredObservation::new(observation, outcome, location_name))
        .await;

    info!(
        id = %stored.id,
        status = %stored.validation_status,
        "Observation stored"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub status: Option<String>,
}

/// GET /api/v1/data
pub async fn list_observations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<StoredObservation>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<ValidationStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let records = state
        .store
        .list(ListQuery {
            skip: params.skip,
            limit: params.limit.min(MAX_PAGE),
            status,
        })
        .await;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    pub is_valid: bool,
}

/// PUT /api/observations/:id/validate?is_valid=bool
pub async fn review_observation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ReviewParams>,
) -> ApiResult<Json<StoredObservation>> {
    let reviewed = state.store.review(id, params.is_valid).await?;
    info!(
        id = %id,
        status = %reviewed.validation_status,
        "Observation reviewed"
    );
    Ok(Json(reviewed))
}

pub fn observation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/observe", post(submit_observation))
        .route("/api/v1/data", get(list_observations))
        .route("/api/observations/:id/validate", put(review_observation))
}
