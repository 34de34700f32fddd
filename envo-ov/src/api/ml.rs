//! Outlier ensemble management endpoints

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::ensemble::{EnsembleStatus, FitOutcome, MIN_TRAINING_ROWS};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RetrainResponse {
    /// "retrained" or "skipped"
    pub status: &'static str,
    pub rows: usize,
    pub message: String,
}

/// POST /api/ml/retrain
///
/// Refits the ensemble on every currently valid stored observation.
pub async fn retrain(State(state): State<AppState>) -> ApiResult<Json<RetrainResponse>> {
    let rows = state.store.valid_points().await;
    let ensemble = state.ensemble.clone();

    let result = tokio::task::spawn_blocking(move || ensemble.retrain(&rows))
        .await
        .map_err(|e| ApiError::Internal(format!("retrain task failed: {}", e)))?;

    match result {
        Ok(FitOutcome::Fitted { rows }) => {
            info!(rows, "Ensemble retrained from stored observations");
            Ok(Json(RetrainResponse {
                status: "retrained",
                rows,
                message: format!("Retrained on {} valid observations", rows),
            }))
        }
        Ok(FitOutcome::Skipped { rows }) => Ok(Json(RetrainResponse {
            status: "skipped",
            rows,
            message: format!(
                "Need at least {} valid observations to retrain (have {})",
                MIN_TRAINING_ROWS, rows
            ),
        })),
        Err(e) => {
            warn!(error = %e, "Ensemble retrain failed");
            *state.last_error.write().await = Some(format!("retrain failed: {}", e));
            Err(ApiError::from(e))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MlStatusResponse {
    #[serde(flatten)]
    pub ensemble: EnsembleStatus,
    pub stored_observations: usize,
}

/// GET /api/ml/status
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<MlStatusResponse>> {
    // Surface a poisoned lock instead of reporting "untrained"
    state.ensemble.snapshot()?;

    Ok(Json(MlStatusResponse {
        ensemble: state.ensemble.status(),
        stored_observations: state.store.count().await,
    }))
}

pub fn ml_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ml/retrain", post(retrain))
        .route("/api/ml/status", get(status))
}
