//! Integration tests for envo-ov API endpoints
//!
//! Providers are disabled, so every request runs offline against the
//! in-memory store.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use envo_ov::config::ServiceConfig;
use envo_ov::ensemble::{EnsembleConfig, OutlierEnsemble};
use envo_ov::store::MemoryObservationStore;
use envo_ov::{build_engine, build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn create_test_app() -> axum::Router {
    let mut config = ServiceConfig::default();
    config.providers.enabled = false;
    config.ensemble = EnsembleConfig {
        samples_per_region: 200,
        warm_start: false,
        ..EnsembleConfig::default()
    };

    let ensemble = OutlierEnsemble::with_seed_points(config.ensemble.clone(), Vec::new());
    let engine = build_engine(&config, &ensemble).unwrap();
    let state = AppState::new(engine, ensemble, Arc::new(MemoryObservationStore::new()));
    build_router(state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "envo-ov");
    assert_eq!(body["ensemble_trained"], false);
}

#[tokio::test]
async fn test_submit_range_violation_is_stored_rejected() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        post_json(
            "/api/observe",
            json!({"type": "water", "value": 7.0, "lat": 23.0, "long": 83.0,
                   "details": {"pH": 15}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "water");
    assert_eq!(body["is_valid"], false);
    assert_eq!(body["validation_status"], "rejected");
    assert!(body["validation_details"]["rejection_reason"]
        .as_str()
        .unwrap()
        .contains("out of scientific range"));
}

#[tokio::test]
async fn test_submit_list_and_review() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        post_json(
            "/api/observe",
            json!({"type": "aqi", "value": 45, "lat": 23.0, "long": 83.0,
                   "location_name": "Jabalpur"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["location_name"], "Jabalpur");
    assert_eq!(body["is_valid"], true);
    // Offline: no reference data, so the accepted reading waits for review
    assert_eq!(body["validation_status"], "pending");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, listed) = send(&app, get("/api/v1/data?status=pending")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let review = Request::builder()
        .method("PUT")
        .uri(format!("/api/observations/{}/validate?is_valid=true", id))
        .body(Body::empty())
        .unwrap();
    let (status, reviewed) = send(&app, review).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["validation_status"], "human_verified");
    assert_eq!(reviewed["needs_review"], false);

    let (_, pending) = send(&app, get("/api/v1/data?status=pending")).await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_category_is_bad_request() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        post_json("/api/observe", json!({"type": "lava", "value": 1, "lat": 23.0, "long": 83.0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_status_filter_is_bad_request() {
    let app = create_test_app();
    let (status, _) = send(&app, get("/api/v1/data?status=maybe")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_review_unknown_observation_is_not_found() {
    let app = create_test_app();
    let review = Request::builder()
        .method("PUT")
        .uri(format!(
            "/api/observations/{}/validate?is_valid=false",
            uuid::Uuid::new_v4()
        ))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, review).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_retrain_skips_with_too_few_valid_rows() {
    let app = create_test_app();
    let (status, body) = send(&app, post_json("/api/ml/retrain", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "skipped");
    assert_eq!(body["rows"], 0);

    let (status, body) = send(&app, get("/api/ml/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "untrained");
    assert_eq!(body["majority"], 2);
    assert_eq!(body["stored_observations"], 0);
}

#[tokio::test]
async fn test_retrain_on_stored_valid_observations() {
    let app = create_test_app();
    for i in 0..12 {
        let (status, _) = send(
            &app,
            post_json(
                "/api/observe",
                json!({"type": "air", "value": 40 + i, "lat": 22.0 + 0.2 * i as f64, "long": 80.0 + 0.3 * i as f64}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, post_json("/api/ml/retrain", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "retrained");

    let (_, status_body) = send(&app, get("/api/ml/status")).await;
    assert_eq!(status_body["state"], "trained");
    assert_eq!(status_body["training_rows"], body["rows"]);
}
