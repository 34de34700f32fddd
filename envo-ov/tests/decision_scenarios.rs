//! End-to-end decisions with the real outlier ensemble
//!
//! Collaborators are offline or stubbed; the ensemble is cold-started on
//! synthetic data with a fixed seed, so every outcome here is deterministic.

use envo_common::{Category, Observation, TrustTier};
use envo_ov::engine::{DecisionEngine, ReviewReason, ValidationStatus, Verdict};
use envo_ov::ensemble::{EnsembleConfig, FitOutcome, OutlierEnsemble};
use envo_ov::types::{CollaboratorError, NewsFeed, NewsSummary};
use std::sync::Arc;

fn small_config() -> EnsembleConfig {
    EnsembleConfig {
        samples_per_region: 300,
        ..EnsembleConfig::default()
    }
}

fn offline_engine(ensemble: &OutlierEnsemble) -> DecisionEngine {
    DecisionEngine::builder(Arc::new(ensemble.clone())).build()
}

struct DustStormNews;

#[async_trait::async_trait]
impl NewsFeed for DustStormNews {
    fn name(&self) -> &'static str {
        "dust-storm"
    }

    async fn recent_news(
        &self,
        _category: Category,
        _lat: f64,
        _long: f64,
    ) -> Result<Vec<NewsSummary>, CollaboratorError> {
        Ok(vec![NewsSummary {
            title: "Severe dust storm sweeps across central India".to_string(),
            description: Some("Visibility drops as winds carry dust from Rajasthan".to_string()),
            source: Some("Daily Wire Service".to_string()),
            published_at: None,
            url: None,
        }])
    }
}

#[tokio::test]
async fn test_typical_reading_is_inlier_pending_region_review() {
    let ensemble = OutlierEnsemble::with_seed_points(small_config(), Vec::new());
    let engine = offline_engine(&ensemble);

    let obs = Observation::new(Category::Air, 45.0, 23.0, 83.0);
    let outcome = engine.evaluate(&obs).await;

    assert_eq!(outcome.verdict, Verdict::Accepted);
    assert!(outcome.is_valid);
    let vote = outcome.evidence.ensemble.as_ref().unwrap();
    assert!(!vote.is_outlier);
    // No reference provider for offline air readings
    assert!(outcome.has_review_reason(ReviewReason::UnverifiedRegion));
    assert_eq!(outcome.validation_status, ValidationStatus::Pending);
    assert!(ensemble.is_fitted());
}

#[tokio::test]
async fn test_extreme_reading_rejected_for_standard_tier() {
    let ensemble = OutlierEnsemble::with_seed_points(small_config(), Vec::new());
    let engine = offline_engine(&ensemble);

    let obs = Observation::new(Category::Air, 1000.0, 23.0, 83.0);
    let outcome = engine.evaluate(&obs).await;

    assert_eq!(outcome.verdict, Verdict::Rejected);
    assert!(!outcome.is_valid);
    assert_eq!(outcome.validation_status, ValidationStatus::Rejected);
    let reason = outcome.evidence.rejection_reason.unwrap();
    assert!(reason.starts_with("Statistical outlier: flagged by"), "{}", reason);
}

#[tokio::test]
async fn test_extreme_expert_reading_with_dust_storm_goes_to_review() {
    let ensemble = OutlierEnsemble::with_seed_points(small_config(), Vec::new());
    let engine = DecisionEngine::builder(Arc::new(ensemble.clone()))
        .news_feed(Arc::new(DustStormNews))
        .build();

    let obs = Observation::new(Category::Air, 1000.0, 23.0, 83.0).with_tier(TrustTier::Expert);
    let outcome = engine.evaluate(&obs).await;

    assert_eq!(outcome.verdict, Verdict::AcceptedPendingReview);
    assert!(outcome.is_valid);
    assert!(outcome.needs_review);
    assert!(outcome.has_review_reason(ReviewReason::StatisticalOutlier));

    let justification = outcome.evidence.justification.unwrap();
    assert!(justification.justified);
    assert_eq!(justification.event_type.as_deref(), Some("dust storm"));
}

#[tokio::test]
async fn test_same_seed_same_decisions() {
    let readings = [45.0, 120.0, 400.0, 1000.0];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let ensemble = OutlierEnsemble::with_seed_points(small_config(), Vec::new());
        let engine = offline_engine(&ensemble);
        let mut votes = Vec::new();
        for value in readings {
            let outcome = engine
                .evaluate(&Observation::new(Category::Air, value, 23.0, 83.0))
                .await;
            votes.push(outcome.evidence.ensemble.map(|v| v.flags));
        }
        runs.push(votes);
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_small_retrain_keeps_cold_start_behaviour() {
    let ensemble = OutlierEnsemble::with_seed_points(small_config(), Vec::new());
    let outcome = ensemble.retrain(&[[45.0, 23.0, 83.0]; 5]).unwrap();
    assert_eq!(outcome, FitOutcome::Skipped { rows: 5 });
    assert!(!ensemble.is_fitted());

    // First evaluation cold-starts the ensemble on demand
    let engine = offline_engine(&ensemble);
    let outcome = engine
        .evaluate(&Observation::new(Category::Air, 45.0, 23.0, 83.0))
        .await;
    assert!(outcome.evidence.ensemble.is_some());
    assert!(ensemble.is_fitted());
}

#[tokio::test]
async fn test_range_rejection_never_reaches_ensemble() {
    let ensemble = OutlierEnsemble::with_seed_points(small_config(), Vec::new());
    let engine = offline_engine(&ensemble);

    let obs = Observation::new(Category::Water, 7.0, 23.0, 83.0)
        .with_detail("pH", 15.0)
        .with_tier(TrustTier::Expert);
    let outcome = engine.evaluate(&obs).await;

    assert_eq!(outcome.verdict, Verdict::Rejected);
    assert!(outcome.evidence.ensemble.is_none());
    assert!(!ensemble.is_fitted());
}
