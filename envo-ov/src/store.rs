//! Observation store
//!
//! Persistence collaborator for validated observations. The pipeline never
//! touches the store; the API layer writes each outcome once and the human
//! review action mutates it later. [`MemoryObservationStore`] keeps records
//! in process memory, newest first.

use crate::engine::{DecisionOutcome, ValidationEvidence, ValidationStatus};
use crate::ensemble::FeatureRow;
use chrono::{DateTime, Utc};
use envo_common::{quality, Category, FieldValue, Observation, TrustTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Observation not found: {0}")]
    NotFound(Uuid),
}

/// Stored observation with its validation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObservation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub category: Category,
    pub value: f64,
    pub lat: f64,
    pub long: f64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub details: BTreeMap<String, FieldValue>,
    pub trust_tier: TrustTier,
    pub quality_label: String,
    pub color_code: String,
    pub health_msg: String,
    pub is_valid: bool,
    pub needs_review: bool,
    pub validation_status: ValidationStatus,
    pub validation_details: ValidationEvidence,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl StoredObservation {
    pub fn new(
        observation: Observation,
        outcome: DecisionOutcome,
        location_name: Option<String>,
    ) -> Self {
        let quality = quality::classify(observation.category, observation.value);
        // Prefer the resolved place name when the caller gave none
        let location_name = location_name.or_else(|| {
            outcome
                .evidence
                .geospatial
                .as_ref()
                .and_then(|g| g.location.clone())
        });

        Self {
            id: Uuid::new_v4(),
            category: observation.category,
            value: observation.value,
            lat: observation.latitude,
            long: observation.longitude,
            location_name,
            details: observation.details,
            trust_tier: observation.trust_tier,
            quality_label: quality.quality_label.to_string(),
            color_code: quality.color_code.to_string(),
            health_msg: quality.health_msg.to_string(),
            is_valid: outcome.is_valid,
            needs_review: outcome.needs_review,
            validation_status: outcome.validation_status,
            validation_details: outcome.evidence,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    pub fn feature_row(&self) -> FeatureRow {
        [self.value, self.lat, self.long]
    }
}

/// Listing filter
#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub skip: usize,
    pub limit: usize,
    pub status: Option<ValidationStatus>,
}

#[async_trait::async_trait]
pub trait ObservationStore: Send + Sync {
    async fn insert(&self, record: StoredObservation) -> StoredObservation;

    /// Newest first
    async fn list(&self, query: ListQuery) -> Vec<StoredObservation>;

    /// Human review: confirm (`true`) or reject (`false`)
    async fn review(&self, id: Uuid, is_valid: bool) -> Result<StoredObservation, StoreError>;

    /// Feature rows of every currently valid observation
    async fn valid_points(&self) -> Vec<FeatureRow>;

    async fn count(&self) -> usize;
}

#[derive(Default)]
pub struct MemoryObservationStore {
    records: RwLock<Vec<StoredObservation>>,
}

impl MemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ObservationStore for MemoryObservationStore {
    async fn insert(&self, record: StoredObservation) -> StoredObservation {
        self.records.write().await.push(record.clone());
        record
    }

    async fn list(&self, query: ListQuery) -> Vec<StoredObservation> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| query.status.map_or(true, |s| r.validation_status == s))
            .skip(query.skip)
            .take(query.limit)
            .cloned()
            .collect()
    }

    async fn review(&self, id: Uuid, is_valid: bool) -> Result<StoredObservation, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;

        record.is_valid = is_valid;
        record.needs_review = false;
        record.validation_status = if is_valid {
            ValidationStatus::HumanVerified
        } else {
            ValidationStatus::Rejected
        };
        record.reviewed_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn valid_points(&self) -> Vec<FeatureRow> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.is_valid)
            .map(StoredObservation::feature_row)
            .collect()
    }

    async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ValidationEvidence, Verdict};

    fn record(value: f64, verdict: Verdict) -> StoredObservation {
        StoredObservation::new(
            Observation::new(Category::Air, value, 20.0, 80.0),
            DecisionOutcome::new(verdict, ValidationEvidence::default()),
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_list_newest_first_with_filter() {
        let store = MemoryObservationStore::new();
        store.insert(record(10.0, Verdict::Accepted)).await;
        store.insert(record(20.0, Verdict::Rejected)).await;
        store.insert(record(30.0, Verdict::AcceptedPendingReview)).await;

        let all = store
            .list(ListQuery {
                skip: 0,
                limit: 10,
                status: None,
            })
            .await;
        assert_eq!(all.iter().map(|r| r.value).collect::<Vec<_>>(), vec![30.0, 20.0, 10.0]);

        let pending = store
            .list(ListQuery {
                skip: 0,
                limit: 10,
                status: Some(ValidationStatus::Pending),
            })
            .await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].value, 30.0);

        let paged = store
            .list(ListQuery {
                skip: 1,
                limit: 1,
                status: None,
            })
            .await;
        assert_eq!(paged[0].value, 20.0);
    }

    #[tokio::test]
    async fn test_review_sets_status_and_clears_flag() {
        let store = MemoryObservationStore::new();
        let stored = store.insert(record(30.0, Verdict::AcceptedPendingReview)).await;
        assert!(stored.needs_review);

        let reviewed = store.review(stored.id, true).await.unwrap();
        assert_eq!(reviewed.validation_status, ValidationStatus::HumanVerified);
        assert!(!reviewed.needs_review);
        assert!(reviewed.reviewed_at.is_some());

        let rejected = store.review(stored.id, false).await.unwrap();
        assert!(!rejected.is_valid);
        assert_eq!(rejected.validation_status, ValidationStatus::Rejected);

        assert!(matches!(
            store.review(Uuid::new_v4(), true).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_valid_points_skip_rejected() {
        let store = MemoryObservationStore::new();
        store.insert(record(10.0, Verdict::Accepted)).await;
        store.insert(record(20.0, Verdict::Rejected)).await;
        assert_eq!(store.valid_points().await, vec![[10.0, 20.0, 80.0]]);
        assert_eq!(store.count().await, 2);
    }

    #[test]
    fn test_quality_attached() {
        let stored = record(180.0, Verdict::Accepted);
        assert_eq!(stored.quality_label, quality::classify(Category::Air, 180.0).quality_label);
    }
}
