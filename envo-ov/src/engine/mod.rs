//! Trust-Tiered Decision Engine
//!
//! Sequences the validators and the outlier ensemble for one submission and
//! applies the trust-tier policy:
//!
//! 1. Range check fails -> rejected, any tier
//! 2. Geospatial check and reference cross-check run concurrently
//!    - geospatial failure -> rejected, any tier
//!    - reference conflict -> standard rejected, expert escalated to review
//! 3. Outlier ensemble
//!    - inlier -> accepted (needs review when no reference was available)
//!    - outlier -> standard rejected, expert escalated to review
//!
//! Collaborator failures never decide an outcome; they are recorded in the
//! evidence and the step continues as "pass, unverifiable".

mod outcome;

pub use outcome::{DecisionOutcome, ReviewReason, ValidationEvidence, ValidationStatus, Verdict};

use crate::ensemble::{EnsembleVote, OutlierCheck};
use crate::justification::{KeywordJustifier, NO_EXTERNAL_SUPPORT};
use crate::standards::CategoryStandards;
use crate::types::{Justification, JustificationRequest, JustificationSource, NewsFeed};
use crate::validators::{validate_ranges, CrossValidator, GeospatialChecker};
use envo_common::Observation;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on each justification-related collaborator call
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one guarded step
enum Step {
    Continue,
    Terminal(Verdict),
}

pub struct DecisionEngine {
    standards: Arc<CategoryStandards>,
    geospatial: GeospatialChecker,
    cross_validator: CrossValidator,
    outliers: Arc<dyn OutlierCheck>,
    news: Option<Arc<dyn NewsFeed>>,
    justifier: Arc<dyn JustificationSource>,
    collaborator_timeout: Duration,
}

pub struct DecisionEngineBuilder {
    standards: Arc<CategoryStandards>,
    geospatial: GeospatialChecker,
    cross_validator: CrossValidator,
    outliers: Arc<dyn OutlierCheck>,
    news: Option<Arc<dyn NewsFeed>>,
    justifier: Arc<dyn JustificationSource>,
    collaborator_timeout: Duration,
}

impl DecisionEngineBuilder {
    pub fn standards(mut self, standards: Arc<CategoryStandards>) -> Self {
        self.standards = standards;
        self
    }

    pub fn geospatial(mut self, checker: GeospatialChecker) -> Self {
        self.geospatial = checker;
        self
    }

    pub fn cross_validator(mut self, validator: CrossValidator) -> Self {
        self.cross_validator = validator;
        self
    }

    pub fn news_feed(mut self, feed: Arc<dyn NewsFeed>) -> Self {
        self.news = Some(feed);
        self
    }

    pub fn justifier(mut self, justifier: Arc<dyn JustificationSource>) -> Self {
        self.justifier = justifier;
        self
    }

    pub fn collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    pub fn build(self) -> DecisionEngine {
        DecisionEngine {
            standards: self.standards,
            geospatial: self.geospatial,
            cross_validator: self.cross_validator,
            outliers: self.outliers,
            news: self.news,
            justifier: self.justifier,
            collaborator_timeout: self.collaborator_timeout,
        }
    }
}

impl DecisionEngine {
    /// Builder with built-in standards, offline geospatial checks, no
    /// reference providers, no news feed and the keyword justifier
    pub fn builder(outliers: Arc<dyn OutlierCheck>) -> DecisionEngineBuilder {
        DecisionEngineBuilder {
            standards: Arc::new(CategoryStandards::builtin()),
            geospatial: GeospatialChecker::offline(),
            cross_validator: CrossValidator::new(),
            outliers,
            news: None,
            justifier: Arc::new(KeywordJustifier::new()),
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Validate one submission; always produces a definite outcome
    pub async fn evaluate(&self, observation: &Observation) -> DecisionOutcome {
        let mut evidence = ValidationEvidence::default();
        let verdict = self.run(observation, &mut evidence).await;
        let outcome = DecisionOutcome::new(verdict, evidence);

        info!(
            category = %observation.category,
            tier = %observation.trust_tier,
            value = observation.value,
            verdict = ?outcome.verdict,
            status = %outcome.validation_status,
            "Observation evaluated"
        );
        outcome
    }

    async fn run(&self, observation: &Observation, evidence: &mut ValidationEvidence) -> Verdict {
        if let Step::Terminal(verdict) = self.range_step(observation, evidence) {
            return verdict;
        }
        if let Step::Terminal(verdict) = self.context_step(observation, evidence).await {
            return verdict;
        }
        self.ensemble_step(observation, evidence).await
    }

    fn range_step(&self, observation: &Observation, evidence: &mut ValidationEvidence) -> Step {
        let check = validate_ranges(&self.standards, observation.category, &observation.details);
        let message = check.message();
        evidence.range = check.report.clone();

        if check.passed() {
            debug!(message = %message, "Range check passed");
            return Step::Continue;
        }
        debug!(message = %message, "Range check failed");
        evidence.rejection_reason = Some(message);
        Step::Terminal(Verdict::Rejected)
    }

    /// Geospatial and reference checks
    async fn context_step(
        &self,
        observation: &Observation,
        evidence: &mut ValidationEvidence,
    ) -> Step {
        // Impossible locations are rejected before any outbound call
        if let Some(rejection) = self.geospatial.static_rejection(observation) {
            evidence.rejection_reason = Some(rejection.message.clone());
            evidence.geospatial = Some(rejection);
            return Step::Terminal(Verdict::Rejected);
        }

        let (geo, cross) = tokio::join!(
            self.geospatial.check(observation),
            self.cross_validator.check(observation)
        );

        let geo_passed = geo.passed;
        let geo_message = geo.message.clone();
        evidence.geospatial = Some(geo);
        evidence.reference_value = cross.reference_value;
        evidence.reference_source = cross.metadata.clone();
        let conflict = cross.is_conflict();
        let cross_message = cross.message.clone();
        evidence.cross_reference = Some(cross);

        if !geo_passed {
            evidence.rejection_reason = Some(geo_message);
            return Step::Terminal(Verdict::Rejected);
        }

        if conflict {
            if !observation.trust_tier.is_expert() {
                evidence.rejection_reason = Some(cross_message);
                return Step::Terminal(Verdict::Rejected);
            }
            evidence.add_review_reason(ReviewReason::ReferenceConflict);
            evidence.justification = Some(self.consult_justifier(observation).await);
            return Step::Terminal(Verdict::AcceptedPendingReview);
        }

        Step::Continue
    }

    async fn ensemble_step(
        &self,
        observation: &Observation,
        evidence: &mut ValidationEvidence,
    ) -> Verdict {
        let unverified = evidence.reference_value.is_none();

        let vote: EnsembleVote = match self.outliers.check(observation.feature_row()).await {
            Ok(vote) => vote,
            Err(e) => {
                warn!(error = %e, "Outlier ensemble unavailable, escalating to review");
                evidence.ensemble_error = Some(e.to_string());
                evidence.add_review_reason(ReviewReason::ModelUnavailable);
                if unverified {
                    evidence.add_review_reason(ReviewReason::UnverifiedRegion);
                }
                return Verdict::AcceptedPendingReview;
            }
        };
        let is_outlier = vote.is_outlier;
        let votes = vote.outlier_votes;
        evidence.ensemble = Some(vote);

        if !is_outlier {
            if unverified {
                evidence.add_review_reason(ReviewReason::UnverifiedRegion);
            }
            return Verdict::Accepted;
        }

        if !observation.trust_tier.is_expert() {
            evidence.rejection_reason = Some(format!(
                "Statistical outlier: flagged by {} of 3 models",
                votes
            ));
            return Verdict::Rejected;
        }

        evidence.add_review_reason(ReviewReason::StatisticalOutlier);
        if unverified {
            evidence.add_review_reason(ReviewReason::UnverifiedRegion);
        }
        evidence.justification = Some(self.consult_justifier(observation).await);
        Verdict::AcceptedPendingReview
    }

    /// Ask the news feed and justification source to explain an anomaly
    ///
    /// Any failure yields "not justified"; the caller's verdict is unchanged.
    async fn consult_justifier(&self, observation: &Observation) -> Justification {
        let news = match &self.news {
            Some(feed) => {
                let fetch = feed.recent_news(
                    observation.category,
                    observation.latitude,
                    observation.longitude,
                );
                match tokio::time::timeout(self.collaborator_timeout, fetch).await {
                    Ok(Ok(news)) => news,
                    Ok(Err(e)) => {
                        warn!(feed = feed.name(), error = %e, "News feed unavailable");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(feed = feed.name(), "News feed timed out");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let request = JustificationRequest {
            category: observation.category,
            latitude: observation.latitude,
            longitude: observation.longitude,
            value: observation.value,
            news,
        };

        match tokio::time::timeout(self.collaborator_timeout, self.justifier.justify(&request)).await {
            Ok(Ok(justification)) => justification,
            Ok(Err(e)) => {
                warn!(source = self.justifier.name(), error = %e, "Justification failed");
                Justification::not_justified(format!("{} ({})", NO_EXTERNAL_SUPPORT, e))
            }
            Err(_) => {
                warn!(source = self.justifier.name(), "Justification timed out");
                Justification::not_justified(format!("{} (timed out)", NO_EXTERNAL_SUPPORT))
            }
        }
    }
}
