//! Decision outcome and audit evidence

use crate::ensemble::EnsembleVote;
use crate::types::{Justification, ReferenceMetadata};
use crate::validators::{CrossCheck, FieldRangeResult, GeoVerdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Terminal state of the decision cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    AcceptedPendingReview,
    Rejected,
}

/// Stored lifecycle status of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Auto,
    Pending,
    HumanVerified,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Auto => "auto",
            ValidationStatus::Pending => "pending",
            ValidationStatus::HumanVerified => "human_verified",
            ValidationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ValidationStatus::Auto),
            "pending" => Ok(ValidationStatus::Pending),
            "human_verified" => Ok(ValidationStatus::HumanVerified),
            "rejected" => Ok(ValidationStatus::Rejected),
            other => Err(format!("Unknown validation status: {}", other)),
        }
    }
}

/// Why an accepted observation still needs a human look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// No reference data was available to corroborate the value
    UnverifiedRegion,
    /// Expert submission disagreed with live reference data
    ReferenceConflict,
    /// Expert submission flagged by the outlier ensemble
    StatisticalOutlier,
    /// Ensemble could not be fitted or consulted
    ModelUnavailable,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewReason::UnverifiedRegion => "unverified region",
            ReviewReason::ReferenceConflict => "reference conflict",
            ReviewReason::StatisticalOutlier => "statistical outlier",
            ReviewReason::ModelUnavailable => "statistical model unavailable",
        })
    }
}

/// Everything the pipeline learned about one submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationEvidence {
    /// Per-field range results
    #[serde(default)]
    pub range: BTreeMap<String, FieldRangeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geospatial: Option<GeoVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_reference: Option<CrossCheck>,
    pub reference_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_source: Option<ReferenceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<EnsembleVote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<Justification>,
    #[serde(default)]
    pub review_reasons: Vec<ReviewReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ValidationEvidence {
    pub(crate) fn add_review_reason(&mut self, reason: ReviewReason) {
        if !self.review_reasons.contains(&reason) {
            self.review_reasons.push(reason);
        }
    }
}

/// Final per-submission result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub is_valid: bool,
    pub needs_review: bool,
    pub validation_status: ValidationStatus,
    pub verdict: Verdict,
    pub evidence: ValidationEvidence,
}

impl DecisionOutcome {
    /// Derive caller-facing flags from the terminal verdict
    ///
    /// An accepted observation with any review reason still needs review.
    pub fn new(verdict: Verdict, evidence: ValidationEvidence) -> Self {
        let (is_valid, needs_review) = match verdict {
            Verdict::Accepted => (true, !evidence.review_reasons.is_empty()),
            Verdict::AcceptedPendingReview => (true, true),
            Verdict::Rejected => (false, false),
        };
        let validation_status = match (is_valid, needs_review) {
            (false, _) => ValidationStatus::Rejected,
            (true, true) => ValidationStatus::Pending,
            (true, false) => ValidationStatus::Auto,
        };
        Self {
            is_valid,
            needs_review,
            validation_status,
            verdict,
            evidence,
        }
    }

    pub fn has_review_reason(&self, reason: ReviewReason) -> bool {
        self.evidence.review_reasons.contains(&reason)
    }

    /// Review reasons as human-readable text
    pub fn review_reason_text(&self) -> Vec<String> {
        self.evidence
            .review_reasons
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}
