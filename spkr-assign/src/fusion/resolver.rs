//! Assignment Resolver
//!
//! Turns the evidence for one label into a decision:
//! 1. Fuse evidence into candidate scores
//! 2. Rank candidates (score descending, ties broken by candidate id ascending)
//! 3. Accept the top candidate if its score clears the acceptance threshold
//! 4. Attach contributing evidence and ranked alternatives
//!
//! # Tie-break
//! Candidates with bit-identical top scores are ordered by lexicographic
//! (byte-wise) candidate id, so "alice" beats "bob". The rule only has to be
//! deterministic; lexicographic order is stable across runs and platforms.
//!
//! # Example
//! ```rust,ignore
//! use spkr_assign::fusion::{AssignmentResolver, EngineConfig};
//!
//! let resolver = AssignmentResolver::new(EngineConfig::with_threshold(0.4)?);
//! let result = resolver.resolve("S1", &evidence);
//! // Single high-trust biometric at 1.0 → score 0.4 → accepted, tier medium
//! ```

use super::signal_fuser::contribution;
use super::{classify, fuse, EngineConfig};
use crate::error::{AssignError, AssignResult};
use crate::types::{Alternative, AssignmentResult, CandidateId, ConfidenceTier, Evidence};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Minimum fused score required to commit to a winner
///
/// Always within [0, 1]; construction is the only validation point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct AcceptanceThreshold(f64);

impl AcceptanceThreshold {
    pub fn new(value: f64) -> AssignResult<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(AssignError::Config(format!(
                "acceptance threshold must be within [0, 1], got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for AcceptanceThreshold {
    type Error = AssignError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AcceptanceThreshold> for f64 {
    fn from(threshold: AcceptanceThreshold) -> f64 {
        threshold.0
    }
}

/// Score descending, then candidate id ascending
fn rank(a: &(CandidateId, f64), b: &(CandidateId, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Stateless per-label resolver
///
/// Holds only immutable configuration; share it freely across tasks.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentResolver {
    config: EngineConfig,
}

impl AssignmentResolver {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve one label from its evidence
    ///
    /// Cannot fail: configuration was validated at construction and provider
    /// failures were absorbed upstream.
    pub fn resolve(&self, label: &str, evidence: &[Evidence]) -> AssignmentResult {
        let scores = fuse(evidence, &self.config.weights, &self.config.trust);

        if scores.is_empty() {
            debug!(label = label, "No evidence; label unassigned");
            return AssignmentResult {
                label: label.to_string(),
                winner: None,
                confidence: ConfidenceTier::Unassigned,
                score: 0.0,
                contributing_evidence: vec![],
                alternatives: vec![],
            };
        }

        let mut ranked: Vec<(CandidateId, f64)> = scores.into_iter().collect();
        ranked.sort_by(rank);

        let (top_candidate, top_score) = ranked[0].clone();
        let threshold = self.config.acceptance_threshold.value();

        if top_score >= threshold {
            let contributing_evidence: Vec<Evidence> = evidence
                .iter()
                .filter(|item| item.candidate_id == top_candidate)
                .filter(|item| {
                    contribution(item, &self.config.weights, &self.config.trust) != 0.0
                })
                .cloned()
                .collect();
            let alternatives = ranked
                .into_iter()
                .skip(1)
                .map(|(candidate_id, score)| Alternative { candidate_id, score })
                .collect();
            let confidence = classify(top_score);

            debug!(
                label = label,
                candidate = %top_candidate,
                score = top_score,
                tier = %confidence,
                "Label assigned"
            );

            AssignmentResult {
                label: label.to_string(),
                winner: Some(top_candidate),
                confidence,
                score: top_score,
                contributing_evidence,
                alternatives,
            }
        } else {
            debug!(
                label = label,
                candidate = %top_candidate,
                score = top_score,
                threshold = threshold,
                "Top candidate below acceptance threshold"
            );

            AssignmentResult {
                label: label.to_string(),
                winner: None,
                confidence: ConfidenceTier::Unassigned,
                score: top_score,
                contributing_evidence: vec![],
                alternatives: ranked
                    .into_iter()
                    .map(|(candidate_id, score)| Alternative { candidate_id, score })
                    .collect(),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
