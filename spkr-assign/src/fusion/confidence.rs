//! Confidence Classifier
//!
//! Step function from fused score to qualitative tier. Independent of the
//! acceptance threshold: it describes how strong a score is, not whether it
//! was accepted.

use crate::types::ConfidenceTier;

/// Lower bound of the `high` tier
pub const HIGH_THRESHOLD: f64 = 0.7;
/// Lower bound of the `medium` tier
pub const MEDIUM_THRESHOLD: f64 = 0.4;
/// Lower bound of the `low` tier
pub const LOW_THRESHOLD: f64 = 0.2;

pub fn classify(score: f64) -> ConfidenceTier {
    if score >= HIGH_THRESHOLD {
        ConfidenceTier::High
    } else if score >= MEDIUM_THRESHOLD {
        ConfidenceTier::Medium
    } else if score >= LOW_THRESHOLD {
        ConfidenceTier::Low
    } else {
        ConfidenceTier::Unassigned
    }
}
