//! Signal Fusion
//!
//! Weighted multi-source scoring:
//! ```text
//! score(candidate) = Σ weight(kind) × trust_multiplier(item) × raw_score
//! ```
//! where `trust_multiplier` applies only to `biometric_match` items and is
//! 1.0 for every other kind.
//!
//! Precondition: every `raw_score` is already clamped to [0, 1] (the
//! [`Evidence`] constructors and the collector guarantee this). With
//! non-negative weights and multipliers the score is monotonic: adding an
//! item never lowers its candidate's score.

use super::{TrustMultipliers, WeightTable};
use crate::types::{CandidateId, Evidence, EvidenceKind};
use std::collections::BTreeMap;

/// Contribution of a single evidence item
pub fn contribution(item: &Evidence, weights: &WeightTable, trust: &TrustMultipliers) -> f64 {
    let multiplier = match item.kind {
        EvidenceKind::BiometricMatch => trust.multiplier(item.trust_or_unknown()),
        _ => 1.0,
    };
    weights.weight(item.kind) * multiplier * item.raw_score
}

/// Fuse evidence into a score per candidate
///
/// Deterministic: items are summed in input order and the map is ordered by
/// candidate id. Items contributing exactly 0 are skipped, so a candidate
/// backed only by such items (e.g. invalidated voice profiles) never appears.
/// Empty input yields an empty map.
pub fn fuse(
    evidence: &[Evidence],
    weights: &WeightTable,
    trust: &TrustMultipliers,
) -> BTreeMap<CandidateId, f64> {
    let mut scores: BTreeMap<CandidateId, f64> = BTreeMap::new();
    for item in evidence {
        let value = contribution(item, weights, trust);
        if value == 0.0 {
            continue;
        }
        *scores.entry(item.candidate_id.clone()).or_insert(0.0) += value;
    }
    scores
}
