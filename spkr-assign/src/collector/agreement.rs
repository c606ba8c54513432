//! Cross-source agreement
//!
//! Derived evidence: when independently produced transcripts of the same
//! recording each tie a label to the same candidate (through biometric or
//! content-name evidence), that candidate gets one corroboration item.
//!
//! This is the only producer of `cross_source_agreement` items. A richer
//! detector can replace it through [`AgreementDetector`] without touching
//! fusion.

use crate::types::{AgreementDetector, CandidateId, Evidence, Provenance, SourceObservation};
use std::collections::{BTreeMap, BTreeSet};

/// Distinct sources needed by default
pub const DEFAULT_MIN_SOURCES: usize = 2;

/// Agreement across transcript sources
#[derive(Debug, Clone, Copy)]
pub struct TranscriptAgreement {
    min_sources: usize,
}

impl Default for TranscriptAgreement {
    fn default() -> Self {
        Self {
            min_sources: DEFAULT_MIN_SOURCES,
        }
    }
}

impl TranscriptAgreement {
    /// `min_sources` below 2 would turn single observations into agreement
    pub fn new(min_sources: usize) -> Self {
        Self {
            min_sources: min_sources.max(2),
        }
    }
}

impl AgreementDetector for TranscriptAgreement {
    fn corroborate(&self, label: &str, observations: &[SourceObservation]) -> Vec<Evidence> {
        let mut sources: BTreeMap<&CandidateId, BTreeSet<&str>> = BTreeMap::new();
        for obs in observations.iter().filter(|o| o.label == label) {
            sources
                .entry(&obs.candidate_id)
                .or_default()
                .insert(obs.source.as_str());
        }

        sources
            .into_iter()
            .filter(|(_, srcs)| srcs.len() >= self.min_sources)
            .map(|(candidate, srcs)| {
                let detail = format!(
                    "agreed by {} sources: {}",
                    srcs.len(),
                    srcs.into_iter().collect::<Vec<_>>().join(", ")
                );
                Evidence::cross_source_agreement(
                    candidate.clone(),
                    Provenance::new("transcript_agreement").with_detail(detail),
                )
            })
            .collect()
    }
}
