//! Per-recording assignment workflow
//!
//! 1. Parse primary and secondary transcripts (fatal on failure)
//! 2. Hash the audio into a recording id
//! 3. Collect evidence for every label
//! 4. Resolve every label
//! 5. Persist atomically (unless dry-run)
//!
//! Progress can be observed through an optional [`AssignEvent`] channel.

pub mod assigner;

pub use assigner::{AssignRequest, Assigner, LabelReport, RunReport};

use crate::types::{ConfidenceTier, ResolutionOutcome};
use std::path::PathBuf;

/// Progress events emitted during a run
#[derive(Debug, Clone, PartialEq)]
pub enum AssignEvent {
    /// Transcript parsed and recording identified
    RunStarted {
        recording_id: String,
        labels: usize,
    },

    /// One label decided
    LabelResolved {
        label: String,
        outcome: ResolutionOutcome,
        winner: Option<String>,
        confidence: ConfidenceTier,
        score: f64,
    },

    /// Record persisted
    Saved { path: PathBuf },
}
