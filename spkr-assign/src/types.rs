//! Core Types and Trait Definitions for spkr-assign
//!
//! Defines the evidence model and the provider traits that sit between the
//! Signal Collector and the outside world:
//! - **Evidence:** one typed, scored, optionally trust-qualified observation
//! - **Providers:** voice identification, conversation analysis, participant
//!   catalog, cross-source agreement
//! - **Results:** per-label assignment decisions with provenance
//!
//! # Architecture
//! Collector (providers → evidence) → Fusion (evidence → scores) →
//! Resolver (scores → decision)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Opaque candidate identity (speaker profile id)
pub type CandidateId = String;

/// Anonymous diarization label (e.g. "S1", "A")
pub type Label = String;

// ============================================================================
// Evidence
// ============================================================================

/// Kind of evidence linking a label to a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Voice-biometric similarity from the identification service
    BiometricMatch,
    /// Name mentioned in conversation, detected by the analysis service
    ContentNameDetection,
    /// Candidate is on the expected-participant list (weak prior)
    ExpectedParticipant,
    /// Several transcript sources corroborate the same candidate
    CrossSourceAgreement,
}

impl EvidenceKind {
    /// All kinds, in weight-table order
    pub const ALL: [EvidenceKind; 4] = [
        EvidenceKind::BiometricMatch,
        EvidenceKind::ContentNameDetection,
        EvidenceKind::ExpectedParticipant,
        EvidenceKind::CrossSourceAgreement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::BiometricMatch => "biometric_match",
            EvidenceKind::ContentNameDetection => "content_name_detection",
            EvidenceKind::ExpectedParticipant => "expected_participant",
            EvidenceKind::CrossSourceAgreement => "cross_source_agreement",
        }
    }
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How well verified a biometric sample/match is
///
/// Variant order is the trust order used by the minimum-trust filter:
/// `Invalidated < Low < Unknown < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Invalidated,
    Low,
    #[default]
    Unknown,
    Medium,
    High,
}

impl TrustLevel {
    /// Parse a trust string; anything unrecognized resolves to `Unknown`
    pub fn parse_lenient(value: Option<&str>) -> TrustLevel {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => TrustLevel::High,
            Some("medium") => TrustLevel::Medium,
            Some("low") => TrustLevel::Low,
            Some("invalidated") => TrustLevel::Invalidated,
            _ => TrustLevel::Unknown,
        }
    }

    /// Derive trust from the review status of the samples behind an embedding
    ///
    /// Any rejected sample invalidates the embedding. No samples at all is
    /// `Unknown`; otherwise all-reviewed is `High`, all-unreviewed is `Low`
    /// and a mix is `Medium`.
    pub fn from_sample_review(reviewed: usize, unreviewed: usize, rejected: usize) -> TrustLevel {
        if rejected > 0 {
            TrustLevel::Invalidated
        } else if reviewed == 0 && unreviewed == 0 {
            TrustLevel::Unknown
        } else if unreviewed == 0 {
            TrustLevel::High
        } else if reviewed == 0 {
            TrustLevel::Low
        } else {
            TrustLevel::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Invalidated => "invalidated",
            TrustLevel::Low => "low",
            TrustLevel::Unknown => "unknown",
            TrustLevel::Medium => "medium",
            TrustLevel::High => "high",
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrustLevel {
    type Err = String;

    /// Strict parse for user input (CLI/config); providers use [`TrustLevel::parse_lenient`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(TrustLevel::High),
            "medium" => Ok(TrustLevel::Medium),
            "low" => Ok(TrustLevel::Low),
            "invalidated" => Ok(TrustLevel::Invalidated),
            "unknown" => Ok(TrustLevel::Unknown),
            other => Err(format!(
                "invalid trust level '{}' (expected high, medium, low, unknown, invalidated)",
                other
            )),
        }
    }
}

/// Audit/display metadata attached to an evidence item
///
/// Never interpreted by fusion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Producing backend or source name
    pub source: String,

    /// Free-form detail (e.g. "member of expected list")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Quoted transcript text supporting the evidence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<String>,
}

impl Provenance {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            detail: None,
            quotes: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_quotes(mut self, quotes: Vec<String>) -> Self {
        self.quotes = quotes;
        self
    }
}

/// Clamp a provider score into [0, 1]; NaN becomes 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// A single piece of evidence tying one label to one candidate ("signal")
///
/// Constructors clamp `raw_score` into [0, 1]; fusion relies on that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub candidate_id: CandidateId,
    pub raw_score: f64,

    /// Only meaningful for `BiometricMatch`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<TrustLevel>,

    pub provenance: Provenance,
}

impl Evidence {
    pub fn biometric(
        candidate_id: impl Into<CandidateId>,
        similarity: f64,
        trust: TrustLevel,
        provenance: Provenance,
    ) -> Self {
        Self {
            kind: EvidenceKind::BiometricMatch,
            candidate_id: candidate_id.into(),
            raw_score: clamp_score(similarity),
            trust: Some(trust),
            provenance,
        }
    }

    pub fn content_name(
        candidate_id: impl Into<CandidateId>,
        confidence: f64,
        provenance: Provenance,
    ) -> Self {
        Self {
            kind: EvidenceKind::ContentNameDetection,
            candidate_id: candidate_id.into(),
            raw_score: clamp_score(confidence),
            trust: None,
            provenance,
        }
    }

    /// Weak prior: fixed anchor score for members of the expected list
    pub fn expected_participant(candidate_id: impl Into<CandidateId>, source: &str) -> Self {
        Self {
            kind: EvidenceKind::ExpectedParticipant,
            candidate_id: candidate_id.into(),
            raw_score: EXPECTED_PARTICIPANT_SCORE,
            trust: None,
            provenance: Provenance::new(source).with_detail("member of expected list"),
        }
    }

    pub fn cross_source_agreement(candidate_id: impl Into<CandidateId>, provenance: Provenance) -> Self {
        Self {
            kind: EvidenceKind::CrossSourceAgreement,
            candidate_id: candidate_id.into(),
            raw_score: 1.0,
            trust: None,
            provenance,
        }
    }

    /// Trust classification used for discounting (`Unknown` when absent)
    pub fn trust_or_unknown(&self) -> TrustLevel {
        self.trust.unwrap_or_default()
    }
}

/// Anchor score for expected-participant evidence
pub const EXPECTED_PARTICIPANT_SCORE: f64 = 0.5;

// ============================================================================
// Results
// ============================================================================

/// Qualitative strength of a fused score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Unassigned,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Unassigned => write!(f, "unassigned"),
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::High => write!(f, "high"),
        }
    }
}

/// Runner-up candidate with its fused score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub candidate_id: CandidateId,
    pub score: f64,
}

/// Decision for one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub label: Label,
    pub winner: Option<CandidateId>,
    pub confidence: ConfidenceTier,
    /// Top fused score, reported even when no winner was accepted
    pub score: f64,
    /// Input evidence referencing the accepted winner, in input order
    pub contributing_evidence: Vec<Evidence>,
    /// Remaining candidates, descending by score
    pub alternatives: Vec<Alternative>,
}

/// Why a label ended up the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Winner accepted
    Assigned,
    /// Evidence exists but the top score is under the acceptance threshold
    BelowThreshold,
    /// No evidence at all for this label
    NoSignal,
}

impl AssignmentResult {
    pub fn outcome(&self) -> ResolutionOutcome {
        if self.winner.is_some() {
            ResolutionOutcome::Assigned
        } else if self.alternatives.is_empty() {
            ResolutionOutcome::NoSignal
        } else {
            ResolutionOutcome::BelowThreshold
        }
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Audio span belonging to one label
#[derive(Debug, Clone)]
pub struct AudioSpan {
    pub audio_path: PathBuf,
    pub label: Label,
    /// (start_sec, end_sec) segments for this label
    pub segments: Vec<(f64, f64)>,
    /// Restrict candidate profiles to these tags (empty = all)
    pub tags: Vec<String>,
}

/// One biometric match reported by the identification service
#[derive(Debug, Clone, PartialEq)]
pub struct BiometricMatch {
    pub candidate_id: CandidateId,
    pub similarity: f64,
    pub trust: TrustLevel,
}

/// One name detection reported by the conversation-analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameDetection {
    pub label: Label,
    pub candidate_name: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence_quotes: Vec<String>,
}

/// Conversation presented to an analyzer
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Which transcript source this came from (file name or backend)
    pub source: String,
    /// `label: text` lines
    pub text: String,
    pub labels: Vec<Label>,
}

/// Recording context handed to the participant catalog
#[derive(Debug, Clone)]
pub struct RecordingContext {
    pub recording_id: String,
    pub audio_path: PathBuf,
}

/// Catalog answer: expected participants plus an optional context name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogContext {
    pub name: Option<String>,
    pub expected_participants: Vec<CandidateId>,
}

/// A label→candidate observation made from one transcript source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceObservation {
    pub source: String,
    pub label: Label,
    pub candidate_id: CandidateId,
}

/// Provider failure
///
/// Absorbed by the Signal Collector: the source contributes nothing and
/// assignment continues.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Binary missing, service unreachable, or not configured
    #[error("Provider not available: {0}")]
    Unavailable(String),

    /// Call exceeded its time budget
    #[error("Provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Provider ran but reported failure
    #[error("Provider failed: {0}")]
    Failed(String),

    /// Provider output could not be parsed
    #[error("Provider output parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability: identify candidates given audio
#[async_trait::async_trait]
pub trait VoiceIdentifier: Send + Sync {
    /// Backend name for provenance tracking
    fn name(&self) -> &str;

    async fn identify(&self, span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError>;
}

/// Capability: detect speaker names given a conversation
#[async_trait::async_trait]
pub trait ConversationAnalyzer: Send + Sync {
    /// Identity string (backend + model); also part of the cache key
    fn name(&self) -> &str;

    async fn analyze(&self, conversation: &Conversation) -> Result<Vec<NameDetection>, ProviderError>;
}

/// Capability: list expected participants for a recording
#[async_trait::async_trait]
pub trait ParticipantCatalog: Send + Sync {
    async fn lookup(&self, ctx: &RecordingContext) -> Result<CatalogContext, ProviderError>;
}

/// Capability: derive corroboration evidence from per-source observations
///
/// Pure meta-level signal; implementations must not call other providers.
pub trait AgreementDetector: Send + Sync {
    fn corroborate(&self, label: &str, observations: &[SourceObservation]) -> Vec<Evidence>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_parse_lenient_defaults_to_unknown() {
        assert_eq!(TrustLevel::parse_lenient(Some("HIGH")), TrustLevel::High);
        assert_eq!(TrustLevel::parse_lenient(Some(" medium ")), TrustLevel::Medium);
        assert_eq!(TrustLevel::parse_lenient(Some("verified")), TrustLevel::Unknown);
        assert_eq!(TrustLevel::parse_lenient(None), TrustLevel::Unknown);
    }

    #[test]
    fn test_trust_strict_parse_rejects_garbage() {
        assert_eq!("low".parse::<TrustLevel>(), Ok(TrustLevel::Low));
        assert!("bogus".parse::<TrustLevel>().is_err());
    }

    #[test]
    fn test_trust_order() {
        assert!(TrustLevel::Invalidated < TrustLevel::Low);
        assert!(TrustLevel::Low < TrustLevel::Unknown);
        assert!(TrustLevel::Unknown < TrustLevel::Medium);
        assert!(TrustLevel::Medium < TrustLevel::High);
    }

    #[test]
    fn test_trust_from_sample_review() {
        assert_eq!(TrustLevel::from_sample_review(2, 0, 0), TrustLevel::High);
        assert_eq!(TrustLevel::from_sample_review(1, 1, 0), TrustLevel::Medium);
        assert_eq!(TrustLevel::from_sample_review(0, 2, 0), TrustLevel::Low);
        assert_eq!(TrustLevel::from_sample_review(1, 1, 1), TrustLevel::Invalidated);
        assert_eq!(TrustLevel::from_sample_review(0, 0, 0), TrustLevel::Unknown);
    }

    #[test]
    fn test_constructors_clamp_scores() {
        let e = Evidence::content_name("alice", 1.7, Provenance::new("llm"));
        assert_eq!(e.raw_score, 1.0);

        let e = Evidence::biometric("alice", -0.2, TrustLevel::High, Provenance::new("voice"));
        assert_eq!(e.raw_score, 0.0);

        let e = Evidence::content_name("alice", f64::NAN, Provenance::new("llm"));
        assert_eq!(e.raw_score, 0.0);
    }

    #[test]
    fn test_expected_participant_anchor() {
        let e = Evidence::expected_participant("bob", "catalog");
        assert_eq!(e.raw_score, 0.5);
        assert_eq!(e.kind, EvidenceKind::ExpectedParticipant);
        assert_eq!(e.provenance.detail.as_deref(), Some("member of expected list"));
    }

    #[test]
    fn test_evidence_serializes_trust_only_when_present() {
        let e = Evidence::content_name("alice", 0.6, Provenance::new("llm"));
        let yaml = serde_yaml::to_string(&e).unwrap();
        assert!(yaml.contains("kind: content_name_detection"));
        assert!(!yaml.contains("trust"));

        let e = Evidence::biometric("alice", 0.9, TrustLevel::Medium, Provenance::new("voice"));
        let yaml = serde_yaml::to_string(&e).unwrap();
        assert!(yaml.contains("trust: medium"));
    }
}
