//! Signal Collector
//!
//! Queries the evidence providers for every label of a recording and
//! normalizes their answers into [`Evidence`] items:
//! 1. **biometric_match** - voice identifier, once per label audio span
//! 2. **content_name_detection** - conversation analyzer, once per transcript
//! 3. **expected_participant** - configured list plus catalog entry
//! 4. **cross_source_agreement** - derived from 1 and 2 across transcripts
//!
//! # Degradation
//! A disabled source, a missing provider, a provider error and a timeout all
//! have the same effect: that source contributes nothing. The failure is
//! logged and reported in [`CollectedEvidence::failures`]; it never aborts
//! the run. Providers run concurrently and collection only returns once
//! every call has finished or timed out.
//!
//! # Trust filter
//! Biometric matches whose trust is strictly below `min_trust` are dropped
//! here, before fusion. A match exactly at `min_trust` is kept.

pub mod agreement;
pub mod biometric;
pub mod cache;
pub mod catalog;
pub mod content;
pub mod names;

pub use agreement::TranscriptAgreement;
pub use biometric::CommandIdentifier;
pub use cache::CachedAnalyzer;
pub use catalog::CatalogDirectory;
pub use content::CommandAnalyzer;
pub use names::NameResolver;

use crate::error::{AssignError, AssignResult};
use crate::transcript::{Transcript, DEFAULT_MAX_GAP, DEFAULT_MIN_SEGMENT};
use crate::types::{
    AgreementDetector, AudioSpan, BiometricMatch, CandidateId, CatalogContext,
    ConversationAnalyzer, Evidence, EvidenceKind, Label, NameDetection, ParticipantCatalog,
    Provenance, ProviderError, RecordingContext, SourceObservation, TrustLevel, VoiceIdentifier,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Secondary transcripts that are not the primary and not repeated
///
/// A transcript counts once per path; a repeat would be double-counted as
/// direct evidence and could never corroborate itself.
fn distinct_secondaries<'a>(primary: &Transcript, secondary: &'a [Transcript]) -> Vec<&'a Transcript> {
    let mut distinct: Vec<&Transcript> = Vec::with_capacity(secondary.len());
    for transcript in secondary {
        let repeated = transcript.path() == primary.path()
            || distinct.iter().any(|t| t.path() == transcript.path());
        if repeated {
            debug!(
                transcript = %transcript.path().display(),
                "Duplicate secondary transcript ignored"
            );
            continue;
        }
        distinct.push(transcript);
    }
    distinct
}

/// Default per-call provider time budget
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Which evidence sources are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceToggles {
    pub biometric: bool,
    pub content: bool,
    pub expected: bool,
    pub agreement: bool,
}

impl Default for SourceToggles {
    fn default() -> Self {
        Self {
            biometric: true,
            content: true,
            expected: true,
            agreement: true,
        }
    }
}

impl SourceToggles {
    pub fn is_enabled(&self, kind: EvidenceKind) -> bool {
        match kind {
            EvidenceKind::BiometricMatch => self.biometric,
            EvidenceKind::ContentNameDetection => self.content,
            EvidenceKind::ExpectedParticipant => self.expected,
            EvidenceKind::CrossSourceAgreement => self.agreement,
        }
    }
}

/// Per-run collector configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub sources: SourceToggles,
    /// Hard filter on biometric matches (inclusive)
    pub min_trust: TrustLevel,
    /// Expected participants supplied by the caller; merged with the catalog
    pub expected_participants: Vec<CandidateId>,
    /// Restrict biometric candidates to profiles with these tags
    pub tags: Vec<String>,
    pub names: NameResolver,
    pub provider_timeout: Duration,
    /// Label spans shorter than this are not sent for identification
    pub min_segment: f64,
    /// Label spans closer than this are merged
    pub max_gap: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sources: SourceToggles::default(),
            min_trust: TrustLevel::Low,
            expected_participants: Vec::new(),
            tags: Vec::new(),
            names: NameResolver::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            min_segment: DEFAULT_MIN_SEGMENT,
            max_gap: DEFAULT_MAX_GAP,
        }
    }
}

/// Inclusive minimum-trust check
pub fn passes_min_trust(trust: TrustLevel, min_trust: TrustLevel) -> bool {
    trust >= min_trust
}

/// A source that contributed nothing because its provider failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    pub reason: String,
}

/// Collector output for one recording
#[derive(Debug, Clone, Default)]
pub struct CollectedEvidence {
    /// Evidence per label of the primary transcript (every label present)
    pub per_label: BTreeMap<Label, Vec<Evidence>>,
    /// Catalog context name, if any
    pub context_name: Option<String>,
    pub failures: Vec<SourceFailure>,
}

/// Detections from one transcript source
struct SourceDetections {
    source: String,
    detections: Vec<NameDetection>,
}

/// Signal Collector
///
/// Providers are optional; an absent provider behaves like a disabled source.
///
/// # Example
/// ```rust,ignore
/// let collector = SignalCollector::new(CollectorConfig::default())
///     .with_voice_identifier(Arc::new(CommandIdentifier::new("spkr-identify", vec![])))
///     .with_catalog(Arc::new(CatalogDirectory::new(catalog_dir)))
///     .with_agreement(Arc::new(TranscriptAgreement::default()));
///
/// let collected = collector.collect(&recording, &primary, &[], &cancel).await?;
/// ```
#[derive(Clone)]
pub struct SignalCollector {
    config: CollectorConfig,
    voice: Option<Arc<dyn VoiceIdentifier>>,
    analyzer: Option<Arc<dyn ConversationAnalyzer>>,
    catalog: Option<Arc<dyn ParticipantCatalog>>,
    agreement: Option<Arc<dyn AgreementDetector>>,
}

impl SignalCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            voice: None,
            analyzer: None,
            catalog: None,
            agreement: None,
        }
    }

    pub fn with_voice_identifier(mut self, voice: Arc<dyn VoiceIdentifier>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ConversationAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ParticipantCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_agreement(mut self, agreement: Arc<dyn AgreementDetector>) -> Self {
        self.agreement = Some(agreement);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Same providers, different run configuration
    pub fn with_config(&self, config: CollectorConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    /// Collect evidence for every label of `primary`
    ///
    /// `secondary` transcripts of the same recording only feed cross-source
    /// agreement. Cancellation drops all in-flight provider calls and
    /// returns [`AssignError::Cancelled`].
    pub async fn collect(
        &self,
        recording: &RecordingContext,
        primary: &Transcript,
        secondary: &[Transcript],
        cancel: &CancellationToken,
    ) -> AssignResult<CollectedEvidence> {
        if cancel.is_cancelled() {
            return Err(AssignError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(recording_id = %recording.recording_id, "Evidence collection cancelled");
                Err(AssignError::Cancelled)
            }
            collected = self.collect_all(recording, primary, secondary) => Ok(collected),
        }
    }

    async fn collect_all(
        &self,
        recording: &RecordingContext,
        primary: &Transcript,
        secondary: &[Transcript],
    ) -> CollectedEvidence {
        let labels = primary.labels();
        let secondary = distinct_secondaries(primary, secondary);

        let (catalog, biometric, content) = tokio::join!(
            self.lookup_catalog(recording),
            self.identify_labels(recording, primary, &labels),
            self.analyze_transcripts(primary, &secondary),
        );

        let mut failures = Vec::new();
        let catalog = catalog.unwrap_or_else(|f| {
            failures.push(f);
            CatalogContext::default()
        });

        let mut biometric_by_label: BTreeMap<Label, Vec<BiometricMatch>> = BTreeMap::new();
        for (label, result) in biometric {
            match result {
                Ok(matches) => {
                    biometric_by_label.insert(label, matches);
                }
                Err(f) => failures.push(f),
            }
        }

        let mut detections = Vec::new();
        for result in content {
            match result {
                Ok(d) => detections.push(d),
                Err(f) => failures.push(f),
            }
        }

        let expected = self.expected_participants(&catalog);
        let primary_source = primary.path().display().to_string();

        let mut per_label = BTreeMap::new();
        for label in labels {
            let evidence = self.label_evidence(
                &label,
                &primary_source,
                biometric_by_label.remove(&label).unwrap_or_default(),
                &detections,
                &expected,
            );
            per_label.insert(label, evidence);
        }

        info!(
            recording_id = %recording.recording_id,
            labels = per_label.len(),
            items = per_label.values().map(Vec::len).sum::<usize>(),
            failed_sources = failures.len(),
            "Evidence collected"
        );

        CollectedEvidence {
            per_label,
            context_name: catalog.name,
            failures,
        }
    }

    /// Run one provider call under the time budget
    ///
    /// Errors and timeouts become a [`SourceFailure`]; nothing is retried.
    async fn guarded<T>(
        &self,
        source: &str,
        label: Option<&str>,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, SourceFailure> {
        let error = match tokio::time::timeout(self.config.provider_timeout, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout(self.config.provider_timeout),
        };

        warn!(
            source = source,
            label = label.unwrap_or("-"),
            error = %error,
            "Evidence source failed; continuing without it"
        );

        Err(SourceFailure {
            source: source.to_string(),
            label: label.map(str::to_string),
            reason: error.to_string(),
        })
    }

    async fn lookup_catalog(&self, recording: &RecordingContext) -> Result<CatalogContext, SourceFailure> {
        match &self.catalog {
            Some(catalog) => self.guarded("catalog", None, catalog.lookup(recording)).await,
            None => Ok(CatalogContext::default()),
        }
    }

    async fn identify_labels(
        &self,
        recording: &RecordingContext,
        primary: &Transcript,
        labels: &[Label],
    ) -> Vec<(Label, Result<Vec<BiometricMatch>, SourceFailure>)> {
        let voice = match &self.voice {
            Some(voice) if self.config.sources.biometric => voice,
            _ => return vec![],
        };

        let calls = labels.iter().filter_map(|label| {
            let segments =
                primary.merged_segments(label, self.config.min_segment, self.config.max_gap);
            if segments.is_empty() {
                debug!(label = %label, "No usable audio segments; skipping identification");
                return None;
            }

            let span = AudioSpan {
                audio_path: recording.audio_path.clone(),
                label: label.clone(),
                segments,
                tags: self.config.tags.clone(),
            };

            Some(async move {
                let result = self
                    .guarded(voice.name(), Some(label.as_str()), voice.identify(&span))
                    .await;
                (label.clone(), result)
            })
        });

        join_all(calls).await
    }

    async fn analyze_transcripts(
        &self,
        primary: &Transcript,
        secondary: &[&Transcript],
    ) -> Vec<Result<SourceDetections, SourceFailure>> {
        let analyzer = match &self.analyzer {
            Some(analyzer) if self.config.sources.content => analyzer,
            _ => return vec![],
        };

        // Secondary transcripts only matter for agreement
        let analyze_secondary = self.config.sources.agreement && self.agreement.is_some();
        let transcripts = std::iter::once(primary)
            .chain(secondary.iter().copied().filter(|_| analyze_secondary));

        let calls = transcripts.map(|transcript| async move {
            let conversation = transcript.conversation();
            self.guarded(analyzer.name(), None, analyzer.analyze(&conversation))
                .await
                .map(|detections| SourceDetections {
                    source: transcript.path().display().to_string(),
                    detections,
                })
        });

        join_all(calls).await
    }

    /// Configured participants first, then catalog participants
    fn expected_participants(&self, catalog: &CatalogContext) -> Vec<(CandidateId, &'static str)> {
        if !self.config.sources.expected {
            return vec![];
        }

        let mut expected: Vec<(CandidateId, &'static str)> = Vec::new();
        let configured = self.config.expected_participants.iter().map(|c| (c, "config"));
        let cataloged = catalog.expected_participants.iter().map(|c| (c, "catalog"));
        for (candidate, source) in configured.chain(cataloged) {
            if !expected.iter().any(|(c, _)| c == candidate) {
                expected.push((candidate.clone(), source));
            }
        }
        expected
    }

    fn label_evidence(
        &self,
        label: &str,
        primary_source: &str,
        matches: Vec<BiometricMatch>,
        detections: &[SourceDetections],
        expected: &[(CandidateId, &'static str)],
    ) -> Vec<Evidence> {
        let mut evidence = Vec::new();
        let mut observations = Vec::new();

        if let Some(voice) = &self.voice {
            for m in matches {
                if !passes_min_trust(m.trust, self.config.min_trust) {
                    debug!(
                        label = label,
                        candidate = %m.candidate_id,
                        trust = %m.trust,
                        min_trust = %self.config.min_trust,
                        "Biometric match below minimum trust; dropped"
                    );
                    continue;
                }

                let item = Evidence::biometric(
                    m.candidate_id,
                    m.similarity,
                    m.trust,
                    Provenance::new(voice.name())
                        .with_detail(format!("voice similarity {:.3}", m.similarity)),
                );
                if item.raw_score > 0.0 && item.trust != Some(TrustLevel::Invalidated) {
                    observations.push(SourceObservation {
                        source: primary_source.to_string(),
                        label: label.to_string(),
                        candidate_id: item.candidate_id.clone(),
                    });
                }
                evidence.push(item);
            }
        }

        let analyzer_name = self.analyzer.as_ref().map(|a| a.name()).unwrap_or("content");
        for source in detections {
            let is_primary = source.source == primary_source;
            for d in source.detections.iter().filter(|d| d.label == label) {
                let Some(candidate) = self.config.names.resolve(&d.candidate_name) else {
                    continue;
                };

                observations.push(SourceObservation {
                    source: source.source.clone(),
                    label: label.to_string(),
                    candidate_id: candidate.clone(),
                });

                if is_primary {
                    evidence.push(Evidence::content_name(
                        candidate,
                        d.confidence,
                        Provenance::new(analyzer_name)
                            .with_detail(format!("detected name '{}'", d.candidate_name))
                            .with_quotes(d.evidence_quotes.clone()),
                    ));
                }
            }
        }

        for (candidate, source) in expected {
            evidence.push(Evidence::expected_participant(candidate.clone(), source));
        }

        if self.config.sources.agreement {
            if let Some(agreement) = &self.agreement {
                evidence.extend(agreement.corroborate(label, &observations));
            }
        }

        debug!(label = label, items = evidence.len(), "Label evidence assembled");
        evidence
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Conversation;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    const TRANSCRIPT: &str = r#"{"utterances": [
        {"speaker": "A", "start": 0, "end": 4000, "text": "Hello everyone, this is Alice"},
        {"speaker": "B", "start": 5000, "end": 9000, "text": "Hi Alice, Bob here"}
    ]}"#;

    fn transcript(name: &str) -> Transcript {
        Transcript::from_json_str(Path::new(name), TRANSCRIPT).unwrap()
    }

    fn recording() -> RecordingContext {
        RecordingContext {
            recording_id: "rec".to_string(),
            audio_path: PathBuf::from("/tmp/rec.wav"),
        }
    }

    struct FixedVoice(Vec<BiometricMatch>);

    #[async_trait]
    impl VoiceIdentifier for FixedVoice {
        fn name(&self) -> &str {
            "fixed-voice"
        }

        async fn identify(&self, span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError> {
            Ok(if span.label == "A" { self.0.clone() } else { vec![] })
        }
    }

    struct FailingVoice;

    #[async_trait]
    impl VoiceIdentifier for FailingVoice {
        fn name(&self) -> &str {
            "failing-voice"
        }

        async fn identify(&self, _span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError> {
            Err(ProviderError::Unavailable("not installed".to_string()))
        }
    }

    struct SlowVoice;

    #[async_trait]
    impl VoiceIdentifier for SlowVoice {
        fn name(&self) -> &str {
            "slow-voice"
        }

        async fn identify(&self, _span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    struct FixedAnalyzer;

    #[async_trait]
    impl ConversationAnalyzer for FixedAnalyzer {
        fn name(&self) -> &str {
            "fixed-llm"
        }

        async fn analyze(&self, _c: &Conversation) -> Result<Vec<NameDetection>, ProviderError> {
            Ok(vec![NameDetection {
                label: "A".to_string(),
                candidate_name: "Alice".to_string(),
                confidence: 0.9,
                evidence_quotes: vec!["this is Alice".to_string()],
            }])
        }
    }

    fn matches() -> Vec<BiometricMatch> {
        vec![
            BiometricMatch {
                candidate_id: "alice".to_string(),
                similarity: 0.92,
                trust: TrustLevel::Medium,
            },
            BiometricMatch {
                candidate_id: "bob".to_string(),
                similarity: 0.61,
                trust: TrustLevel::Low,
            },
            BiometricMatch {
                candidate_id: "carol".to_string(),
                similarity: 0.55,
                trust: TrustLevel::Invalidated,
            },
        ]
    }

    fn kinds(evidence: &[Evidence], kind: EvidenceKind) -> Vec<&str> {
        evidence
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.candidate_id.as_str())
            .collect()
    }

    #[test]
    fn test_min_trust_is_inclusive() {
        assert!(passes_min_trust(TrustLevel::Medium, TrustLevel::Medium));
        assert!(passes_min_trust(TrustLevel::High, TrustLevel::Medium));
        assert!(!passes_min_trust(TrustLevel::Unknown, TrustLevel::Medium));
        assert!(!passes_min_trust(TrustLevel::Invalidated, TrustLevel::Low));
    }

    #[tokio::test]
    async fn test_min_trust_filter_drops_items_below_minimum() {
        let config = CollectorConfig {
            min_trust: TrustLevel::Low,
            ..CollectorConfig::default()
        };
        let collector =
            SignalCollector::new(config).with_voice_identifier(Arc::new(FixedVoice(matches())));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        let a = &collected.per_label["A"];
        assert_eq!(kinds(a, EvidenceKind::BiometricMatch), vec!["alice", "bob"]);
        assert!(collected.per_label["B"].is_empty());
    }

    #[tokio::test]
    async fn test_min_trust_medium_keeps_only_medium_and_above() {
        let config = CollectorConfig {
            min_trust: TrustLevel::Medium,
            ..CollectorConfig::default()
        };
        let collector =
            SignalCollector::new(config).with_voice_identifier(Arc::new(FixedVoice(matches())));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            kinds(&collected.per_label["A"], EvidenceKind::BiometricMatch),
            vec!["alice"]
        );
    }

    #[tokio::test]
    async fn test_failed_provider_contributes_nothing() {
        let config = CollectorConfig {
            expected_participants: vec!["alice".to_string()],
            ..CollectorConfig::default()
        };
        let collector = SignalCollector::new(config).with_voice_identifier(Arc::new(FailingVoice));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(collected.failures.len(), 2);
        assert_eq!(collected.failures[0].source, "failing-voice");
        let a = &collected.per_label["A"];
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].kind, EvidenceKind::ExpectedParticipant);
    }

    #[tokio::test]
    async fn test_timeout_treated_as_absent() {
        let config = CollectorConfig {
            provider_timeout: Duration::from_millis(50),
            ..CollectorConfig::default()
        };
        let collector = SignalCollector::new(config)
            .with_voice_identifier(Arc::new(SlowVoice))
            .with_analyzer(Arc::new(FixedAnalyzer));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert!(collected
            .failures
            .iter()
            .all(|f| f.reason.contains("timed out")));
        assert_eq!(
            kinds(&collected.per_label["A"], EvidenceKind::ContentNameDetection),
            vec!["alice"]
        );
    }

    #[tokio::test]
    async fn test_disabled_sources_emit_nothing() {
        let config = CollectorConfig {
            sources: SourceToggles {
                biometric: false,
                content: false,
                expected: false,
                agreement: false,
            },
            expected_participants: vec!["alice".to_string()],
            ..CollectorConfig::default()
        };
        let collector = SignalCollector::new(config)
            .with_voice_identifier(Arc::new(FixedVoice(matches())))
            .with_analyzer(Arc::new(FixedAnalyzer));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert!(collected.per_label.values().all(Vec::is_empty));
        assert!(collected.failures.is_empty());
    }

    #[tokio::test]
    async fn test_content_name_mapped_through_aliases() {
        let config = CollectorConfig {
            names: NameResolver::default().with_alias("Alice", "alice-smith"),
            ..CollectorConfig::default()
        };
        let collector = SignalCollector::new(config).with_analyzer(Arc::new(FixedAnalyzer));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        let content = &collected.per_label["A"][0];
        assert_eq!(content.candidate_id, "alice-smith");
        assert_eq!(content.provenance.quotes, vec!["this is Alice"]);
    }

    #[tokio::test]
    async fn test_expected_participants_deduplicated() {
        let config = CollectorConfig {
            expected_participants: vec!["alice".to_string(), "bob".to_string(), "alice".to_string()],
            ..CollectorConfig::default()
        };
        let collected = SignalCollector::new(config)
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        let b = &collected.per_label["B"];
        assert_eq!(kinds(b, EvidenceKind::ExpectedParticipant), vec!["alice", "bob"]);
        assert!(b.iter().all(|e| e.raw_score == 0.5));
    }

    #[tokio::test]
    async fn test_agreement_across_transcripts() {
        let collector = SignalCollector::new(CollectorConfig::default())
            .with_analyzer(Arc::new(FixedAnalyzer))
            .with_agreement(Arc::new(TranscriptAgreement::default()));

        let collected = collector
            .collect(
                &recording(),
                &transcript("assemblyai.json"),
                &[transcript("speechmatics.json")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let a = &collected.per_label["A"];
        assert_eq!(kinds(a, EvidenceKind::ContentNameDetection), vec!["alice"]);
        assert_eq!(kinds(a, EvidenceKind::CrossSourceAgreement), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_primary_repeated_as_secondary_counts_once() {
        let collector = SignalCollector::new(CollectorConfig::default())
            .with_analyzer(Arc::new(FixedAnalyzer))
            .with_agreement(Arc::new(TranscriptAgreement::default()));

        let collected = collector
            .collect(
                &recording(),
                &transcript("t.json"),
                &[transcript("t.json")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let a = &collected.per_label["A"];
        assert_eq!(kinds(a, EvidenceKind::ContentNameDetection), vec!["alice"]);
        assert!(kinds(a, EvidenceKind::CrossSourceAgreement).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_secondaries_deduplicated() {
        let collector = SignalCollector::new(CollectorConfig::default())
            .with_analyzer(Arc::new(FixedAnalyzer))
            .with_agreement(Arc::new(TranscriptAgreement::default()));

        let collected = collector
            .collect(
                &recording(),
                &transcript("t.json"),
                &[transcript("other.json"), transcript("other.json"), transcript("t.json")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let a = &collected.per_label["A"];
        assert_eq!(kinds(a, EvidenceKind::ContentNameDetection), vec!["alice"]);
        assert_eq!(kinds(a, EvidenceKind::CrossSourceAgreement), vec!["alice"]);
    }

    #[test]
    fn test_distinct_secondaries_keeps_first_of_each_path() {
        let primary = transcript("t.json");
        let secondary = vec![transcript("a.json"), transcript("t.json"), transcript("a.json"), transcript("b.json")];

        let paths: Vec<&Path> = distinct_secondaries(&primary, &secondary)
            .iter()
            .map(|t| t.path())
            .collect();
        assert_eq!(paths, vec![Path::new("a.json"), Path::new("b.json")]);
    }

    #[tokio::test]
    async fn test_single_transcript_never_agrees() {
        let collector = SignalCollector::new(CollectorConfig::default())
            .with_voice_identifier(Arc::new(FixedVoice(matches())))
            .with_analyzer(Arc::new(FixedAnalyzer))
            .with_agreement(Arc::new(TranscriptAgreement::default()));

        let collected = collector
            .collect(&recording(), &transcript("t.json"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert!(kinds(&collected.per_label["A"], EvidenceKind::CrossSourceAgreement).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_collection_returns_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = SignalCollector::new(CollectorConfig::default())
            .with_voice_identifier(Arc::new(SlowVoice))
            .collect(&recording(), &transcript("t.json"), &[], &cancel)
            .await;

        assert!(matches!(result, Err(AssignError::Cancelled)));
    }
}
