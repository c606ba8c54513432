//! Shared fixtures and fake providers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use spkr_assign::collector::{CollectorConfig, SignalCollector, TranscriptAgreement};
use spkr_assign::fusion::{AssignmentResolver, EngineConfig};
use spkr_assign::store::AssignmentStore;
use spkr_assign::types::{
    AudioSpan, BiometricMatch, Conversation, ConversationAnalyzer, NameDetection, ProviderError,
    TrustLevel, VoiceIdentifier,
};
use spkr_assign::workflow::{AssignRequest, Assigner};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// AssemblyAI-style transcript, times in milliseconds
pub const MEETING: &str = r#"{"utterances": [
    {"speaker": "A", "start": 0, "end": 4000, "text": "Good morning, this is Alice"},
    {"speaker": "B", "start": 4500, "end": 9000, "text": "Thanks Alice, Bob here"},
    {"speaker": "A", "start": 9500, "end": 12000, "text": "Let's start"}
]}"#;

/// Same meeting, Speechmatics format
pub const MEETING_SPEECHMATICS: &str = r#"{"results": [
    {"type": "word", "start_time": 0.0, "end_time": 0.5, "alternatives": [{"content": "Good", "speaker": "S1"}]},
    {"type": "word", "start_time": 0.5, "end_time": 1.2, "alternatives": [{"content": "morning", "speaker": "S1"}]},
    {"type": "word", "start_time": 4.5, "end_time": 5.0, "alternatives": [{"content": "Thanks", "speaker": "S2"}]},
    {"type": "word", "start_time": 5.0, "end_time": 5.6, "alternatives": [{"content": "Alice", "speaker": "S2"}]}
]}"#;

pub struct Fixture {
    pub dir: TempDir,
    pub audio: PathBuf,
    pub transcript: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_audio(b"RIFF fake meeting audio")
    }

    pub fn with_audio(bytes: &[u8]) -> Self {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("meeting.wav");
        std::fs::write(&audio, bytes).unwrap();
        let transcript = dir.path().join("meeting.assemblyai.json");
        std::fs::write(&transcript, MEETING).unwrap();
        Self {
            dir,
            audio,
            transcript,
        }
    }

    /// Write an extra transcript next to the primary one
    pub fn add_transcript(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn store(&self) -> AssignmentStore {
        AssignmentStore::new(self.dir.path().join("assignments"))
    }

    pub fn request(&self) -> AssignRequest {
        AssignRequest {
            audio_path: self.audio.clone(),
            transcript_path: self.transcript.clone(),
            ..AssignRequest::default()
        }
    }
}

/// Returns fixed matches per label
pub struct FakeVoice {
    pub matches: BTreeMap<String, Vec<BiometricMatch>>,
}

impl FakeVoice {
    pub fn new() -> Self {
        Self {
            matches: BTreeMap::new(),
        }
    }

    pub fn with_match(mut self, label: &str, candidate: &str, similarity: f64, trust: TrustLevel) -> Self {
        self.matches
            .entry(label.to_string())
            .or_default()
            .push(BiometricMatch {
                candidate_id: candidate.to_string(),
                similarity,
                trust,
            });
        self
    }
}

#[async_trait]
impl VoiceIdentifier for FakeVoice {
    fn name(&self) -> &str {
        "fake-voice"
    }

    async fn identify(&self, span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError> {
        Ok(self.matches.get(&span.label).cloned().unwrap_or_default())
    }
}

/// Voice service that is never reachable
pub struct DownVoice;

#[async_trait]
impl VoiceIdentifier for DownVoice {
    fn name(&self) -> &str {
        "down-voice"
    }

    async fn identify(&self, _span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }
}

/// Detects "Alice" for label A in every conversation
pub struct FakeAnalyzer;

#[async_trait]
impl ConversationAnalyzer for FakeAnalyzer {
    fn name(&self) -> &str {
        "fake-llm"
    }

    async fn analyze(&self, _conversation: &Conversation) -> Result<Vec<NameDetection>, ProviderError> {
        Ok(vec![NameDetection {
            label: "A".to_string(),
            candidate_name: "Alice".to_string(),
            confidence: 0.9,
            evidence_quotes: vec!["this is Alice".to_string()],
        }])
    }
}

/// Analyzer whose output never parses
pub struct GarbledAnalyzer;

#[async_trait]
impl ConversationAnalyzer for GarbledAnalyzer {
    fn name(&self) -> &str {
        "garbled-llm"
    }

    async fn analyze(&self, _conversation: &Conversation) -> Result<Vec<NameDetection>, ProviderError> {
        Err(ProviderError::Parse("expected value at line 1 column 1".to_string()))
    }
}

pub fn resolver(threshold: f64) -> AssignmentResolver {
    AssignmentResolver::new(EngineConfig::with_threshold(threshold).unwrap())
}

pub fn expected(ids: &[&str]) -> CollectorConfig {
    CollectorConfig {
        expected_participants: ids.iter().map(|s| s.to_string()).collect(),
        ..CollectorConfig::default()
    }
}

/// Collector with the fake voice and analyzer plus agreement detection
pub fn full_collector(config: CollectorConfig, voice: FakeVoice) -> SignalCollector {
    SignalCollector::new(config)
        .with_voice_identifier(Arc::new(voice))
        .with_analyzer(Arc::new(FakeAnalyzer))
        .with_agreement(Arc::new(TranscriptAgreement::default()))
}

pub fn assigner(store: AssignmentStore, threshold: f64, collector: SignalCollector) -> Assigner {
    Assigner::new(resolver(threshold), collector, Arc::new(store))
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

pub fn file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
