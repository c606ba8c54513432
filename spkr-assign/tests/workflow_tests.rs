//! End-to-end assignment runs with fake providers
//!
//! Transcript on disk → collector → resolver → YAML store.

mod helpers;

use helpers::*;
use spkr_assign::collector::{CollectorConfig, SignalCollector};
use spkr_assign::store::RecordingAssignment;
use spkr_assign::types::{ConfidenceTier, EvidenceKind, ResolutionOutcome, TrustLevel};
use spkr_assign::AssignError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn alice_voice() -> FakeVoice {
    FakeVoice::new().with_match("A", "alice", 0.92, TrustLevel::Medium)
}

#[tokio::test]
async fn test_all_sources_agree_on_alice() {
    let f = Fixture::new();
    let collector = full_collector(expected(&["alice", "bob"]), alice_voice());

    let report = assigner(f.store(), 0.3, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    // 0.4*0.7*0.92 + 0.3*0.9 + 0.2*0.5
    let a = &report.record.per_label["A"];
    assert_eq!(a.winner.as_deref(), Some("alice"));
    assert!(approx(a.score, 0.6276), "score was {}", a.score);
    assert_eq!(a.confidence, ConfidenceTier::Medium);

    let kinds: Vec<EvidenceKind> = a.contributing_evidence.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EvidenceKind::BiometricMatch));
    assert!(kinds.contains(&EvidenceKind::ContentNameDetection));
    assert!(kinds.contains(&EvidenceKind::ExpectedParticipant));
    assert!(!kinds.contains(&EvidenceKind::CrossSourceAgreement));

    // Only the weak prior for B; equal scores rank alphabetically
    let b = &report.record.per_label["B"];
    assert_eq!(b.winner, None);
    assert_eq!(b.confidence, ConfidenceTier::Unassigned);
    assert!(approx(b.score, 0.1));
    assert_eq!(b.alternatives[0].candidate_id, "alice");
    assert_eq!(b.alternatives[1].candidate_id, "bob");

    assert_eq!(report.assigned(), 1);
    assert_eq!(report.below_threshold(), 1);
    assert!(report.failures().is_empty());
}

#[tokio::test]
async fn test_second_transcript_adds_agreement() {
    let f = Fixture::new();
    let secondary = f.add_transcript("meeting.other.json", MEETING);
    let collector = full_collector(expected(&["alice", "bob"]), alice_voice());

    let mut request = f.request();
    request.secondary_transcripts = vec![secondary.clone()];

    let report = assigner(f.store(), 0.3, collector)
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    let a = &report.record.per_label["A"];
    assert_eq!(a.winner.as_deref(), Some("alice"));
    assert!(approx(a.score, 0.7276), "score was {}", a.score);
    assert_eq!(a.confidence, ConfidenceTier::High);

    let agreement: Vec<_> = a
        .contributing_evidence
        .iter()
        .filter(|e| e.kind == EvidenceKind::CrossSourceAgreement)
        .collect();
    assert_eq!(agreement.len(), 1);
    assert_eq!(agreement[0].provenance.source, "transcript_agreement");

    // Secondary content never counts as direct evidence
    let content = a
        .contributing_evidence
        .iter()
        .filter(|e| e.kind == EvidenceKind::ContentNameDetection)
        .count();
    assert_eq!(content, 1);

    assert_eq!(report.record.secondary_transcripts, vec![secondary]);
}

#[tokio::test]
async fn test_agreement_disabled_ignores_second_transcript() {
    let f = Fixture::new();
    let secondary = f.add_transcript("meeting.other.json", MEETING);
    let mut config = expected(&["alice"]);
    config.sources.agreement = false;

    let mut request = f.request();
    request.secondary_transcripts = vec![secondary];

    let report = assigner(f.store(), 0.3, full_collector(config, alice_voice()))
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    let a = &report.record.per_label["A"];
    assert!(approx(a.score, 0.6276));
    assert!(a
        .contributing_evidence
        .iter()
        .all(|e| e.kind != EvidenceKind::CrossSourceAgreement));
}

#[tokio::test]
async fn test_unreachable_voice_service_degrades() {
    let f = Fixture::new();
    let collector = SignalCollector::new(expected(&["alice"]))
        .with_voice_identifier(Arc::new(DownVoice))
        .with_analyzer(Arc::new(FakeAnalyzer));

    let report = assigner(f.store(), 0.3, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    // Content plus prior still carry A: 0.27 + 0.1
    let a = &report.record.per_label["A"];
    assert_eq!(a.winner.as_deref(), Some("alice"));
    assert!(approx(a.score, 0.37));
    assert_eq!(a.confidence, ConfidenceTier::Low);

    let failed_labels: Vec<Option<String>> = report
        .failures()
        .iter()
        .filter(|f| f.source == "down-voice")
        .map(|f| f.label.clone())
        .collect();
    assert_eq!(
        failed_labels,
        vec![Some("A".to_string()), Some("B".to_string())]
    );

    // Degraded sources are persisted with the record
    let saved = f.store().load(report.recording_id.as_str()).await.unwrap();
    assert_eq!(saved.degraded_sources.len(), 2);
}

#[tokio::test]
async fn test_all_providers_failing_still_completes() {
    let f = Fixture::new();
    let collector = SignalCollector::new(CollectorConfig::default())
        .with_voice_identifier(Arc::new(DownVoice))
        .with_analyzer(Arc::new(GarbledAnalyzer));

    let report = assigner(f.store(), 0.3, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.no_signal(), 2);
    assert_eq!(report.failures().len(), 3);
    assert!(report.saved_to.is_some());
}

#[tokio::test]
async fn test_weak_prior_alone_stays_below_default_threshold() {
    let f = Fixture::new();
    let collector = SignalCollector::new(expected(&["carol"]));

    let report = assigner(f.store(), 0.3, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    for label in &report.labels {
        assert_eq!(label.outcome, ResolutionOutcome::BelowThreshold);
        assert!(approx(label.score, 0.1));
    }
}

#[tokio::test]
async fn test_threshold_boundary_is_inclusive() {
    let f = Fixture::new();
    let collector = SignalCollector::new(expected(&["carol"]));

    let report = assigner(f.store(), 0.1, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    // Accepted, but too weak for any named tier; the same candidate may win
    // several labels
    for label in &report.labels {
        assert_eq!(label.outcome, ResolutionOutcome::Assigned);
        assert_eq!(label.winner.as_deref(), Some("carol"));
        assert_eq!(label.confidence, ConfidenceTier::Unassigned);
    }
}

#[tokio::test]
async fn test_min_trust_filter_drops_low_matches() {
    let voice = || FakeVoice::new().with_match("A", "alice", 0.95, TrustLevel::Low);

    let f = Fixture::new();
    let strict = CollectorConfig {
        min_trust: TrustLevel::Medium,
        ..CollectorConfig::default()
    };
    let report = assigner(f.store(), 0.3, full_collector(strict, voice()))
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();
    let a = &report.record.per_label["A"];
    assert_eq!(a.winner, None);
    assert!(approx(a.score, 0.27));

    let f = Fixture::new();
    let report = assigner(f.store(), 0.3, full_collector(CollectorConfig::default(), voice()))
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();
    let a = &report.record.per_label["A"];
    assert_eq!(a.winner.as_deref(), Some("alice"));
    // 0.4*0.4*0.95 + 0.27
    assert!(approx(a.score, 0.422));
}

#[tokio::test]
async fn test_invalidated_profile_contributes_nothing() {
    let f = Fixture::new();
    let voice = FakeVoice::new()
        .with_match("A", "alice", 1.0, TrustLevel::Invalidated)
        .with_match("A", "bob", 0.6, TrustLevel::High);
    let config = CollectorConfig {
        min_trust: TrustLevel::Invalidated,
        ..CollectorConfig::default()
    };
    let collector = SignalCollector::new(config).with_voice_identifier(Arc::new(voice));

    let report = assigner(f.store(), 0.2, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    let a = &report.record.per_label["A"];
    assert_eq!(a.winner.as_deref(), Some("bob"));
    assert!(approx(a.score, 0.24));
    assert!(a.alternatives.is_empty());
}

#[tokio::test]
async fn test_invalidated_profile_alone_is_no_signal() {
    let f = Fixture::new();
    let voice = FakeVoice::new().with_match("A", "alice", 0.95, TrustLevel::Invalidated);
    let config = CollectorConfig {
        min_trust: TrustLevel::Invalidated,
        ..CollectorConfig::default()
    };
    let collector = SignalCollector::new(config).with_voice_identifier(Arc::new(voice));

    let report = assigner(f.store(), 0.0, collector)
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    let a = report.labels.iter().find(|l| l.label == "A").unwrap();
    assert_eq!(a.outcome, ResolutionOutcome::NoSignal);
    assert_eq!(a.winner, None);
    assert_eq!(report.assigned(), 0);
}

#[tokio::test]
async fn test_speechmatics_primary_transcript() {
    let f = Fixture::new();
    let transcript = f.add_transcript("meeting.speechmatics.json", MEETING_SPEECHMATICS);
    let mut request = f.request();
    request.transcript_path = transcript;

    let report = assigner(f.store(), 0.1, SignalCollector::new(expected(&["alice"])))
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    let labels: Vec<&str> = report.labels.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, vec!["S1", "S2"]);
}

#[tokio::test]
async fn test_output_path_bypasses_store() {
    let f = Fixture::new();
    let output = f.dir.path().join("out").join("meeting.speakers.yaml");
    let mut request = f.request();
    request.output_path = Some(output.clone());

    let report = assigner(f.store(), 0.3, full_collector(expected(&[]), alice_voice()))
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.saved_to.as_deref(), Some(output.as_path()));
    assert_eq!(file_count(f.store().dir()), 0);

    let content = std::fs::read_to_string(&output).unwrap();
    let record = RecordingAssignment::from_yaml(&content).unwrap();
    assert_eq!(record.recording_id, report.recording_id);
    assert_eq!(record.per_label, report.record.per_label);
}

#[tokio::test]
async fn test_rerun_replaces_previous_record() {
    let f = Fixture::new();
    let store = f.store();

    let first = assigner(store.clone(), 0.3, SignalCollector::new(expected(&["alice"])))
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.assigned(), 0);

    let second = assigner(store.clone(), 0.3, full_collector(expected(&["alice"]), alice_voice()))
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.recording_id, second.recording_id);
    assert_eq!(store.list().await.unwrap().len(), 1);

    let saved = store.load(second.recording_id.as_str()).await.unwrap();
    assert_eq!(saved.assigned_count(), 1);
}

#[tokio::test]
async fn test_saved_record_found_by_prefix() {
    let f = Fixture::new();
    let store = f.store();
    let report = assigner(store.clone(), 0.3, full_collector(expected(&[]), alice_voice()))
        .run(&f.request(), &CancellationToken::new())
        .await
        .unwrap();

    let prefix = &report.recording_id.as_str()[..8];
    let found = store.find(prefix).await.unwrap().unwrap();
    assert_eq!(found.recording_id, report.recording_id);

    assert!(store.clear(report.recording_id.as_str()).await.unwrap());
    assert!(store.find(prefix).await.unwrap().is_none());
    assert!(!store.clear(report.recording_id.as_str()).await.unwrap());
}

#[tokio::test]
async fn test_missing_transcript_aborts_before_hashing() {
    let f = Fixture::new();
    let mut request = f.request();
    request.transcript_path = f.dir.path().join("missing.json");

    let result = assigner(f.store(), 0.3, SignalCollector::new(CollectorConfig::default()))
        .run(&request, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AssignError::NotFound(_))));
    assert_eq!(file_count(f.store().dir()), 0);
}
