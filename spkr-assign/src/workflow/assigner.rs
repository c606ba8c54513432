//! Assignment orchestrator
//!
//! Ties collector, resolver and store together for one recording.
//!
//! # Error Handling
//! - Unreadable transcript or missing audio aborts before any label is processed
//! - Provider failures only thin out the evidence (see the collector)
//! - Cancellation at any point before the write discards everything
//!
//! # Example
//! ```rust,ignore
//! let assigner = Assigner::new(resolver, collector, Arc::new(AssignmentStore::new(dir)));
//! let report = assigner.run(&request, &CancellationToken::new()).await?;
//! println!("{} of {} labels assigned", report.assigned(), report.labels.len());
//! ```

use super::AssignEvent;
use crate::collector::{SignalCollector, SourceFailure};
use crate::error::{AssignError, AssignResult};
use crate::fusion::AssignmentResolver;
use crate::recording_id::{HashAlgorithm, RecordingId};
use crate::store::{AssignmentSink, LabelAssignment, RecordingAssignment, METHOD, SCHEMA_VERSION};
use crate::transcript::Transcript;
use crate::types::{CandidateId, ConfidenceTier, Label, RecordingContext, ResolutionOutcome};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One assignment run
#[derive(Debug, Clone, Default)]
pub struct AssignRequest {
    pub audio_path: PathBuf,
    pub transcript_path: PathBuf,
    /// Other transcripts of the same recording (cross-source agreement)
    pub secondary_transcripts: Vec<PathBuf>,
    /// Write here instead of the store's own location
    pub output_path: Option<PathBuf>,
    /// Resolve but do not persist
    pub dry_run: bool,
}

/// Per-label summary
#[derive(Debug, Clone, PartialEq)]
pub struct LabelReport {
    pub label: Label,
    pub outcome: ResolutionOutcome,
    pub winner: Option<CandidateId>,
    pub confidence: ConfidenceTier,
    pub score: f64,
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub recording_id: RecordingId,
    pub record: RecordingAssignment,
    pub labels: Vec<LabelReport>,
    /// Where the record was written; `None` for dry runs
    pub saved_to: Option<PathBuf>,
}

impl RunReport {
    fn count(&self, outcome: ResolutionOutcome) -> usize {
        self.labels.iter().filter(|l| l.outcome == outcome).count()
    }

    pub fn assigned(&self) -> usize {
        self.count(ResolutionOutcome::Assigned)
    }

    pub fn below_threshold(&self) -> usize {
        self.count(ResolutionOutcome::BelowThreshold)
    }

    pub fn no_signal(&self) -> usize {
        self.count(ResolutionOutcome::NoSignal)
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.record.degraded_sources
    }
}

/// Per-recording orchestrator
///
/// Cheap to clone; clones share providers and the sink, so independent
/// recordings can run concurrently.
#[derive(Clone)]
pub struct Assigner {
    resolver: AssignmentResolver,
    collector: SignalCollector,
    sink: Arc<dyn AssignmentSink>,
    hash_algorithm: HashAlgorithm,
    event_tx: Option<mpsc::Sender<AssignEvent>>,
}

async fn load_transcript(path: &Path) -> AssignResult<Transcript> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AssignError::NotFound(format!(
                "Transcript not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    Transcript::from_json_str(path, &content)
}

impl Assigner {
    pub fn new(
        resolver: AssignmentResolver,
        collector: SignalCollector,
        sink: Arc<dyn AssignmentSink>,
    ) -> Self {
        Self {
            resolver,
            collector,
            sink,
            hash_algorithm: HashAlgorithm::default(),
            event_tx: None,
        }
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<AssignEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    async fn emit_event(&self, event: AssignEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run one recording end to end
    pub async fn run(&self, request: &AssignRequest, cancel: &CancellationToken) -> AssignResult<RunReport> {
        // Transcripts first: nothing else is worth doing without them
        let primary = load_transcript(&request.transcript_path).await?;
        let mut secondary = Vec::with_capacity(request.secondary_transcripts.len());
        for path in &request.secondary_transcripts {
            secondary.push(load_transcript(path).await?);
        }

        let recording_id = RecordingId::from_file(&request.audio_path, self.hash_algorithm).await?;
        let labels = primary.labels();

        info!(
            recording_id = %recording_id,
            transcript = %request.transcript_path.display(),
            labels = labels.len(),
            secondary = secondary.len(),
            "Found {} speakers",
            labels.len()
        );
        self.emit_event(AssignEvent::RunStarted {
            recording_id: recording_id.to_string(),
            labels: labels.len(),
        })
        .await;

        let recording = RecordingContext {
            recording_id: recording_id.to_string(),
            audio_path: request.audio_path.clone(),
        };
        let collected = self
            .collector
            .collect(&recording, &primary, &secondary, cancel)
            .await?;

        let mut per_label = BTreeMap::new();
        let mut label_reports = Vec::with_capacity(collected.per_label.len());
        for (label, evidence) in &collected.per_label {
            let result = self.resolver.resolve(label, evidence);
            let report = LabelReport {
                label: label.clone(),
                outcome: result.outcome(),
                winner: result.winner.clone(),
                confidence: result.confidence,
                score: result.score,
            };

            self.emit_event(AssignEvent::LabelResolved {
                label: report.label.clone(),
                outcome: report.outcome,
                winner: report.winner.clone(),
                confidence: report.confidence,
                score: report.score,
            })
            .await;

            label_reports.push(report);
            per_label.insert(label.clone(), LabelAssignment::from(result));
        }

        let config = self.resolver.config();
        let record = RecordingAssignment {
            schema_version: SCHEMA_VERSION,
            recording_id: recording_id.clone(),
            audio_path: Some(request.audio_path.clone()),
            transcript_path: request.transcript_path.clone(),
            secondary_transcripts: request.secondary_transcripts.clone(),
            assigned_at: Utc::now(),
            method: METHOD.to_string(),
            threshold: config.acceptance_threshold.value(),
            min_trust: self.collector.config().min_trust,
            context: collected.context_name,
            degraded_sources: collected.failures,
            per_label,
        };

        if cancel.is_cancelled() {
            info!(recording_id = %recording_id, "Run cancelled before save; results discarded");
            return Err(AssignError::Cancelled);
        }

        let saved_to = if request.dry_run {
            debug!(recording_id = %recording_id, "Dry run; not saving");
            None
        } else {
            let path = match &request.output_path {
                Some(path) => {
                    self.sink.write_to(&record, path).await?;
                    path.clone()
                }
                None => self.sink.write(&record).await?,
            };
            self.emit_event(AssignEvent::Saved { path: path.clone() }).await;
            Some(path)
        };

        let report = RunReport {
            recording_id,
            record,
            labels: label_reports,
            saved_to,
        };

        info!(
            recording_id = %report.recording_id,
            assigned = report.assigned(),
            below_threshold = report.below_threshold(),
            no_signal = report.no_signal(),
            "Assignment run complete"
        );

        Ok(report)
    }
}
